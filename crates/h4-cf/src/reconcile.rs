//! Fill-value and scale/offset type reconciliation.
//!
//! CF requires `_FillValue` to share the variable's type and `add_offset` to
//! share `scale_factor`'s type. Both fixes use delete-then-reappend so the
//! attribute keeps a single type.

use h4_common::{AttrTable, CfType, H4Error, H4Result};

use crate::codec::escape_fill_value;

pub const FILL_VALUE: &str = "_FillValue";
pub const SCALE_FACTOR: &str = "scale_factor";
pub const ADD_OFFSET: &str = "add_offset";

/// Retype `_FillValue` to `var_type`.
///
/// A fill value that was stored as a String is decoded back to a number: a
/// multi-character value is the octal escape of the original byte, a single
/// character is taken as its 8-bit code and must lie in `[0, 128]`.
pub fn correct_fill_value_type(table: &mut AttrTable, var_type: CfType) -> H4Result<()> {
    let (fill_type, fill_value) = match table.simple_find(FILL_VALUE) {
        Some(attr) => {
            if attr.values.len() != 1 {
                return Err(H4Error::malformed(
                    FILL_VALUE,
                    format!("expected exactly one value, found {}", attr.values.len()),
                ));
            }
            (attr.cf_type, attr.values[0].clone())
        }
        None => return Ok(()),
    };

    if fill_value.is_empty() || fill_type == var_type {
        return Ok(());
    }

    let new_value = if fill_type == CfType::String {
        string_fill_to_number(&fill_value)?
    } else {
        fill_value
    };

    table.del_attr(FILL_VALUE);
    table.append_attr(FILL_VALUE, var_type, new_value)
}

fn string_fill_to_number(value: &str) -> H4Result<String> {
    let escaped = escape_fill_value(value);
    let mut chars = escaped.chars();
    match (chars.next(), chars.next()) {
        (Some(_), Some(_)) => Ok(strtol_octal(&escaped[1..]).to_string()),
        (Some(c), None) => {
            let code = c as u32;
            if code > 128 {
                return Err(H4Error::malformed(
                    FILL_VALUE,
                    format!("character fill value {code} is outside [0, 128]"),
                ));
            }
            Ok(code.to_string())
        }
        _ => Ok(escaped),
    }
}

/// Leading base-8 integer of `s`, `strtol`-style: optional whitespace and
/// sign, then octal digits up to the first non-octal character.
pub fn strtol_octal(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let value = digits
        .bytes()
        .take_while(|b| (b'0'..=b'7').contains(b))
        .fold(0i64, |acc, b| acc.saturating_mul(8).saturating_add((b - b'0') as i64));
    if negative {
        -value
    } else {
        value
    }
}

/// Give `add_offset` the type of `scale_factor`, keeping its text.
///
/// Only the declared type changes; the value is not reinterpreted.
pub fn correct_scale_offset_type(table: &mut AttrTable) -> H4Result<()> {
    let scale_type = match table.simple_find(SCALE_FACTOR) {
        Some(attr) if attr.first().is_some_and(|v| !v.is_empty()) => attr.cf_type,
        _ => return Ok(()),
    };
    let (offset_type, offset_values) = match table.simple_find(ADD_OFFSET) {
        Some(attr) if attr.first().is_some_and(|v| !v.is_empty()) => {
            (attr.cf_type, attr.values.clone())
        }
        _ => return Ok(()),
    };
    if scale_type == offset_type {
        return Ok(());
    }
    table.del_attr(ADD_OFFSET);
    table.append_values(ADD_OFFSET, scale_type, &offset_values)
}
