//! Product-specific scale/offset rule engine.
//!
//! `policy` decides which convention a grid or swath uses, `modis` rewrites a
//! field's attribute table for the MODIS conventions and `vip` handles the
//! integer-encoded MEaSUREs VIP ranges. [`ScaleRule`] applies the same
//! conventions to data values at read time.

pub mod modis;
pub mod policy;
pub mod vip;

use h4_common::{AttrTable, CfType, H4Error, H4Result, NumberType, SoType};
use num_traits::Float;

pub use modis::{
    change_data_type, handle_modis_special_attrs, handle_modis_special_attrs_disable_scale_comp,
    ModisFieldContext, ModisOutcome,
};
pub use policy::{reclassify, so_type_for_object, ReclassifyInput};

/// Lowest UINT16 value MODIS reserves for non-scaled flags.
pub const MIN_NON_SCALE_SPECIAL_VALUE: i32 = 65500;
/// Highest reserved value; also the usual UINT16 fill value.
pub const MAX_NON_SCALE_SPECIAL_VALUE: i32 = 65535;

/// A field's read-time scale/offset equation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRule {
    pub so_type: SoType,
    pub scale: f64,
    pub offset: f64,
}

impl ScaleRule {
    pub fn new(so_type: SoType, scale: f64, offset: f64) -> Self {
        Self {
            so_type,
            scale,
            offset,
        }
    }

    /// Map one encoded value to its physical value.
    pub fn apply(&self, x: f64) -> f64 {
        match self.so_type {
            SoType::ModisMulScale => self.scale * (x - self.offset),
            SoType::ModisDivScale => (x - self.offset) / self.scale,
            SoType::ModisEqScale | SoType::DefaultCfEqu => self.scale * x + self.offset,
        }
    }

    /// Apply in place, leaving fill values and reserved values untouched.
    ///
    /// Values are matched against the fill at single precision, so a
    /// Float64 fill that f32 cannot represent still finds its cells.
    pub fn apply_slice<T: Float>(&self, data: &mut [T], number_type: NumberType, fill: Option<f64>) {
        let fill = fill.map(|f| f as f32);
        for v in data.iter_mut() {
            if let (Some(fv), Some(rv)) = (fill, v.to_f32()) {
                if rv == fv || is_special_value(number_type, fv, rv) {
                    continue;
                }
            }
            let x = v.to_f64().unwrap_or(0.0);
            if let Some(scaled) = T::from(self.apply(x)) {
                *v = scaled;
            }
        }
    }
}

/// UINT16 MODIS fields with fill 65535 reserve 65500..=65535 for flags.
pub fn is_special_value(number_type: NumberType, fill_value: f32, value: f32) -> bool {
    if number_type != NumberType::Uint16 {
        return false;
    }
    if fill_value as i32 != MAX_NON_SCALE_SPECIAL_VALUE {
        return false;
    }
    let v = value as i32;
    (MIN_NON_SCALE_SPECIAL_VALUE..=MAX_NON_SCALE_SPECIAL_VALUE).contains(&v)
}

/// C `atof`: the longest numeric prefix, 0 when there is none.
pub fn atof(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || (end == digits_start + 1 && bytes[digits_start] == b'.') {
        return 0.0;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}

/// C `atoi`: the leading integer, 0 when there is none.
pub fn atoi(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let value = rest
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, b| acc.wrapping_mul(10).wrapping_add((b - b'0') as i64));
    if negative {
        -value
    } else {
        value
    }
}

/// Strictly parse a numeric attribute value.
pub(crate) fn parse_number(attr: &str, text: &str) -> H4Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| H4Error::malformed(attr, format!("'{text}' is not a number")))
}

/// First value and type of an attribute, if present.
pub(crate) fn first_with_type(table: &AttrTable, name: &str) -> Option<(String, CfType)> {
    table
        .simple_find(name)
        .and_then(|a| a.first().map(|v| (v.to_string(), a.cf_type)))
}
