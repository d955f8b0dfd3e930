//! Attribute value codec.
//!
//! Renders one element of a raw attribute buffer as DAS text and maps HDF4
//! number types to CF type names. Floats use the `%#.Ng` form (10 significant
//! digits for Float32, 17 for Float64) so values survive a text round trip.

use h4_common::dtype::{bytes_to_text, read_element};
use h4_common::{AttrTable, CfType, H4Result, NumberType, RawAttribute};

const FLOAT32_DIGITS: usize = 10;
const FLOAT64_DIGITS: usize = 17;

/// Render element `index` of `data`, interpreted as `number_type`.
///
/// Character types return the whole buffer up to the first NUL and ignore
/// `index`. Unknown types render as `UNKNOWN`.
pub fn print_attr(number_type: NumberType, index: usize, data: &[u8]) -> H4Result<String> {
    let rep = match number_type {
        NumberType::Uint8 => read_element::<u8>(data, index)?.to_string(),
        NumberType::Int8 => read_element::<i8>(data, index)?.to_string(),
        NumberType::Char8 | NumberType::Uchar8 => bytes_to_text(data),
        NumberType::Int16 => read_element::<i16>(data, index)?.to_string(),
        NumberType::Uint16 => read_element::<u16>(data, index)?.to_string(),
        NumberType::Int32 => read_element::<i32>(data, index)?.to_string(),
        NumberType::Uint32 => read_element::<u32>(data, index)?.to_string(),
        NumberType::Float32 => print_float32(read_element::<f32>(data, index)?),
        NumberType::Float64 => print_float64(read_element::<f64>(data, index)?),
        NumberType::Other(_) => "UNKNOWN".to_string(),
    };
    Ok(rep)
}

/// Append a raw attribute: character data as one string, numbers one value
/// per element.
pub fn append_raw_attr(table: &mut AttrTable, name: &str, attr: &RawAttribute) -> H4Result<()> {
    if attr.number_type.is_char() {
        return table.append_attr(name, CfType::String, attr.text());
    }
    let cf_type = print_type(attr.number_type);
    for i in 0..attr.count {
        table.append_attr(name, cf_type, print_attr(attr.number_type, i, &attr.data)?)?;
    }
    Ok(())
}

/// `%#.10g` rendering. Infinities and NaN print as `inf`, `-inf` and
/// `nan` without the trailing point.
pub fn print_float32(value: f32) -> String {
    with_point(format_showpoint(value as f64, FLOAT32_DIGITS), value.is_finite())
}

/// `%#.17g` rendering, with the same non-finite forms as [`print_float32`].
pub fn print_float64(value: f64) -> String {
    with_point(format_showpoint(value, FLOAT64_DIGITS), value.is_finite())
}

/// CF type name of an HDF4 number type.
///
/// INT8 is reported as Int32 because DAP2 has no signed byte.
pub fn print_type(number_type: NumberType) -> CfType {
    match number_type {
        NumberType::Char8 | NumberType::Uchar8 => CfType::String,
        NumberType::Uint8 => CfType::Byte,
        NumberType::Int8 => signed_byte_type(),
        NumberType::Int16 => CfType::Int16,
        NumberType::Uint16 => CfType::UInt16,
        NumberType::Int32 => CfType::Int32,
        NumberType::Uint32 => CfType::UInt32,
        NumberType::Float32 => CfType::Float32,
        NumberType::Float64 => CfType::Float64,
        NumberType::Other(_) => CfType::Unknown,
    }
}

#[cfg(not(feature = "signed-byte-as-byte"))]
fn signed_byte_type() -> CfType {
    CfType::Int32
}

#[cfg(feature = "signed-byte-as-byte")]
fn signed_byte_type() -> CfType {
    CfType::Byte
}

/// Storage size of one element, 0 for unknown types.
pub fn type_size(number_type: NumberType) -> usize {
    number_type.size().unwrap_or(0)
}

/// Escape a string for the DAS.
///
/// Equivalent to three passes in order: double every backslash, octal-escape
/// every byte outside the printable set, then escape double quotes. Doing it
/// in one pass keeps generated `\ooo` sequences from being re-escaped.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for_each_byte(s, |b| match b {
        b'\\' => out.push_str("\\\\"),
        b'"' => out.push_str("\\\""),
        b if is_printable(b) => out.push(b as char),
        b => push_octal(&mut out, b),
    });
    out
}

/// Octal-escape non-printable bytes only.
///
/// Used to recover the textual form of character-typed fill values.
pub fn escape_fill_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for_each_byte(s, |b| {
        if is_printable(b) {
            out.push(b as char)
        } else {
            push_octal(&mut out, b)
        }
    });
    out
}

/// Visit the raw bytes of a string decoded one char per byte.
///
/// Chars up to U+00FF stand for the byte of the same value; anything wider
/// contributes its UTF-8 encoding.
fn for_each_byte(s: &str, mut f: impl FnMut(u8)) {
    let mut buf = [0u8; 4];
    for c in s.chars() {
        let code = c as u32;
        if code <= 0xFF {
            f(code as u8);
        } else {
            for &b in c.encode_utf8(&mut buf).as_bytes() {
                f(b);
            }
        }
    }
}

fn is_printable(b: u8) -> bool {
    b.is_ascii_graphic() || matches!(b, b' ' | b'\n' | b'\t' | b'\r')
}

fn push_octal(out: &mut String, b: u8) {
    out.push_str(&format!("\\{:03o}", b));
}

fn with_point(mut rep: String, finite: bool) -> String {
    if finite && !rep.contains(['.', 'e', 'E']) {
        rep.push('.');
    }
    rep
}

/// Format like C `printf("%#.*g", digits, value)`.
fn format_showpoint(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    let digits = digits.max(1);

    // Scientific rendering decides the exponent after rounding.
    let sci = format!("{:.*e}", digits - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => (sci.clone(), 0),
    };

    if exp < -4 || exp >= digits as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        let mut mantissa = mantissa;
        if !mantissa.contains('.') {
            mantissa.push('.');
        }
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (digits as i32 - 1 - exp).max(0) as usize;
        let mut fixed = format!("{:.*}", decimals, value);
        if !fixed.contains('.') {
            fixed.push('.');
        }
        fixed
    }
}
