//! HDF4 number types, CF type names and raw attribute buffers.
//!
//! `RawAttribute` is the byte-level form an attribute arrives in from the
//! HDF4 library: a number-type tag, an element count and the packed
//! native-endian buffer. All typed access goes through a single extractor
//! so that per-kind cast rules live in one place.

use bytemuck::Pod;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{H4Error, H4Result};

/// HDF4 number-type tags (`DFNT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NumberType {
    Char8,
    Uchar8,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    /// Any tag this engine does not interpret.
    Other(i32),
}

impl NumberType {
    /// Map a raw `DFNT_*` tag to a number type.
    pub fn from_code(code: i32) -> Self {
        match code {
            4 => Self::Char8,
            3 => Self::Uchar8,
            20 => Self::Int8,
            21 => Self::Uint8,
            22 => Self::Int16,
            23 => Self::Uint16,
            24 => Self::Int32,
            25 => Self::Uint32,
            5 => Self::Float32,
            6 => Self::Float64,
            other => Self::Other(other),
        }
    }

    /// The raw `DFNT_*` tag.
    pub fn code(&self) -> i32 {
        match self {
            Self::Char8 => 4,
            Self::Uchar8 => 3,
            Self::Int8 => 20,
            Self::Uint8 => 21,
            Self::Int16 => 22,
            Self::Uint16 => 23,
            Self::Int32 => 24,
            Self::Uint32 => 25,
            Self::Float32 => 5,
            Self::Float64 => 6,
            Self::Other(code) => *code,
        }
    }

    /// Storage size of one element in bytes, `None` for unknown tags.
    pub fn size(&self) -> Option<usize> {
        match self {
            Self::Char8 | Self::Uchar8 | Self::Int8 | Self::Uint8 => Some(1),
            Self::Int16 | Self::Uint16 => Some(2),
            Self::Int32 | Self::Uint32 | Self::Float32 => Some(4),
            Self::Float64 => Some(8),
            Self::Other(_) => None,
        }
    }

    pub fn is_char(&self) -> bool {
        matches!(self, Self::Char8 | Self::Uchar8)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Uint8
                | Self::Int16
                | Self::Uint16
                | Self::Int32
                | Self::Uint32
        )
    }
}

/// CF-facing type names written into the DAS and DDS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CfType {
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
    String,
    Unknown,
}

impl CfType {
    pub fn name(&self) -> &'static str {
        match self {
            CfType::Byte => "Byte",
            CfType::Int16 => "Int16",
            CfType::UInt16 => "UInt16",
            CfType::Int32 => "Int32",
            CfType::UInt32 => "UInt32",
            CfType::Float32 => "Float32",
            CfType::Float64 => "Float64",
            CfType::String => "String",
            CfType::Unknown => "Unknown",
        }
    }

    /// Parse a CF type name; unrecognised names map to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Byte" => CfType::Byte,
            "Int16" => CfType::Int16,
            "UInt16" => CfType::UInt16,
            "Int32" => CfType::Int32,
            "UInt32" => CfType::UInt32,
            "Float32" => CfType::Float32,
            "Float64" => CfType::Float64,
            "String" => CfType::String,
            _ => CfType::Unknown,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, CfType::Float32 | CfType::Float64)
    }
}

impl std::fmt::Display for CfType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An attribute as handed over by the HDF4 library.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub name: String,
    pub number_type: NumberType,
    /// Number of elements (string length for character types).
    pub count: usize,
    pub data: Bytes,
}

impl RawAttribute {
    /// Wrap a packed buffer. The element count is derived from the buffer length.
    pub fn new(name: impl Into<String>, number_type: NumberType, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let count = number_type.size().map(|s| data.len() / s).unwrap_or(0);
        Self {
            name: name.into(),
            number_type,
            count,
            data,
        }
    }

    /// Build a numeric attribute from typed values in native byte order.
    pub fn from_values<T: Pod>(name: impl Into<String>, number_type: NumberType, values: &[T]) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(values);
        Self::new(name, number_type, Bytes::copy_from_slice(bytes))
    }

    /// Build a `CHAR8` attribute from text.
    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        Self::new(name, NumberType::Char8, Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Encode textual values as the given number type.
    pub fn from_text_values(
        name: impl Into<String>,
        number_type: NumberType,
        values: &[String],
    ) -> H4Result<Self> {
        let name = name.into();
        if number_type.is_char() {
            return Ok(Self::new(
                name,
                number_type,
                Bytes::copy_from_slice(values.concat().as_bytes()),
            ));
        }
        let mut buf = Vec::new();
        for v in values {
            let v = v.trim();
            let bad = |_| H4Error::malformed(name.clone(), format!("cannot encode '{v}' as {number_type:?}"));
            match number_type {
                NumberType::Int8 => buf.extend_from_slice(&v.parse::<i8>().map_err(bad)?.to_ne_bytes()),
                NumberType::Uint8 => buf.extend_from_slice(&v.parse::<u8>().map_err(bad)?.to_ne_bytes()),
                NumberType::Int16 => buf.extend_from_slice(&v.parse::<i16>().map_err(bad)?.to_ne_bytes()),
                NumberType::Uint16 => buf.extend_from_slice(&v.parse::<u16>().map_err(bad)?.to_ne_bytes()),
                NumberType::Int32 => buf.extend_from_slice(&v.parse::<i32>().map_err(bad)?.to_ne_bytes()),
                NumberType::Uint32 => buf.extend_from_slice(&v.parse::<u32>().map_err(bad)?.to_ne_bytes()),
                NumberType::Float32 => buf.extend_from_slice(&v.parse::<f32>().map_err(|_| {
                    H4Error::malformed(name.clone(), format!("cannot encode '{v}' as Float32"))
                })?.to_ne_bytes()),
                NumberType::Float64 => buf.extend_from_slice(&v.parse::<f64>().map_err(|_| {
                    H4Error::malformed(name.clone(), format!("cannot encode '{v}' as Float64"))
                })?.to_ne_bytes()),
                _ => return Err(H4Error::UnsupportedType(format!("{number_type:?}"))),
            }
        }
        Ok(Self::new(name, number_type, buf))
    }

    /// Read element `index` as a plain-old-data value of type `T`.
    pub fn element<T: Pod>(&self, index: usize) -> H4Result<T> {
        read_element(&self.data, index)
    }

    /// Read element `index` of any numeric kind widened to f64.
    pub fn element_as_f64(&self, index: usize) -> H4Result<f64> {
        element_as_f64(self.number_type, &self.data, index)
    }

    /// The first element cast to f32, the way scale/offset attributes are read.
    pub fn first_as_f32(&self) -> H4Result<f32> {
        Ok(self.element_as_f64(0)? as f32)
    }

    /// Character payload up to the first NUL, one char per byte.
    pub fn text(&self) -> String {
        bytes_to_text(&self.data)
    }
}

/// Read element `index` of `T` from a packed native-endian buffer.
pub fn read_element<T: Pod>(data: &[u8], index: usize) -> H4Result<T> {
    let size = std::mem::size_of::<T>();
    let start = index * size;
    let end = start + size;
    if end > data.len() {
        return Err(H4Error::invalid_input(format!(
            "element {index} is outside a {}-byte buffer",
            data.len()
        )));
    }
    Ok(bytemuck::pod_read_unaligned(&data[start..end]))
}

/// Widen element `index` of a buffer of the given type to f64.
pub fn element_as_f64(number_type: NumberType, data: &[u8], index: usize) -> H4Result<f64> {
    let v = match number_type {
        NumberType::Int8 => read_element::<i8>(data, index)? as f64,
        NumberType::Uint8 | NumberType::Uchar8 | NumberType::Char8 => {
            read_element::<u8>(data, index)? as f64
        }
        NumberType::Int16 => read_element::<i16>(data, index)? as f64,
        NumberType::Uint16 => read_element::<u16>(data, index)? as f64,
        NumberType::Int32 => read_element::<i32>(data, index)? as f64,
        NumberType::Uint32 => read_element::<u32>(data, index)? as f64,
        NumberType::Float32 => read_element::<f32>(data, index)? as f64,
        NumberType::Float64 => read_element::<f64>(data, index)?,
        NumberType::Other(code) => {
            return Err(H4Error::UnsupportedType(format!("number type {code}")))
        }
    };
    Ok(v)
}

/// Decode bytes up to the first NUL, mapping each byte to one char.
///
/// The byte identity is kept so that escaping can recover the original octets.
pub fn bytes_to_text(data: &[u8]) -> String {
    data.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}
