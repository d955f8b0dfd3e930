//! Field descriptors and the scale/offset convention enum.

use serde::{Deserialize, Serialize};

use crate::dtype::NumberType;

/// Role of a field in the CF view of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FieldType {
    #[default]
    General,
    Latitude,
    Longitude,
    ExistingCv,
    InsertedIndexCv,
    Time,
    AddedCv,
}

impl FieldType {
    pub fn code(&self) -> u8 {
        match self {
            FieldType::General => 0,
            FieldType::Latitude => 1,
            FieldType::Longitude => 2,
            FieldType::ExistingCv => 3,
            FieldType::InsertedIndexCv => 4,
            FieldType::Time => 5,
            FieldType::AddedCv => 6,
        }
    }

    pub fn is_lat_lon(&self) -> bool {
        matches!(self, FieldType::Latitude | FieldType::Longitude)
    }

    /// Fields the engine invented rather than read from the file.
    pub fn is_fake(&self) -> bool {
        self.code() > 3
    }
}

impl TryFrom<u8> for FieldType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(FieldType::General),
            1 => Ok(FieldType::Latitude),
            2 => Ok(FieldType::Longitude),
            3 => Ok(FieldType::ExistingCv),
            4 => Ok(FieldType::InsertedIndexCv),
            5 => Ok(FieldType::Time),
            6 => Ok(FieldType::AddedCv),
            other => Err(format!("field type {other} is outside 0..=6")),
        }
    }
}

impl From<FieldType> for u8 {
    fn from(ft: FieldType) -> u8 {
        ft.code()
    }
}

/// Scale/offset convention of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SoType {
    /// `y = scale * x + offset`, already CF.
    #[default]
    DefaultCfEqu,
    /// `y = scale * (x - offset)`
    ModisMulScale,
    /// `y = (x - offset) / scale`
    ModisDivScale,
    /// `y = scale * x + offset`, with MODIS naming quirks.
    ModisEqScale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub size: usize,
}

impl Dimension {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Latitude layout marker used by MOD13C2-style grids.
pub const MOD13C2_LL_FORMAT: i32 = 3;

/// A field as prepared by the file-open layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Name inside the file.
    pub name: String,
    /// CF-safe, clash-free name used in the DAS/DDS.
    pub new_name: String,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub field_type: FieldType,
    pub number_type: NumberType,
    /// Value of the `coordinates` attribute to emit, if any.
    #[serde(default)]
    pub coordinates: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    /// Fill value the file-open layer decided to add.
    #[serde(default)]
    pub added_fill_value: Option<f32>,
    #[serde(default)]
    pub special_ll_format: i32,
    #[serde(default = "default_ydim_major")]
    pub ydim_major: bool,
}

fn default_ydim_major() -> bool {
    true
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, number_type: NumberType) -> Self {
        let name = name.into();
        Self {
            new_name: name.clone(),
            name,
            dimensions: Vec::new(),
            field_type: FieldType::General,
            number_type,
            coordinates: None,
            units: None,
            added_fill_value: None,
            special_ll_format: 0,
            ydim_major: true,
        }
    }

    pub fn with_new_name(mut self, new_name: impl Into<String>) -> Self {
        self.new_name = new_name.into();
        self
    }

    pub fn with_dim(mut self, name: impl Into<String>, size: usize) -> Self {
        self.dimensions.push(Dimension::new(name, size));
        self
    }

    pub fn with_field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }
}
