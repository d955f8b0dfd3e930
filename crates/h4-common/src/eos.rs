//! Prepared HDF-EOS2 structure: grids and swaths with their fields.

use serde::{Deserialize, Serialize};

use crate::dtype::RawAttribute;
use crate::field::{FieldDescriptor, FieldType, MOD13C2_LL_FORMAT};

/// Which HDF-EOS2 object family a dataset belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EosKind {
    Grid,
    Swath,
}

/// One swath dimension map: `geo` is sampled every `increment` cells of `data`
/// starting at `offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionMap {
    pub geo: String,
    pub data: String,
    pub offset: i32,
    pub increment: i32,
}

impl DimensionMap {
    pub fn new(geo: impl Into<String>, data: impl Into<String>, offset: i32, increment: i32) -> Self {
        Self {
            geo: geo.into(),
            data: data.into(),
            offset,
            increment,
        }
    }
}

/// GCTP projection of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionCode {
    #[default]
    Geographic,
    Sinusoidal,
    Other,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GridProjection {
    pub code: ProjectionCode,
    /// Upper-left corner, (x, y) in projection meters.
    pub upleft: [f64; 2],
    pub lowright: [f64; 2],
}

/// A grid or swath as prepared by the file-open layer.
#[derive(Debug, Clone, PartialEq)]
pub struct EosDataset {
    pub kind: EosKind,
    pub name: String,
    pub data_fields: Vec<FieldDescriptor>,
    pub geo_fields: Vec<FieldDescriptor>,
    pub dimension_maps: Vec<DimensionMap>,
    pub projection: GridProjection,
    /// Object-level attributes.
    pub attributes: Vec<RawAttribute>,
}

impl EosDataset {
    pub fn new(kind: EosKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            data_fields: Vec::new(),
            geo_fields: Vec::new(),
            dimension_maps: Vec::new(),
            projection: GridProjection::default(),
            attributes: Vec::new(),
        }
    }

    /// Data fields then geolocation fields.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.data_fields.iter().chain(self.geo_fields.iter())
    }

    pub fn is_grid(&self) -> bool {
        self.kind == EosKind::Grid
    }
}

/// An HDF-EOS2 file: every grid and swath it contains.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EosFile {
    pub path: String,
    pub grids: Vec<EosDataset>,
    pub swaths: Vec<EosDataset>,
}

impl EosFile {
    pub fn datasets(&self) -> impl Iterator<Item = &EosDataset> {
        self.grids.iter().chain(self.swaths.iter())
    }

    /// File name without its directory.
    pub fn base_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// True when a grid latitude uses the MOD13C2 layout, whose StructMetadata
    /// does not describe the served coordinates.
    pub fn has_mod13c2_latitude(&self) -> bool {
        self.grids.iter().flat_map(|g| g.data_fields.iter()).any(|f| {
            f.field_type == FieldType::Latitude && f.special_ll_format == MOD13C2_LL_FORMAT
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::NumberType;

    #[test]
    fn test_base_name() {
        let file = EosFile {
            path: "/data/modis/MOD09GA.A2010001.h10v05.005.hdf".into(),
            ..Default::default()
        };
        assert_eq!(file.base_name(), "MOD09GA.A2010001.h10v05.005.hdf");
    }

    #[test]
    fn test_mod13c2_latitude_detection() {
        let mut grid = EosDataset::new(EosKind::Grid, "MOD_Grid_monthly_CMG_VI");
        let mut lat = FieldDescriptor::new("Latitude", NumberType::Float32)
            .with_field_type(FieldType::Latitude);
        lat.special_ll_format = MOD13C2_LL_FORMAT;
        grid.data_fields.push(lat);
        let file = EosFile {
            path: "MOD13C2.hdf".into(),
            grids: vec![grid],
            swaths: vec![],
        };
        assert!(file.has_mod13c2_latitude());
    }
}
