//! Serializable description of an HDF4 file's objects.
//!
//! A snapshot lists what the HDF4 and HDF-EOS2 libraries would report for one
//! file: SD global attributes, scientific datasets, vgroups, vdatas and the
//! prepared grid/swath structure. It is loaded from YAML or JSON and backs the
//! in-memory library used by the CLI and the tests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dtype::{NumberType, RawAttribute};
use crate::eos::{DimensionMap, EosDataset, EosFile, EosKind, GridProjection};
use crate::error::{H4Error, H4Result};
use crate::field::{Dimension, FieldDescriptor};

/// One attribute or data value as written in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int(v) => write!(f, "{v}"),
            ScalarValue::Float(v) => write!(f, "{v}"),
            ScalarValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Text(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub number_type: NumberType,
    #[serde(default)]
    pub values: Vec<ScalarValue>,
}

impl AttrSpec {
    pub fn new(name: impl Into<String>, number_type: NumberType, values: Vec<ScalarValue>) -> Self {
        Self {
            name: name.into(),
            number_type,
            values,
        }
    }

    /// A `CHAR8` attribute.
    pub fn text(name: impl Into<String>, text: &str) -> Self {
        Self::new(name, NumberType::Char8, vec![ScalarValue::from(text)])
    }

    pub fn to_raw(&self) -> H4Result<RawAttribute> {
        let values: Vec<String> = self.values.iter().map(ToString::to_string).collect();
        RawAttribute::from_text_values(self.name.clone(), self.number_type, &values)
    }
}

/// Encode every spec in order.
pub fn raw_attributes(specs: &[AttrSpec]) -> H4Result<Vec<RawAttribute>> {
    specs.iter().map(AttrSpec::to_raw).collect()
}

/// A scientific dataset (SDS).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdsSpec {
    pub name: String,
    #[serde(rename = "ref")]
    pub reference: i32,
    #[serde(rename = "type")]
    pub number_type: NumberType,
    #[serde(default)]
    pub dims: Vec<Dimension>,
    #[serde(default)]
    pub attributes: Vec<AttrSpec>,
    /// Dimension scale (coordinate) dataset.
    #[serde(default)]
    pub dim_scale: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildKind {
    Sds,
    Vdata,
    Vgroup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    pub kind: ChildKind,
    #[serde(rename = "ref")]
    pub reference: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VgroupSpec {
    #[serde(rename = "ref")]
    pub reference: i32,
    pub name: String,
    #[serde(default)]
    pub class: String,
    /// Not a child of any other vgroup.
    #[serde(default)]
    pub lone: bool,
    #[serde(default)]
    pub children: Vec<ChildRef>,
    #[serde(default)]
    pub attributes: Vec<AttrSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VdataFieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub number_type: NumberType,
    #[serde(default = "default_order")]
    pub order: usize,
    /// `records * order` values, or one string per record for char fields.
    #[serde(default)]
    pub values: Vec<ScalarValue>,
    #[serde(default)]
    pub attributes: Vec<AttrSpec>,
}

fn default_order() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VdataSpec {
    #[serde(rename = "ref")]
    pub reference: i32,
    pub name: String,
    #[serde(default)]
    pub class: String,
    /// Stores an attribute rather than a table.
    #[serde(default)]
    pub is_attr: bool,
    #[serde(default)]
    pub lone: bool,
    pub records: usize,
    #[serde(default)]
    pub fields: Vec<VdataFieldSpec>,
    #[serde(default)]
    pub attributes: Vec<AttrSpec>,
}

/// A grid or swath with its prepared field descriptors and data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EosObjectSpec {
    pub name: String,
    #[serde(default)]
    pub data_fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub geo_fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub dimension_maps: Vec<DimensionMap>,
    #[serde(default)]
    pub projection: GridProjection,
    #[serde(default)]
    pub attributes: Vec<AttrSpec>,
    /// Per-field attributes as the EOS library reports them.
    #[serde(default)]
    pub field_attributes: BTreeMap<String, Vec<AttrSpec>>,
    /// Row-major values of fields that can be read.
    #[serde(default)]
    pub field_values: BTreeMap<String, Vec<f64>>,
}

impl EosObjectSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_fields: Vec::new(),
            geo_fields: Vec::new(),
            dimension_maps: Vec::new(),
            projection: GridProjection::default(),
            attributes: Vec::new(),
            field_attributes: BTreeMap::new(),
            field_values: BTreeMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.data_fields
            .iter()
            .chain(self.geo_fields.iter())
            .find(|f| f.name == name)
    }

    fn to_dataset(&self, kind: EosKind) -> H4Result<EosDataset> {
        let mut ds = EosDataset::new(kind, self.name.clone());
        ds.data_fields = self.data_fields.clone();
        ds.geo_fields = self.geo_fields.clone();
        ds.dimension_maps = self.dimension_maps.clone();
        ds.projection = self.projection.clone();
        ds.attributes = raw_attributes(&self.attributes)?;
        Ok(ds)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSnapshot {
    pub path: String,
    pub global_attributes: Vec<AttrSpec>,
    pub datasets: Vec<SdsSpec>,
    pub vgroups: Vec<VgroupSpec>,
    pub vdatas: Vec<VdataSpec>,
    pub grids: Vec<EosObjectSpec>,
    pub swaths: Vec<EosObjectSpec>,
}

impl FileSnapshot {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn from_yaml_str(yaml: &str) -> H4Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> H4Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: impl AsRef<Path>) -> H4Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            other => Err(H4Error::invalid_input(format!(
                "unsupported snapshot extension {other:?} for {}",
                path.display()
            ))),
        }
    }

    /// The prepared HDF-EOS2 structure.
    pub fn to_eos_file(&self) -> H4Result<EosFile> {
        Ok(EosFile {
            path: self.path.clone(),
            grids: self
                .grids
                .iter()
                .map(|g| g.to_dataset(EosKind::Grid))
                .collect::<H4Result<_>>()?,
            swaths: self
                .swaths
                .iter()
                .map(|s| s.to_dataset(EosKind::Swath))
                .collect::<H4Result<_>>()?,
        })
    }

    /// True when the file carries HDF-EOS2 structure metadata.
    pub fn is_eos2(&self) -> bool {
        !self.grids.is_empty() || !self.swaths.is_empty()
    }
}
