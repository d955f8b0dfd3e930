//! Special-product HDF4 files.
//!
//! TRMM, CERES, OBPG ocean color and the MODIS ARNSS products are plain HDF4
//! files without HDF-EOS2 structure metadata, but each family has a known
//! layout. [`SpFile::load`] walks such a file through the SD, V and VS
//! interfaces, works out its [`SpType`] and prepares the field roles the
//! attribute rules below need.
//!
//! ```text
//!   SpFile::load ─► detect SpType ─► prepare fields
//!                                        │
//!        otherhdf / obpg / trmm / ceres / vdata / vgroup / mod08 rules
//! ```
//!
//! `amsr`, `sinusoidal` and `eos_objects` hold the rules that apply to
//! HDF-EOS2 grids and swaths instead.

pub mod amsr;
pub mod ceres;
pub mod eos_objects;
mod load;
pub mod mod08;
pub mod obpg;
pub mod otherhdf;
pub mod sinusoidal;
pub mod trmm;
pub mod vdata;
pub mod vgroup;

use bytes::Bytes;
use h4_common::{Dimension, FieldType, NumberType, RawAttribute};
use serde::Serialize;

/// Product family of a non-EOS HDF4 file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpType {
    #[default]
    OtherHdf,
    TrmmL2V6,
    TrmmL3bV6,
    TrmmL3aV6,
    TrmmL3cV6,
    TrmmL2V7,
    TrmmL3sV7,
    TrmmL3mV7,
    CerAvg,
    CerEs4,
    CerCday,
    CerCgeo,
    CerSrb,
    CerSyn,
    CerZavg,
    ObpgL2,
    ObpgL3,
    ModisArnss,
}

impl SpType {
    pub fn is_ceres(&self) -> bool {
        matches!(
            self,
            SpType::CerAvg
                | SpType::CerEs4
                | SpType::CerCday
                | SpType::CerCgeo
                | SpType::CerSrb
                | SpType::CerSyn
                | SpType::CerZavg
        )
    }

    /// CERES products whose ECS metadata and Vdata descriptions are withheld.
    pub fn is_ceres_withheld(&self) -> bool {
        matches!(self, SpType::CerAvg | SpType::CerEs4 | SpType::CerSrb | SpType::CerZavg)
    }

    pub fn is_obpg(&self) -> bool {
        matches!(self, SpType::ObpgL2 | SpType::ObpgL3)
    }

    pub fn is_trmm_v7(&self) -> bool {
        matches!(self, SpType::TrmmL2V7 | SpType::TrmmL3sV7 | SpType::TrmmL3mV7)
    }

    pub fn is_trmm(&self) -> bool {
        self.is_trmm_v7()
            || matches!(
                self,
                SpType::TrmmL2V6 | SpType::TrmmL3bV6 | SpType::TrmmL3aV6 | SpType::TrmmL3cV6
            )
    }
}

// ============================================================================
// Product detection
// ============================================================================

/// CERES product from the `LOCALGRANULEID` stored in the `CERES_metadata` Vdata.
pub fn ceres_type(local_granule_id: &str) -> Option<SpType> {
    const PREFIXES: [(&str, SpType); 7] = [
        ("CER_AVG", SpType::CerAvg),
        ("CER_ES4", SpType::CerEs4),
        ("CER_ISCCP-D2like-Day", SpType::CerCday),
        ("CER_ISCCP-D2like-GEO", SpType::CerCgeo),
        ("CER_SRBAVG3", SpType::CerSrb),
        ("CER_SYN", SpType::CerSyn),
        ("CER_ZAVG", SpType::CerZavg),
    ];
    PREFIXES
        .iter()
        .find(|(prefix, _)| local_granule_id.starts_with(prefix))
        .map(|(_, t)| *t)
}

/// TRMM version 7 products are recognised by their header attributes.
pub fn trmm_v7_type(globals: &[RawAttribute]) -> Option<SpType> {
    let mut multi_grid = 0;
    let mut single_grid = 0;
    let mut swath = 0;
    for attr in globals {
        let name = attr.name.as_str();
        if name == "FileHeader" || name == "FileInfo" {
            multi_grid += 1;
            single_grid += 1;
            swath += 1;
        }
        if name == "SwathHeader" {
            swath += 1;
        }
        if name == "GridHeader" {
            single_grid += 1;
        } else if name.starts_with("GridHeader") && name.len() > 10 {
            multi_grid += 1;
        }
    }
    if single_grid == 3 {
        Some(SpType::TrmmL3sV7)
    } else if swath == 3 {
        Some(SpType::TrmmL2V7)
    } else if multi_grid > 3 {
        Some(SpType::TrmmL3mV7)
    } else {
        None
    }
}

/// MODIS ARNSS and the TRMM version 6 products, told apart by how many ECS
/// metadata attributes they carry and by the shape of their granule fields.
pub fn metadata_product_type(globals: &[RawAttribute], fields: &[SpField]) -> Option<SpType> {
    let flag = globals
        .iter()
        .filter(|a| {
            a.name == "CoreMetadata.0"
                || a.name == "ArchiveMetadata.0"
                || a.name == "StructMetadata.0"
                || a.name.contains("SubsettingMethod")
        })
        .count();
    if flag == 4 {
        return Some(SpType::ModisArnss);
    }
    if flag != 2 {
        return None;
    }

    let in_granule = |f: &SpField| f.full_path.contains("DATA_GRANULE");
    if fields.iter().any(|f| {
        f.name == "geolocation" && in_granule(f) && f.full_path.contains("SwathData") && f.rank() == 3
    }) {
        return Some(SpType::TrmmL2V6);
    }

    for field in fields.iter().filter(|f| in_granule(f)) {
        let has = |size: usize| field.dims.iter().any(|d| d.size == size);
        if has(1440) && has(400) {
            return Some(SpType::TrmmL3bV6);
        }
        if field.rank() > 2 {
            if has(360) && has(180) {
                return Some(SpType::TrmmL3aV6);
            }
            if has(720) && has(148) {
                return Some(SpType::TrmmL3cV6);
            }
        }
    }
    None
}

/// OBPG level 2 or level 3 from the `Product Name` and `Sensor Name` globals.
///
/// The first letter of the product name identifies the sensor (`A` MODIS
/// Aqua, `T` MODIS Terra, `O` OCTS, `S` SeaWiFS, `C` CZCS); both attributes
/// must name the same sensor.
pub fn obpg_type(globals: &[RawAttribute]) -> Option<SpType> {
    let text = |name: &str| globals.iter().find(|a| a.name == name).map(RawAttribute::text);
    let product = text("Product Name")?;
    let sensor = text("Sensor Name")?;

    let sensor_code = [("MODISA", 'A'), ("MODIST", 'T'), ("OCTS", 'O'), ("SeaWiFS", 'S'), ("CZCS", 'C')]
        .iter()
        .find(|(needle, _)| sensor.contains(needle))
        .map(|(_, code)| *code)?;
    let product_code = product.chars().next()?;
    if product_code != sensor_code {
        return None;
    }

    if product.contains(".L2") || (product_code == 'C' && product.contains(".L1A")) {
        Some(SpType::ObpgL2)
    } else if product.contains(".L3m") {
        Some(SpType::ObpgL3)
    } else {
        None
    }
}

/// Apply the detection rules in priority order.
pub fn detect_sp_type(globals: &[RawAttribute], fields: &[SpField], ceres_granule_id: Option<&str>) -> SpType {
    ceres_granule_id
        .and_then(ceres_type)
        .or_else(|| trmm_v7_type(globals))
        .or_else(|| metadata_product_type(globals, fields))
        .or_else(|| obpg_type(globals))
        .unwrap_or_default()
}

// ============================================================================
// Prepared file model
// ============================================================================

/// One SDS with the role the preparation gave it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpField {
    pub name: String,
    /// CF-safe, clash-free name.
    pub new_name: String,
    /// Vgroup path of the dataset, `/` separated, ending with its name.
    pub full_path: String,
    pub field_type: FieldType,
    pub number_type: NumberType,
    pub dims: Vec<Dimension>,
    pub attributes: Vec<RawAttribute>,
    /// Value for the `coordinates` attribute; empty for none.
    pub coordinates: String,
    /// Units for coordinate fields.
    pub units: String,
    pub is_dim_scale: bool,
    /// Synthesized for a dimension that has no scale dataset.
    pub is_dim_no_scale: bool,
}

impl SpField {
    pub fn new(name: impl Into<String>, number_type: NumberType) -> Self {
        let name = name.into();
        Self {
            new_name: name.clone(),
            full_path: format!("/{name}"),
            name,
            field_type: FieldType::General,
            number_type,
            dims: Vec::new(),
            attributes: Vec::new(),
            coordinates: String::new(),
            units: String::new(),
            is_dim_scale: false,
            is_dim_no_scale: false,
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn attribute(&self, name: &str) -> Option<&RawAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpVdataField {
    pub name: String,
    pub new_name: String,
    pub number_type: NumberType,
    pub order: usize,
    /// `records * order` packed elements.
    pub data: Bytes,
    pub attributes: Vec<RawAttribute>,
}

/// A lone Vdata kept for the CF view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpVdata {
    pub name: String,
    pub new_name: String,
    pub class: String,
    pub records: usize,
    /// Small Vdata are mapped to attributes instead of variables.
    pub treat_as_attr: bool,
    pub attributes: Vec<RawAttribute>,
    pub fields: Vec<SpVdataField>,
}

/// Attributes of one vgroup, keyed by the CF form of its path.
#[derive(Debug, Clone, PartialEq)]
pub struct VgroupAttrs {
    pub name: String,
    pub attributes: Vec<RawAttribute>,
}

/// A prepared special-product file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpFile {
    pub path: String,
    pub sp_type: SpType,
    pub global_attributes: Vec<RawAttribute>,
    pub fields: Vec<SpField>,
    pub vdatas: Vec<SpVdata>,
    pub vgroup_attrs: Vec<VgroupAttrs>,
    /// Some dimension has no scale dataset, so no `coordinates` are emitted.
    pub has_dim_no_scale_field: bool,
    /// Grid name of a one-dimensional XDim/YDim HDF-EOS2 grid served as SDS.
    pub special_eos_grid: Option<String>,
}

impl SpFile {
    pub fn base_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// A MERRA file that still carries HDF-EOS2 structure metadata.
    pub fn merra_is_eos2(&self) -> bool {
        self.base_name().starts_with("MERRA")
            && self
                .global_attributes
                .iter()
                .any(|a| a.name.starts_with("StructMetadata") || a.name.starts_with("structmetadata"))
    }

    pub fn field(&self, name: &str) -> Option<&SpField> {
        self.fields.iter().find(|f| f.name == name)
    }
}
