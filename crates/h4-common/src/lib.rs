//! Shared types for the HDF4 / HDF-EOS2 to CF attribute engine.
//!
//! ```text
//!   HDF4 library ──► RawAttribute ──► (h4-cf engine) ──► Das / Dds
//!                          ▲                 ▲
//!                   NumberType        FieldDescriptor, EosFile, H4Config
//! ```

pub mod config;
pub mod das;
pub mod dds;
pub mod dtype;
pub mod eos;
pub mod error;
pub mod field;
pub mod snapshot;

// Re-export commonly used types at crate root
pub use config::{check_beskeys, EnvKeys, H4Config, KeyProvider};
pub use das::{Attr, AttrTable, Das};
pub use dds::{Dds, DdsDim, DdsVariable};
pub use dtype::{CfType, NumberType, RawAttribute};
pub use eos::{DimensionMap, EosDataset, EosFile, EosKind, GridProjection, ProjectionCode};
pub use error::{H4Error, H4Result};
pub use field::{Dimension, FieldDescriptor, FieldType, SoType};
pub use snapshot::{
    AttrSpec, ChildKind, ChildRef, EosObjectSpec, FileSnapshot, ScalarValue, SdsSpec, VdataFieldSpec,
    VdataSpec, VgroupSpec,
};
