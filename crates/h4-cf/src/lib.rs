//! HDF4 / HDF-EOS2 to CF attribute normalization engine.
//!
//! Turns the raw attributes of an HDF4 file into CF-conforming DAS tables,
//! applying the product-specific fixes NASA data needs along the way.
//!
//! ```text
//!   Hdf4Library / EosLibrary (source)
//!        │
//!        ├─► codec + naming ─► harvest ─► scale_offset + products ─► reconcile
//!        │                                                              │
//!        ├─► ecs (global metadata) ─────────────────────────────────────┤
//!        │                                                              ▼
//!        │                                                  build: DasBuild / Dds
//!        └─► reader: dimmap expansion + read-time scaling
//! ```

pub mod build;
pub mod codec;
pub mod dimmap;
pub mod ecs;
pub mod harvest;
pub mod naming;
pub mod products;
pub mod reader;
pub mod reconcile;
pub mod scale_offset;
pub mod source;

// Re-export commonly used types at crate root
pub use build::{build_eos2_dds, build_sp_dds, DasBuild, DasBuilder};
pub use ecs::{KeyValueParser, MetadataParser, ParseStatus};
pub use harvest::AttrMapper;
pub use products::{SpFile, SpType};
pub use reader::{DimMapFieldReader, FieldData, FieldRequest, FieldValues, Hyperslab};
pub use scale_offset::ScaleRule;
pub use source::{EosApi, EosLibrary, Hdf4Library, MemoryFile};
