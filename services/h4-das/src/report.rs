//! Builds the JSON document the CLI prints for one file.

use h4_cf::scale_offset::so_type_for_object;
use h4_cf::{
    build_eos2_dds, build_sp_dds, DasBuilder, DimMapFieldReader, FieldRequest, KeyValueParser, MemoryFile, SpFile,
};
use h4_common::{Das, Dds, H4Config, H4Result};
use serde::Serialize;
use tracing::{info, instrument};

/// Which attribute path a file goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Eos2,
    SpecialProduct,
}

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub include_dds: bool,
    pub ecs_metadata: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub path: String,
    pub kind: FileKind,
    pub das: Das,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dds: Option<Dds>,
    pub changed_type_fields: Vec<String>,
}

/// MERRA files carry structure metadata but are served as plain SDS.
pub fn file_kind(lib: &MemoryFile) -> FileKind {
    let base = lib.path().rsplit('/').next().unwrap_or_default();
    if lib.snapshot().is_eos2() && !base.starts_with("MERRA") {
        FileKind::Eos2
    } else {
        FileKind::SpecialProduct
    }
}

#[instrument(skip(lib, config, options), fields(path = lib.path()))]
pub fn build_report(lib: &MemoryFile, config: &H4Config, options: &ReportOptions) -> H4Result<Report> {
    let builder = DasBuilder::new(config, &KeyValueParser).with_ecs_metadata(options.ecs_metadata);
    let kind = file_kind(lib);

    let (build, dds) = match kind {
        FileKind::Eos2 => {
            let file = lib.eos_file()?;
            let build = builder.build_eos2(lib, &file)?;
            let dds = if options.include_dds {
                Some(build_eos2_dds(&file, &build.changed_type_fields)?)
            } else {
                None
            };
            (build, dds)
        }
        FileKind::SpecialProduct => {
            let file = SpFile::load(lib, lib.path(), config)?;
            info!(sp_type = ?file.sp_type, fields = file.fields.len(), "Loaded special product");
            let build = builder.build_sp(&file)?;
            let dds = options.include_dds.then(|| build_sp_dds(&file));
            (build, dds)
        }
    };

    info!(
        tables = build.das.len(),
        changed = build.changed_type_fields.len(),
        "Built DAS"
    );

    Ok(Report {
        path: lib.path().to_string(),
        kind,
        das: build.das,
        dds,
        changed_type_fields: build.changed_type_fields,
    })
}

/// One field read through the dimension-map reader.
#[derive(Debug, Clone, Serialize)]
pub struct FieldReport {
    pub object: String,
    pub field: String,
    pub dims: Vec<(String, usize)>,
    pub values: Vec<f64>,
}

/// The object named on the command line, as a grid or a swath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectName {
    Grid(String),
    Swath(String),
}

impl ObjectName {
    pub fn name(&self) -> &str {
        match self {
            ObjectName::Grid(name) | ObjectName::Swath(name) => name,
        }
    }
}

#[instrument(skip(lib, config), fields(path = lib.path()))]
pub fn read_field(lib: &MemoryFile, config: &H4Config, object: &ObjectName, field: &str) -> H4Result<FieldReport> {
    let request = match object {
        ObjectName::Grid(grid) => FieldRequest::grid(lib.path(), grid, field),
        ObjectName::Swath(swath) => FieldRequest::swath(lib.path(), swath, field),
    }
    .with_so_type(so_type_for_object(object.name()));

    let data = DimMapFieldReader::new(lib, config).read(&request)?;
    Ok(FieldReport {
        object: object.name().to_string(),
        field: field.to_string(),
        dims: data.dims.iter().map(|d| (d.name.clone(), d.size)).collect(),
        values: data.values.to_f64(),
    })
}
