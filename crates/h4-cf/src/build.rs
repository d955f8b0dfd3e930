//! Per-file DAS and DDS builders.
//!
//! ```text
//!   EosFile ──► per field: fill, coordinates, harvest, units, MODIS rules,
//!              AMSR renames, fill type, scale/offset type
//!           ──► sinusoidal grid mapping ──► ECS tables ──► HDF_GLOBAL
//!           ──► grid/swath object attributes
//!
//!   SpFile  ──► vgroup attrs ──► globals + ECS ──► per field ──► product rules
//! ```
//!
//! A build owns everything it produces. Fields whose datatype changes at
//! read time are returned with the DAS instead of being collected in a
//! process-wide list.

use h4_common::{AttrTable, CfType, Das, Dds, DdsVariable, EosDataset, EosFile, FieldDescriptor, FieldType};
use h4_common::{H4Config, H4Result, SoType};
use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::{append_raw_attr, print_type};
use crate::ecs::{write_ecs_metadata, MetadataParser, ParseStatus, HDF_GLOBAL};
use crate::harvest::{write_attribute_coordinates, write_attribute_fill_value, write_attribute_units, AttrMapper};
use crate::naming::to_cf_name;
use crate::products::amsr::handle_amsr_attrs;
use crate::products::ceres::handle_merra_ceres_attrs;
use crate::products::eos_objects::{map_eos2_objects_attrs, write_dataset_attrs};
use crate::products::mod08::{change_das_mod08_scale_offset, MOD08_GRID};
use crate::products::obpg::{add_obpg_special_attrs, ObpgScaling};
use crate::products::otherhdf::{handle_otherhdf_special_attrs, is_visible};
use crate::products::sinusoidal::{add_cf_grid_cv_attrs, add_cf_grid_cvs};
use crate::products::trmm::add_missing_cf_attrs;
use crate::products::vdata::handle_vdata_attrs_with_desc_key;
use crate::products::vgroup::write_vgroup_attrs;
use crate::products::{SpField, SpFile, SpType};
use crate::reconcile::{correct_fill_value_type, correct_scale_offset_type};
use crate::scale_offset::policy::{is_modis_l1b_swath, is_vip_grid};
use crate::scale_offset::{
    change_data_type, handle_modis_special_attrs, handle_modis_special_attrs_disable_scale_comp, so_type_for_object,
    ModisFieldContext,
};
use crate::source::{HFileGuard, Hdf4Library, SdFileGuard};

const LONG_NAME: &str = "long_name";
const STANDARD_NAME: &str = "standard_name";
const UNITS: &str = "units";
const COORDINATES: &str = "coordinates";
const VALID_RANGE: &str = "valid_range";
/// MODIS fields carrying a `Key` attribute are lookup tables, not scaled data.
const KEY_ATTR: &str = "Key";

/// A finished DAS and the fields whose datatype changes when read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DasBuild {
    pub das: Das,
    /// CF names of fields served as Float32 because a MODIS scale is applied.
    pub changed_type_fields: Vec<String>,
}

/// Builds the DAS of one file with a fixed configuration.
pub struct DasBuilder<'a> {
    config: &'a H4Config,
    parser: &'a dyn MetadataParser,
    ecs_metadata: bool,
}

/// File-wide facts the per-field MODIS gating needs.
struct EosFileFacts<'f> {
    base_name: &'f str,
    is_modis_l1b: bool,
    is_vip: bool,
}

impl<'a> DasBuilder<'a> {
    pub fn new(config: &'a H4Config, parser: &'a dyn MetadataParser) -> Self {
        Self {
            config,
            parser,
            ecs_metadata: true,
        }
    }

    /// Whether CoreMetadata, ArchiveMetadata and ProductMetadata are parsed.
    pub fn with_ecs_metadata(mut self, enabled: bool) -> Self {
        self.ecs_metadata = enabled;
        self
    }

    // ========================================================================
    // HDF-EOS2 files
    // ========================================================================

    /// DAS of an HDF-EOS2 file whose structure has been prepared.
    pub fn build_eos2<L: Hdf4Library + ?Sized>(&self, lib: &L, file: &EosFile) -> H4Result<DasBuild> {
        let mut build = DasBuild::default();

        let sd = SdFileGuard::new(lib, lib.sd_start(&file.path)?);
        let h = HFileGuard::new(lib, lib.h_open(&file.path)?);
        let globals = lib.sd_global_attributes(sd.id())?;

        let facts = EosFileFacts {
            base_name: file.base_name(),
            is_modis_l1b: file.swaths.iter().any(|s| is_modis_l1b_swath(&s.name)),
            is_vip: file.grids.len() == 1 && is_vip_grid(&file.grids[0].name),
        };
        let mut mapper = AttrMapper::new(lib, sd.id(), h.id());

        for grid in &file.grids {
            let so_type = so_type_for_object(&grid.name);
            debug!(grid = %grid.name, so_type = ?so_type, fields = grid.data_fields.len(), "Building grid attributes");
            for field in &grid.data_fields {
                if field.field_type == FieldType::General {
                    if let Some(fill) = field.added_fill_value {
                        write_attribute_fill_value(&mut build.das, &field.new_name, field.number_type, fill)?;
                    }
                    write_coordinates(&mut build.das, field)?;
                }
                mapper.write_attribute(
                    &mut build.das,
                    &grid.name,
                    &field.name,
                    &field.new_name,
                    file.grids.len(),
                    field.field_type,
                )?;
                if field.field_type != FieldType::General && field.field_type != FieldType::ExistingCv {
                    write_units(&mut build.das, field)?;
                }
                self.finish_eos_field(&mut build, field, so_type, true, &facts)?;
            }
            add_cf_grid_cv_attrs(&mut build.das, grid)?;
        }

        for swath in &file.swaths {
            let so_type = so_type_for_object(&swath.name);
            debug!(swath = %swath.name, so_type = ?so_type, fields = swath.all_fields().count(), "Building swath attributes");
            let geo_count = swath.geo_fields.len();
            for (index, field) in swath.geo_fields.iter().chain(swath.data_fields.iter()).enumerate() {
                if field.field_type == FieldType::General {
                    write_coordinates(&mut build.das, field)?;
                }
                if field.field_type != FieldType::General && field.field_type != FieldType::ExistingCv {
                    write_units(&mut build.das, field)?;
                }
                if index >= geo_count {
                    if let Some(fill) = field.added_fill_value {
                        write_attribute_fill_value(&mut build.das, &field.new_name, field.number_type, fill)?;
                    }
                }
                mapper.write_attribute(
                    &mut build.das,
                    &swath.name,
                    &field.name,
                    &field.new_name,
                    file.swaths.len(),
                    field.field_type,
                )?;
                self.finish_eos_field(&mut build, field, so_type, false, &facts)?;
            }
        }

        // MOD13C2's StructMetadata does not describe the served latitude.
        let struct_metadata = !self.config.disable_struct_meta_attr && !file.has_mod13c2_latitude();
        write_ecs_metadata(&mut build.das, &globals, self.parser, self.ecs_metadata, struct_metadata)?;

        h.close()?;
        sd.close()?;

        if self.config.enable_swath_grid_attr {
            self.write_object_attrs(lib, file, &mut build.das)?;
        }

        debug!(
            path = %file.path,
            tables = build.das.len(),
            changed_type = build.changed_type_fields.len(),
            "Built HDF-EOS2 DAS"
        );
        Ok(build)
    }

    /// MODIS rules, AMSR renames and the type reconciliation of one field.
    fn finish_eos_field(
        &self,
        build: &mut DasBuild,
        field: &FieldDescriptor,
        so_type: SoType,
        is_grid: bool,
        facts: &EosFileFacts<'_>,
    ) -> H4Result<()> {
        let Some(table) = build.das.get_table_mut(&field.new_name) else {
            return Ok(());
        };

        let mut fill_value_retyped = false;
        if so_type != SoType::DefaultCfEqu {
            let ctx = ModisFieldContext {
                file_name: facts.base_name,
                field_name: &field.new_name,
                is_grid,
                so_type,
                is_vip: facts.is_vip,
            };
            let disable_comp = !facts.is_modis_l1b
                && !facts.is_vip
                && !table.contains(KEY_ATTR)
                && self.config.disable_scale_offset_comp;
            if disable_comp {
                handle_modis_special_attrs_disable_scale_comp(table, &ctx)?;
            } else {
                let changed_type = change_data_type(table, so_type);
                if changed_type {
                    build.changed_type_fields.push(field.new_name.clone());
                }
                fill_value_retyped = handle_modis_special_attrs(table, &ctx, changed_type)?.fill_value_retyped;
            }
        }

        handle_amsr_attrs(table)?;
        reconcile_types(table, print_type(field.number_type), !fill_value_retyped, self.config)
    }

    /// Grid and swath object attributes. The prepared structure is used when
    /// it carries them; otherwise they are read from the attribute vdatas.
    fn write_object_attrs<L: Hdf4Library + ?Sized>(&self, lib: &L, file: &EosFile, das: &mut Das) -> H4Result<()> {
        let prepared = file.grids.iter().chain(file.swaths.iter()).any(|d| !d.attributes.is_empty());
        if !prepared {
            return map_eos2_objects_attrs(lib, &file.path, das);
        }
        for dataset in file.grids.iter().chain(file.swaths.iter()) {
            write_dataset_attrs(das, dataset)?;
        }
        Ok(())
    }

    // ========================================================================
    // Special-product HDF4 files
    // ========================================================================

    /// DAS of a prepared special-product (or plain) HDF4 file.
    pub fn build_sp(&self, file: &SpFile) -> H4Result<DasBuild> {
        let mut build = DasBuild::default();
        let das = &mut build.das;

        write_vgroup_attrs(file, das, self.config)?;
        self.write_sp_globals(file, das)?;

        let obpg = ObpgScaling::from_file(file)?;
        for field in file.fields.iter().filter(|f| is_visible(file, f)) {
            self.write_sp_field(file, field, &obpg, das)?;
        }

        handle_otherhdf_special_attrs(file, das)?;
        add_missing_cf_attrs(file, das)?;

        for field in &file.fields {
            if let Some(table) = das.get_table_mut(&field.new_name) {
                reconcile_types(table, print_type(field.number_type), true, self.config)?;
            }
        }

        handle_merra_ceres_attrs(file, das, self.config)?;
        handle_vdata_attrs_with_desc_key(file, das, self.config)?;

        if file.special_eos_grid.as_deref() == Some(MOD08_GRID) {
            change_das_mod08_scale_offset(das, file)?;
        }

        debug!(
            path = %file.path,
            sp_type = ?file.sp_type,
            tables = das.len(),
            "Built special-product DAS"
        );
        Ok(build)
    }

    /// ECS metadata is concatenated per family and parsed once. Everything
    /// else goes to `HDF_GLOBAL`.
    fn write_sp_globals(&self, file: &SpFile, das: &mut Das) -> H4Result<()> {
        let withheld = file.sp_type.is_ceres_withheld();
        let trmm_v6 = file.sp_type == SpType::TrmmL2V6;

        let mut core = String::new();
        let mut archive = String::new();
        let mut structure = String::new();
        for attr in &file.global_attributes {
            let name = attr.name.as_str();
            if name.starts_with("CoreMetadata") || name.starts_with("coremetadata") {
                if !withheld {
                    core.push_str(&attr.text());
                }
            } else if name.starts_with("ArchiveMetadata")
                || name.starts_with("ArchivedMetadata")
                || name.starts_with("archivemetadata")
            {
                if !withheld && !trmm_v6 {
                    archive.push_str(&attr.text());
                }
            } else if name.starts_with("StructMetadata") || name.starts_with("structmetadata") {
                if !self.config.disable_struct_meta_attr && !withheld && !trmm_v6 {
                    structure.push_str(&attr.text());
                }
            } else {
                append_raw_attr(das.get_or_create(HDF_GLOBAL), &to_cf_name(name), attr)?;
            }
        }

        for (table_name, text) in [
            ("CoreMetadata", core),
            ("ArchiveMetadata", archive),
            ("StructMetadata", structure),
        ] {
            if text.is_empty() {
                continue;
            }
            let table = das.get_or_create(table_name);
            if let ParseStatus::NotOk(reason) = self.parser.parse(table, &text)? {
                warn!(table = table_name, reason = %reason, "ECS metadata parsed with errors");
            }
        }
        Ok(())
    }

    fn write_sp_field(&self, file: &SpFile, field: &SpField, obpg: &ObpgScaling, das: &mut Das) -> H4Result<()> {
        let table = das.get_or_create(&field.new_name);
        if field.attribute(LONG_NAME).is_none() {
            write_sp_long_name(table, file.sp_type, field)?;
        }

        add_obpg_special_attrs(das, file, field, obpg)?;

        let table = das.get_or_create(&field.new_name);
        for attr in &field.attributes {
            append_raw_attr(table, &to_cf_name(&attr.name), attr)?;
        }

        match field.field_type {
            FieldType::Latitude | FieldType::Longitude => {
                table.del_attr(UNITS);
                table.append_attr(UNITS, CfType::String, field.units.as_str())?;
                // CERES ES4 ranges are misread by CF tools
                if file.sp_type == SpType::CerEs4 {
                    table.del_attr(VALID_RANGE);
                }
            }
            FieldType::InsertedIndexCv => {
                table.del_attr(UNITS);
                table.append_attr(UNITS, CfType::String, field.units.as_str())?;
            }
            FieldType::General => {
                table.del_attr(COORDINATES);
                if !file.has_dim_no_scale_field && !field.coordinates.is_empty() {
                    table.append_attr(COORDINATES, CfType::String, field.coordinates.as_str())?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// `long_name` (and for TRMM V7 `standard_name`) of a field without one.
fn write_sp_long_name(table: &mut AttrTable, sp_type: SpType, field: &SpField) -> H4Result<()> {
    let axis = match field.field_type {
        FieldType::Latitude => Some("latitude"),
        FieldType::Longitude => Some("longitude"),
        _ => None,
    };
    match sp_type {
        SpType::TrmmL2V7 => {
            if let Some(axis) = axis {
                table.append_attr(STANDARD_NAME, CfType::String, axis)?;
            }
        }
        SpType::TrmmL3sV7 | SpType::TrmmL3mV7 => {
            if let Some(axis) = axis {
                table.append_attr(LONG_NAME, CfType::String, axis)?;
                table.append_attr(STANDARD_NAME, CfType::String, axis)?;
            }
        }
        _ => table.append_attr(LONG_NAME, CfType::String, field.name.as_str())?,
    }
    Ok(())
}

fn write_coordinates(das: &mut Das, field: &FieldDescriptor) -> H4Result<()> {
    match field.coordinates.as_deref() {
        Some(coordinates) if !coordinates.is_empty() => write_attribute_coordinates(das, &field.new_name, coordinates),
        _ => Ok(()),
    }
}

fn write_units(das: &mut Das, field: &FieldDescriptor) -> H4Result<()> {
    write_attribute_units(das, &field.new_name, field.units.as_deref().unwrap_or(""))
}

/// `_FillValue` type fix and, when enabled, the scale/offset type check.
fn reconcile_types(table: &mut AttrTable, var_type: CfType, fix_fill: bool, config: &H4Config) -> H4Result<()> {
    if fix_fill {
        correct_fill_value_type(table, var_type)?;
    }
    if config.enable_check_scale_offset_type {
        correct_scale_offset_type(table)?;
    }
    Ok(())
}

// ============================================================================
// DDS
// ============================================================================

/// Variables of an HDF-EOS2 file, with the sinusoidal projection variables.
///
/// Fields listed in `changed_type_fields` are declared Float32.
pub fn build_eos2_dds(file: &EosFile, changed_type_fields: &[String]) -> H4Result<Dds> {
    let mut dds = Dds::new();
    for dataset in file.grids.iter().chain(file.swaths.iter()) {
        for field in dataset_fields(dataset) {
            let cf_type = if changed_type_fields.contains(&field.new_name) {
                CfType::Float32
            } else {
                print_type(field.number_type)
            };
            let var = field
                .dimensions
                .iter()
                .fold(DdsVariable::new(field.new_name.as_str(), cf_type), |v, d| {
                    v.with_dim(d.size, d.name.as_str())
                });
            dds.add_variable(var);
        }
    }
    for grid in &file.grids {
        add_cf_grid_cvs(&mut dds, grid)?;
    }
    Ok(dds)
}

fn dataset_fields(dataset: &EosDataset) -> impl Iterator<Item = &FieldDescriptor> {
    dataset.geo_fields.iter().chain(dataset.data_fields.iter())
}

/// Variables of a special-product file.
pub fn build_sp_dds(file: &SpFile) -> Dds {
    let mut dds = Dds::new();
    for field in file.fields.iter().filter(|f| is_visible(file, f)) {
        let var = field
            .dims
            .iter()
            .fold(DdsVariable::new(field.new_name.as_str(), print_type(field.number_type)), |v, d| {
                v.with_dim(d.size, d.name.as_str())
            });
        dds.add_variable(var);
    }
    dds
}
