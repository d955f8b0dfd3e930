//! Field attribute harvesting for HDF-EOS2 files.
//!
//! HDF-EOS2 hides a field's native SD or Vdata attributes behind the grid or
//! swath API. [`AttrMapper`] finds the `Data Fields` and `Geolocation Fields`
//! vgroups of the current grid/swath, remembers which SDS index or Vdata ref
//! carries each field name, and copies the native attributes into the field's
//! table.
//!
//! The maps are rebuilt only when the group changes, so callers should visit
//! fields group by group.

use std::collections::{HashMap, HashSet};

use h4_common::{AttrTable, CfType, Das, FieldType, H4Error, H4Result, NumberType, RawAttribute};
use tracing::{debug, trace};

use crate::codec::{append_raw_attr, print_attr, print_float32, print_float64, print_type};
use crate::naming::{handle_name_clashing, to_cf_name};
use crate::reconcile::{ADD_OFFSET, FILL_VALUE, SCALE_FACTOR};
use crate::scale_offset::{atof, atoi};
use crate::source::{Hdf4Library, SdsGuard, SdsInfo, VdataGuard, VgroupGuard};
use crate::source::{DFTAG_NDG, DFTAG_VG, DFTAG_VH};

const DATA_FIELDS: &str = "Data Fields";
const GEO_FIELDS: &str = "Geolocation Fields";
const LONG_NAME: &str = "long_name";
const COORDINATES: &str = "coordinates";
const UNITS: &str = "units";

/// What to do with a lat/lon field's `scale_factor` or `add_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOffsetCheck {
    /// Copy the attribute.
    Keep,
    /// Identity value (scale 1, offset 0); drop it.
    Identity,
    /// A non-identity float scale on an integer coordinate.
    IntegerScale,
    /// A non-zero offset.
    NonZeroOffset,
}

/// Classify the single-valued `scale_factor` or `add_offset` of a lat/lon SDS.
pub fn check_scale_offset(info: &SdsInfo, attrs: &[RawAttribute], is_scale: bool) -> H4Result<ScaleOffsetCheck> {
    let wanted = if is_scale { SCALE_FACTOR } else { ADD_OFFSET };
    let attr = match attrs.iter().find(|a| a.name == wanted && a.count == 1) {
        Some(attr) => attr,
        None => return Ok(ScaleOffsetCheck::Keep),
    };

    if is_scale {
        if !attr.number_type.is_float() {
            return Ok(ScaleOffsetCheck::Keep);
        }
        if attr.element_as_f64(0)? == 1.0 {
            return Ok(ScaleOffsetCheck::Identity);
        }
        if !info.number_type.is_float() {
            return Ok(ScaleOffsetCheck::IntegerScale);
        }
        return Ok(ScaleOffsetCheck::Keep);
    }

    let text = print_attr(attr.number_type, 0, &attr.data)?;
    let is_zero = if attr.number_type.is_float() {
        atof(&text) == 0.0
    } else {
        atoi(&text) == 0
    };
    Ok(if is_zero {
        ScaleOffsetCheck::Identity
    } else {
        ScaleOffsetCheck::NonZeroOffset
    })
}

/// Field name to SDS index and field name to Vdata ref for one branch.
#[derive(Debug, Default, Clone)]
struct BranchMaps {
    sds: HashMap<String, usize>,
    vdata: HashMap<String, i32>,
}

/// File-scoped harvester of native field attributes.
pub struct AttrMapper<'a, L: Hdf4Library + ?Sized> {
    lib: &'a L,
    sd_id: i32,
    file_id: i32,
    group: Option<String>,
    data: BranchMaps,
    geo: BranchMaps,
    clash_names: HashSet<String>,
}

impl<'a, L: Hdf4Library + ?Sized> AttrMapper<'a, L> {
    /// `sd_id` comes from `SDstart` and `file_id` from `Hopen` on the same file.
    pub fn new(lib: &'a L, sd_id: i32, file_id: i32) -> Self {
        Self {
            lib,
            sd_id,
            file_id,
            group: None,
            data: BranchMaps::default(),
            geo: BranchMaps::default(),
            clash_names: HashSet::new(),
        }
    }

    /// Make `names` unique against every name this mapper has handed out.
    pub fn resolve_names(&mut self, names: &mut [String]) {
        handle_name_clashing(names, &mut self.clash_names);
    }

    pub fn clash_names(&self) -> &HashSet<String> {
        &self.clash_names
    }

    /// Write `long_name` and every native attribute of one grid or swath field.
    ///
    /// `n_groups` is the number of grids (or swaths) in the file; with more
    /// than one the long name is qualified by the group name.
    pub fn write_attribute(
        &mut self,
        das: &mut Das,
        group: &str,
        field: &str,
        new_name: &str,
        n_groups: usize,
        field_type: FieldType,
    ) -> H4Result<()> {
        let long_name = if n_groups > 1 {
            format!("{group}:{field}")
        } else {
            field.to_string()
        };
        write_attr_long_name(das, &long_name, new_name, field_type)?;

        if self.group.as_deref() != Some(group) {
            self.load_group(group)?;
        }

        if let Some(&index) = self.data.sds.get(field) {
            self.write_attr_sd(das, index, new_name, field_type)?;
        }
        if let Some(&reference) = self.data.vdata.get(field) {
            self.write_attr_vdata(das, reference, new_name, field_type)?;
        }
        if let Some(&index) = self.geo.sds.get(field) {
            self.write_attr_sd(das, index, new_name, field_type)?;
        }
        if let Some(&reference) = self.geo.vdata.get(field) {
            self.write_attr_vdata(das, reference, new_name, field_type)?;
        }
        Ok(())
    }

    fn load_group(&mut self, group: &str) -> H4Result<()> {
        self.group = None;
        self.data = BranchMaps::default();
        self.geo = BranchMaps::default();

        let reference = self.lib.v_find(self.file_id, group)?;
        let vgroup = VgroupGuard::new(self.lib, self.lib.v_attach(self.file_id, reference)?);
        let mut data_ref = None;
        let mut geo_ref = None;
        for child in self.lib.v_tag_refs(vgroup.id())? {
            if child.tag != DFTAG_VG {
                continue;
            }
            let sub = VgroupGuard::new(self.lib, self.lib.v_attach(self.file_id, child.reference)?);
            let name = self.lib.v_name(sub.id())?;
            sub.close()?;
            if name.starts_with(DATA_FIELDS) {
                data_ref = Some(child.reference);
            } else if name.starts_with(GEO_FIELDS) {
                geo_ref = Some(child.reference);
            }
        }
        vgroup.close()?;

        if let Some(r) = geo_ref {
            self.geo = self.branch_maps(r)?;
        }
        if let Some(r) = data_ref {
            self.data = self.branch_maps(r)?;
        }
        debug!(
            group = group,
            data_sds = self.data.sds.len(),
            data_vdata = self.data.vdata.len(),
            geo_sds = self.geo.sds.len(),
            geo_vdata = self.geo.vdata.len(),
            "Mapped field vgroups"
        );
        self.group = Some(group.to_string());
        Ok(())
    }

    /// Collect the SDS and Vdata children of a field vgroup.
    fn branch_maps(&self, reference: i32) -> H4Result<BranchMaps> {
        let mut maps = BranchMaps::default();
        let vgroup = VgroupGuard::new(self.lib, self.lib.v_attach(self.file_id, reference)?);
        for child in self.lib.v_tag_refs(vgroup.id())? {
            match child.tag {
                DFTAG_NDG => {
                    let index = self.lib.sd_ref_to_index(self.sd_id, child.reference)?;
                    let sds = SdsGuard::new(self.lib, self.lib.sd_select(self.sd_id, index)?);
                    let info = self.lib.sd_info(sds.id())?;
                    sds.close()?;
                    maps.sds.insert(info.name, index);
                }
                DFTAG_VH => {
                    let vdata = VdataGuard::new(self.lib, self.lib.vs_attach(self.file_id, child.reference)?);
                    let name = self.lib.vs_name(vdata.id())?;
                    vdata.close()?;
                    maps.vdata.insert(name, child.reference);
                }
                _ => {}
            }
        }
        vgroup.close()?;
        Ok(maps)
    }

    fn write_attr_sd(&self, das: &mut Das, index: usize, new_name: &str, field_type: FieldType) -> H4Result<()> {
        let sds = SdsGuard::new(self.lib, self.lib.sd_select(self.sd_id, index)?);
        let info = self.lib.sd_info(sds.id())?;
        let attrs = self.lib.sd_attributes(sds.id())?;
        sds.close()?;

        let table = das.get_or_create(new_name);
        let skip_coordinates = field_type == FieldType::General && table.contains(COORDINATES);
        let skip_units = field_type.is_lat_lon() && table.contains(UNITS);

        let mut skip_scale = false;
        let mut skip_offset = false;
        if field_type.is_lat_lon() {
            let scale = check_scale_offset(&info, &attrs, true)?;
            let offset = check_scale_offset(&info, &attrs, false)?;
            if scale == ScaleOffsetCheck::IntegerScale && offset == ScaleOffsetCheck::NonZeroOffset {
                return Err(H4Error::malformed(
                    info.name,
                    "integer latitude/longitude with a non-zero add_offset is not supported",
                ));
            }
            skip_scale = matches!(scale, ScaleOffsetCheck::Identity | ScaleOffsetCheck::IntegerScale);
            skip_offset = offset == ScaleOffsetCheck::Identity;
        }

        copy_native(table, &attrs, |name| {
            (skip_coordinates && name == COORDINATES)
                || (skip_units && name == UNITS)
                || (skip_scale && name == SCALE_FACTOR)
                || (skip_offset && name == ADD_OFFSET)
        })?;
        trace!(sds = %info.name, table = new_name, count = attrs.len(), "Copied SDS attributes");
        Ok(())
    }

    fn write_attr_vdata(
        &self,
        das: &mut Das,
        reference: i32,
        new_name: &str,
        field_type: FieldType,
    ) -> H4Result<()> {
        let vdata = VdataGuard::new(self.lib, self.lib.vs_attach(self.file_id, reference)?);
        let attrs = self.lib.vs_attributes(vdata.id())?;
        vdata.close()?;

        let table = das.get_or_create(new_name);
        let skip_coordinates = field_type == FieldType::General && table.contains(COORDINATES);
        let skip_units = !skip_coordinates && field_type.is_lat_lon() && table.contains(UNITS);
        copy_native(table, &attrs, |name| {
            (skip_coordinates && name == COORDINATES) || (skip_units && name == UNITS)
        })
    }
}

/// Copy native attributes under CF names. The first native `_FillValue` or
/// `long_name` replaces whatever the table already held.
fn copy_native(table: &mut AttrTable, attrs: &[RawAttribute], skip: impl Fn(&str) -> bool) -> H4Result<()> {
    let mut replaced: Vec<&str> = Vec::new();
    for attr in attrs {
        if skip(&attr.name) {
            continue;
        }
        let name = to_cf_name(&attr.name);
        for special in [FILL_VALUE, LONG_NAME] {
            if name == special && !replaced.contains(&special) {
                table.del_attr(special);
                replaced.push(special);
            }
        }
        append_raw_attr(table, &name, attr)?;
    }
    Ok(())
}

/// `long_name` for a field; invented fields are marked `(fake)`.
pub fn write_attr_long_name(das: &mut Das, long_name: &str, var: &str, field_type: FieldType) -> H4Result<()> {
    let value = if field_type.is_fake() {
        format!("{long_name}(fake)")
    } else {
        long_name.to_string()
    };
    das.get_or_create(var).append_attr(LONG_NAME, CfType::String, value)
}

/// Append a `_FillValue` given as f32, cast to the field's number type.
pub fn write_attribute_fill_value(das: &mut Das, var: &str, number_type: NumberType, value: f32) -> H4Result<()> {
    let text = match number_type {
        NumberType::Uint8 => (value as u8).to_string(),
        NumberType::Int8 => (value as i8).to_string(),
        NumberType::Int16 => (value as i16).to_string(),
        NumberType::Uint16 => (value as u16).to_string(),
        NumberType::Int32 => (value as i32).to_string(),
        NumberType::Uint32 => (value as u32).to_string(),
        NumberType::Float32 => print_float32(value),
        NumberType::Float64 => print_float64(value as f64),
        other => {
            return Err(H4Error::UnsupportedType(format!(
                "cannot write a _FillValue of type {other:?} for '{var}'"
            )))
        }
    };
    das.get_or_create(var).append_attr(FILL_VALUE, print_type(number_type), text)
}

pub fn write_attribute_coordinates(das: &mut Das, var: &str, coordinates: &str) -> H4Result<()> {
    das.get_or_create(var).append_attr(COORDINATES, CfType::String, coordinates)
}

/// Replace `units`.
pub fn write_attribute_units(das: &mut Das, var: &str, units: &str) -> H4Result<()> {
    let table = das.get_or_create(var);
    table.del_attr(UNITS);
    table.append_attr(UNITS, CfType::String, units)
}
