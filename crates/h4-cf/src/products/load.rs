//! Reading a special-product file and preparing its fields.

use std::collections::{HashMap, HashSet};

use h4_common::dtype::bytes_to_text;
use h4_common::{Dimension, FieldType, H4Config, H4Result, NumberType};
use tracing::debug;

use super::{detect_sp_type, SpField, SpFile, SpType, SpVdata, SpVdataField, VgroupAttrs};
use crate::naming::{dedupe, to_cf_name};
use crate::source::{HFileGuard, Hdf4Library, SdFileGuard, SdsGuard, VdataGuard, VgroupGuard};
use crate::source::{DFTAG_NDG, DFTAG_VG};

/// Vdata classes the HDF4 library uses for its own bookkeeping.
const INTERNAL_VDATA_CLASSES: [&str; 6] = [
    "_HDF_CHK_TBL_",
    "SDSVar",
    "CoordVar",
    "DimVal0.0",
    "DimVal0.1",
    "RIATTR0.0C",
];
const INTERNAL_VDATA_NAME: &str = "RIATTR0.0N";
/// Vdata with at most this many records are mapped to attributes.
const ATTR_VDATA_MAX_RECORDS: usize = 10;
const CERES_METADATA: &str = "CERES_metadata";
const LOCAL_GRANULE_ID: &str = "LOCALGRANULEID";
const EOSGRID_SUFFIX: &str = ":EOSGRID";

impl SpFile {
    /// Read and prepare a non-EOS HDF4 file.
    ///
    /// Every SD, V and VS handle taken here is released before returning,
    /// including on error.
    pub fn load<L: Hdf4Library + ?Sized>(lib: &L, path: &str, config: &H4Config) -> H4Result<SpFile> {
        let sd = SdFileGuard::new(lib, lib.sd_start(path)?);
        let h = HFileGuard::new(lib, lib.h_open(path)?);

        let global_attributes = lib.sd_global_attributes(sd.id())?;
        let tree = walk_vgroups(lib, h.id(), config.enable_vgroup_attr)?;
        let fields = read_fields(lib, sd.id(), &tree)?;
        let (vdatas, granule_id) = read_lone_vdatas(lib, h.id(), config.enable_vdata_desc_attr)?;

        h.close()?;
        sd.close()?;

        let sp_type = detect_sp_type(&global_attributes, &fields, granule_id.as_deref());
        let mut file = SpFile {
            path: path.to_string(),
            sp_type,
            global_attributes,
            fields,
            vdatas,
            vgroup_attrs: tree.vgroup_attrs,
            has_dim_no_scale_field: false,
            special_eos_grid: None,
        };
        file.prepare(config.enable_special_eos);
        debug!(
            path = path,
            sp_type = ?file.sp_type,
            fields = file.fields.len(),
            vdatas = file.vdatas.len(),
            dim_no_scale = file.has_dim_no_scale_field,
            "Prepared special-product file"
        );
        Ok(file)
    }

    /// Assign names, coordinate roles and `coordinates` values.
    pub fn prepare(&mut self, check_special_eos: bool) {
        if self.sp_type == SpType::ModisArnss {
            align_arnss_dims(&mut self.fields);
        }
        self.mark_coordinate_fields();
        self.insert_missing_fields();
        self.assign_names();

        if !self.has_dim_no_scale_field {
            self.assign_coordinates();
        }
        if check_special_eos {
            self.special_eos_grid = special_eos_grid(&self.fields);
        }
    }

    fn mark_coordinate_fields(&mut self) {
        let sp_type = self.sp_type;
        for field in &mut self.fields {
            if field.is_dim_scale && field.rank() == 1 && field.dims[0].name == field.name {
                field.field_type = FieldType::ExistingCv;
                continue;
            }
            let role = match sp_type {
                SpType::OtherHdf => None,
                SpType::ModisArnss => match field.name.as_str() {
                    "Latitude" => Some(FieldType::Latitude),
                    "Longitude" => Some(FieldType::Longitude),
                    _ => None,
                },
                _ => match field.name.to_ascii_lowercase().as_str() {
                    "latitude" => Some(FieldType::Latitude),
                    "longitude" => Some(FieldType::Longitude),
                    _ => None,
                },
            };
            match role {
                Some(FieldType::Latitude) => {
                    field.field_type = FieldType::Latitude;
                    field.units = "degrees_north".to_string();
                }
                Some(FieldType::Longitude) => {
                    field.field_type = FieldType::Longitude;
                    field.units = "degrees_east".to_string();
                }
                _ => {}
            }
        }
    }

    /// Dimensions without a coordinate dataset. Plain HDF4 files only record
    /// that they exist; the known products get an index field per dimension.
    fn insert_missing_fields(&mut self) {
        let mut covered: HashSet<String> = HashSet::new();
        for field in self.fields.iter().filter(|f| f.field_type != FieldType::General) {
            covered.extend(field.dims.iter().map(|d| d.name.clone()));
        }

        let mut missing: Vec<Dimension> = Vec::new();
        for dim in self.fields.iter().flat_map(|f| f.dims.iter()) {
            if !covered.contains(&dim.name) && !missing.iter().any(|d| d.name == dim.name) {
                missing.push(dim.clone());
            }
        }
        if missing.is_empty() {
            return;
        }

        let is_other = self.sp_type == SpType::OtherHdf;
        if is_other {
            self.has_dim_no_scale_field = true;
        }
        for dim in missing {
            let mut field = SpField::new(dim.name.clone(), NumberType::Int32);
            field.field_type = if self.sp_type.is_trmm_v7() && dim.name == "nlayer" {
                FieldType::AddedCv
            } else {
                FieldType::InsertedIndexCv
            };
            field.units = "level".to_string();
            field.is_dim_no_scale = is_other;
            field.dims = vec![dim];
            self.fields.push(field);
        }
    }

    fn assign_names(&mut self) {
        let merra_eos2 = self.merra_is_eos2();
        let mut names: Vec<String> = self
            .fields
            .iter()
            .map(|f| {
                let name = if merra_eos2 {
                    f.name.strip_suffix(EOSGRID_SUFFIX).unwrap_or(&f.name)
                } else {
                    f.name.as_str()
                };
                to_cf_name(name)
            })
            .collect();
        dedupe(&mut names);
        for (field, name) in self.fields.iter_mut().zip(names) {
            field.new_name = name;
        }
    }

    /// Every coordinate field whose dimensions all belong to the field.
    fn assign_coordinates(&mut self) {
        let cvs: Vec<(String, Vec<String>)> = self
            .fields
            .iter()
            .filter(|f| f.field_type != FieldType::General)
            .map(|f| (f.new_name.clone(), f.dims.iter().map(|d| d.name.clone()).collect()))
            .collect();
        for field in self.fields.iter_mut().filter(|f| f.field_type == FieldType::General) {
            let dims: HashSet<&str> = field.dims.iter().map(|d| d.name.as_str()).collect();
            let names: Vec<&str> = cvs
                .iter()
                .filter(|(_, cv_dims)| !cv_dims.is_empty() && cv_dims.iter().all(|d| dims.contains(d.as_str())))
                .map(|(name, _)| name.as_str())
                .collect();
            field.coordinates = names.join(" ");
        }
    }
}

/// ARNSS data fields name their dimensions differently from lat/lon; map
/// them onto the lat/lon names by size.
fn align_arnss_dims(fields: &mut [SpField]) {
    let by_size: HashMap<usize, String> = fields
        .iter()
        .filter(|f| f.name == "Longitude")
        .flat_map(|f| f.dims.iter().map(|d| (d.size, d.name.clone())))
        .collect();
    for field in fields.iter_mut().filter(|f| f.name != "Latitude" && f.name != "Longitude") {
        for dim in &mut field.dims {
            if let Some(name) = by_size.get(&dim.size) {
                dim.name = name.clone();
            }
        }
    }
}

/// A one-dimensional HDF-EOS2 grid read as plain SDS: rank-1 `XDim` and
/// `YDim` datasets whose dimensions are `XDim:<grid>` and `YDim:<grid>`.
fn special_eos_grid(fields: &[SpField]) -> Option<String> {
    let grid_of = |field_name: &str, prefix: &str| -> Option<String> {
        let field = fields
            .iter()
            .find(|f| f.name == field_name && f.rank() == 1 && !f.is_dim_scale)?;
        field.dims[0].name.strip_prefix(prefix).map(str::to_string)
    };
    let x = grid_of("XDim", "XDim:")?;
    let y = grid_of("YDim", "YDim:")?;
    (x == y && !x.is_empty()).then_some(x)
}

// ============================================================================
// Library walks
// ============================================================================

#[derive(Default)]
struct VgroupTree {
    /// SDS ref to the path of its parent vgroup, ending in `/`.
    sds_parent: HashMap<i32, String>,
    vgroup_attrs: Vec<VgroupAttrs>,
}

fn walk_vgroups<L: Hdf4Library + ?Sized>(lib: &L, file_id: i32, collect_attrs: bool) -> H4Result<VgroupTree> {
    let mut tree = VgroupTree::default();
    let mut visited = HashSet::new();
    for reference in lib.v_lone(file_id)? {
        walk_vgroup(lib, file_id, reference, "/", collect_attrs, &mut visited, &mut tree)?;
    }
    Ok(tree)
}

fn walk_vgroup<L: Hdf4Library + ?Sized>(
    lib: &L,
    file_id: i32,
    reference: i32,
    parent: &str,
    collect_attrs: bool,
    visited: &mut HashSet<i32>,
    tree: &mut VgroupTree,
) -> H4Result<()> {
    if !visited.insert(reference) {
        return Ok(());
    }
    let vgroup = VgroupGuard::new(lib, lib.v_attach(file_id, reference)?);
    let path = format!("{parent}{}", lib.v_name(vgroup.id())?);
    if collect_attrs {
        let attributes = lib.v_attributes(vgroup.id())?;
        if !attributes.is_empty() {
            tree.vgroup_attrs.push(VgroupAttrs {
                name: to_cf_name(&path),
                attributes,
            });
        }
    }
    let children = lib.v_tag_refs(vgroup.id())?;
    vgroup.close()?;

    let child_parent = format!("{path}/");
    for child in children {
        match child.tag {
            DFTAG_NDG => {
                tree.sds_parent
                    .entry(child.reference)
                    .or_insert_with(|| child_parent.clone());
            }
            DFTAG_VG => walk_vgroup(lib, file_id, child.reference, &child_parent, collect_attrs, visited, tree)?,
            _ => {}
        }
    }
    Ok(())
}

fn read_fields<L: Hdf4Library + ?Sized>(lib: &L, sd_id: i32, tree: &VgroupTree) -> H4Result<Vec<SpField>> {
    let count = lib.sd_file_info(sd_id)?;
    let mut fields = Vec::with_capacity(count);
    for index in 0..count {
        let sds = SdsGuard::new(lib, lib.sd_select(sd_id, index)?);
        let info = lib.sd_info(sds.id())?;
        let attributes = lib.sd_attributes(sds.id())?;
        sds.close()?;

        let mut field = SpField::new(info.name.clone(), info.number_type);
        if let Some(parent) = tree.sds_parent.get(&info.reference) {
            field.full_path = format!("{parent}{}", info.name);
        }
        field.dims = info.dims;
        field.attributes = attributes;
        field.is_dim_scale = info.is_dim_scale;
        fields.push(field);
    }
    Ok(fields)
}

fn is_internal_vdata(name: &str, class: &str) -> bool {
    INTERNAL_VDATA_CLASSES.iter().any(|c| class.starts_with(c)) || name.starts_with(INTERNAL_VDATA_NAME)
}

/// Lone user Vdata plus the CERES granule id, when the file has one.
fn read_lone_vdatas<L: Hdf4Library + ?Sized>(
    lib: &L,
    file_id: i32,
    enable_desc: bool,
) -> H4Result<(Vec<SpVdata>, Option<String>)> {
    let mut vdatas = Vec::new();
    let mut granule_id = None;
    for reference in lib.vs_lone(file_id)? {
        let vdata = VdataGuard::new(lib, lib.vs_attach(file_id, reference)?);
        let name = lib.vs_name(vdata.id())?;
        let class = lib.vs_class(vdata.id())?;
        if lib.vs_is_attr(vdata.id())? || is_internal_vdata(&name, &class) {
            vdata.close()?;
            continue;
        }
        let records = lib.vs_record_count(vdata.id())?;
        let attributes = lib.vs_attributes(vdata.id())?;
        let raw_fields = lib.vs_fields(vdata.id())?;
        vdata.close()?;

        if name == CERES_METADATA {
            if let Some(id) = raw_fields.iter().find(|f| f.name == LOCAL_GRANULE_ID) {
                granule_id = Some(bytes_to_text(&id.data));
            }
        }

        let new_name = to_cf_name(&name);
        let treat_as_attr = enable_desc && records <= ATTR_VDATA_MAX_RECORDS;
        let fields = raw_fields
            .into_iter()
            .map(|f| SpVdataField {
                new_name: if treat_as_attr {
                    to_cf_name(&f.name)
                } else {
                    to_cf_name(&format!("vdata_{new_name}_vdf_{}", f.name))
                },
                name: f.name,
                number_type: f.number_type,
                order: f.order,
                data: f.data,
                attributes: f.attributes,
            })
            .collect();
        vdatas.push(SpVdata {
            name,
            new_name,
            class,
            records,
            treat_as_attr,
            attributes,
            fields,
        });
    }

    let mut names: Vec<String> = vdatas
        .iter()
        .flat_map(|v| v.fields.iter().map(|f| f.new_name.clone()))
        .collect();
    dedupe(&mut names);
    let mut names = names.into_iter();
    for field in vdatas.iter_mut().flat_map(|v| v.fields.iter_mut()) {
        if let Some(name) = names.next() {
            field.new_name = name;
        }
    }
    Ok((vdatas, granule_id))
}
