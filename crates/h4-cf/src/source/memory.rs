//! In-memory implementation of both library traits, backed by a snapshot.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;

use bytes::Bytes;
use h4_common::snapshot::raw_attributes;
use h4_common::{
    ChildKind, EosFile, EosObjectSpec, FileSnapshot, H4Error, H4Result, NumberType, RawAttribute,
    VdataSpec,
};

use super::{EosApi, EosFieldInfo, EosLibrary, Hdf4Library, SdsInfo, TagRef, VdataField};
use super::{DFTAG_NDG, DFTAG_VG, DFTAG_VH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handle {
    SdFile,
    Sds(usize),
    HFile,
    Vgroup(usize),
    Vdata(usize),
    EosFile(EosApi),
    EosObject(EosApi, usize),
}

/// One HDF4 file held in memory.
///
/// Every open/attach hands out a fresh id and every release must present a
/// live id of the matching kind, so leaked or double-released handles show up
/// in [`MemoryFile::open_handles`] or as errors.
pub struct MemoryFile {
    snapshot: FileSnapshot,
    global_attributes: Vec<RawAttribute>,
    sds_attributes: Vec<Vec<RawAttribute>>,
    vgroup_attributes: Vec<Vec<RawAttribute>>,
    vdata_attributes: Vec<Vec<RawAttribute>>,
    vdata_fields: Vec<Vec<VdataField>>,
    handles: RefCell<HashMap<i32, Handle>>,
    next_id: Cell<i32>,
}

impl MemoryFile {
    pub fn from_snapshot(snapshot: FileSnapshot) -> H4Result<Self> {
        let global_attributes = raw_attributes(&snapshot.global_attributes)?;
        let sds_attributes = snapshot
            .datasets
            .iter()
            .map(|s| raw_attributes(&s.attributes))
            .collect::<H4Result<_>>()?;
        let vgroup_attributes = snapshot
            .vgroups
            .iter()
            .map(|v| raw_attributes(&v.attributes))
            .collect::<H4Result<_>>()?;
        let vdata_attributes = snapshot
            .vdatas
            .iter()
            .map(|v| raw_attributes(&v.attributes))
            .collect::<H4Result<_>>()?;
        let vdata_fields = snapshot
            .vdatas
            .iter()
            .map(encode_vdata_fields)
            .collect::<H4Result<_>>()?;

        Ok(Self {
            snapshot,
            global_attributes,
            sds_attributes,
            vgroup_attributes,
            vdata_attributes,
            vdata_fields,
            handles: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        })
    }

    pub fn from_yaml_str(yaml: &str) -> H4Result<Self> {
        Self::from_snapshot(FileSnapshot::from_yaml_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> H4Result<Self> {
        Self::from_snapshot(FileSnapshot::from_path(path)?)
    }

    pub fn path(&self) -> &str {
        &self.snapshot.path
    }

    pub fn snapshot(&self) -> &FileSnapshot {
        &self.snapshot
    }

    pub fn eos_file(&self) -> H4Result<EosFile> {
        self.snapshot.to_eos_file()
    }

    /// Handles currently open or attached.
    pub fn open_handles(&self) -> usize {
        self.handles.borrow().len()
    }

    fn check_path(&self, call: &'static str, path: &str) -> H4Result<()> {
        if path == self.snapshot.path {
            Ok(())
        } else {
            Err(H4Error::library(call, format!("cannot open '{path}'")))
        }
    }

    fn acquire(&self, handle: Handle) -> i32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handles.borrow_mut().insert(id, handle);
        id
    }

    fn lookup(&self, call: &'static str, id: i32) -> H4Result<Handle> {
        self.handles
            .borrow()
            .get(&id)
            .copied()
            .ok_or_else(|| H4Error::library(call, format!("invalid id {id}")))
    }

    fn release(&self, call: &'static str, id: i32, matches: impl Fn(Handle) -> bool) -> H4Result<()> {
        let handle = self.lookup(call, id)?;
        if !matches(handle) {
            return Err(H4Error::library(call, format!("id {id} is a {handle:?} handle")));
        }
        self.handles.borrow_mut().remove(&id);
        Ok(())
    }

    fn sds_index(&self, call: &'static str, id: i32) -> H4Result<usize> {
        match self.lookup(call, id)? {
            Handle::Sds(index) => Ok(index),
            other => Err(H4Error::library(call, format!("id {id} is a {other:?} handle"))),
        }
    }

    fn vgroup_index(&self, call: &'static str, id: i32) -> H4Result<usize> {
        match self.lookup(call, id)? {
            Handle::Vgroup(index) => Ok(index),
            other => Err(H4Error::library(call, format!("id {id} is a {other:?} handle"))),
        }
    }

    fn vdata(&self, call: &'static str, id: i32) -> H4Result<(usize, &VdataSpec)> {
        match self.lookup(call, id)? {
            Handle::Vdata(index) => Ok((index, &self.snapshot.vdatas[index])),
            other => Err(H4Error::library(call, format!("id {id} is a {other:?} handle"))),
        }
    }

    fn check_file(&self, call: &'static str, id: i32, expected: Handle) -> H4Result<()> {
        let handle = self.lookup(call, id)?;
        if handle == expected {
            Ok(())
        } else {
            Err(H4Error::library(call, format!("id {id} is a {handle:?} handle")))
        }
    }

    fn objects(&self, api: EosApi) -> &[EosObjectSpec] {
        match api {
            EosApi::Grid => &self.snapshot.grids,
            EosApi::Swath => &self.snapshot.swaths,
        }
    }

    fn eos_object(&self, call: &'static str, api: EosApi, id: i32) -> H4Result<&EosObjectSpec> {
        match self.lookup(call, id)? {
            Handle::EosObject(kind, index) if kind == api => Ok(&self.objects(api)[index]),
            other => Err(H4Error::library(call, format!("id {id} is a {other:?} handle"))),
        }
    }

    fn eos_open(&self, call: &'static str, api: EosApi, path: &str) -> H4Result<i32> {
        self.check_path(call, path)?;
        Ok(self.acquire(Handle::EosFile(api)))
    }

    fn eos_attach(&self, call: &'static str, api: EosApi, file_id: i32, name: &str) -> H4Result<i32> {
        self.check_file(call, file_id, Handle::EosFile(api))?;
        let index = self
            .objects(api)
            .iter()
            .position(|o| o.name == name)
            .ok_or_else(|| H4Error::library(call, format!("no object named '{name}'")))?;
        Ok(self.acquire(Handle::EosObject(api, index)))
    }

    fn eos_field_info(&self, call: &'static str, api: EosApi, id: i32, field: &str) -> H4Result<EosFieldInfo> {
        let object = self.eos_object(call, api, id)?;
        let desc = object
            .field(field)
            .ok_or_else(|| H4Error::library(call, format!("no field '{field}' in '{}'", object.name)))?;
        Ok(EosFieldInfo {
            dims: desc.dimensions.clone(),
            number_type: desc.number_type,
        })
    }

    fn eos_read_field(&self, call: &'static str, api: EosApi, id: i32, field: &str) -> H4Result<Bytes> {
        let info = self.eos_field_info(call, api, id, field)?;
        let object = self.eos_object(call, api, id)?;
        let values = object
            .field_values
            .get(field)
            .ok_or_else(|| H4Error::library(call, format!("field '{field}' has no data")))?;
        encode_values(field, info.number_type, values)
    }

    fn eos_field_attribute(
        &self,
        call: &'static str,
        api: EosApi,
        id: i32,
        field: &str,
        name: &str,
    ) -> H4Result<Option<RawAttribute>> {
        let object = self.eos_object(call, api, id)?;
        object
            .field_attributes
            .get(field)
            .and_then(|attrs| attrs.iter().find(|a| a.name == name))
            .map(|a| a.to_raw())
            .transpose()
    }
}

fn encode_values(name: &str, number_type: NumberType, values: &[f64]) -> H4Result<Bytes> {
    match number_type {
        NumberType::Float32 => {
            let narrowed: Vec<f32> = values.iter().map(|&v| v as f32).collect();
            Ok(Bytes::copy_from_slice(bytemuck::cast_slice(&narrowed)))
        }
        NumberType::Float64 => Ok(Bytes::copy_from_slice(bytemuck::cast_slice(values))),
        _ => {
            let text: Vec<String> = values.iter().map(|&v| (v as i64).to_string()).collect();
            Ok(RawAttribute::from_text_values(name, number_type, &text)?.data)
        }
    }
}

fn encode_vdata_fields(vdata: &VdataSpec) -> H4Result<Vec<VdataField>> {
    vdata
        .fields
        .iter()
        .map(|f| {
            let data = if f.number_type.is_char() {
                // one string per record, NUL padded to the field order
                let mut buf = Vec::with_capacity(vdata.records * f.order);
                for v in &f.values {
                    let mut record = v.to_string().into_bytes();
                    record.resize(f.order.max(record.len()), 0);
                    buf.extend_from_slice(&record);
                }
                Bytes::from(buf)
            } else {
                let text: Vec<String> = f.values.iter().map(ToString::to_string).collect();
                RawAttribute::from_text_values(f.name.clone(), f.number_type, &text)?.data
            };
            Ok(VdataField {
                name: f.name.clone(),
                number_type: f.number_type,
                order: f.order,
                data,
                attributes: raw_attributes(&f.attributes)?,
            })
        })
        .collect()
}

impl Hdf4Library for MemoryFile {
    fn sd_start(&self, path: &str) -> H4Result<i32> {
        self.check_path("SDstart", path)?;
        Ok(self.acquire(Handle::SdFile))
    }

    fn sd_end(&self, sd_id: i32) -> H4Result<()> {
        self.release("SDend", sd_id, |h| h == Handle::SdFile)
    }

    fn sd_file_info(&self, sd_id: i32) -> H4Result<usize> {
        self.check_file("SDfileinfo", sd_id, Handle::SdFile)?;
        Ok(self.snapshot.datasets.len())
    }

    fn sd_global_attributes(&self, sd_id: i32) -> H4Result<Vec<RawAttribute>> {
        self.check_file("SDattrinfo", sd_id, Handle::SdFile)?;
        Ok(self.global_attributes.clone())
    }

    fn sd_ref_to_index(&self, sd_id: i32, reference: i32) -> H4Result<usize> {
        self.check_file("SDreftoindex", sd_id, Handle::SdFile)?;
        self.snapshot
            .datasets
            .iter()
            .position(|s| s.reference == reference)
            .ok_or_else(|| H4Error::library("SDreftoindex", format!("no dataset with ref {reference}")))
    }

    fn sd_name_to_index(&self, sd_id: i32, name: &str) -> H4Result<usize> {
        self.check_file("SDnametoindex", sd_id, Handle::SdFile)?;
        self.snapshot
            .datasets
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| H4Error::library("SDnametoindex", format!("no dataset named '{name}'")))
    }

    fn sd_select(&self, sd_id: i32, index: usize) -> H4Result<i32> {
        self.check_file("SDselect", sd_id, Handle::SdFile)?;
        if index >= self.snapshot.datasets.len() {
            return Err(H4Error::library("SDselect", format!("index {index} is out of range")));
        }
        Ok(self.acquire(Handle::Sds(index)))
    }

    fn sd_end_access(&self, sds_id: i32) -> H4Result<()> {
        self.release("SDendaccess", sds_id, |h| matches!(h, Handle::Sds(_)))
    }

    fn sd_info(&self, sds_id: i32) -> H4Result<SdsInfo> {
        let index = self.sds_index("SDgetinfo", sds_id)?;
        let sds = &self.snapshot.datasets[index];
        Ok(SdsInfo {
            name: sds.name.clone(),
            reference: sds.reference,
            dims: sds.dims.clone(),
            number_type: sds.number_type,
            n_attrs: sds.attributes.len(),
            is_dim_scale: sds.dim_scale,
        })
    }

    fn sd_attributes(&self, sds_id: i32) -> H4Result<Vec<RawAttribute>> {
        let index = self.sds_index("SDreadattr", sds_id)?;
        Ok(self.sds_attributes[index].clone())
    }

    fn h_open(&self, path: &str) -> H4Result<i32> {
        self.check_path("Hopen", path)?;
        Ok(self.acquire(Handle::HFile))
    }

    fn h_close(&self, file_id: i32) -> H4Result<()> {
        self.release("Hclose", file_id, |h| h == Handle::HFile)
    }

    fn v_find(&self, file_id: i32, name: &str) -> H4Result<i32> {
        self.check_file("Vfind", file_id, Handle::HFile)?;
        self.snapshot
            .vgroups
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.reference)
            .ok_or_else(|| H4Error::library("Vfind", format!("no vgroup named '{name}'")))
    }

    fn v_lone(&self, file_id: i32) -> H4Result<Vec<i32>> {
        self.check_file("Vlone", file_id, Handle::HFile)?;
        Ok(self
            .snapshot
            .vgroups
            .iter()
            .filter(|v| v.lone)
            .map(|v| v.reference)
            .collect())
    }

    fn v_attach(&self, file_id: i32, reference: i32) -> H4Result<i32> {
        self.check_file("Vattach", file_id, Handle::HFile)?;
        let index = self
            .snapshot
            .vgroups
            .iter()
            .position(|v| v.reference == reference)
            .ok_or_else(|| H4Error::library("Vattach", format!("no vgroup with ref {reference}")))?;
        Ok(self.acquire(Handle::Vgroup(index)))
    }

    fn v_detach(&self, vgroup_id: i32) -> H4Result<()> {
        self.release("Vdetach", vgroup_id, |h| matches!(h, Handle::Vgroup(_)))
    }

    fn v_name(&self, vgroup_id: i32) -> H4Result<String> {
        let index = self.vgroup_index("Vgetname", vgroup_id)?;
        Ok(self.snapshot.vgroups[index].name.clone())
    }

    fn v_class(&self, vgroup_id: i32) -> H4Result<String> {
        let index = self.vgroup_index("Vgetclass", vgroup_id)?;
        Ok(self.snapshot.vgroups[index].class.clone())
    }

    fn v_tag_refs(&self, vgroup_id: i32) -> H4Result<Vec<TagRef>> {
        let index = self.vgroup_index("Vgettagrefs", vgroup_id)?;
        Ok(self.snapshot.vgroups[index]
            .children
            .iter()
            .map(|c| TagRef {
                tag: match c.kind {
                    ChildKind::Sds => DFTAG_NDG,
                    ChildKind::Vdata => DFTAG_VH,
                    ChildKind::Vgroup => DFTAG_VG,
                },
                reference: c.reference,
            })
            .collect())
    }

    fn v_attributes(&self, vgroup_id: i32) -> H4Result<Vec<RawAttribute>> {
        let index = self.vgroup_index("Vattrinfo", vgroup_id)?;
        Ok(self.vgroup_attributes[index].clone())
    }

    fn vs_lone(&self, file_id: i32) -> H4Result<Vec<i32>> {
        self.check_file("VSlone", file_id, Handle::HFile)?;
        Ok(self
            .snapshot
            .vdatas
            .iter()
            .filter(|v| v.lone)
            .map(|v| v.reference)
            .collect())
    }

    fn vs_attach(&self, file_id: i32, reference: i32) -> H4Result<i32> {
        self.check_file("VSattach", file_id, Handle::HFile)?;
        let index = self
            .snapshot
            .vdatas
            .iter()
            .position(|v| v.reference == reference)
            .ok_or_else(|| H4Error::library("VSattach", format!("no vdata with ref {reference}")))?;
        Ok(self.acquire(Handle::Vdata(index)))
    }

    fn vs_detach(&self, vdata_id: i32) -> H4Result<()> {
        self.release("VSdetach", vdata_id, |h| matches!(h, Handle::Vdata(_)))
    }

    fn vs_name(&self, vdata_id: i32) -> H4Result<String> {
        Ok(self.vdata("VSgetname", vdata_id)?.1.name.clone())
    }

    fn vs_class(&self, vdata_id: i32) -> H4Result<String> {
        Ok(self.vdata("VSgetclass", vdata_id)?.1.class.clone())
    }

    fn vs_is_attr(&self, vdata_id: i32) -> H4Result<bool> {
        Ok(self.vdata("VSisattr", vdata_id)?.1.is_attr)
    }

    fn vs_record_count(&self, vdata_id: i32) -> H4Result<usize> {
        Ok(self.vdata("VSelts", vdata_id)?.1.records)
    }

    fn vs_attributes(&self, vdata_id: i32) -> H4Result<Vec<RawAttribute>> {
        let (index, _) = self.vdata("VSattrinfo", vdata_id)?;
        Ok(self.vdata_attributes[index].clone())
    }

    fn vs_fields(&self, vdata_id: i32) -> H4Result<Vec<VdataField>> {
        let (index, _) = self.vdata("VSread", vdata_id)?;
        Ok(self.vdata_fields[index].clone())
    }
}

impl EosLibrary for MemoryFile {
    fn gd_open(&self, path: &str) -> H4Result<i32> {
        self.eos_open("GDopen", EosApi::Grid, path)
    }

    fn gd_close(&self, file_id: i32) -> H4Result<()> {
        self.release("GDclose", file_id, |h| h == Handle::EosFile(EosApi::Grid))
    }

    fn gd_attach(&self, file_id: i32, name: &str) -> H4Result<i32> {
        self.eos_attach("GDattach", EosApi::Grid, file_id, name)
    }

    fn gd_detach(&self, grid_id: i32) -> H4Result<()> {
        self.release("GDdetach", grid_id, |h| {
            matches!(h, Handle::EosObject(EosApi::Grid, _))
        })
    }

    fn gd_field_info(&self, grid_id: i32, field: &str) -> H4Result<EosFieldInfo> {
        self.eos_field_info("GDfieldinfo", EosApi::Grid, grid_id, field)
    }

    fn gd_read_field(&self, grid_id: i32, field: &str) -> H4Result<Bytes> {
        self.eos_read_field("GDreadfield", EosApi::Grid, grid_id, field)
    }

    fn gd_field_attribute(&self, grid_id: i32, field: &str, name: &str) -> H4Result<Option<RawAttribute>> {
        self.eos_field_attribute("GDreadattr", EosApi::Grid, grid_id, field, name)
    }

    fn sw_open(&self, path: &str) -> H4Result<i32> {
        self.eos_open("SWopen", EosApi::Swath, path)
    }

    fn sw_close(&self, file_id: i32) -> H4Result<()> {
        self.release("SWclose", file_id, |h| h == Handle::EosFile(EosApi::Swath))
    }

    fn sw_attach(&self, file_id: i32, name: &str) -> H4Result<i32> {
        self.eos_attach("SWattach", EosApi::Swath, file_id, name)
    }

    fn sw_detach(&self, swath_id: i32) -> H4Result<()> {
        self.release("SWdetach", swath_id, |h| {
            matches!(h, Handle::EosObject(EosApi::Swath, _))
        })
    }

    fn sw_field_info(&self, swath_id: i32, field: &str) -> H4Result<EosFieldInfo> {
        self.eos_field_info("SWfieldinfo", EosApi::Swath, swath_id, field)
    }

    fn sw_read_field(&self, swath_id: i32, field: &str) -> H4Result<Bytes> {
        self.eos_read_field("SWreadfield", EosApi::Swath, swath_id, field)
    }

    fn sw_field_attribute(&self, swath_id: i32, field: &str, name: &str) -> H4Result<Option<RawAttribute>> {
        self.eos_field_attribute("SWreadattr", EosApi::Swath, swath_id, field, name)
    }

    fn sw_inq_maps(&self, swath_id: i32) -> H4Result<(String, Vec<i32>, Vec<i32>)> {
        let swath = self.eos_object("SWinqmaps", EosApi::Swath, swath_id)?;
        let names: Vec<String> = swath
            .dimension_maps
            .iter()
            .map(|m| format!("{}/{}", m.geo, m.data))
            .collect();
        Ok((
            names.join(","),
            swath.dimension_maps.iter().map(|m| m.offset).collect(),
            swath.dimension_maps.iter().map(|m| m.increment).collect(),
        ))
    }

    fn sw_dim_size(&self, swath_id: i32, dim: &str) -> H4Result<usize> {
        let swath = self.eos_object("SWdiminfo", EosApi::Swath, swath_id)?;
        swath
            .data_fields
            .iter()
            .chain(swath.geo_fields.iter())
            .flat_map(|f| f.dimensions.iter())
            .find(|d| d.name == dim)
            .map(|d| d.size)
            .ok_or_else(|| H4Error::library("SWdiminfo", format!("no dimension '{dim}'")))
    }
}
