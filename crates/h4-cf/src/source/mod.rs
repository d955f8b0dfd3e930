//! The HDF4 and HDF-EOS2 library seams.
//!
//! The engine never talks to the C libraries directly. Everything it needs is
//! expressed by [`Hdf4Library`] (SD, V and VS interfaces) and [`EosLibrary`]
//! (GD/SW interfaces). Handles are plain `i32` ids like the C API; callers wrap
//! them in the guards of [`guard`] so every acquired handle is released on
//! every exit path.

pub mod guard;
pub mod memory;

use bytes::Bytes;
use h4_common::{Dimension, H4Error, H4Result, NumberType, RawAttribute};

pub use guard::{
    EosFileGuard, EosObjectGuard, HFileGuard, SdFileGuard, SdsGuard, VdataGuard, VgroupGuard,
};
pub use memory::MemoryFile;

/// SDS tag (numeric data group).
pub const DFTAG_NDG: i32 = 720;
/// Vdata tag.
pub const DFTAG_VH: i32 = 1962;
/// Vgroup tag.
pub const DFTAG_VG: i32 = 1965;

/// What `SDgetinfo` reports for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SdsInfo {
    pub name: String,
    pub reference: i32,
    pub dims: Vec<Dimension>,
    pub number_type: NumberType,
    pub n_attrs: usize,
    pub is_dim_scale: bool,
}

impl SdsInfo {
    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

/// A child entry of a vgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRef {
    pub tag: i32,
    pub reference: i32,
}

/// One vdata field with all of its records.
#[derive(Debug, Clone, PartialEq)]
pub struct VdataField {
    pub name: String,
    pub number_type: NumberType,
    pub order: usize,
    /// `records * order` packed elements.
    pub data: Bytes,
    pub attributes: Vec<RawAttribute>,
}

/// SD, V and VS interfaces of the HDF4 library.
pub trait Hdf4Library {
    fn sd_start(&self, path: &str) -> H4Result<i32>;
    fn sd_end(&self, sd_id: i32) -> H4Result<()>;
    /// Number of datasets in the file.
    fn sd_file_info(&self, sd_id: i32) -> H4Result<usize>;
    fn sd_global_attributes(&self, sd_id: i32) -> H4Result<Vec<RawAttribute>>;
    fn sd_ref_to_index(&self, sd_id: i32, reference: i32) -> H4Result<usize>;
    fn sd_name_to_index(&self, sd_id: i32, name: &str) -> H4Result<usize>;
    fn sd_select(&self, sd_id: i32, index: usize) -> H4Result<i32>;
    fn sd_end_access(&self, sds_id: i32) -> H4Result<()>;
    fn sd_info(&self, sds_id: i32) -> H4Result<SdsInfo>;
    fn sd_attributes(&self, sds_id: i32) -> H4Result<Vec<RawAttribute>>;

    fn h_open(&self, path: &str) -> H4Result<i32>;
    fn h_close(&self, file_id: i32) -> H4Result<()>;

    /// Ref of the vgroup with this name.
    fn v_find(&self, file_id: i32, name: &str) -> H4Result<i32>;
    /// Refs of vgroups that are not children of another vgroup.
    fn v_lone(&self, file_id: i32) -> H4Result<Vec<i32>>;
    fn v_attach(&self, file_id: i32, reference: i32) -> H4Result<i32>;
    fn v_detach(&self, vgroup_id: i32) -> H4Result<()>;
    fn v_name(&self, vgroup_id: i32) -> H4Result<String>;
    fn v_class(&self, vgroup_id: i32) -> H4Result<String>;
    fn v_tag_refs(&self, vgroup_id: i32) -> H4Result<Vec<TagRef>>;
    fn v_attributes(&self, vgroup_id: i32) -> H4Result<Vec<RawAttribute>>;

    /// Refs of vdatas that are not children of any vgroup.
    fn vs_lone(&self, file_id: i32) -> H4Result<Vec<i32>>;
    fn vs_attach(&self, file_id: i32, reference: i32) -> H4Result<i32>;
    fn vs_detach(&self, vdata_id: i32) -> H4Result<()>;
    fn vs_name(&self, vdata_id: i32) -> H4Result<String>;
    fn vs_class(&self, vdata_id: i32) -> H4Result<String>;
    fn vs_is_attr(&self, vdata_id: i32) -> H4Result<bool>;
    fn vs_record_count(&self, vdata_id: i32) -> H4Result<usize>;
    fn vs_attributes(&self, vdata_id: i32) -> H4Result<Vec<RawAttribute>>;
    fn vs_fields(&self, vdata_id: i32) -> H4Result<Vec<VdataField>>;
}

/// Shape and type of a grid or swath field.
#[derive(Debug, Clone, PartialEq)]
pub struct EosFieldInfo {
    pub dims: Vec<Dimension>,
    pub number_type: NumberType,
}

/// GD and SW interfaces of the HDF-EOS2 library.
pub trait EosLibrary {
    fn gd_open(&self, path: &str) -> H4Result<i32>;
    fn gd_close(&self, file_id: i32) -> H4Result<()>;
    fn gd_attach(&self, file_id: i32, name: &str) -> H4Result<i32>;
    fn gd_detach(&self, grid_id: i32) -> H4Result<()>;
    fn gd_field_info(&self, grid_id: i32, field: &str) -> H4Result<EosFieldInfo>;
    fn gd_read_field(&self, grid_id: i32, field: &str) -> H4Result<Bytes>;
    fn gd_field_attribute(&self, grid_id: i32, field: &str, name: &str) -> H4Result<Option<RawAttribute>>;

    fn sw_open(&self, path: &str) -> H4Result<i32>;
    fn sw_close(&self, file_id: i32) -> H4Result<()>;
    fn sw_attach(&self, file_id: i32, name: &str) -> H4Result<i32>;
    fn sw_detach(&self, swath_id: i32) -> H4Result<()>;
    fn sw_field_info(&self, swath_id: i32, field: &str) -> H4Result<EosFieldInfo>;
    fn sw_read_field(&self, swath_id: i32, field: &str) -> H4Result<Bytes>;
    fn sw_field_attribute(&self, swath_id: i32, field: &str, name: &str) -> H4Result<Option<RawAttribute>>;
    /// `SWinqmaps`: the `geo/data` name list plus offsets and increments.
    fn sw_inq_maps(&self, swath_id: i32) -> H4Result<(String, Vec<i32>, Vec<i32>)>;
    fn sw_dim_size(&self, swath_id: i32, dim: &str) -> H4Result<usize>;
}

/// The grid or swath half of [`EosLibrary`], chosen once per object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EosApi {
    Grid,
    Swath,
}

impl EosApi {
    /// Pick the API from whichever object name is set. Exactly one must be.
    pub fn select<'n>(grid_name: &'n str, swath_name: &'n str) -> H4Result<(EosApi, &'n str)> {
        match (grid_name.is_empty(), swath_name.is_empty()) {
            (false, true) => Ok((EosApi::Grid, grid_name)),
            (true, false) => Ok((EosApi::Swath, swath_name)),
            (true, true) => Err(H4Error::invalid_input("neither a grid nor a swath name is given")),
            (false, false) => Err(H4Error::invalid_input(format!(
                "both grid '{grid_name}' and swath '{swath_name}' are given"
            ))),
        }
    }

    pub fn open<L: EosLibrary + ?Sized>(self, lib: &L, path: &str) -> H4Result<i32> {
        match self {
            EosApi::Grid => lib.gd_open(path),
            EosApi::Swath => lib.sw_open(path),
        }
    }

    pub fn close<L: EosLibrary + ?Sized>(self, lib: &L, file_id: i32) -> H4Result<()> {
        match self {
            EosApi::Grid => lib.gd_close(file_id),
            EosApi::Swath => lib.sw_close(file_id),
        }
    }

    pub fn attach<L: EosLibrary + ?Sized>(self, lib: &L, file_id: i32, name: &str) -> H4Result<i32> {
        match self {
            EosApi::Grid => lib.gd_attach(file_id, name),
            EosApi::Swath => lib.sw_attach(file_id, name),
        }
    }

    pub fn detach<L: EosLibrary + ?Sized>(self, lib: &L, object_id: i32) -> H4Result<()> {
        match self {
            EosApi::Grid => lib.gd_detach(object_id),
            EosApi::Swath => lib.sw_detach(object_id),
        }
    }

    pub fn field_info<L: EosLibrary + ?Sized>(
        self,
        lib: &L,
        object_id: i32,
        field: &str,
    ) -> H4Result<EosFieldInfo> {
        match self {
            EosApi::Grid => lib.gd_field_info(object_id, field),
            EosApi::Swath => lib.sw_field_info(object_id, field),
        }
    }

    pub fn read_field<L: EosLibrary + ?Sized>(self, lib: &L, object_id: i32, field: &str) -> H4Result<Bytes> {
        match self {
            EosApi::Grid => lib.gd_read_field(object_id, field),
            EosApi::Swath => lib.sw_read_field(object_id, field),
        }
    }

    pub fn field_attribute<L: EosLibrary + ?Sized>(
        self,
        lib: &L,
        object_id: i32,
        field: &str,
        name: &str,
    ) -> H4Result<Option<RawAttribute>> {
        match self {
            EosApi::Grid => lib.gd_field_attribute(object_id, field, name),
            EosApi::Swath => lib.sw_field_attribute(object_id, field, name),
        }
    }

    /// Dimension maps and dense sizes are a swath concept.
    pub fn inq_maps<L: EosLibrary + ?Sized>(
        self,
        lib: &L,
        object_id: i32,
    ) -> H4Result<(String, Vec<i32>, Vec<i32>)> {
        match self {
            EosApi::Grid => Ok((String::new(), Vec::new(), Vec::new())),
            EosApi::Swath => lib.sw_inq_maps(object_id),
        }
    }

    pub fn dim_size<L: EosLibrary + ?Sized>(self, lib: &L, object_id: i32, dim: &str) -> H4Result<usize> {
        match self {
            EosApi::Grid => Err(H4Error::invalid_input(format!(
                "grids have no dimension map for '{dim}'"
            ))),
            EosApi::Swath => lib.sw_dim_size(object_id, dim),
        }
    }

    /// Name of the C call family, for error messages.
    pub fn prefix(self) -> &'static str {
        match self {
            EosApi::Grid => "GD",
            EosApi::Swath => "SW",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_exactly_one() {
        assert_eq!(EosApi::select("g", "").unwrap(), (EosApi::Grid, "g"));
        assert_eq!(EosApi::select("", "s").unwrap(), (EosApi::Swath, "s"));
        assert!(EosApi::select("", "").is_err());
        assert!(EosApi::select("g", "s").is_err());
    }
}
