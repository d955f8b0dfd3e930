//! Grid and swath object attributes of HDF-EOS2 files.
//!
//! The HDF-EOS2 library stores `GDwriteattr`/`SWwriteattr` values as
//! one-field, one-record attribute vdatas inside a `Grid Attributes` or
//! `Swath Attributes` vgroup under the object's own vgroup. They are read
//! back through the plain V/VS interfaces.

use h4_common::{Das, EosDataset, EosKind, H4Error, H4Result};
use tracing::debug;

use crate::codec::{append_raw_attr, print_attr, print_type};
use crate::naming::to_cf_name;
use crate::source::{HFileGuard, Hdf4Library, VdataGuard, VgroupGuard, DFTAG_VG, DFTAG_VH};

const GRID_CLASS: &str = "GRID";
const SWATH_CLASS: &str = "SWATH";
const GRID_ATTRIBUTES: &str = "Grid Attributes";
const SWATH_ATTRIBUTES: &str = "Swath Attributes";

/// Map every grid and swath object attribute of `path` into the DAS.
pub fn map_eos2_objects_attrs<L: Hdf4Library + ?Sized>(lib: &L, path: &str, das: &mut Das) -> H4Result<()> {
    let file = HFileGuard::new(lib, lib.h_open(path)?);

    for reference in lib.v_lone(file.id())? {
        let vgroup = VgroupGuard::new(lib, lib.v_attach(file.id(), reference)?);
        let name = lib.v_name(vgroup.id())?;
        let attr_group = match lib.v_class(vgroup.id())?.as_str() {
            GRID_CLASS => GRID_ATTRIBUTES,
            SWATH_CLASS => SWATH_ATTRIBUTES,
            _ => {
                vgroup.close()?;
                continue;
            }
        };
        map_one_object(lib, file.id(), vgroup.id(), &name, attr_group, das)?;
        vgroup.close()?;
    }

    file.close()
}

/// Find the attribute vgroup of one object and copy its vdatas.
fn map_one_object<L: Hdf4Library + ?Sized>(
    lib: &L,
    file_id: i32,
    object_id: i32,
    object_name: &str,
    attr_group: &str,
    das: &mut Das,
) -> H4Result<()> {
    for child in lib.v_tag_refs(object_id)?.into_iter().filter(|c| c.tag == DFTAG_VG) {
        let group = VgroupGuard::new(lib, lib.v_attach(file_id, child.reference)?);
        if lib.v_name(group.id())? == attr_group {
            debug!(object = object_name, "Mapping HDF-EOS2 object attributes");
            copy_attr_vdatas(lib, file_id, group.id(), object_name, das)?;
            return group.close();
        }
        group.close()?;
    }
    Ok(())
}

fn copy_attr_vdatas<L: Hdf4Library + ?Sized>(
    lib: &L,
    file_id: i32,
    group_id: i32,
    object_name: &str,
    das: &mut Das,
) -> H4Result<()> {
    let table = das.get_or_create(&to_cf_name(object_name));

    for child in lib.v_tag_refs(group_id)?.into_iter().filter(|c| c.tag == DFTAG_VH) {
        let vdata = VdataGuard::new(lib, lib.vs_attach(file_id, child.reference)?);
        if !lib.vs_is_attr(vdata.id())? {
            vdata.close()?;
            continue;
        }

        let name = lib.vs_name(vdata.id())?;
        let fields = lib.vs_fields(vdata.id())?;
        if fields.len() != 1 {
            return Err(H4Error::malformed(
                name,
                format!("object attribute vdata has {} fields, expected 1", fields.len()),
            ));
        }
        let records = lib.vs_record_count(vdata.id())?;
        if records != 1 {
            return Err(H4Error::malformed(
                name,
                format!("object attribute vdata has {records} records, expected 1"),
            ));
        }
        vdata.close()?;

        let field = &fields[0];
        // char values come back as one string; print_type maps them to String
        table.append_attr(
            &to_cf_name(&name),
            print_type(field.number_type),
            print_attr(field.number_type, 0, &field.data)?,
        )?;
    }
    Ok(())
}

/// Table name for the object-level attributes of a prepared grid or swath.
///
/// Grid names are made CF-safe; swath names are used as they are.
pub fn dataset_table_name(dataset: &EosDataset) -> String {
    match dataset.kind {
        EosKind::Grid => to_cf_name(&dataset.name),
        EosKind::Swath => dataset.name.clone(),
    }
}

/// Write the object-level attributes carried by a prepared grid or swath.
pub fn write_dataset_attrs(das: &mut Das, dataset: &EosDataset) -> H4Result<()> {
    if dataset.attributes.is_empty() {
        return Ok(());
    }
    let table = das.get_or_create(&dataset_table_name(dataset));
    for attr in &dataset.attributes {
        append_raw_attr(table, &to_cf_name(&attr.name), attr)?;
    }
    Ok(())
}
