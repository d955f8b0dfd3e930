//! Vdata of plain HDF4 files, written as DAS attributes.
//!
//! Small vdatas (at most ten records) are flattened into attributes of a
//! table named after the vdata, one `Vdata_field_<name>` attribute per
//! field. Larger ones only get their descriptive attributes, the data
//! itself being served as variables.

use h4_common::dtype::bytes_to_text;
use h4_common::{AttrTable, CfType, Das, H4Config, H4Error, H4Result};

use super::{SpFile, SpVdata, SpVdataField};
use crate::codec::{append_raw_attr, print_attr, print_type, type_size};
use crate::naming::to_cf_name;

const VDATA_DESC: &str = "This is an HDF4 Vdata.";

pub fn handle_vdata_attrs_with_desc_key(file: &SpFile, das: &mut Das, config: &H4Config) -> H4Result<()> {
    if !config.enable_ceres_vdata && file.sp_type.is_ceres_withheld() {
        return Ok(());
    }
    for vdata in &file.vdatas {
        write_vdata(vdata, das, config.enable_vdata_desc_attr)?;
    }
    Ok(())
}

fn write_vdata(vdata: &SpVdata, das: &mut Das, with_desc: bool) -> H4Result<()> {
    if with_desc {
        let nothing_to_say = vdata.attributes.is_empty()
            && !vdata.treat_as_attr
            && vdata.fields.iter().all(|f| f.attributes.is_empty());
        if nothing_to_say {
            return Ok(());
        }
        let table = das.get_or_create(&vdata.new_name);
        table.append_attr("hdf4_vd_desc", CfType::String, VDATA_DESC)?;
        for attr in &vdata.attributes {
            append_raw_attr(table, &format!("Vdata_attr_{}", to_cf_name(&attr.name)), attr)?;
        }
    }

    if !vdata.treat_as_attr {
        if with_desc {
            for field in vdata.fields.iter().filter(|f| !f.attributes.is_empty()) {
                let table = das.get_or_create(&field.new_name);
                for attr in &field.attributes {
                    append_raw_attr(table, &to_cf_name(&attr.name), attr)?;
                }
            }
        }
        return Ok(());
    }

    let table = das.get_or_create(&vdata.new_name);
    for field in &vdata.fields {
        let name = format!("Vdata_field_{}", field.new_name);
        write_field_values(table, &name, field, vdata.records)?;
        if with_desc {
            for attr in &field.attributes {
                append_raw_attr(table, &format!("Vdata_field_attr_{}", to_cf_name(&attr.name)), attr)?;
            }
        }
    }
    Ok(())
}

/// Flatten the values of one vdata field into a single attribute.
///
/// Multi-record, multi-order fields quote each record so the record
/// boundaries stay visible.
fn write_field_values(table: &mut AttrTable, name: &str, field: &SpVdataField, records: usize) -> H4Result<()> {
    let nt = field.number_type;
    let cf_type = print_type(nt);

    if field.order <= 1 {
        if nt.is_char() {
            return table.append_attr(name, CfType::String, bytes_to_text(&field.data));
        }
        for i in 0..records {
            table.append_attr(name, cf_type, print_attr(nt, i, &field.data)?)?;
        }
        return Ok(());
    }

    let expected = type_size(nt) * field.order * records;
    if field.data.len() != expected {
        return Err(H4Error::malformed(
            name,
            format!("vdata field holds {} bytes, expected {expected}", field.data.len()),
        ));
    }

    if records == 1 {
        if nt.is_char() {
            return table.append_attr(name, CfType::String, bytes_to_text(&field.data));
        }
        for i in 0..field.order {
            table.append_attr(name, cf_type, print_attr(nt, i, &field.data)?)?;
        }
        return Ok(());
    }

    if nt.is_char() {
        for record in field.data.chunks(field.order) {
            table.append_attr(name, cf_type, format!("'{}'", bytes_to_text(record)))?;
        }
        return Ok(());
    }
    for r in 0..records {
        table.append_attr(name, cf_type, "'")?;
        for i in 0..field.order {
            table.append_attr(name, cf_type, print_attr(nt, r * field.order + i, &field.data)?)?;
        }
        table.append_attr(name, cf_type, "'")?;
    }
    Ok(())
}
