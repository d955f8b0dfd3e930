//! Plain HDF4 files that follow the dimension-scale convention.
//!
//! Some of them (the P.O. DAAC AVHRR files among others) label latitude and
//! longitude only through `long_name` and either omit `units` or call it
//! `unit`. The first such latitude and longitude get CF units.

use h4_common::{CfType, Das, FieldType, H4Result};

use super::{SpField, SpFile, SpType};

const LONG_NAME: &str = "long_name";
const UNITS: &str = "units";

/// Fields of a plain HDF4 file that appear in the DAS at all.
pub(crate) fn is_visible(file: &SpFile, field: &SpField) -> bool {
    if file.has_dim_no_scale_field && field.field_type != FieldType::General && !field.is_dim_scale {
        return false;
    }
    !(file.sp_type == SpType::OtherHdf && field.is_dim_no_scale)
}

pub fn handle_otherhdf_special_attrs(file: &SpFile, das: &mut Das) -> H4Result<()> {
    if file.sp_type != SpType::OtherHdf {
        return Ok(());
    }

    let mut lat_done = false;
    let mut lon_done = false;
    for field in file.fields.iter().filter(|f| is_visible(file, f)) {
        if lat_done && lon_done {
            break;
        }
        let long_name = match field.attribute(LONG_NAME) {
            Some(attr) if attr.number_type.is_char() => attr.text(),
            _ => continue,
        };
        if field.attribute(UNITS).is_some() {
            continue;
        }
        let units = match long_name.as_str() {
            "latitude" | "Latitude" if !lat_done => {
                lat_done = true;
                "degrees_north"
            }
            "longitude" | "Longitude" if !lon_done => {
                lon_done = true;
                "degrees_east"
            }
            _ => continue,
        };
        das.get_or_create(&field.new_name)
            .append_attr(UNITS, CfType::String, units)?;
    }
    Ok(())
}
