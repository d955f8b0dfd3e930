//! Missing CF attributes for TRMM version 6 and 7 products.
//!
//! TRMM files rarely carry `_FillValue`, and the level 1/2 V7 products
//! define `scale_factor` as the divisor rather than the multiplier. The
//! rules below are keyed on the product type and, for level 2, on the
//! algorithm code embedded in the file name (`2A25`, `1B21`, ...).

use h4_common::{AttrTable, CfType, Das, FieldType, H4Result, NumberType};

use super::{SpField, SpFile, SpType};
use crate::codec::{print_float32, print_float64, print_type};
use crate::ecs::HDF_GLOBAL;
use crate::reconcile::{FILL_VALUE, SCALE_FACTOR};
use crate::scale_offset::atof;

const V7_REFERENCES: &str = "http://pps.gsfc.nasa.gov/Documents/filespec.TRMM.V7.pdf";
const ICS_REFERENCES: &str = "http://pps.gsfc.nasa.gov/Documents/ICSVol4.pdf";
const L2_COMMENT: &str = "_FillValue, valid_min and valid_max are added for some TRMM level 1 and \
                          level 2 products, and scale_factor is changed to follow CF conventions.";

/// Comments for the L3 single-grid index dimensions.
const L3S_DIM_COMMENTS: [(&str, &str); 5] = [
    (
        "nh3",
        "Index number to represent the fixed heights above the earth ellipsoid, at 2, 4, 6 km plus one for path-average.",
    ),
    (
        "ncat3",
        "Index number to represent catgories for probability distribution functions.Check more information from the references.",
    ),
    ("nthrshZO", "Q-thresholds for Zero order used for probability distribution functions."),
    ("nthrshHB", "Q-thresholds for HB used for probability distribution functions."),
    ("nthrshSRT", "Q-thresholds for SRT used for probability distribution functions."),
];

/// Comments for the L3 multi-grid index dimensions, with their reference.
const L3M_DIM_COMMENTS: [(&str, &str, &str); 4] = [
    (
        "nh1",
        "Number of fixed heights above the earth ellipsoid, at 2, 4, 6, 10, and 15 km plus one for path-average.",
        V7_REFERENCES,
    ),
    (
        "nh3",
        "Number of fixed heights above the earth ellipsoid, at 2, 4, 6 km plus one for path-average.",
        V7_REFERENCES,
    ),
    (
        "nang",
        "Number of fixed incidence angles, at 0, 5, 10 and 15 degree and all angles.",
        ICS_REFERENCES,
    ),
    (
        "ncat2",
        "Second number of categories for histograms (30). Check more information from the references.",
        V7_REFERENCES,
    ),
];

pub fn add_missing_cf_attrs(file: &SpFile, das: &mut Das) -> H4Result<()> {
    match file.sp_type {
        SpType::TrmmL3aV6 | SpType::TrmmL3cV6 | SpType::TrmmL3sV7 | SpType::TrmmL3mV7 => add_level3_attrs(file, das),
        SpType::TrmmL2V7 => add_level2_v7_attrs(file, das),
        _ => Ok(()),
    }
}

fn add_level3_attrs(file: &SpFile, das: &mut Das) -> H4Result<()> {
    for field in data_fields(file, NumberType::Float32) {
        replace_attr(das.get_or_create(&field.new_name), FILL_VALUE, CfType::Float32, "-9999.9")?;
    }
    for field in file.fields.iter().filter(|f| {
        f.field_type == FieldType::General && matches!(f.number_type, NumberType::Int32 | NumberType::Int16)
    }) {
        replace_attr(
            das.get_or_create(&field.new_name),
            FILL_VALUE,
            print_type(field.number_type),
            "-9999",
        )?;
    }

    if file.sp_type == SpType::TrmmL3sV7 {
        for field in &file.fields {
            if field.field_type == FieldType::AddedCv && field.new_name == "nlayer" {
                das.get_or_create(&field.new_name).append_attr("units", CfType::String, "km")?;
            } else if field.field_type == FieldType::InsertedIndexCv {
                if let Some((_, comment)) = L3S_DIM_COMMENTS.iter().find(|(n, _)| *n == field.new_name) {
                    add_comment(das.get_or_create(&field.new_name), comment, V7_REFERENCES)?;
                }
            }
        }

        // 3A26 marks missing data with -666, -777 and -999
        if file.base_name().contains("3A26") {
            for field in data_fields(file, NumberType::Float32) {
                let table = das.get_or_create(&field.new_name);
                replace_attr(table, FILL_VALUE, CfType::Float32, "-999")?;
                table.append_attr("valid_min", CfType::Float32, "0")?;
            }
        }
    }

    if file.sp_type == SpType::TrmmL3mV7 {
        for field in file.fields.iter().filter(|f| f.field_type == FieldType::InsertedIndexCv) {
            if let Some((_, comment, references)) = L3M_DIM_COMMENTS.iter().find(|(n, _, _)| *n == field.new_name) {
                add_comment(das.get_or_create(&field.new_name), comment, references)?;
            }
        }
    }
    Ok(())
}

fn add_level2_v7_attrs(file: &SpFile, das: &mut Das) -> H4Result<()> {
    let base = file.base_name();
    let has = |code: &str| base.contains(code);

    if has("2B31") || has("2A12") || has("2A21") {
        if has("2B31") {
            for field in data_fields(file, NumberType::Int16) {
                invert_scale_factor(das.get_or_create(&field.new_name))?;
            }
        }
        if has("2A12") {
            for field in &file.fields {
                if field.field_type == FieldType::AddedCv && field.new_name == "nlayer" {
                    das.get_or_create(&field.new_name).append_attr("units", CfType::String, "km")?;
                }
                // INT8 is served as Int32
                if field.field_type == FieldType::General && field.number_type == NumberType::Int8 {
                    replace_attr(das.get_or_create(&field.new_name), FILL_VALUE, CfType::Int32, "-99")?;
                }
            }
        }
        for field in data_fields(file, NumberType::Float32) {
            replace_attr(das.get_or_create(&field.new_name), FILL_VALUE, CfType::Float32, "-9999.9")?;
        }
        for field in data_fields(file, NumberType::Int16) {
            replace_attr(das.get_or_create(&field.new_name), FILL_VALUE, CfType::Int32, "-9999")?;
        }
    } else if has("2A25") {
        add_2a25_ranges(file, das)?;
    } else if has("1B21") || has("1C21") || has("1B11") {
        if has("1B21") || has("1C21") {
            for field in data_fields(file, NumberType::Int16) {
                add_power_ranges(das.get_or_create(&field.new_name))?;
            }
        }
        for field in data_fields(file, NumberType::Int16) {
            let table = das.get_or_create(&field.new_name);
            invert_scale_factor(table)?;
            replace_attr(table, FILL_VALUE, CfType::Int16, "-9999")?;
        }
    } else if has("1B01") {
        for field in data_fields(file, NumberType::Float32) {
            replace_attr(das.get_or_create(&field.new_name), FILL_VALUE, CfType::Float32, "-9999.9")?;
        }
    }

    add_comment(das.get_or_create(HDF_GLOBAL), L2_COMMENT, V7_REFERENCES)
}

/// Reflectivity (dBZ) and rain rate (mm/hr) fields of 2A25. Only the first
/// two such fields are rewritten.
fn add_2a25_ranges(file: &SpFile, das: &mut Das) -> H4Result<()> {
    let mut handled = 0;
    for field in data_fields(file, NumberType::Int16) {
        let table = das.get_or_create(&field.new_name);
        let max_physical = match table.first_value("units") {
            Some("mm/hr") => 300.0f32,
            Some("dBZ") => 80.0,
            _ => continue,
        };
        let Some(scale) = table.first_value(SCALE_FACTOR).map(|s| atof(s) as f32) else {
            continue;
        };
        handled += 1;
        table.append_attr("valid_min", CfType::Int16, "0")?;
        table.append_attr("valid_max", CfType::Int16, ((max_physical * scale) as i16).to_string())?;
        invert_scale_factor(table)?;
        if handled == 2 {
            break;
        }
    }
    Ok(())
}

/// Valid range of 1B21/1C21 power (dBm) and reflectivity (dBZ) fields, in
/// packed units.
fn add_power_ranges(table: &mut AttrTable) -> H4Result<()> {
    let (min, max) = match table.first_value("units") {
        Some("dBm") => (-120.0f32, -20.0f32),
        Some("dBZ") => (-20.0, 80.0),
        _ => return Ok(()),
    };
    let Some(scale) = table.first_value(SCALE_FACTOR).map(|s| atof(s) as f32) else {
        return Ok(());
    };
    table.append_attr("valid_min", CfType::Int16, ((min * scale) as i16).to_string())?;
    table.append_attr("valid_max", CfType::Int16, ((max * scale) as i16).to_string())
}

/// TRMM divides by `scale_factor`; CF multiplies.
fn invert_scale_factor(table: &mut AttrTable) -> H4Result<()> {
    let Some(attr) = table.simple_find(SCALE_FACTOR) else {
        return Ok(());
    };
    let cf_type = attr.cf_type;
    let value = attr.first().map(atof).unwrap_or(0.0);
    let inverted = match cf_type {
        CfType::Float64 => print_float64(1.0 / value),
        CfType::Float32 => print_float32(1.0f32 / value as f32),
        _ => return Ok(()),
    };
    table.del_attr(SCALE_FACTOR);
    table.append_attr(SCALE_FACTOR, cf_type, inverted)
}

fn replace_attr(table: &mut AttrTable, name: &str, cf_type: CfType, value: &str) -> H4Result<()> {
    table.del_attr(name);
    table.append_attr(name, cf_type, value)
}

fn add_comment(table: &mut AttrTable, comment: &str, references: &str) -> H4Result<()> {
    table.append_attr("comment", CfType::String, comment)?;
    table.append_attr("references", CfType::String, references)
}

fn data_fields(file: &SpFile, number_type: NumberType) -> impl Iterator<Item = &SpField> {
    file.fields
        .iter()
        .filter(move |f| f.field_type == FieldType::General && f.number_type == number_type)
}
