//! MODIS scale/offset attribute rewriting.
//!
//! When a field's data will be rescaled at read time (its type "changes",
//! typically int16 to float32), the encoded-domain attributes must follow:
//! `scale_factor`/`add_offset` are renamed so CF tools do not apply them a
//! second time, `valid_range` is converted to physical `valid_min`/`valid_max`,
//! and `_FillValue`/`Number_Type` are adjusted to the new type.

use h4_common::{AttrTable, CfType, H4Error, H4Result, SoType};
use tracing::debug;

use super::policy::{is_modis_l1b_band_field, reclassify, L1bBand, ReclassifyInput};
use super::vip::handle_modis_vip_special_attrs;
use super::{atof, first_with_type, parse_number};
use crate::codec::{print_float32, print_float64};
use crate::reconcile::{ADD_OFFSET, FILL_VALUE, SCALE_FACTOR};

const VALID_RANGE: &str = "valid_range";
const VALID_MIN: &str = "valid_min";
const VALID_MAX: &str = "valid_max";
const NUMBER_TYPE: &str = "Number_Type";
const SCALED_INTEGERS_SUFFIX: &str = " Scaled Integers";

/// Where a field lives and which convention its object declared.
#[derive(Debug, Clone, Copy)]
pub struct ModisFieldContext<'a> {
    /// File name without directory.
    pub file_name: &'a str,
    /// CF name of the field.
    pub field_name: &'a str,
    pub is_grid: bool,
    pub so_type: SoType,
    /// The object is a MEaSUREs VIP grid.
    pub is_vip: bool,
}

impl<'a> ModisFieldContext<'a> {
    fn reclassify_input(&self) -> ReclassifyInput<'a> {
        ReclassifyInput {
            file_name: self.file_name,
            field_name: self.field_name,
            is_grid: self.is_grid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModisOutcome {
    /// Convention after reclassification.
    pub so_type: SoType,
    /// `_FillValue` was moved to Float32; skip the generic fill-type fix.
    pub fill_value_retyped: bool,
}

/// Whether applying the MODIS rule at read time changes the field's datatype.
pub fn change_data_type(table: &AttrTable, so_type: SoType) -> bool {
    if so_type == SoType::DefaultCfEqu {
        return false;
    }

    let non_empty = |name: &str| table.first_value(name).is_some_and(|v| !v.is_empty());
    if (non_empty("radiance_scales") && non_empty("radiance_offsets"))
        || (non_empty("reflectance_scales") && non_empty("reflectance_offsets"))
    {
        return true;
    }

    let mut scale_value: Option<&str> = None;
    let mut offset_value = "0";
    for attr in table.iter() {
        if attr.name.contains(SCALE_FACTOR) && attr.name != "scale_factor_err" {
            scale_value = attr.first();
        }
        if attr.name.contains(ADD_OFFSET) && attr.name != "add_offset_err" {
            if let Some(v) = attr.first() {
                offset_value = v;
            }
        }
    }

    match scale_value {
        Some(scale) if !scale.is_empty() => !(atof(scale) == 1.0 && atof(offset_value) == 0.0),
        _ => false,
    }
}

/// Rewrite a field's attributes for a non-CF MODIS scale/offset convention.
///
/// Malformed `valid_range` content is an error and leaves the table partially
/// rewritten; callers abandon the field.
pub fn handle_modis_special_attrs(
    table: &mut AttrTable,
    ctx: &ModisFieldContext<'_>,
    changed_type: bool,
) -> H4Result<ModisOutcome> {
    let mut outcome = ModisOutcome {
        so_type: ctx.so_type,
        fill_value_retyped: false,
    };
    if ctx.so_type == SoType::DefaultCfEqu {
        return Ok(outcome);
    }

    let scale = first_with_type(table, SCALE_FACTOR);
    let offset = first_with_type(table, ADD_OFFSET);
    let fill = first_with_type(table, FILL_VALUE);
    let number_type = if changed_type {
        first_with_type(table, NUMBER_TYPE)
    } else {
        None
    };

    let orig_scale = scale.as_ref().map(|(v, _)| atof(v) as f32).unwrap_or(1.0);
    let orig_offset = offset.as_ref().map(|(v, _)| atof(v) as f32).unwrap_or(0.0);

    let mut range_text = String::new();
    let mut orig_valid_min = 0.0f32;
    let mut orig_valid_max = 0.0f32;
    let has_valid_range = match table.simple_find(VALID_RANGE) {
        Some(attr) => {
            range_text = attr.values.join(", ");
            if !ctx.is_vip {
                if attr.values.len() < 2 {
                    return Err(H4Error::malformed(
                        VALID_RANGE,
                        format!("expected 2 values, found {}", attr.values.len()),
                    ));
                }
                orig_valid_min = parse_number(VALID_RANGE, &attr.values[0])? as f32;
                orig_valid_max = parse_number(VALID_RANGE, &attr.values[1])? as f32;
            }
            true
        }
        None => false,
    };

    // Keep the encoded-domain scale/offset under names CF tools ignore.
    if let Some((scale_text, scale_type)) = &scale {
        let offset_text = offset.as_ref().map(|(v, _)| v.as_str()).unwrap_or("0");
        if !(atof(scale_text) == 1.0 && atof(offset_text) == 0.0) {
            table.del_attr(SCALE_FACTOR);
            table.append_attr("orig_scale_factor", *scale_type, scale_text.as_str())?;
            if let Some((offset_text, offset_type)) = &offset {
                table.del_attr(ADD_OFFSET);
                table.append_attr("orig_add_offset", *offset_type, offset_text.as_str())?;
            }
        }
    }

    if changed_type {
        if let Some((fill_text, fill_type)) = &fill {
            if !fill_text.is_empty() && !fill_type.is_float() {
                outcome.fill_value_retyped = true;
                table.del_attr(FILL_VALUE);
                table.append_attr(FILL_VALUE, CfType::Float32, fill_text.as_str())?;
            }
        }
    }

    let mut handled_l1b = false;
    if ctx.so_type == SoType::ModisMulScale && changed_type {
        if let Some(band) = is_modis_l1b_band_field(ctx.field_name) {
            handle_l1b_band_attrs(table, band, orig_valid_min, orig_valid_max)?;
            handled_l1b = true;
        }
    }

    if changed_type && has_valid_range && !handled_l1b {
        let (valid_min, valid_max) = if ctx.is_vip {
            let scale_text = scale.as_ref().map(|(v, _)| v.as_str()).unwrap_or("");
            handle_modis_vip_special_attrs(&range_text, scale_text)?
        } else if scale.is_some() {
            outcome.so_type = reclassify(ctx.so_type, orig_scale as f64, &ctx.reclassify_input());
            match outcome.so_type {
                SoType::ModisMulScale => (
                    (orig_valid_min - orig_offset) * orig_scale,
                    (orig_valid_max - orig_offset) * orig_scale,
                ),
                SoType::ModisDivScale => (
                    (orig_valid_min - orig_offset) / orig_scale,
                    (orig_valid_max - orig_offset) / orig_scale,
                ),
                SoType::ModisEqScale => (
                    orig_valid_min * orig_scale + orig_offset,
                    orig_valid_max * orig_scale + orig_offset,
                ),
                SoType::DefaultCfEqu => (orig_valid_min, orig_valid_max),
            }
        } else {
            match ctx.so_type {
                SoType::ModisMulScale | SoType::ModisDivScale => {
                    (orig_valid_min - orig_offset, orig_valid_max - orig_offset)
                }
                SoType::ModisEqScale => (orig_valid_min + orig_offset, orig_valid_max + orig_offset),
                SoType::DefaultCfEqu => (orig_valid_min, orig_valid_max),
            }
        };

        table.append_attr(VALID_MIN, CfType::Float32, print_float32(valid_min))?;
        table.append_attr(VALID_MAX, CfType::Float32, print_float32(valid_max))?;
        table.del_attr(VALID_RANGE);
    }

    if let Some((value, attr_type)) = number_type {
        table.del_attr(NUMBER_TYPE);
        table.append_attr("Number_Type_Orig", attr_type, value)?;
    }

    debug!(field = %ctx.field_name, so_type = ?outcome.so_type, changed_type, "Rewrote MODIS attributes");
    Ok(outcome)
}

/// Per-band MODIS L1B ranges: the physical range spans every band's scale and offset.
fn handle_l1b_band_attrs(
    table: &mut AttrTable,
    band: L1bBand,
    orig_valid_min: f32,
    orig_valid_max: f32,
) -> H4Result<()> {
    let (scales_name, offsets_name) = match band {
        L1bBand::Emissive => ("radiance_scales", "radiance_offsets"),
        L1bBand::RefSb => ("reflectance_scales", "reflectance_offsets"),
    };

    let mut scale_max = 0.0f32;
    let mut scale_min = 100000.0f32;
    let mut offset_max = 0.0f32;
    let mut offset_min = 0.0f32;

    if let Some(attr) = table.simple_find(scales_name) {
        for v in &attr.values {
            let s = atof(v) as f32;
            scale_max = scale_max.max(s);
            scale_min = scale_min.min(s);
        }
    }
    if let Some(attr) = table.simple_find(offsets_name) {
        for v in &attr.values {
            let o = atof(v) as f32;
            offset_max = offset_max.max(o);
            offset_min = offset_min.min(o);
        }
    }

    if let Some(long_name) = table.first_value("long_name").map(str::to_string) {
        if let Some(stripped) = long_name.strip_suffix(SCALED_INTEGERS_SUFFIX) {
            let stripped = stripped.to_string();
            table.del_attr("long_name");
            table.append_attr("long_name", CfType::String, stripped)?;
            table.append_attr("orig_long_name", CfType::String, long_name)?;
        }
    }

    if scale_min <= 0.0 {
        return Err(H4Error::malformed(
            scales_name,
            "band scale factors must be greater than 0",
        ));
    }

    let valid_max = if orig_valid_max > offset_min {
        (orig_valid_max - offset_min) * scale_max
    } else {
        (orig_valid_max - offset_min) * scale_min
    };
    let valid_min = if orig_valid_min > offset_max {
        (orig_valid_min - offset_max) * scale_min
    } else {
        (orig_valid_min - offset_max) * scale_max
    };
    // Radiances and reflectances are never negative.
    let valid_min = valid_min.max(0.0);

    table.append_attr(VALID_MIN, CfType::Float32, print_float32(valid_min))?;
    table.append_attr(VALID_MAX, CfType::Float32, print_float32(valid_max))?;
    table.del_attr(VALID_RANGE);

    if band == L1bBand::Emissive {
        if let Some(units) = table.first_value("radiance_units").map(str::to_string) {
            if !units.is_empty() {
                table.del_attr("units");
                table.append_attr("units", CfType::String, units)?;
            }
        }
    }
    Ok(())
}

/// Disabled-computation mode: data stays encoded, so rewrite `scale_factor`
/// and `add_offset` into CF form for the client instead of renaming them.
pub fn handle_modis_special_attrs_disable_scale_comp(
    table: &mut AttrTable,
    ctx: &ModisFieldContext<'_>,
) -> H4Result<SoType> {
    let (scale_text, scale_type) = match first_with_type(table, SCALE_FACTOR) {
        Some(scale) if !scale.0.is_empty() => scale,
        _ => return Ok(ctx.so_type),
    };
    let offset = first_with_type(table, ADD_OFFSET);

    let scale_is_f64 = scale_type == CfType::Float64;
    let orig_scale = width_cast(atof(&scale_text), scale_is_f64);
    let so_type = reclassify(ctx.so_type, orig_scale, &ctx.reclassify_input());

    match so_type {
        SoType::ModisMulScale => {
            if let Some((offset_text, offset_type)) = &offset {
                let offset_is_f64 = *offset_type == CfType::Float64;
                let orig_offset = width_cast(atof(offset_text), offset_is_f64);
                let new_offset = if orig_offset == 0.0 {
                    0.0
                } else {
                    width_cast(-orig_offset * orig_scale, offset_is_f64)
                };
                table.del_attr(SCALE_FACTOR);
                table.append_attr(SCALE_FACTOR, float_type(scale_is_f64), scale_text.as_str())?;
                replace_float(table, ADD_OFFSET, new_offset, offset_is_f64)?;
            }
        }
        SoType::ModisDivScale => {
            let new_scale = width_cast(1.0 / orig_scale, scale_is_f64);
            replace_float(table, SCALE_FACTOR, new_scale, scale_is_f64)?;
            if let Some((offset_text, offset_type)) = &offset {
                let offset_is_f64 = *offset_type == CfType::Float64;
                let orig_offset = width_cast(atof(offset_text), offset_is_f64);
                let new_offset = if orig_offset == 0.0 {
                    0.0
                } else {
                    width_cast(-orig_offset * new_scale, offset_is_f64)
                };
                replace_float(table, ADD_OFFSET, new_offset, offset_is_f64)?;
            }
        }
        SoType::ModisEqScale | SoType::DefaultCfEqu => {}
    }

    Ok(so_type)
}

fn width_cast(value: f64, is_f64: bool) -> f64 {
    if is_f64 {
        value
    } else {
        value as f32 as f64
    }
}

fn float_type(is_f64: bool) -> CfType {
    if is_f64 {
        CfType::Float64
    } else {
        CfType::Float32
    }
}

fn replace_float(table: &mut AttrTable, name: &str, value: f64, is_f64: bool) -> H4Result<()> {
    table.del_attr(name);
    let text = if is_f64 {
        print_float64(value)
    } else {
        print_float32(value as f32)
    };
    table.append_attr(name, float_type(is_f64), text)
}
