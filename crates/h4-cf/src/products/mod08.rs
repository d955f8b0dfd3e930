//! MOD08_M3-like one-dimensional grids read as plain HDF4.
//!
//! The MODIS atmosphere products apply `scale * (x - offset)`, so the
//! offset served to CF clients becomes `-scale * offset`.

use h4_common::{CfType, Das, FieldType, H4Result};

use super::SpFile;
use crate::codec::print_float64;
use crate::reconcile::{ADD_OFFSET, SCALE_FACTOR};
use crate::scale_offset::atof;

/// Grid name under which MOD08_M3 files are recognized.
pub const MOD08_GRID: &str = "mod08";

pub fn change_das_mod08_scale_offset(das: &mut Das, file: &SpFile) -> H4Result<()> {
    if file.special_eos_grid.as_deref() != Some(MOD08_GRID) {
        return Ok(());
    }
    for field in file.fields.iter().filter(|f| f.field_type == FieldType::General) {
        let table = das.get_or_create(&field.new_name);
        let offset = match table.first_value(ADD_OFFSET) {
            Some("0.0") | None => continue,
            Some(value) => atof(value),
        };
        if offset == 0.0 {
            continue;
        }
        let scale = match table.first_value(SCALE_FACTOR) {
            Some(value) if !value.is_empty() => atof(value),
            _ => continue,
        };
        table.del_attr(ADD_OFFSET);
        table.append_attr(ADD_OFFSET, CfType::Float64, print_float64(-scale * offset))?;
    }
    Ok(())
}
