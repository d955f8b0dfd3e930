//! MEaSUREs VIP valid ranges.
//!
//! VIP grids store `valid_range` as text such as `"-10000,10000"` and the
//! scale as an integer, so the range is divided with integer arithmetic.

use h4_common::{H4Error, H4Result};

use super::atoi;

const VALID_RANGE: &str = "valid_range";

/// Return `(valid_min, valid_max)` from a `"min,max"` range and an integer scale.
pub fn handle_modis_vip_special_attrs(valid_range: &str, scale_factor: &str) -> H4Result<(f32, f32)> {
    let (min_text, max_text) = match valid_range.split_once(',') {
        Some(parts) => parts,
        None => {
            return Err(H4Error::malformed(
                VALID_RANGE,
                format!("'{valid_range}' has no ',' separator"),
            ))
        }
    };
    if max_text.contains(',') {
        return Err(H4Error::malformed(
            VALID_RANGE,
            format!("'{valid_range}' has more than one ',' separator"),
        ));
    }

    let orig_min = atoi(min_text) as i16;
    let orig_max = atoi(max_text) as i16;
    let scale = atoi(scale_factor) as i16;
    if scale == 0 {
        return Err(H4Error::malformed("scale_factor", "VIP scale factor is zero"));
    }

    let valid_min = (orig_min as i32 / scale as i32) as f32;
    let valid_max = (orig_max as i32 / scale as i32) as f32;
    Ok((valid_min, valid_max))
}
