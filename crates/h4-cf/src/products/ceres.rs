//! CERES and MERRA: record where each field lives in the vgroup hierarchy.

use h4_common::{CfType, Das, FieldType, H4Config, H4Result};

use super::SpFile;

const FULL_PATH: &str = "fullpath";

/// With short names enabled the hierarchy is flattened away, so the
/// original path is kept as a `fullpath` attribute.
pub fn handle_merra_ceres_attrs(file: &SpFile, das: &mut Das, config: &H4Config) -> H4Result<()> {
    if !config.enable_ceres_merra_short_name {
        return Ok(());
    }
    if !file.sp_type.is_ceres() && !file.merra_is_eos2() {
        return Ok(());
    }
    for field in file.fields.iter().filter(|f| !f.field_type.is_fake()) {
        das.get_or_create(&field.new_name)
            .append_attr(FULL_PATH, CfType::String, field.full_path.as_str())?;
    }
    Ok(())
}
