//! Attributes attached to vgroups of plain HDF4 files.

use h4_common::{Das, H4Config, H4Result};

use super::SpFile;
use crate::codec::append_raw_attr;
use crate::naming::to_cf_name;

pub fn write_vgroup_attrs(file: &SpFile, das: &mut Das, config: &H4Config) -> H4Result<()> {
    if !config.enable_vgroup_attr {
        return Ok(());
    }
    for group in file.vgroup_attrs.iter().filter(|g| !g.attributes.is_empty()) {
        let table = das.get_or_create(&group.name);
        for attr in &group.attributes {
            append_raw_attr(table, &to_cf_name(&attr.name), attr)?;
        }
    }
    Ok(())
}
