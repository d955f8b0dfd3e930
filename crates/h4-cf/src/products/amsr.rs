//! AMSR-E style scale attributes (`SCALE_FACTOR`, `Scale`, `OFFSET`).

use h4_common::{AttrTable, H4Result};

use crate::reconcile::{ADD_OFFSET, SCALE_FACTOR};

const RENAMES: [(&str, &str); 3] = [("SCALE_FACTOR", SCALE_FACTOR), ("Scale", SCALE_FACTOR), ("OFFSET", ADD_OFFSET)];

/// Rename non-CF scale and offset attributes to their CF names.
///
/// Type and values are kept; the renamed attribute moves to the end of the
/// table. A name already taken by a CF attribute is left alone.
pub fn handle_amsr_attrs(table: &mut AttrTable) -> H4Result<()> {
    for (from, to) in RENAMES {
        if table.contains(from) && !table.contains(to) {
            table.rename_attr(from, to);
        }
    }
    Ok(())
}
