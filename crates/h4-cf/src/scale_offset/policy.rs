//! Scale/offset convention classification and named product exceptions.
//!
//! Each exception is its own predicate so new products can be added without
//! touching the equations in `modis.rs`.

use h4_common::SoType;
use tracing::info;

/// Grids/swaths whose names end with one of these use `MODIS_MUL_SCALE`.
const MODIS_MUL_SUFFIXES: [&str; 13] = [
    "L1B",
    "GEO",
    "BRDF",
    "0.05Deg",
    "Reflectance",
    "MOD17A2",
    "North",
    "South",
    "MOD_Swath_Sea_Ice",
    "MOD_Grid_MOD15A2",
    "MOD_Grid_MOD16A2",
    "MOD_Grid_MOD16A3",
    "MODIS_NACP_LAI",
];

const MODIS_DIV_SUFFIXES: [&str; 5] = ["VI", "1km_2D", "L2g_2d", "CMG", "MODIS SWATH TYPE L2"];

const MODIS_EQ_SUFFIX: &str = "LST";

/// `MODIS_Grid*` prefixes that use the equal-scale equation.
const MODIS_EQ_GRID_PREFIXES: [&str; 3] = [
    "MODIS_Grid_1km_2D",
    "MODIS_Grid_8Day_1km_LST21",
    "MODIS_Grid_Daily_1km_LST21",
];

const MODIS_ATMOSPHERE_OBJECTS: [&str; 5] = ["mod05", "mod06", "mod07", "mod08", "atml2"];

pub const VIP_GRID_NAME: &str = "VIP_CMG_GRID";
pub const MODIS_L1B_SWATH_NAME: &str = "MODIS_SWATH_Type_L1B";

/// Classify a grid or swath by name.
pub fn so_type_for_object(name: &str) -> SoType {
    if MODIS_ATMOSPHERE_OBJECTS.contains(&name) {
        return SoType::ModisMulScale;
    }

    let mut so_type = SoType::DefaultCfEqu;

    if name.starts_with("MOD") || name.starts_with("mod") {
        if name.ends_with(MODIS_EQ_SUFFIX) {
            return SoType::ModisEqScale;
        }
        if MODIS_MUL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            return SoType::ModisMulScale;
        }
        if MODIS_DIV_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            // MODIS_Grid_1km_2D falls through to the MODIS_Grid check below.
            if name != "MODIS_Grid_1km_2D" {
                return SoType::ModisDivScale;
            }
            so_type = SoType::ModisDivScale;
        }

        if name.starts_with("MODIS_Grid") {
            so_type = if MODIS_EQ_GRID_PREFIXES.iter().any(|p| name.starts_with(p)) {
                SoType::ModisEqScale
            } else {
                SoType::ModisDivScale
            };
        } else if name.starts_with("MOD_Grid") {
            so_type = SoType::ModisDivScale;
        }
    }

    if is_vip_grid(name) {
        so_type = SoType::ModisDivScale;
    }

    so_type
}

/// MOD09/MYD09 `Range` fields carry scale 25 but still multiply.
pub fn is_mod09_range_exception(file_name: &str, field_name: &str, is_grid: bool) -> bool {
    is_grid
        && file_name.len() > 5
        && (file_name.starts_with("MOD09") || file_name.starts_with("MYD09"))
        && field_name.len() > 5
        && field_name.contains("Range")
}

/// MOD16A2/A3 grids keep their convention whatever the scale.
pub fn is_mod16_exception(file_name: &str, is_grid: bool) -> bool {
    is_grid
        && file_name.len() > 7
        && ["MOD16A2", "MYD16A2", "MOD16A3", "MYD16A3"]
            .iter()
            .any(|p| file_name.starts_with(p))
}

/// Which per-band MODIS L1B field family a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L1bBand {
    Emissive,
    RefSb,
}

pub fn is_modis_l1b_band_field(field_name: &str) -> Option<L1bBand> {
    if field_name.ends_with("Emissive") {
        Some(L1bBand::Emissive)
    } else if field_name.ends_with("RefSB") {
        Some(L1bBand::RefSb)
    } else {
        None
    }
}

pub fn is_vip_grid(name: &str) -> bool {
    name == VIP_GRID_NAME
}

pub fn is_modis_l1b_swath(name: &str) -> bool {
    name == MODIS_L1B_SWATH_NAME
}

/// Inputs the reclassification heuristic needs besides the scale value.
#[derive(Debug, Clone, Copy)]
pub struct ReclassifyInput<'a> {
    pub file_name: &'a str,
    pub field_name: &'a str,
    pub is_grid: bool,
}

/// Correct a convention that contradicts the observed scale.
///
/// MODIS products always scale towards smaller values, so EQ/MUL with a scale
/// above 1 is really DIV and DIV below 1 is really MUL. Named exceptions keep
/// their declared convention. Applying this twice gives the same result.
pub fn reclassify(so_type: SoType, scale: f64, input: &ReclassifyInput<'_>) -> SoType {
    let mut so_type = so_type;

    if matches!(so_type, SoType::ModisEqScale | SoType::ModisMulScale) && scale > 1.0 {
        let exempt = is_mod09_range_exception(input.file_name, input.field_name, input.is_grid)
            || is_mod16_exception(input.file_name, input.is_grid);
        if !exempt {
            info!(
                field = %input.field_name,
                scale,
                from = ?so_type,
                "Scale factor above 1 under a multiplying convention, switching to MODIS_DIV_SCALE"
            );
            so_type = SoType::ModisDivScale;
        }
    }

    if so_type == SoType::ModisDivScale && scale < 1.0 {
        info!(
            field = %input.field_name,
            scale,
            "Scale factor below 1 under MODIS_DIV_SCALE, switching to MODIS_MUL_SCALE"
        );
        so_type = SoType::ModisMulScale;
    }

    so_type
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(file: &'a str, field: &'a str, is_grid: bool) -> ReclassifyInput<'a> {
        ReclassifyInput {
            file_name: file,
            field_name: field,
            is_grid,
        }
    }

    #[test]
    fn test_atmosphere_products_multiply() {
        assert_eq!(so_type_for_object("mod08"), SoType::ModisMulScale);
        assert_eq!(so_type_for_object("atml2"), SoType::ModisMulScale);
    }

    #[test]
    fn test_suffix_classes() {
        assert_eq!(so_type_for_object("MODIS_Grid_8Day_1km_LST"), SoType::ModisEqScale);
        assert_eq!(so_type_for_object("MODIS_SWATH_Type_L1B"), SoType::ModisMulScale);
        assert_eq!(so_type_for_object("MOD_Grid_BRDF"), SoType::ModisMulScale);
        assert_eq!(so_type_for_object("MODIS_Grid_16DAY_250m_500m_VI"), SoType::ModisDivScale);
        assert_eq!(so_type_for_object("MODIS SWATH TYPE L2"), SoType::ModisDivScale);
    }

    #[test]
    fn test_modis_grid_1km_2d_is_eq() {
        assert_eq!(so_type_for_object("MODIS_Grid_1km_2D"), SoType::ModisEqScale);
        assert_eq!(so_type_for_object("MODIS_Grid_500m_2D"), SoType::ModisDivScale);
        assert_eq!(so_type_for_object("MODIS_Grid_Daily_1km_LST21"), SoType::ModisEqScale);
    }

    #[test]
    fn test_mod_grid_prefix_is_div() {
        assert_eq!(so_type_for_object("MOD_Grid_Snow_500m"), SoType::ModisDivScale);
    }

    #[test]
    fn test_vip_and_default() {
        assert_eq!(so_type_for_object(VIP_GRID_NAME), SoType::ModisDivScale);
        assert_eq!(so_type_for_object("AMSR_E_L3_DailyLand"), SoType::DefaultCfEqu);
        assert_eq!(so_type_for_object("MYD_Swath"), SoType::DefaultCfEqu);
    }

    #[test]
    fn test_mod09_range_exception() {
        assert!(is_mod09_range_exception("MOD09GA.A2010001.hdf", "Range_1", true));
        assert!(!is_mod09_range_exception("MOD09GA.A2010001.hdf", "Range_1", false));
        assert!(!is_mod09_range_exception("MOD09GA.A2010001.hdf", "sur_refl", true));
        assert!(!is_mod09_range_exception("MOD11A1.hdf", "Range_1", true));
    }

    #[test]
    fn test_mod16_exception() {
        assert!(is_mod16_exception("MYD16A3.A2010.hdf", true));
        assert!(!is_mod16_exception("MYD16A3.A2010.hdf", false));
    }

    #[test]
    fn test_l1b_band_field() {
        assert_eq!(is_modis_l1b_band_field("EV_1KM_Emissive"), Some(L1bBand::Emissive));
        assert_eq!(is_modis_l1b_band_field("EV_250_Aggr1km_RefSB"), Some(L1bBand::RefSb));
        assert_eq!(is_modis_l1b_band_field("EV_1KM_Emissive_Uncert_Indexes"), None);
    }

    #[test]
    fn test_reclassify_scale_above_one() {
        let i = input("MOD11A1.hdf", "LST_Day_1km", true);
        assert_eq!(reclassify(SoType::ModisEqScale, 25.0, &i), SoType::ModisDivScale);
        assert_eq!(reclassify(SoType::ModisMulScale, 0.02, &i), SoType::ModisMulScale);
    }

    #[test]
    fn test_reclassify_suppressed_for_range() {
        let i = input("MOD09GA.A2010001.hdf", "Range_1", true);
        assert_eq!(reclassify(SoType::ModisEqScale, 25.0, &i), SoType::ModisEqScale);
    }

    #[test]
    fn test_reclassify_div_below_one() {
        let i = input("MOD13A2.hdf", "NDVI", true);
        assert_eq!(reclassify(SoType::ModisDivScale, 0.5, &i), SoType::ModisMulScale);
        assert_eq!(reclassify(SoType::DefaultCfEqu, 0.5, &i), SoType::DefaultCfEqu);
    }

    #[test]
    fn test_reclassify_idempotent() {
        let cases = [
            (SoType::ModisEqScale, 25.0),
            (SoType::ModisMulScale, 10000.0),
            (SoType::ModisDivScale, 0.0001),
            (SoType::ModisDivScale, 10000.0),
            (SoType::ModisEqScale, 1.0),
            (SoType::DefaultCfEqu, 3.0),
        ];
        let i = input("MOD13A2.hdf", "NDVI", true);
        for (so, scale) in cases {
            let once = reclassify(so, scale, &i);
            assert_eq!(reclassify(once, scale, &i), once, "{so:?} {scale}");
        }
    }
}
