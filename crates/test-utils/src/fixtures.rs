//! Common fixtures: product file names, attribute sets and configurations.

/// File names whose shape selects product-specific behavior.
pub mod products {
    /// MODIS daily surface reflectance grid (sinusoidal).
    pub const MOD09GA: &str = "/data/MOD09GA.A2010001.h10v05.005.2010003.hdf";

    /// MODIS monthly CMG vegetation index grid.
    pub const MOD13C2: &str = "/data/MOD13C2.A2010001.005.2010037.hdf";

    /// MODIS L1B 1 km calibrated radiances.
    pub const MOD021KM: &str = "/data/MOD021KM.A2010001.0000.005.2010005.hdf";

    /// MODIS L2 cloud product.
    pub const MOD06_L2: &str = "/data/MOD06_L2.A2010001.0000.005.2010005.hdf";

    /// MODIS L3 atmosphere daily grid.
    pub const MOD08_D3: &str = "/data/MOD08_D3.A2010001.005.2010005.hdf";

    /// AMSR-E L2A brightness temperatures.
    pub const AMSR_L2A: &str = "/data/AMSR_E_L2A_BrightnessTemperatures_V10.hdf";

    /// TRMM 3B42 version 7.
    pub const TRMM_3B42_V7: &str = "/data/3B42.20100101.00.7.HDF";

    /// SeaWiFS L3 standard mapped image.
    pub const OBPG_L3: &str = "/data/S1998001.L3m_DAY_CHL_chlor_a_9km.hdf";
}

/// Grid and swath object names.
pub mod objects {
    pub const MOD09_GRID: &str = "MOD_Grid_500m_Surface_Reflectance";
    pub const MOD13C2_GRID: &str = "MOD_Grid_monthly_CMG_VI";
    pub const MOD08_GRID: &str = "mod08";
    pub const L1B_SWATH: &str = "MODIS_SWATH_Type_L1B";
    pub const MOD06_SWATH: &str = "mod06";
    pub const AMSR_SWATH: &str = "Low_Res_Swath";
}

/// Native attribute sets as they appear on real fields.
pub mod attrs {
    use h4_common::{AttrSpec, NumberType, ScalarValue};

    fn one(name: &str, number_type: NumberType, value: impl Into<ScalarValue>) -> AttrSpec {
        AttrSpec::new(name, number_type, vec![value.into()])
    }

    /// MODIS L2 style `scale * (raw - offset)` attributes on an Int16 field.
    pub fn modis_l2_scaled(scale: f64, offset: f64, fill: i64) -> Vec<AttrSpec> {
        vec![
            AttrSpec::text("units", "K"),
            one("scale_factor", NumberType::Float64, scale),
            one("add_offset", NumberType::Float64, offset),
            one("_FillValue", NumberType::Int16, fill),
            AttrSpec::new(
                "valid_range",
                NumberType::Int16,
                vec![ScalarValue::Int(0), ScalarValue::Int(20000)],
            ),
        ]
    }

    /// MOD13C2 style divided scale on an Int16 vegetation index.
    pub fn modis_vi_div(scale: f64) -> Vec<AttrSpec> {
        vec![
            AttrSpec::text("units", "NDVI"),
            one("scale_factor", NumberType::Float64, scale),
            one("add_offset", NumberType::Float64, 0.0),
            one("_FillValue", NumberType::Int16, -3000),
            AttrSpec::new(
                "valid_range",
                NumberType::Int16,
                vec![ScalarValue::Int(-2000), ScalarValue::Int(10000)],
            ),
        ]
    }

    /// A lookup-table field that must never be scaled.
    pub fn modis_key_field() -> Vec<AttrSpec> {
        vec![
            AttrSpec::text("Key", "0=clear 1=cloudy"),
            one("scale_factor", NumberType::Float32, 0.01),
        ]
    }

    /// Float latitude with identity scale and offset.
    pub fn latitude_identity() -> Vec<AttrSpec> {
        vec![
            AttrSpec::text("units", "degrees"),
            one("scale_factor", NumberType::Float32, 1.0),
            one("add_offset", NumberType::Float32, 0.0),
        ]
    }
}

/// Configuration key sets used across tests.
pub mod config {
    use h4_common::config::{DISABLE_SCALE_OFFSET_COMP, ENABLE_CHECK_SCALE_OFFSET_TYPE, ENABLE_SWATH_GRID_ATTR};
    use std::collections::HashMap;

    /// Configuration map with every listed key set to `"true"`.
    pub fn enabled(keys: &[&str]) -> HashMap<String, String> {
        keys.iter().map(|k| (k.to_string(), "true".to_string())).collect()
    }

    /// Keys that turn off read-time scale/offset computation.
    pub const RAW_VALUES: [&str; 1] = [DISABLE_SCALE_OFFSET_COMP];

    /// Keys a strict CF client typically enables.
    pub const STRICT_CF: [&str; 2] = [ENABLE_CHECK_SCALE_OFFSET_TYPE, ENABLE_SWATH_GRID_ATTR];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_sets_encode() {
        for set in [
            attrs::modis_l2_scaled(0.01, -15000.0, -9999),
            attrs::modis_vi_div(10000.0),
            attrs::modis_key_field(),
            attrs::latitude_identity(),
        ] {
            for attr in set {
                assert!(attr.to_raw().is_ok(), "{} does not encode", attr.name);
            }
        }
    }

    #[test]
    fn test_enabled_map() {
        let map = config::enabled(&config::STRICT_CF);
        assert_eq!(map.len(), 2);
        assert!(map.values().all(|v| v == "true"));
    }
}
