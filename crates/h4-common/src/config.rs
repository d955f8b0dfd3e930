//! Handler configuration keys.
//!
//! Every key is a boolean looked up through a [`KeyProvider`]. A missing key
//! is false; a present key is true only when its value is `true` or `yes`
//! (case-insensitive).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{H4Error, H4Result};

pub const ENABLE_PASS_FILE_ID: &str = "H4.EnablePassFileID";
pub const ENABLE_CF: &str = "H4.EnableCF";
pub const ENABLE_CERES_MERRA_SHORT_NAME: &str = "H4.EnableCERESMERRAShortName";
pub const ENABLE_VDATA_DESC_ATTR: &str = "H4.EnableVdataDescAttr";
pub const ENABLE_CERES_VDATA: &str = "H4.EnableCERESVdata";
pub const DISABLE_SCALE_OFFSET_COMP: &str = "H4.DisableScaleOffsetComp";
pub const ENABLE_CHECK_SCALE_OFFSET_TYPE: &str = "H4.EnableCheckScaleOffsetType";
pub const DISABLE_STRUCT_META_ATTR: &str = "H4.DisableStructMetaAttr";
pub const ENABLE_SWATH_GRID_ATTR: &str = "H4.EnableSwathGridAttr";
pub const ENABLE_VGROUP_ATTR: &str = "H4.EnableVgroupAttr";
pub const ENABLE_SPECIAL_EOS: &str = "H4.EnableSpecialEOS";
pub const ENABLE_CHECK_MODIS_GEO_FILE: &str = "H4.EnableCheckMODISGeoFile";

/// All recognised keys, in documentation order.
pub const ALL_KEYS: [&str; 12] = [
    ENABLE_PASS_FILE_ID,
    ENABLE_CF,
    ENABLE_CERES_MERRA_SHORT_NAME,
    ENABLE_VDATA_DESC_ATTR,
    ENABLE_CERES_VDATA,
    DISABLE_SCALE_OFFSET_COMP,
    ENABLE_CHECK_SCALE_OFFSET_TYPE,
    DISABLE_STRUCT_META_ATTR,
    ENABLE_SWATH_GRID_ATTR,
    ENABLE_VGROUP_ATTR,
    ENABLE_SPECIAL_EOS,
    ENABLE_CHECK_MODIS_GEO_FILE,
];

/// Source of raw configuration values.
pub trait KeyProvider {
    fn lookup(&self, key: &str) -> Option<String>;
}

impl KeyProvider for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl KeyProvider for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Keys read from process environment variables.
///
/// `H4.EnablePassFileID` is looked up as `H4_ENABLEPASSFILEID`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvKeys;

impl EnvKeys {
    pub fn var_name(key: &str) -> String {
        key.replace('.', "_").to_uppercase()
    }
}

impl KeyProvider for EnvKeys {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(Self::var_name(key)).ok()
    }
}

/// Truthiness of one key: `true`/`yes` in any case, absent means false.
pub fn check_beskeys(provider: &dyn KeyProvider, key: &str) -> bool {
    match provider.lookup(key) {
        Some(value) => {
            let value = value.trim().to_lowercase();
            value == "true" || value == "yes"
        }
        None => false,
    }
}

/// The boolean switches that shape the CF view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct H4Config {
    /// Reuse the caller's open file handles instead of reopening.
    pub enable_pass_file_id: bool,
    /// Produce the CF view at all.
    pub enable_cf: bool,
    /// Add `fullpath` attributes to CERES and MERRA fields.
    pub enable_ceres_merra_short_name: bool,
    pub enable_vdata_desc_attr: bool,
    /// Lift the suppression of CERES Vdata description attributes.
    pub enable_ceres_vdata: bool,
    /// Leave data encoded and rewrite scale/offset for the client instead.
    pub disable_scale_offset_comp: bool,
    pub enable_check_scale_offset_type: bool,
    pub disable_struct_meta_attr: bool,
    pub enable_swath_grid_attr: bool,
    pub enable_vgroup_attr: bool,
    pub enable_special_eos: bool,
    pub enable_check_modis_geo_file: bool,
}

impl H4Config {
    /// Read every key from a provider.
    pub fn from_keys(provider: &dyn KeyProvider) -> Self {
        let config = Self {
            enable_pass_file_id: check_beskeys(provider, ENABLE_PASS_FILE_ID),
            enable_cf: check_beskeys(provider, ENABLE_CF),
            enable_ceres_merra_short_name: check_beskeys(provider, ENABLE_CERES_MERRA_SHORT_NAME),
            enable_vdata_desc_attr: check_beskeys(provider, ENABLE_VDATA_DESC_ATTR),
            enable_ceres_vdata: check_beskeys(provider, ENABLE_CERES_VDATA),
            disable_scale_offset_comp: check_beskeys(provider, DISABLE_SCALE_OFFSET_COMP),
            enable_check_scale_offset_type: check_beskeys(provider, ENABLE_CHECK_SCALE_OFFSET_TYPE),
            disable_struct_meta_attr: check_beskeys(provider, DISABLE_STRUCT_META_ATTR),
            enable_swath_grid_attr: check_beskeys(provider, ENABLE_SWATH_GRID_ATTR),
            enable_vgroup_attr: check_beskeys(provider, ENABLE_VGROUP_ATTR),
            enable_special_eos: check_beskeys(provider, ENABLE_SPECIAL_EOS),
            enable_check_modis_geo_file: check_beskeys(provider, ENABLE_CHECK_MODIS_GEO_FILE),
        };
        debug!(?config, "Loaded H4 configuration keys");
        config
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_keys(&EnvKeys)
    }

    // ========================================================================
    // YAML loading
    // ========================================================================

    /// Parse a YAML mapping of key to bool or string.
    ///
    /// ```yaml
    /// H4.EnableCF: true
    /// H4.DisableScaleOffsetComp: "yes"
    /// ```
    pub fn from_yaml_str(yaml: &str) -> H4Result<Self> {
        let keys = yaml_keys(yaml)?;
        Ok(Self::from_keys(&keys))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> H4Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enable_cf && self.disable_struct_meta_attr && self.enable_swath_grid_attr {
            return Err(format!(
                "{DISABLE_STRUCT_META_ATTR} and {ENABLE_SWATH_GRID_ATTR} only apply when {ENABLE_CF} is set"
            ));
        }
        Ok(())
    }
}

fn yaml_keys(yaml: &str) -> H4Result<BTreeMap<String, String>> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let mut keys = BTreeMap::new();
    let mapping = match value {
        serde_yaml::Value::Mapping(m) => m,
        serde_yaml::Value::Null => return Ok(keys),
        _ => return Err(H4Error::Config("configuration must be a mapping".to_string())),
    };
    for (k, v) in mapping {
        let key = match k {
            serde_yaml::Value::String(s) => s,
            other => return Err(H4Error::Config(format!("non-string key {other:?}"))),
        };
        let text = match v {
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Null => continue,
            other => {
                return Err(H4Error::Config(format!("key {key} has a non-scalar value {other:?}")))
            }
        };
        keys.insert(key, text);
    }
    Ok(keys)
}
