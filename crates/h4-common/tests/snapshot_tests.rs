//! Loading snapshots and configuration from files.

use std::io::Write;

use h4_common::{EosKind, FieldType, FileSnapshot, H4Config, H4Error, NumberType};

const GRID_SNAPSHOT: &str = r#"
path: /data/MOD09GA.A2010001.h10v05.005.hdf
global_attributes:
  - {name: HDFEOSVersion, type: CHAR8, values: [HDFEOS_V2.9]}
grids:
  - name: MOD_Grid_500m_Surface_Reflectance
    data_fields:
      - name: sur_refl_b01
        new_name: sur_refl_b01
        number_type: INT16
        dimensions: [{name: YDim, size: 2400}, {name: XDim, size: 2400}]
      - name: Latitude
        new_name: Latitude
        number_type: FLOAT64
        field_type: 1
        units: degrees_north
        dimensions: [{name: YDim, size: 2400}, {name: XDim, size: 2400}]
    projection: {code: sinusoidal, upleft: [-7783653.6, 3335851.6], lowright: [-6671703.1, 2223901.0]}
"#;

fn write(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn test_yml_extension_is_yaml() {
    let file = write(".yml", GRID_SNAPSHOT);
    let snapshot = FileSnapshot::from_path(file.path()).unwrap();
    assert!(snapshot.is_eos2());
    assert_eq!(snapshot.global_attributes.len(), 1);
}

#[test]
fn test_prepared_structure() {
    let snapshot = FileSnapshot::from_yaml_str(GRID_SNAPSHOT).unwrap();
    let eos = snapshot.to_eos_file().unwrap();
    assert_eq!(eos.grids.len(), 1);
    assert!(eos.swaths.is_empty());

    let grid = &eos.grids[0];
    assert_eq!(grid.kind, EosKind::Grid);
    let lat = grid.data_fields.iter().find(|f| f.name == "Latitude").unwrap();
    assert_eq!(lat.field_type, FieldType::Latitude);
    assert_eq!(lat.number_type, NumberType::Float64);
    assert!(lat.ydim_major);
    assert_eq!(eos.base_name(), "MOD09GA.A2010001.h10v05.005.hdf");
}

#[test]
fn test_unknown_extension_rejected() {
    let file = write(".hdf", GRID_SNAPSHOT);
    let err = FileSnapshot::from_path(file.path()).unwrap_err();
    assert!(matches!(err, H4Error::InvalidInput(_)));
}

#[test]
fn test_plain_file_is_not_eos2() {
    let snapshot = FileSnapshot::from_yaml_str("path: /data/plain.hdf\n").unwrap();
    assert!(!snapshot.is_eos2());
    assert!(snapshot.to_eos_file().unwrap().grids.is_empty());
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_file_with_every_key() {
    let yaml: String = h4_common::config::ALL_KEYS
        .iter()
        .map(|k| format!("{k}: true\n"))
        .collect();
    let file = write(".yaml", &yaml);
    let config = H4Config::from_yaml_file(file.path()).unwrap();

    assert!(config.enable_pass_file_id);
    assert!(config.enable_check_modis_geo_file);
    assert!(config.validate().is_ok());
}
