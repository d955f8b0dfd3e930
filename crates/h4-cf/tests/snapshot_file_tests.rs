//! Builds driven from snapshot and configuration files on disk.

use h4_cf::{DasBuilder, KeyValueParser, MemoryFile};
use h4_common::{EosObjectSpec, FieldDescriptor, H4Config, NumberType};
use test_utils::{attrs, objects, products, with_field_attrs, write_temp_file, SnapshotBuilder};

fn cloud_snapshot_json() -> String {
    let mut swath = EosObjectSpec::new(objects::MOD06_SWATH);
    swath.data_fields = vec![FieldDescriptor::new("Cloud_Top_Temperature", NumberType::Int16)
        .with_dim("Cell_Along_Swath_5km", 2)
        .with_dim("Cell_Across_Swath_5km", 2)];
    let swath = with_field_attrs(
        swath,
        "Cloud_Top_Temperature",
        attrs::modis_l2_scaled(0.01, -15000.0, -32768),
    );
    let snapshot = SnapshotBuilder::new(products::MOD06_L2).eos_swath(swath).build();
    serde_json::to_string_pretty(&snapshot).unwrap()
}

#[test]
fn test_json_snapshot_round_trips_through_disk() {
    let (_dir, path) = write_temp_file("MOD06_L2.json", &cloud_snapshot_json());
    let lib = MemoryFile::from_path(&path).unwrap();
    assert_eq!(lib.path(), products::MOD06_L2);
    assert_eq!(lib.snapshot().swaths.len(), 1);
    assert_eq!(lib.snapshot().datasets.len(), 1);
}

#[test]
fn test_config_file_drives_the_build() {
    let (_snap_dir, snapshot_path) = write_temp_file("MOD06_L2.json", &cloud_snapshot_json());
    let (_cfg_dir, config_path) = write_temp_file(
        "h4.yaml",
        "H4.EnableCF: true\nH4.DisableScaleOffsetComp: \"yes\"\nH4.EnableCheckScaleOffsetType: false\n",
    );

    let config = H4Config::from_yaml_file(&config_path).unwrap();
    assert!(config.enable_cf);
    assert!(config.disable_scale_offset_comp);
    assert!(!config.enable_check_scale_offset_type);

    let lib = MemoryFile::from_path(&snapshot_path).unwrap();
    let file = lib.eos_file().unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_eos2(&lib, &file).unwrap();

    // encoded values are served, so nothing changes type
    assert!(build.changed_type_fields.is_empty());
    let table = build.das.get_table("Cloud_Top_Temperature").unwrap();
    assert!(table.contains("scale_factor"));
    assert!(table.contains("valid_range"));
}

#[test]
fn test_das_build_serializes_in_table_order() {
    let (_dir, path) = write_temp_file("MOD06_L2.json", &cloud_snapshot_json());
    let lib = MemoryFile::from_path(&path).unwrap();
    let config = H4Config::default();
    let file = lib.eos_file().unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_eos2(&lib, &file).unwrap();

    let json = serde_json::to_value(&build).unwrap();
    assert_eq!(json["changed_type_fields"][0], "Cloud_Top_Temperature");

    let tables = json["das"]["tables"].as_array().unwrap();
    assert_eq!(tables[0]["name"], "Cloud_Top_Temperature");
    let attributes = tables[0]["attributes"].as_array().unwrap();
    assert_eq!(attributes[0]["name"], "long_name");
    assert_eq!(attributes[0]["type"], "String");
    assert_eq!(attributes[0]["values"][0], "Cloud_Top_Temperature");
}
