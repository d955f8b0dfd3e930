//! End-to-end DAS/DDS builds of HDF-EOS2 files held in memory.

use h4_cf::scale_offset::atof;
use h4_cf::{build_eos2_dds, DasBuilder, KeyValueParser, MemoryFile};
use h4_common::{
    AttrSpec, CfType, EosObjectSpec, FieldDescriptor, FieldType, FileSnapshot, H4Config, NumberType,
};
use test_utils::{assert_approx_eq, attrs, objects, products, with_field_attrs, SnapshotBuilder};

const NDVI: &str = "CMG 0.05 Deg Monthly NDVI";
const NDVI_CF: &str = "CMG_0_05_Deg_Monthly_NDVI";

const CORE_METADATA: &str = "GROUP = INVENTORYMETADATA
  OBJECT = LOCALGRANULEID
    VALUE = \"MOD06_L2.A2010001.0000.005.2010005.hdf\"
  END_OBJECT = LOCALGRANULEID
END_GROUP = INVENTORYMETADATA
END
";

const STRUCT_METADATA: &str = "GROUP=SwathStructure
END_GROUP=SwathStructure
END
";

// ============================================================================
// Snapshots
// ============================================================================

fn vi_grid() -> EosObjectSpec {
    let mut grid = EosObjectSpec::new(objects::MOD13C2_GRID);
    grid.data_fields = vec![
        FieldDescriptor::new("Latitude", NumberType::Float32)
            .with_field_type(FieldType::Latitude)
            .with_dim("YDim", 3)
            .with_dim("XDim", 4),
        FieldDescriptor::new("Longitude", NumberType::Float32)
            .with_field_type(FieldType::Longitude)
            .with_dim("YDim", 3)
            .with_dim("XDim", 4),
        FieldDescriptor::new(NDVI, NumberType::Int16)
            .with_new_name(NDVI_CF)
            .with_dim("YDim", 3)
            .with_dim("XDim", 4),
    ];
    grid.data_fields[0].units = Some("degrees_north".into());
    grid.data_fields[1].units = Some("degrees_east".into());
    grid.data_fields[2].coordinates = Some("Latitude Longitude".into());
    with_field_attrs(grid, NDVI, attrs::modis_vi_div(10000.0))
}

fn cloud_swath() -> EosObjectSpec {
    let mut swath = EosObjectSpec::new(objects::MOD06_SWATH);
    swath.geo_fields = vec![
        FieldDescriptor::new("Latitude", NumberType::Float32)
            .with_field_type(FieldType::Latitude)
            .with_dim("Cell_Along_Swath_5km", 2)
            .with_dim("Cell_Across_Swath_5km", 2),
        FieldDescriptor::new("Longitude", NumberType::Float32)
            .with_field_type(FieldType::Longitude)
            .with_dim("Cell_Along_Swath_5km", 2)
            .with_dim("Cell_Across_Swath_5km", 2),
    ];
    swath.geo_fields[0].units = Some("degrees_north".into());
    swath.geo_fields[1].units = Some("degrees_east".into());
    swath.data_fields = vec![FieldDescriptor::new("Cloud_Top_Temperature", NumberType::Int16)
        .with_dim("Cell_Along_Swath_5km", 2)
        .with_dim("Cell_Across_Swath_5km", 2)];
    swath.data_fields[0].coordinates = Some("Latitude Longitude".into());

    let swath = with_field_attrs(swath, "Latitude", attrs::latitude_identity());
    with_field_attrs(
        swath,
        "Cloud_Top_Temperature",
        attrs::modis_l2_scaled(0.01, -15000.0, -32768),
    )
}

fn vi_file() -> MemoryFile {
    let snapshot = SnapshotBuilder::new(products::MOD13C2).eos_grid(vi_grid()).build();
    MemoryFile::from_snapshot(snapshot).unwrap()
}

fn cloud_snapshot() -> FileSnapshot {
    SnapshotBuilder::new(products::MOD06_L2)
        .global_text("HDFEOSVersion", "HDFEOS_V2.9")
        .global_text("CoreMetadata.0", CORE_METADATA)
        .global_text("StructMetadata.0", STRUCT_METADATA)
        .eos_swath(cloud_swath())
        .build()
}

fn first_f64(table: &h4_common::AttrTable, name: &str) -> f64 {
    atof(table.first_value(name).unwrap_or_else(|| panic!("missing {name}")))
}

// ============================================================================
// MODIS divided scale on a grid
// ============================================================================

#[test]
fn test_div_scale_grid_field_becomes_float32() {
    let lib = vi_file();
    let config = H4Config::default();
    let parser = KeyValueParser;
    let file = lib.eos_file().unwrap();

    let build = DasBuilder::new(&config, &parser).build_eos2(&lib, &file).unwrap();
    assert_eq!(build.changed_type_fields, vec![NDVI_CF.to_string()]);

    let ndvi = build.das.get_table(NDVI_CF).unwrap();
    assert_eq!(ndvi.first_value("long_name"), Some(NDVI));
    assert_eq!(ndvi.first_value("coordinates"), Some("Latitude Longitude"));
    assert_eq!(ndvi.first_value("units"), Some("NDVI"));

    // the encoded-domain scale moves out of the CF names
    assert!(!ndvi.contains("scale_factor"));
    assert!(!ndvi.contains("add_offset"));
    assert_approx_eq!(first_f64(ndvi, "orig_scale_factor"), 10000.0, 1e-9);

    assert_eq!(ndvi.attr_type("_FillValue"), Some(CfType::Float32));
    assert_approx_eq!(first_f64(ndvi, "_FillValue"), -3000.0, 1e-9);

    assert!(!ndvi.contains("valid_range"));
    assert_approx_eq!(first_f64(ndvi, "valid_min"), -0.2, 1e-6);
    assert_approx_eq!(first_f64(ndvi, "valid_max"), 1.0, 1e-6);

    assert_eq!(lib.open_handles(), 0);
}

#[test]
fn test_grid_latitude_gets_units_and_long_name() {
    let lib = vi_file();
    let config = H4Config::default();
    let file = lib.eos_file().unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_eos2(&lib, &file).unwrap();

    let lat = build.das.get_table("Latitude").unwrap();
    assert_eq!(lat.first_value("long_name"), Some("Latitude"));
    assert_eq!(lat.first_value("units"), Some("degrees_north"));
    assert!(!lat.contains("coordinates"));
}

#[test]
fn test_disabled_computation_rewrites_scale_for_clients() {
    let lib = vi_file();
    let config = H4Config {
        disable_scale_offset_comp: true,
        ..Default::default()
    };
    let file = lib.eos_file().unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_eos2(&lib, &file).unwrap();

    assert!(build.changed_type_fields.is_empty());
    let ndvi = build.das.get_table(NDVI_CF).unwrap();
    assert_approx_eq!(first_f64(ndvi, "scale_factor"), 0.0001, 1e-12);
    assert_eq!(ndvi.attr_type("scale_factor"), Some(CfType::Float64));
    assert_eq!(ndvi.attr_type("_FillValue"), Some(CfType::Int16));
    assert!(ndvi.contains("valid_range"));
    assert!(!ndvi.contains("orig_scale_factor"));
}

#[test]
fn test_dds_declares_changed_fields_float32() {
    let lib = vi_file();
    let config = H4Config::default();
    let file = lib.eos_file().unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_eos2(&lib, &file).unwrap();

    let dds = build_eos2_dds(&file, &build.changed_type_fields).unwrap();
    assert_eq!(dds.find(NDVI_CF).unwrap().cf_type, CfType::Float32);
    assert_eq!(dds.find(NDVI_CF).unwrap().rank(), 2);
    assert_eq!(dds.find("Latitude").unwrap().cf_type, CfType::Float32);
    assert_eq!(dds.len(), 3);
}

// ============================================================================
// MODIS multiplied scale on a swath, ECS metadata
// ============================================================================

#[test]
fn test_mul_scale_swath_valid_range() {
    let lib = MemoryFile::from_snapshot(cloud_snapshot()).unwrap();
    let config = H4Config::default();
    let file = lib.eos_file().unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_eos2(&lib, &file).unwrap();

    assert_eq!(build.changed_type_fields, vec!["Cloud_Top_Temperature".to_string()]);
    let ctt = build.das.get_table("Cloud_Top_Temperature").unwrap();
    // scale * (raw - offset)
    assert_approx_eq!(first_f64(ctt, "valid_min"), 150.0, 1e-3);
    assert_approx_eq!(first_f64(ctt, "valid_max"), 350.0, 1e-3);
    assert_approx_eq!(first_f64(ctt, "orig_add_offset"), -15000.0, 1e-9);
    assert_eq!(ctt.first_value("coordinates"), Some("Latitude Longitude"));
    assert_eq!(lib.open_handles(), 0);
}

#[test]
fn test_swath_latitude_drops_identity_scale() {
    let lib = MemoryFile::from_snapshot(cloud_snapshot()).unwrap();
    let config = H4Config::default();
    let file = lib.eos_file().unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_eos2(&lib, &file).unwrap();

    let lat = build.das.get_table("Latitude").unwrap();
    assert!(!lat.contains("scale_factor"));
    assert!(!lat.contains("add_offset"));
    // the prepared units win over the native ones
    assert_eq!(lat.first_value("units"), Some("degrees_north"));
    assert_eq!(lat.attr_num("units"), 1);
}

#[test]
fn test_ecs_tables_and_globals() {
    let lib = MemoryFile::from_snapshot(cloud_snapshot()).unwrap();
    let config = H4Config::default();
    let file = lib.eos_file().unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_eos2(&lib, &file).unwrap();

    let core = build.das.get_table("CoreMetadata").unwrap();
    assert_eq!(
        core.first_value("INVENTORYMETADATA.LOCALGRANULEID.VALUE"),
        Some("MOD06_L2.A2010001.0000.005.2010005.hdf")
    );
    assert!(build.das.get_table("StructMetadata").is_some());

    let globals = build.das.get_table("HDF_GLOBAL").unwrap();
    assert_eq!(globals.first_value("HDFEOSVersion"), Some("HDFEOS_V2.9"));
    assert!(!globals.contains("CoreMetadata_0"));
}

#[test]
fn test_struct_metadata_can_be_disabled() {
    let lib = MemoryFile::from_snapshot(cloud_snapshot()).unwrap();
    let config = H4Config {
        disable_struct_meta_attr: true,
        ..Default::default()
    };
    let file = lib.eos_file().unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_eos2(&lib, &file).unwrap();

    assert!(build.das.get_table("StructMetadata").is_none());
    assert!(build.das.get_table("CoreMetadata").is_some());
}

#[test]
fn test_ecs_metadata_can_be_skipped() {
    let lib = MemoryFile::from_snapshot(cloud_snapshot()).unwrap();
    let config = H4Config::default();
    let file = lib.eos_file().unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser)
        .with_ecs_metadata(false)
        .build_eos2(&lib, &file)
        .unwrap();

    assert!(build.das.get_table("CoreMetadata").is_none());
    assert!(build.das.get_table("StructMetadata").is_some());
}

// ============================================================================
// Object attributes
// ============================================================================

#[test]
fn test_swath_object_attributes_when_enabled() {
    let mut swath = cloud_swath();
    swath.attributes = vec![AttrSpec::text("Processing Center", "MODAPS")];
    let snapshot = SnapshotBuilder::new(products::MOD06_L2).eos_swath(swath).build();
    let lib = MemoryFile::from_snapshot(snapshot).unwrap();
    let file = lib.eos_file().unwrap();

    let off = H4Config::default();
    let build = DasBuilder::new(&off, &KeyValueParser).build_eos2(&lib, &file).unwrap();
    assert!(build.das.get_table(objects::MOD06_SWATH).is_none());

    let on = H4Config {
        enable_swath_grid_attr: true,
        ..Default::default()
    };
    let build = DasBuilder::new(&on, &KeyValueParser).build_eos2(&lib, &file).unwrap();
    let table = build.das.get_table(objects::MOD06_SWATH).unwrap();
    assert_eq!(table.first_value("Processing_Center"), Some("MODAPS"));
    assert_eq!(lib.open_handles(), 0);
}

#[test]
fn test_missing_group_vgroup_is_an_error_and_releases_handles() {
    // the swath structure exists but its vgroup does not
    let mut snapshot = cloud_snapshot();
    snapshot.vgroups.retain(|v| v.name != objects::MOD06_SWATH);
    let lib = MemoryFile::from_snapshot(snapshot).unwrap();
    let config = H4Config::default();
    let file = lib.eos_file().unwrap();

    assert!(DasBuilder::new(&config, &KeyValueParser).build_eos2(&lib, &file).is_err());
    assert_eq!(lib.open_handles(), 0);
}
