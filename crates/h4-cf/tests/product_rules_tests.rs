//! Product-specific scale/offset rules seen through a full DAS build.

use h4_cf::scale_offset::{atof, so_type_for_object};
use h4_cf::{build_eos2_dds, DasBuilder, DimMapFieldReader, FieldRequest, KeyValueParser, MemoryFile, SpFile, SpType};
use h4_common::{
    AttrSpec, AttrTable, CfType, Dimension, EosObjectSpec, FieldDescriptor, H4Config, NumberType, ScalarValue,
    SdsSpec, SoType, VdataFieldSpec, VdataSpec,
};
use test_utils::{
    assert_approx_eq, assert_slice_approx_eq, attrs, config, objects, products, ramp, require_test_file,
    with_field_attrs, SnapshotBuilder,
};

fn first_f64(table: &AttrTable, name: &str) -> f64 {
    atof(table.first_value(name).unwrap_or_else(|| panic!("missing {name}")))
}

fn one(name: &str, number_type: NumberType, value: impl Into<ScalarValue>) -> AttrSpec {
    AttrSpec::new(name, number_type, vec![value.into()])
}

fn range(number_type: NumberType, min: i64, max: i64) -> AttrSpec {
    AttrSpec::new("valid_range", number_type, vec![min.into(), max.into()])
}

fn field(name: &str, number_type: NumberType, dims: &[(&str, usize)]) -> FieldDescriptor {
    dims.iter()
        .fold(FieldDescriptor::new(name, number_type), |f, (dim, size)| f.with_dim(*dim, *size))
}

fn sds(name: &str, number_type: NumberType, dims: &[(&str, usize)], attributes: Vec<AttrSpec>) -> SdsSpec {
    SdsSpec {
        name: name.to_string(),
        reference: 0,
        number_type,
        dims: dims.iter().map(|(n, s)| Dimension::new(*n, *s)).collect(),
        attributes,
        dim_scale: false,
    }
}

fn eos_build(lib: &MemoryFile, config: &H4Config) -> h4_cf::DasBuild {
    let file = lib.eos_file().unwrap();
    DasBuilder::new(config, &KeyValueParser).build_eos2(lib, &file).unwrap()
}

// ============================================================================
// MODIS L1B band fields
// ============================================================================

const EMISSIVE: &str = "EV_1KM_Emissive";

fn l1b_file() -> MemoryFile {
    let mut swath = EosObjectSpec::new(objects::L1B_SWATH);
    swath.data_fields = vec![field(
        EMISSIVE,
        NumberType::Uint16,
        &[("Band_1KM_Emissive", 2), ("10*nscans", 2), ("Max_EV_frames", 2)],
    )];
    let swath = with_field_attrs(
        swath,
        EMISSIVE,
        vec![
            AttrSpec::text("long_name", "Earth View 1KM Emissive Bands Scaled Integers"),
            AttrSpec::text("units", "none"),
            AttrSpec::new("radiance_scales", NumberType::Float32, vec![0.5.into(), 0.25.into()]),
            AttrSpec::new("radiance_offsets", NumberType::Float32, vec![100.0.into(), 200.0.into()]),
            AttrSpec::text("radiance_units", "Watts/m^2/micrometer/steradian"),
            range(NumberType::Uint16, 0, 32767),
            one("_FillValue", NumberType::Uint16, 65535i64),
        ],
    );
    MemoryFile::from_snapshot(SnapshotBuilder::new(products::MOD021KM).eos_swath(swath).build()).unwrap()
}

#[test]
fn test_l1b_band_range_spans_every_band() {
    let lib = l1b_file();
    // L1B fields are always computed, even when the client asked for raw values
    let raw = H4Config::from_keys(&config::enabled(&config::RAW_VALUES));
    assert!(raw.disable_scale_offset_comp);
    let build = eos_build(&lib, &raw);

    assert_eq!(build.changed_type_fields, vec![EMISSIVE.to_string()]);
    let table = build.das.get_table(EMISSIVE).unwrap();
    assert_approx_eq!(first_f64(table, "valid_min"), 0.0, 1e-9);
    assert_approx_eq!(first_f64(table, "valid_max"), 16383.5, 1e-3);
    assert!(!table.contains("valid_range"));

    assert_eq!(table.first_value("long_name"), Some("Earth View 1KM Emissive Bands"));
    assert_eq!(
        table.first_value("orig_long_name"),
        Some("Earth View 1KM Emissive Bands Scaled Integers")
    );
    assert_eq!(table.first_value("units"), Some("Watts/m^2/micrometer/steradian"));
    assert_eq!(table.attr_type("_FillValue"), Some(CfType::Float32));
    assert_eq!(lib.open_handles(), 0);
}

#[test]
fn test_l1b_band_declared_float32() {
    let lib = l1b_file();
    let config = H4Config::default();
    let file = lib.eos_file().unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_eos2(&lib, &file).unwrap();

    let dds = build_eos2_dds(&file, &build.changed_type_fields).unwrap();
    let var = dds.find(EMISSIVE).unwrap();
    assert_eq!(var.cf_type, CfType::Float32);
    assert_eq!(var.rank(), 3);
}

#[test]
fn test_l1b_band_cannot_be_read_through_dimension_maps() {
    let lib = l1b_file();
    let config = H4Config::default();
    let request = FieldRequest::swath(lib.path(), objects::L1B_SWATH, EMISSIVE)
        .with_so_type(so_type_for_object(objects::L1B_SWATH));
    assert!(DimMapFieldReader::new(&lib, &config).read(&request).is_err());
    assert_eq!(lib.open_handles(), 0);
}

// ============================================================================
// Lookup-table fields under disabled computation
// ============================================================================

#[test]
fn test_key_field_keeps_computed_attributes() {
    let mut swath = EosObjectSpec::new(objects::MOD06_SWATH);
    swath.data_fields = vec![
        field("Cloud_Mask_Flag", NumberType::Int16, &[("Cell_Along_Swath_5km", 2)]),
        field("Cloud_Top_Temperature", NumberType::Int16, &[("Cell_Along_Swath_5km", 2)]),
    ];
    let swath = with_field_attrs(swath, "Cloud_Mask_Flag", attrs::modis_key_field());
    let swath = with_field_attrs(
        swath,
        "Cloud_Top_Temperature",
        attrs::modis_l2_scaled(0.01, -15000.0, -32768),
    );
    let lib = MemoryFile::from_snapshot(SnapshotBuilder::new(products::MOD06_L2).eos_swath(swath).build()).unwrap();

    let raw = H4Config::from_keys(&config::enabled(&config::RAW_VALUES));
    let build = eos_build(&lib, &raw);
    assert_eq!(build.changed_type_fields, vec!["Cloud_Mask_Flag".to_string()]);

    let mask = build.das.get_table("Cloud_Mask_Flag").unwrap();
    assert!(!mask.contains("scale_factor"));
    assert_approx_eq!(first_f64(mask, "orig_scale_factor"), 0.01, 1e-6);

    // scale * (raw - offset) rewritten as raw * scale + (-scale * offset)
    let ctt = build.das.get_table("Cloud_Top_Temperature").unwrap();
    assert_approx_eq!(first_f64(ctt, "scale_factor"), 0.01, 1e-12);
    assert_approx_eq!(first_f64(ctt, "add_offset"), 150.0, 1e-9);
    assert_eq!(ctt.attr_type("add_offset"), Some(CfType::Float64));
    assert_eq!(ctt.attr_type("_FillValue"), Some(CfType::Int16));
}

// ============================================================================
// MOD09 surface reflectance
// ============================================================================

#[test]
fn test_mod09_range_fields_keep_multiplying() {
    let dims = [("YDim", 2), ("XDim", 2)];
    let mut grid = EosObjectSpec::new(objects::MOD09_GRID);
    grid.data_fields = vec![
        field("sur_refl_b01", NumberType::Int16, &dims),
        field("Range_Sample", NumberType::Uint8, &dims),
        field("Coarse_Index", NumberType::Uint8, &dims),
    ];
    let scaled = |scale: f64, valid: AttrSpec| {
        vec![
            one("scale_factor", NumberType::Float64, scale),
            one("add_offset", NumberType::Float64, 0.0),
            valid,
        ]
    };
    let grid = with_field_attrs(grid, "sur_refl_b01", scaled(0.0001, range(NumberType::Int16, -100, 16000)));
    let grid = with_field_attrs(grid, "Range_Sample", scaled(25.0, range(NumberType::Uint8, 0, 255)));
    let grid = with_field_attrs(grid, "Coarse_Index", scaled(25.0, range(NumberType::Uint8, 0, 255)));
    let lib = MemoryFile::from_snapshot(SnapshotBuilder::new(products::MOD09GA).eos_grid(grid).build()).unwrap();

    assert_eq!(so_type_for_object(objects::MOD09_GRID), SoType::ModisMulScale);
    let build = eos_build(&lib, &H4Config::default());
    assert_eq!(build.changed_type_fields.len(), 3);

    let refl = build.das.get_table("sur_refl_b01").unwrap();
    assert_approx_eq!(first_f64(refl, "valid_min"), -0.01, 1e-6);
    assert_approx_eq!(first_f64(refl, "valid_max"), 1.6, 1e-5);

    let sample = build.das.get_table("Range_Sample").unwrap();
    assert_approx_eq!(first_f64(sample, "valid_max"), 6375.0, 1e-3);

    // without the exception a scale above 1 divides
    let coarse = build.das.get_table("Coarse_Index").unwrap();
    assert_approx_eq!(first_f64(coarse, "valid_max"), 10.2, 1e-4);
}

// ============================================================================
// AMSR-E attribute names
// ============================================================================

const BT_89V: &str = "Brightness_Temperature_89V";

fn amsr_file() -> MemoryFile {
    let mut swath = EosObjectSpec::new(objects::AMSR_SWATH);
    swath.data_fields = vec![field(BT_89V, NumberType::Float32, &[("Low_Res_Scan", 2), ("Low_Res_Pixel", 3)])];
    swath.attributes = vec![AttrSpec::text("Resolution", "low")];
    swath.field_values.insert(BT_89V.into(), ramp(200.0, 0.5, 6));
    let swath = with_field_attrs(
        swath,
        BT_89V,
        vec![
            AttrSpec::text("units", "K"),
            one("SCALE_FACTOR", NumberType::Float64, 0.01),
            one("OFFSET", NumberType::Float32, 327.68),
        ],
    );
    MemoryFile::from_snapshot(SnapshotBuilder::new(products::AMSR_L2A).eos_swath(swath).build()).unwrap()
}

#[test]
fn test_amsr_scale_names_become_cf() {
    let lib = amsr_file();
    let strict = H4Config::from_keys(&config::enabled(&config::STRICT_CF));
    let build = eos_build(&lib, &strict);

    assert!(build.changed_type_fields.is_empty());
    let bt = build.das.get_table(BT_89V).unwrap();
    assert!(!bt.contains("SCALE_FACTOR"));
    assert!(!bt.contains("OFFSET"));
    assert_approx_eq!(first_f64(bt, "scale_factor"), 0.01, 1e-12);
    assert_approx_eq!(first_f64(bt, "add_offset"), 327.68, 1e-4);
    // the offset follows the scale factor's type
    assert_eq!(bt.attr_type("add_offset"), Some(CfType::Float64));

    let swath = build.das.get_table(objects::AMSR_SWATH).unwrap();
    assert_eq!(swath.first_value("Resolution"), Some("low"));
}

#[test]
fn test_amsr_offset_type_kept_by_default() {
    let lib = amsr_file();
    let build = eos_build(&lib, &H4Config::default());
    let bt = build.das.get_table(BT_89V).unwrap();
    assert_eq!(bt.attr_type("add_offset"), Some(CfType::Float32));
    assert!(build.das.get_table(objects::AMSR_SWATH).is_none());
}

#[test]
fn test_amsr_values_read_unscaled() {
    let lib = amsr_file();
    let config = H4Config::default();
    let request = FieldRequest::swath(lib.path(), objects::AMSR_SWATH, BT_89V)
        .with_so_type(so_type_for_object(objects::AMSR_SWATH));
    let data = DimMapFieldReader::new(&lib, &config).read(&request).unwrap();
    assert_eq!(data.dims.len(), 2);
    assert_slice_approx_eq!(data.values.to_f64(), ramp(200.0, 0.5, 6), 1e-4);
}

// ============================================================================
// Special products
// ============================================================================

#[test]
fn test_mod08_offset_served_in_cf_form() {
    let x = ("XDim:mod08", 4);
    let y = ("YDim:mod08", 3);
    let scaled = |offset: f64| {
        vec![
            one("scale_factor", NumberType::Float64, 0.01),
            one("add_offset", NumberType::Float64, offset),
        ]
    };
    let snapshot = SnapshotBuilder::new(products::MOD08_D3)
        .sds(sds("XDim", NumberType::Float32, &[x], Vec::new()))
        .sds(sds("YDim", NumberType::Float32, &[y], Vec::new()))
        .sds(sds("Cloud_Top_Temperature_Mean", NumberType::Int16, &[y, x], scaled(-15000.0)))
        .sds(sds("Cloud_Fraction_Mean", NumberType::Int16, &[y, x], scaled(0.0)))
        .build();
    let lib = MemoryFile::from_snapshot(snapshot).unwrap();
    let config = H4Config {
        enable_special_eos: true,
        ..Default::default()
    };

    let file = SpFile::load(&lib, lib.path(), &config).unwrap();
    assert_eq!(file.special_eos_grid.as_deref(), Some(objects::MOD08_GRID));
    let build = DasBuilder::new(&config, &KeyValueParser).build_sp(&file).unwrap();

    let ctt = build.das.get_table("Cloud_Top_Temperature_Mean").unwrap();
    assert_approx_eq!(first_f64(ctt, "add_offset"), 150.0, 1e-9);
    assert_eq!(ctt.attr_type("add_offset"), Some(CfType::Float64));

    let fraction = build.das.get_table("Cloud_Fraction_Mean").unwrap();
    assert_approx_eq!(first_f64(fraction, "add_offset"), 0.0, 1e-12);
    assert_eq!(lib.open_handles(), 0);
}

#[test]
fn test_obpg_l3_slope_and_intercept() {
    let snapshot = SnapshotBuilder::new(products::OBPG_L3)
        .global_text("Product Name", "S1998001.L3m_DAY_CHL_chlor_a_9km")
        .global_text("Sensor Name", "SeaWiFS")
        .global_text("Scaling", "linear")
        .global(one("Slope", NumberType::Float32, 0.5))
        .global(one("Intercept", NumberType::Float32, -2.0))
        .sds(sds("l3m_data", NumberType::Uint16, &[("lat", 2), ("lon", 3)], Vec::new()))
        .build();
    let lib = MemoryFile::from_snapshot(snapshot).unwrap();
    let config = H4Config::default();

    let file = SpFile::load(&lib, lib.path(), &config).unwrap();
    assert_eq!(file.sp_type, SpType::ObpgL3);
    let build = DasBuilder::new(&config, &KeyValueParser).build_sp(&file).unwrap();

    let data = build.das.get_table("l3m_data").unwrap();
    assert_approx_eq!(first_f64(data, "scale_factor"), 0.5, 1e-9);
    assert_approx_eq!(first_f64(data, "add_offset"), -2.0, 1e-9);
    assert_eq!(data.attr_type("scale_factor"), Some(CfType::Float32));
    assert_eq!(data.first_value("_FillValue"), Some("65535"));
    assert_eq!(data.attr_type("_FillValue"), Some(CfType::UInt16));
}

// ============================================================================
// Vdata as attributes
// ============================================================================

fn scan_times_file() -> MemoryFile {
    let vdata = VdataSpec {
        reference: 40,
        name: "Scan Times".into(),
        class: String::new(),
        is_attr: false,
        lone: true,
        records: 2,
        fields: vec![
            VdataFieldSpec {
                name: "Year".into(),
                number_type: NumberType::Int16,
                order: 1,
                values: vec![2010i64.into(), 2010i64.into()],
                attributes: Vec::new(),
            },
            VdataFieldSpec {
                name: "Position".into(),
                number_type: NumberType::Float32,
                order: 2,
                values: ramp(1.0, 1.0, 4).into_iter().map(ScalarValue::from).collect(),
                attributes: Vec::new(),
            },
        ],
        attributes: vec![AttrSpec::text("Source", "GPS")],
    };
    let snapshot = SnapshotBuilder::new("/data/scan_times.hdf")
        .sds(sds("temperature", NumberType::Float32, &[("track", 2)], Vec::new()))
        .vdata(vdata)
        .build();
    MemoryFile::from_snapshot(snapshot).unwrap()
}

#[test]
fn test_small_vdata_flattened_into_attributes() {
    let lib = scan_times_file();
    let config = H4Config {
        enable_vdata_desc_attr: true,
        ..Default::default()
    };
    let file = SpFile::load(&lib, lib.path(), &config).unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_sp(&file).unwrap();

    let table = build.das.get_table("Scan_Times").unwrap();
    assert!(table.contains("hdf4_vd_desc"));
    assert_eq!(table.first_value("Vdata_attr_Source"), Some("GPS"));
    assert_eq!(table.attr_num("Vdata_field_Year"), 2);
    assert_eq!(table.attr_type("Vdata_field_Year"), Some(CfType::Int16));

    // two records of order 2, each quoted
    assert_eq!(table.attr_num("Vdata_field_Position"), 8);
    assert_eq!(table.first_value("Vdata_field_Position"), Some("'"));
    assert_eq!(lib.open_handles(), 0);
}

#[test]
fn test_vdata_skipped_without_description_switch() {
    let lib = scan_times_file();
    let config = H4Config::default();
    let file = SpFile::load(&lib, lib.path(), &config).unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_sp(&file).unwrap();
    assert!(build.das.get_table("Scan_Times").is_none());
}

// ============================================================================
// Real product snapshots
// ============================================================================

#[test]
fn test_real_mod06_snapshot() {
    let path = require_test_file!("MOD06_L2.yaml");
    let lib = MemoryFile::from_path(&path).unwrap();
    let config = H4Config::default();
    let file = lib.eos_file().unwrap();
    let build = DasBuilder::new(&config, &KeyValueParser).build_eos2(&lib, &file).unwrap();
    assert!(build.das.get_table("HDF_GLOBAL").is_some());
    assert_eq!(lib.open_handles(), 0);
}
