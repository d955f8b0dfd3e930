//! Reading swath and grid fields at data resolution.
//!
//! A geolocation field tied to the data by dimension maps is read at its
//! stored resolution, expanded along every mapped axis, cut down to the
//! requested hyperslab and finally scaled with the object's scale/offset
//! convention.

use std::collections::HashMap;

use bytemuck::Pod;
use h4_common::{Dimension, DimensionMap, H4Config, H4Error, H4Result, NumberType, SoType};
use num_traits::Float;
use tracing::{debug, instrument};

use crate::dimmap::{expand_dimmap, parse_dimension_maps, subset};
use crate::reconcile::{ADD_OFFSET, FILL_VALUE, SCALE_FACTOR};
use crate::scale_offset::policy::{is_modis_l1b_band_field, is_modis_l1b_swath};
use crate::scale_offset::{reclassify, ReclassifyInput, ScaleRule};
use crate::source::{EosApi, EosFileGuard, EosLibrary, EosObjectGuard};

/// Start, stride and length along each axis of the expanded field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hyperslab {
    pub offset: Vec<usize>,
    pub step: Vec<usize>,
    pub count: Vec<usize>,
}

impl Hyperslab {
    pub fn new(offset: Vec<usize>, step: Vec<usize>, count: Vec<usize>) -> Self {
        Self { offset, step, count }
    }

    /// The whole of an array with the given shape.
    pub fn full(shape: &[usize]) -> Self {
        Self {
            offset: vec![0; shape.len()],
            step: vec![1; shape.len()],
            count: shape.to_vec(),
        }
    }
}

/// One field read.
#[derive(Debug, Clone)]
pub struct FieldRequest<'a> {
    pub path: &'a str,
    /// Exactly one of `grid_name` and `swath_name` is non-empty.
    pub grid_name: &'a str,
    pub swath_name: &'a str,
    pub field_name: &'a str,
    pub so_type: SoType,
    /// Maps known from the prepared structure; inquired when absent.
    pub dimension_maps: Option<Vec<DimensionMap>>,
    /// The field comes from a MODIS MOD03/MYD03 companion file.
    pub is_geofile: bool,
    /// File id already open by the caller.
    pub file_id: Option<i32>,
    /// Whole field when absent.
    pub slab: Option<Hyperslab>,
}

impl<'a> FieldRequest<'a> {
    pub fn swath(path: &'a str, swath_name: &'a str, field_name: &'a str) -> Self {
        Self {
            path,
            grid_name: "",
            swath_name,
            field_name,
            so_type: SoType::DefaultCfEqu,
            dimension_maps: None,
            is_geofile: false,
            file_id: None,
            slab: None,
        }
    }

    pub fn grid(path: &'a str, grid_name: &'a str, field_name: &'a str) -> Self {
        Self {
            grid_name,
            swath_name: "",
            ..Self::swath(path, "", field_name)
        }
    }

    pub fn with_so_type(mut self, so_type: SoType) -> Self {
        self.so_type = so_type;
        self
    }

    pub fn with_slab(mut self, slab: Hyperslab) -> Self {
        self.slab = Some(slab);
        self
    }

    pub fn with_maps(mut self, maps: Vec<DimensionMap>) -> Self {
        self.dimension_maps = Some(maps);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValues {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl FieldValues {
    pub fn len(&self) -> usize {
        match self {
            FieldValues::Float32(v) => v.len(),
            FieldValues::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to f64.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            FieldValues::Float32(v) => v.iter().map(|&x| x as f64).collect(),
            FieldValues::Float64(v) => v.clone(),
        }
    }
}

/// Expanded dimensions and the requested values.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldData {
    /// Dimensions after expansion, before subsetting.
    pub dims: Vec<Dimension>,
    pub values: FieldValues,
}

/// Reads fields through an HDF-EOS2 library.
pub struct DimMapFieldReader<'a, L: EosLibrary + ?Sized> {
    lib: &'a L,
    config: &'a H4Config,
}

impl<'a, L: EosLibrary + ?Sized> DimMapFieldReader<'a, L> {
    pub fn new(lib: &'a L, config: &'a H4Config) -> Self {
        Self { lib, config }
    }

    #[instrument(skip(self, request), fields(field = %request.field_name))]
    pub fn read(&self, request: &FieldRequest<'_>) -> H4Result<FieldData> {
        let (api, object_name) = EosApi::select(request.grid_name, request.swath_name)?;

        let file = match request.file_id {
            Some(id) if self.config.enable_pass_file_id && !request.is_geofile => {
                EosFileGuard::borrowed(self.lib, api, id)
            }
            _ => EosFileGuard::open(self.lib, api, request.path)?,
        };
        let object = EosObjectGuard::attach(self.lib, api, file.id(), object_name)?;

        let data = self.read_attached(api, object.id(), object_name, request)?;

        object.close()?;
        file.close()?;
        Ok(data)
    }

    fn read_attached(
        &self,
        api: EosApi,
        object_id: i32,
        object_name: &str,
        request: &FieldRequest<'_>,
    ) -> H4Result<FieldData> {
        let is_l1b = api == EosApi::Swath && is_modis_l1b_swath(object_name);
        if is_l1b && request.so_type != SoType::DefaultCfEqu && is_modis_l1b_band_field(request.field_name).is_some()
        {
            return Err(H4Error::invalid_input(format!(
                "MODIS L1B band field '{}' cannot be read through a dimension map",
                request.field_name
            )));
        }

        let maps = match &request.dimension_maps {
            Some(maps) => maps.clone(),
            None => {
                let (names, offsets, increments) = api.inq_maps(self.lib, object_id)?;
                if names.is_empty() {
                    Vec::new()
                } else {
                    parse_dimension_maps(&names, &offsets, &increments)?
                }
            }
        };

        let info = api.field_info(self.lib, object_id, request.field_name)?;
        if info.dims.len() > 2 {
            return Err(H4Error::UnsupportedRank(info.dims.len()));
        }

        let mut dense_sizes = HashMap::new();
        for map in maps.iter().filter(|m| info.dims.iter().any(|d| d.name == m.geo)) {
            if !dense_sizes.contains_key(&map.data) {
                dense_sizes.insert(map.data.clone(), api.dim_size(self.lib, object_id, &map.data)?);
            }
        }

        let compute = !self.config.disable_scale_offset_comp || is_l1b;
        let rule = if compute && request.so_type != SoType::DefaultCfEqu {
            self.scale_rule(api, object_id, request)?
        } else {
            None
        };

        let mut dims = info.dims.clone();
        let values = match info.number_type {
            NumberType::Float32 => FieldValues::Float32(self.expand_field::<f32>(
                api, object_id, request, info.number_type, &mut dims, &maps, &dense_sizes, &rule,
            )?),
            NumberType::Float64 => FieldValues::Float64(self.expand_field::<f64>(
                api, object_id, request, info.number_type, &mut dims, &maps, &dense_sizes, &rule,
            )?),
            other => {
                return Err(H4Error::UnsupportedType(format!(
                    "{other:?} for dimension-map field '{}'",
                    request.field_name
                )))
            }
        };

        debug!(
            dims = ?dims.iter().map(|d| d.size).collect::<Vec<_>>(),
            values = values.len(),
            "Read dimension-map field"
        );
        Ok(FieldData { dims, values })
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_field<T: Float + Pod>(
        &self,
        api: EosApi,
        object_id: i32,
        request: &FieldRequest<'_>,
        number_type: NumberType,
        dims: &mut [Dimension],
        maps: &[DimensionMap],
        dense_sizes: &HashMap<String, usize>,
        rule: &Option<(ScaleRule, Option<f64>)>,
    ) -> H4Result<Vec<T>> {
        let raw = api.read_field(self.lib, object_id, request.field_name)?;
        let count: usize = dims.iter().map(|d| d.size).product();
        let stored = (0..count)
            .map(|i| h4_common::dtype::read_element::<T>(&raw, i))
            .collect::<H4Result<Vec<T>>>()?;

        let expanded = expand_dimmap(stored, dims, maps, dense_sizes)?;
        let shape: Vec<usize> = dims.iter().map(|d| d.size).collect();
        let slab = request.slab.clone().unwrap_or_else(|| Hyperslab::full(&shape));
        let mut values = subset(&expanded, &shape, &slab.offset, &slab.step, &slab.count)?;

        if let Some((rule, fill)) = rule {
            rule.apply_slice(&mut values, number_type, *fill);
        }
        Ok(values)
    }

    /// The field's scale rule and fill, or `None` when it declares neither
    /// a scale factor nor an offset.
    fn scale_rule(
        &self,
        api: EosApi,
        object_id: i32,
        request: &FieldRequest<'_>,
    ) -> H4Result<Option<(ScaleRule, Option<f64>)>> {
        let attr = |name: &str| -> H4Result<Option<f64>> {
            match api.field_attribute(self.lib, object_id, request.field_name, name)? {
                Some(a) if !a.number_type.is_char() => Ok(Some(a.element_as_f64(0)?)),
                _ => Ok(None),
            }
        };
        let scale = attr(SCALE_FACTOR)?;
        let offset = attr(ADD_OFFSET)?;
        if scale.is_none() && offset.is_none() {
            return Ok(None);
        }
        let scale = scale.unwrap_or(1.0);
        let fill = attr(FILL_VALUE)?;

        let file_name = request.path.rsplit('/').next().unwrap_or(request.path);
        let so_type = reclassify(
            request.so_type,
            scale,
            &ReclassifyInput {
                file_name,
                field_name: request.field_name,
                is_grid: api == EosApi::Grid,
            },
        );
        Ok(Some((ScaleRule::new(so_type, scale, offset.unwrap_or(0.0)), fill)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryFile;

    const SWATH_FILE: &str = r#"
path: /data/MOD021KM.A2010001.1200.005.hdf
swaths:
  - name: MODIS_SWATH_Type_L1B
    geo_fields:
      - name: Latitude
        new_name: Latitude
        number_type: FLOAT32
        field_type: 1
        dimensions: [{name: GeoTrack, size: 2}, {name: GeoXtrack, size: 3}]
    data_fields:
      - name: EV_1KM_Emissive
        new_name: EV_1KM_Emissive
        number_type: FLOAT32
        dimensions: [{name: Track, size: 4}, {name: Xtrack, size: 6}]
    dimension_maps:
      - {geo: GeoTrack, data: Track, offset: 0, increment: 2}
      - {geo: GeoXtrack, data: Xtrack, offset: 0, increment: 2}
    field_values:
      Latitude: [0, 2, 4, 10, 12, 14]
  - name: Swath_Scaled
    geo_fields:
      - name: Height
        new_name: Height
        number_type: FLOAT64
        dimensions: [{name: GeoTrack, size: 3}]
      - name: Flags
        new_name: Flags
        number_type: INT16
        dimensions: [{name: GeoTrack, size: 3}]
    data_fields:
      - name: radiance
        new_name: radiance
        number_type: FLOAT32
        dimensions: [{name: Track, size: 5}]
    dimension_maps:
      - {geo: GeoTrack, data: Track, offset: 0, increment: 2}
    field_attributes:
      Height:
        - {name: scale_factor, type: FLOAT64, values: [2.0]}
        - {name: add_offset, type: FLOAT64, values: [1.0]}
        - {name: _FillValue, type: FLOAT64, values: [-999.0]}
    field_values:
      Height: [3, -999, 5]
      Flags: [1, 2, 3]
  - name: Swath_Fill64
    geo_fields:
      - name: Height
        new_name: Height
        number_type: FLOAT64
        dimensions: [{name: GeoTrack, size: 3}]
      - name: Bias
        new_name: Bias
        number_type: FLOAT32
        dimensions: [{name: GeoTrack, size: 3}]
    data_fields:
      - name: radiance
        new_name: radiance
        number_type: FLOAT32
        dimensions: [{name: Track, size: 5}]
    dimension_maps:
      - {geo: GeoTrack, data: Track, offset: 0, increment: 2}
    field_attributes:
      Height:
        - {name: scale_factor, type: FLOAT64, values: [0.5]}
        - {name: add_offset, type: FLOAT64, values: [0.0]}
        - {name: _FillValue, type: FLOAT64, values: [-9999.9]}
      Bias:
        - {name: add_offset, type: FLOAT32, values: [10.0]}
    field_values:
      Height: [3, -9999.9, 5]
      Bias: [20, 30, 40]
"#;

    fn lib() -> MemoryFile {
        MemoryFile::from_yaml_str(SWATH_FILE).unwrap()
    }

    #[test]
    fn test_expand_both_axes() {
        let lib = lib();
        let config = H4Config::default();
        let reader = DimMapFieldReader::new(&lib, &config);
        let req = FieldRequest::swath(lib.path(), "MODIS_SWATH_Type_L1B", "Latitude");
        let data = reader.read(&req).unwrap();

        assert_eq!(data.dims, vec![Dimension::new("Track", 4), Dimension::new("Xtrack", 6)]);
        let FieldValues::Float32(v) = data.values else {
            panic!("expected f32 values");
        };
        assert_eq!(v.len(), 24);
        assert_eq!(&v[..6], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        // row 1 sits halfway between stored rows 0 and 1
        assert_eq!(v[6], 5.0);
        assert_eq!(lib.open_handles(), 0);
    }

    #[test]
    fn test_subset_after_expansion() {
        let lib = lib();
        let config = H4Config::default();
        let reader = DimMapFieldReader::new(&lib, &config);
        let req = FieldRequest::swath(lib.path(), "MODIS_SWATH_Type_L1B", "Latitude")
            .with_slab(Hyperslab::new(vec![0, 1], vec![2, 2], vec![2, 3]));
        let data = reader.read(&req).unwrap();
        assert_eq!(data.values.to_f64(), vec![1.0, 3.0, 5.0, 11.0, 13.0, 15.0]);
    }

    #[test]
    fn test_scale_applied_fill_skipped() {
        let lib = lib();
        let config = H4Config::default();
        let reader = DimMapFieldReader::new(&lib, &config);
        let req = FieldRequest::swath(lib.path(), "Swath_Scaled", "Height").with_so_type(SoType::ModisMulScale);
        let data = reader.read(&req).unwrap();

        // MUL with scale 2 above 1 reclassifies to DIV: (x - 1) / 2
        let v = data.values.to_f64();
        assert_eq!(v.len(), 5);
        assert_eq!(v[0], 1.0);
        assert_eq!(v[2], -999.0);
        assert_eq!(v[4], 2.0);
    }

    #[test]
    fn test_f64_fill_cells_are_not_scaled() {
        let lib = lib();
        let config = H4Config::default();
        let reader = DimMapFieldReader::new(&lib, &config);
        let req = FieldRequest::swath(lib.path(), "Swath_Fill64", "Height").with_so_type(SoType::ModisMulScale);
        let data = reader.read(&req).unwrap();

        let FieldValues::Float64(v) = data.values else {
            panic!("expected f64 values");
        };
        assert_eq!(v.len(), 5);
        assert_eq!(v[0], 1.5);
        assert_eq!(v[2], -9999.9);
        assert_eq!(v[4], 2.5);
    }

    #[test]
    fn test_offset_alone_is_applied_without_fill() {
        let lib = lib();
        let config = H4Config::default();
        let reader = DimMapFieldReader::new(&lib, &config);
        let req = FieldRequest::swath(lib.path(), "Swath_Fill64", "Bias").with_so_type(SoType::ModisMulScale);
        let data = reader.read(&req).unwrap();

        // scale defaults to 1: 1 * (x - 10)
        assert_eq!(data.values.to_f64(), vec![10.0, 15.0, 20.0, 25.0, 30.0]);
    }

    #[test]
    fn test_disabled_computation_reads_raw() {
        let lib = lib();
        let config = H4Config {
            disable_scale_offset_comp: true,
            ..Default::default()
        };
        let reader = DimMapFieldReader::new(&lib, &config);
        let req = FieldRequest::swath(lib.path(), "Swath_Scaled", "Height").with_so_type(SoType::ModisMulScale);
        let data = reader.read(&req).unwrap();
        assert_eq!(data.values.to_f64()[0], 3.0);
    }

    #[test]
    fn test_default_convention_reads_raw() {
        let lib = lib();
        let config = H4Config::default();
        let reader = DimMapFieldReader::new(&lib, &config);
        let req = FieldRequest::swath(lib.path(), "Swath_Scaled", "Height")
            .with_maps(Vec::new());
        let data = reader.read(&req).unwrap();
        assert_eq!(data.values.to_f64(), vec![3.0, -999.0, 5.0]);
        assert_eq!(data.dims[0].name, "GeoTrack");
    }

    #[test]
    fn test_l1b_band_rejected() {
        let lib = lib();
        let config = H4Config::default();
        let reader = DimMapFieldReader::new(&lib, &config);
        let req = FieldRequest::swath(lib.path(), "MODIS_SWATH_Type_L1B", "EV_1KM_Emissive")
            .with_so_type(SoType::ModisMulScale);
        assert!(matches!(reader.read(&req), Err(H4Error::InvalidInput(_))));
        assert_eq!(lib.open_handles(), 0);
    }

    #[test]
    fn test_integer_field_unsupported() {
        let lib = lib();
        let config = H4Config::default();
        let reader = DimMapFieldReader::new(&lib, &config);
        let req = FieldRequest::swath(lib.path(), "Swath_Scaled", "Flags");
        assert!(matches!(reader.read(&req), Err(H4Error::UnsupportedType(_))));
        assert_eq!(lib.open_handles(), 0);
    }

    #[test]
    fn test_api_selection() {
        let lib = lib();
        let config = H4Config::default();
        let reader = DimMapFieldReader::new(&lib, &config);
        let mut req = FieldRequest::swath(lib.path(), "Swath_Scaled", "Height");
        req.grid_name = "Grid";
        assert!(reader.read(&req).is_err());
        assert_eq!(lib.open_handles(), 0);
    }

    #[test]
    fn test_passed_file_id_is_kept_open() {
        let lib = lib();
        let config = H4Config {
            enable_pass_file_id: true,
            ..Default::default()
        };
        let id = lib.sw_open(lib.path()).unwrap();
        let reader = DimMapFieldReader::new(&lib, &config);
        let mut req = FieldRequest::swath(lib.path(), "Swath_Scaled", "Height");
        req.file_id = Some(id);
        reader.read(&req).unwrap();
        assert_eq!(lib.open_handles(), 1);
        lib.sw_close(id).unwrap();
    }
}
