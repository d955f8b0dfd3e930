//! CF grid mapping for HDF-EOS2 grids in the sinusoidal projection.
//!
//! Such grids get 1-D projection coordinates along their two horizontal
//! dimensions and a dummy `<grid>_eos_cf_projection` variable that data
//! fields reference through `grid_mapping`.

use h4_common::{CfType, Das, Dds, DdsVariable, EosDataset, FieldType, H4Error, H4Result, ProjectionCode};

use crate::naming::to_cf_name;

const PROJECTION_SUFFIX: &str = "eos_cf_projection";
const EARTH_RADIUS: &str = "6371007.181";

/// The y (`dim0`) and x (`dim1`) dimensions shared by latitude and longitude.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatLonDims {
    pub dim0: (String, usize),
    pub dim1: (String, usize),
}

/// Name of the dummy projection variable of a grid.
pub fn projection_var_name(grid: &str) -> String {
    format!("{}_{PROJECTION_SUFFIX}", to_cf_name(grid))
}

/// Horizontal dimensions, from the first 2-D latitude or longitude field.
///
/// 1-D latitude gives `dim0` and 1-D longitude gives `dim1`; the search
/// keeps going until both are known or a 2-D field settles it.
pub fn latlon_dims(grid: &EosDataset) -> H4Result<LatLonDims> {
    let mut dim0: Option<(String, usize)> = None;
    let mut dim1: Option<(String, usize)> = None;

    for field in grid.data_fields.iter().filter(|f| f.field_type.is_lat_lon()) {
        let dims = &field.dimensions;
        match dims.len() {
            2 => {
                let (y, x) = if field.ydim_major { (&dims[0], &dims[1]) } else { (&dims[1], &dims[0]) };
                dim0 = Some((y.name.clone(), y.size));
                dim1 = Some((x.name.clone(), x.size));
                break;
            }
            1 if field.field_type == FieldType::Latitude => {
                dim0 = Some((dims[0].name.clone(), dims[0].size));
            }
            1 => dim1 = Some((dims[0].name.clone(), dims[0].size)),
            _ => {}
        }
    }

    match (dim0, dim1) {
        (Some(dim0), Some(dim1)) => Ok(LatLonDims { dim0, dim1 }),
        _ => Err(H4Error::invalid_input(format!(
            "cannot find latitude/longitude dimensions of grid '{}'",
            grid.name
        ))),
    }
}

/// Attributes of the projection coordinates, the projection variable and
/// the `grid_mapping` of every data field on the grid.
pub fn add_cf_grid_cv_attrs(das: &mut Das, grid: &EosDataset) -> H4Result<()> {
    if grid.projection.code != ProjectionCode::Sinusoidal {
        return Ok(());
    }
    let dims = latlon_dims(grid)?;

    for (dim, axis, axis_type) in [(&dims.dim0, "y", "GeoY"), (&dims.dim1, "x", "GeoX")] {
        let table = das.get_or_create(&dim.0);
        table.append_attr("standard_name", CfType::String, format!("projection_{axis}_coordinate"))?;
        table.append_attr(
            "long_name",
            CfType::String,
            format!("{axis} coordinate of projection for grid {}", grid.name),
        )?;
        table.append_attr("units", CfType::String, "meter")?;
        table.append_attr("_CoordinateAxisType", CfType::String, axis_type)?;
    }

    let projection = projection_var_name(&grid.name);
    let table = das.get_or_create(&projection);
    table.append_attr("grid_mapping_name", CfType::String, "sinusoidal")?;
    table.append_attr("longitude_of_central_meridian", CfType::Float64, "0.0")?;
    table.append_attr("earth_radius", CfType::Float64, EARTH_RADIUS)?;
    table.append_attr("_CoordinateAxisTypes", CfType::String, "GeoX GeoY")?;

    for field in grid
        .data_fields
        .iter()
        .filter(|f| f.field_type == FieldType::General && f.rank() > 1)
    {
        let spans = |d: &(String, usize)| field.dimensions.iter().any(|fd| fd.name == d.0 && fd.size == d.1);
        if spans(&dims.dim0) && spans(&dims.dim1) {
            das.get_or_create(&field.new_name)
                .append_attr("grid_mapping", CfType::String, projection.as_str())?;
        }
    }
    Ok(())
}

/// The two Float64 projection coordinates and the projection variable.
pub fn add_cf_grid_cvs(dds: &mut Dds, grid: &EosDataset) -> H4Result<()> {
    if grid.projection.code != ProjectionCode::Sinusoidal {
        return Ok(());
    }
    let dims = latlon_dims(grid)?;
    for (name, size) in [&dims.dim0, &dims.dim1] {
        dds.add_variable(DdsVariable::new(name.as_str(), CfType::Float64).with_dim(*size, name.as_str()));
    }
    dds.add_variable(DdsVariable::new(projection_var_name(&grid.name), CfType::Byte));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use h4_common::{EosKind, FieldDescriptor, GridProjection, NumberType};

    fn modis_grid() -> EosDataset {
        let mut grid = EosDataset::new(EosKind::Grid, "MOD_Grid_250m 500m");
        grid.projection = GridProjection {
            code: ProjectionCode::Sinusoidal,
            upleft: [-20015109.354, 1111950.519667],
            lowright: [-18903158.834333, 0.0],
        };
        grid.data_fields = vec![
            FieldDescriptor::new("Latitude", NumberType::Float64)
                .with_field_type(FieldType::Latitude)
                .with_dim("YDim", 2400)
                .with_dim("XDim", 2400),
            FieldDescriptor::new("Longitude", NumberType::Float64)
                .with_field_type(FieldType::Longitude)
                .with_dim("YDim", 2400)
                .with_dim("XDim", 2400),
            FieldDescriptor::new("sur_refl_b01", NumberType::Int16)
                .with_dim("YDim", 2400)
                .with_dim("XDim", 2400),
            FieldDescriptor::new("num_obs", NumberType::Int8).with_dim("XDim", 2400),
        ];
        grid
    }

    #[test]
    fn test_sinusoidal_attrs() {
        let mut das = Das::new();
        add_cf_grid_cv_attrs(&mut das, &modis_grid()).unwrap();

        let y = das.get_table("YDim").unwrap();
        assert_eq!(y.first_value("standard_name"), Some("projection_y_coordinate"));
        assert_eq!(y.first_value("long_name"), Some("y coordinate of projection for grid MOD_Grid_250m 500m"));
        assert_eq!(das.get_table("XDim").unwrap().first_value("_CoordinateAxisType"), Some("GeoX"));

        let proj = das.get_table("MOD_Grid_250m_500m_eos_cf_projection").unwrap();
        assert_eq!(proj.first_value("earth_radius"), Some("6371007.181"));
        assert_eq!(proj.attr_type("longitude_of_central_meridian"), Some(CfType::Float64));

        assert_eq!(
            das.get_table("sur_refl_b01").unwrap().first_value("grid_mapping"),
            Some("MOD_Grid_250m_500m_eos_cf_projection")
        );
        assert!(das.get_table("num_obs").is_none());
    }

    #[test]
    fn test_xdim_major_swaps() {
        let mut grid = modis_grid();
        grid.data_fields[0].ydim_major = false;
        let dims = latlon_dims(&grid).unwrap();
        assert_eq!(dims.dim0.0, "XDim");
        assert_eq!(dims.dim1.0, "YDim");
    }

    #[test]
    fn test_dds_variables() {
        let mut dds = Dds::new();
        add_cf_grid_cvs(&mut dds, &modis_grid()).unwrap();
        assert_eq!(dds.len(), 3);
        assert_eq!(dds.find("YDim").unwrap().cf_type, CfType::Float64);
        assert_eq!(dds.find("MOD_Grid_250m_500m_eos_cf_projection").unwrap().rank(), 0);
    }

    #[test]
    fn test_geographic_untouched_and_missing_dims() {
        let mut grid = modis_grid();
        grid.projection.code = ProjectionCode::Geographic;
        let mut das = Das::new();
        add_cf_grid_cv_attrs(&mut das, &grid).unwrap();
        assert!(das.is_empty());

        let mut grid = modis_grid();
        grid.data_fields.retain(|f| !f.field_type.is_lat_lon());
        assert!(add_cf_grid_cv_attrs(&mut das, &grid).is_err());
    }
}
