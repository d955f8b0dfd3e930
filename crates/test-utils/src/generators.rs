//! Generators for synthetic geolocation and data arrays.
//!
//! Geolocation built from a plane `origin + row * row_step + col * col_step`
//! survives dimension-map expansion unchanged: linear interpolation and
//! extrapolation of a plane give back the plane. That makes the expected
//! dense array easy to compute for any offset and increment.

use h4_common::DimensionMap;

/// A geolocation plane over data-resolution cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearGeo {
    pub origin: f64,
    pub row_step: f64,
    pub col_step: f64,
}

impl LinearGeo {
    pub fn new(origin: f64, row_step: f64, col_step: f64) -> Self {
        Self {
            origin,
            row_step,
            col_step,
        }
    }

    /// Value at data cell (`row`, `col`).
    pub fn value(&self, row: f64, col: f64) -> f64 {
        self.origin + row * self.row_step + col * self.col_step
    }

    /// Row-major sparse samples taken at `offset + i * increment` on each axis.
    pub fn sparse(&self, rows: usize, cols: usize, row_map: (i32, i32), col_map: (i32, i32)) -> Vec<f64> {
        let mut out = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            let row = (row_map.0 + i as i32 * row_map.1) as f64;
            for k in 0..cols {
                let col = (col_map.0 + k as i32 * col_map.1) as f64;
                out.push(self.value(row, col));
            }
        }
        out
    }

    /// Row-major values over every data cell.
    pub fn dense(&self, rows: usize, cols: usize) -> Vec<f64> {
        (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (r, c)))
            .map(|(r, c)| self.value(r as f64, c as f64))
            .collect()
    }
}

/// Dimension maps for a geo field `(geo_track, geo_xtrack)` sampled on
/// `(data_track, data_xtrack)`.
pub fn dimension_maps(row_map: (i32, i32), col_map: (i32, i32)) -> Vec<DimensionMap> {
    vec![
        DimensionMap::new("GeoTrack", "DataTrack", row_map.0, row_map.1),
        DimensionMap::new("GeoXtrack", "DataXtrack", col_map.0, col_map.1),
    ]
}

/// `start, start + step, ...` with `n` elements.
pub fn ramp(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Replace every `every`-th value (starting at index 0) with `fill`.
pub fn with_fill_every(mut values: Vec<f64>, fill: f64, every: usize) -> Vec<f64> {
    if every == 0 {
        return values;
    }
    for v in values.iter_mut().step_by(every) {
        *v = fill;
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_samples_plane() {
        let geo = LinearGeo::new(10.0, 1.0, 0.5);
        let sparse = geo.sparse(2, 3, (0, 2), (1, 2));
        assert_eq!(sparse.len(), 6);
        assert_eq!(sparse[0], geo.value(0.0, 1.0));
        assert_eq!(sparse[5], geo.value(2.0, 5.0));
    }

    #[test]
    fn test_dense_size() {
        let geo = LinearGeo::new(0.0, 1.0, 1.0);
        let dense = geo.dense(4, 6);
        assert_eq!(dense.len(), 24);
        assert_eq!(dense[23], 8.0);
    }

    #[test]
    fn test_fill_every() {
        let v = with_fill_every(ramp(0.0, 1.0, 5), -999.0, 2);
        assert_eq!(v, vec![-999.0, 1.0, -999.0, 3.0, -999.0]);
    }
}
