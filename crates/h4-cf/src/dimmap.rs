//! Dimension-map geolocation interpolation.
//!
//! Swath geolocation is often stored at a coarser resolution than the data
//! and tied to it by a dimension map: geolocation cell `i` sits at data cell
//! `offset + i * increment`. Expanding a field to the data resolution fills
//! the cells in between by linear interpolation along each mapped axis.
//!
//! ```text
//!   sparse  v0 ─────────── v1 ─────────── v2
//!   dense   j0  .  .  .  . j5  .  .  .  . j10  j11 (extrapolated)
//! ```

use std::collections::HashMap;

use h4_common::{Dimension, DimensionMap, H4Error, H4Result};
use num_traits::Float;

/// Expand axis `axis` of a row-major array to `dense` cells.
///
/// Returns the new array and its shape. Aligned cells copy the sparse sample
/// exactly; the others interpolate between the two bracketing samples, and
/// past either end the outermost pair is extended.
pub fn expand_axis<T: Float>(
    data: &[T],
    shape: &[usize],
    axis: usize,
    offset: i32,
    increment: i32,
    dense: usize,
) -> H4Result<(Vec<T>, Vec<usize>)> {
    if shape.len() > 2 {
        return Err(H4Error::UnsupportedRank(shape.len()));
    }
    if axis >= shape.len() {
        return Err(H4Error::invalid_input(format!(
            "axis {axis} is outside a rank-{} field",
            shape.len()
        )));
    }
    if increment == 0 {
        return Err(H4Error::malformed("increment", "dimension map increment is zero"));
    }
    let expected: usize = shape.iter().product();
    if data.len() != expected {
        return Err(H4Error::invalid_input(format!(
            "{} values do not fill a {shape:?} field",
            data.len()
        )));
    }

    let n = shape[axis];
    if n == 0 {
        return Err(H4Error::invalid_input("cannot expand an empty axis"));
    }
    let outer: usize = shape[..axis].iter().product();
    let inner: usize = shape[axis + 1..].iter().product();

    let mut out = vec![T::zero(); outer * dense * inner];
    for o in 0..outer {
        for k in 0..inner {
            let sample = |i: usize| data[(o * n + i) * inner + k];
            for j in 0..dense {
                out[(o * dense + j) * inner + k] =
                    interpolate(j as i64, n, offset as i64, increment as i64, &sample);
            }
        }
    }

    let mut new_shape = shape.to_vec();
    new_shape[axis] = dense;
    Ok((out, new_shape))
}

fn interpolate<T: Float>(j: i64, n: usize, offset: i64, inc: i64, v: &impl Fn(usize) -> T) -> T {
    // truncating division, as in C
    let i = (j - offset) / inc;
    if i * inc + offset == j && i >= 0 && (i as usize) < n {
        return v(i as usize);
    }
    if n < 2 {
        return v(0);
    }

    let (i1, i2) = if i <= 0 {
        (0, 1)
    } else if i as usize + 1 >= n {
        (n - 2, n - 1)
    } else {
        (i as usize, i as usize + 1)
    };
    let j1 = i1 as i64 * inc + offset;
    let j2 = i2 as i64 * inc + offset;

    let cast = |x: i64| T::from(x).unwrap_or_else(T::zero);
    (cast(j - j1) * v(i2) + cast(j2 - j) * v(i1)) / cast(j2 - j1)
}

/// Expand every mapped axis of a field to its data dimension.
///
/// `dims` is updated to the data dimension names and sizes. Axes whose
/// dimension has no map are left alone.
pub fn expand_dimmap<T: Float>(
    data: Vec<T>,
    dims: &mut [Dimension],
    maps: &[DimensionMap],
    dense_sizes: &HashMap<String, usize>,
) -> H4Result<Vec<T>> {
    let mut data = data;
    for axis in 0..dims.len() {
        let Some(map) = maps.iter().find(|m| m.geo == dims[axis].name) else {
            continue;
        };
        let dense = *dense_sizes.get(&map.data).ok_or_else(|| {
            H4Error::invalid_input(format!("no size for data dimension '{}'", map.data))
        })?;
        let shape: Vec<usize> = dims.iter().map(|d| d.size).collect();
        let (expanded, _) = expand_axis(&data, &shape, axis, map.offset, map.increment, dense)?;
        data = expanded;
        dims[axis] = Dimension::new(map.data.clone(), dense);
    }
    Ok(data)
}

/// Row-major flat index of `pos` in an array of shape `dims`.
pub fn flat_index(dims: &[usize], pos: &[usize]) -> usize {
    pos.iter()
        .enumerate()
        .map(|(k, p)| p * dims[k + 1..].iter().product::<usize>())
        .sum()
}

/// Strided hyperslab of a rank-1 or rank-2 array.
pub fn subset<T: Copy>(
    data: &[T],
    shape: &[usize],
    offset: &[usize],
    step: &[usize],
    count: &[usize],
) -> H4Result<Vec<T>> {
    let rank = shape.len();
    if rank == 0 || rank > 2 {
        return Err(H4Error::UnsupportedRank(rank));
    }
    if offset.len() != rank || step.len() != rank || count.len() != rank {
        return Err(H4Error::invalid_input(format!(
            "constraint rank does not match field rank {rank}"
        )));
    }
    for k in 0..rank {
        if step[k] == 0 {
            return Err(H4Error::invalid_input(format!("step of axis {k} is zero")));
        }
        if count[k] == 0 {
            continue;
        }
        let last = (count[k] - 1)
            .checked_mul(step[k])
            .and_then(|span| span.checked_add(offset[k]));
        if last.map_or(true, |last| last >= shape[k]) {
            return Err(H4Error::invalid_input(format!(
                "axis {k}: offset {} step {} count {} exceeds size {}",
                offset[k], step[k], count[k], shape[k]
            )));
        }
    }

    let mut out = Vec::with_capacity(count.iter().product());
    if rank == 1 {
        for i in 0..count[0] {
            out.push(data[offset[0] + i * step[0]]);
        }
    } else {
        for i in 0..count[0] {
            for j in 0..count[1] {
                let pos = [offset[0] + i * step[0], offset[1] + j * step[1]];
                out.push(data[flat_index(shape, &pos)]);
            }
        }
    }
    Ok(out)
}

/// Parse the `geo/data,geo/data` list returned by the map inquiry.
pub fn parse_dimension_maps(names: &str, offsets: &[i32], increments: &[i32]) -> H4Result<Vec<DimensionMap>> {
    let entries: Vec<&str> = names.split(',').collect();
    if entries.len() != offsets.len() || entries.len() != increments.len() {
        return Err(H4Error::malformed(
            "dimension maps",
            format!(
                "{} map names but {} offsets and {} increments",
                entries.len(),
                offsets.len(),
                increments.len()
            ),
        ));
    }
    entries
        .iter()
        .zip(offsets.iter().zip(increments.iter()))
        .map(|(entry, (&offset, &increment))| {
            let parts: Vec<&str> = entry.split('/').collect();
            if parts.len() != 2 {
                return Err(H4Error::malformed(
                    "dimension maps",
                    format!("'{entry}' is not of the form geo/data"),
                ));
            }
            Ok(DimensionMap::new(parts[0], parts[1], offset, increment))
        })
        .collect()
}

/// Name prefix of the MOD03/MYD03 geolocation file that goes with a MODIS
/// granule, e.g. `MOD03.A2010001.1200` for `MOD021KM.A2010001.1200.005.hdf`.
///
/// Returns `None` for a file that is itself a geolocation file.
pub fn modis_geofile_prefix(base_name: &str) -> Option<String> {
    if is_modis_geofile(base_name) {
        return None;
    }
    let platform = if base_name.starts_with("MOD") {
        "MOD03"
    } else if base_name.starts_with("MYD") {
        "MYD03"
    } else {
        return None;
    };
    let start = base_name.find(".A")?;
    let middle = base_name.get(start..start + 14)?;
    Some(format!("{platform}{middle}"))
}

pub fn is_modis_geofile(base_name: &str) -> bool {
    base_name.len() > 5 && (base_name.starts_with("MOD03") || base_name.starts_with("MYD03"))
}

/// Non-lat/lon geolocation fields that a MODIS geolocation file can supply,
/// returned under their name in that file.
pub fn is_modis_dimmap_nonll_field(field_name: &str) -> Option<&'static str> {
    const SAME: [&str; 10] = [
        "Height",
        "SensorZenith",
        "SensorAzimuth",
        "Range",
        "SolarZenith",
        "SolarAzimuth",
        "Land/SeaMask",
        "gflags",
        "Sensor_Azimuth",
        "Sensor_Zenith",
    ];
    match field_name {
        "Solar_Zenith" => Some("SolarZenith"),
        "Solar_Azimuth" => Some("SolarAzimuth"),
        "Sensor_Zenith" => Some("SensorZenith"),
        other => SAME.iter().find(|&&n| n == other).copied(),
    }
}
