//! Pairwise evaluation over coordinate collections.
//!
//! A call takes one or two collections. With one collection the map compares
//! it with itself; with two, rows come from the first and columns from the
//! second. Every input is validated before any cell is computed, and the
//! method is resolved to a concrete model once per call rather than per cell.

pub mod filter;

use ndarray::{Array1, Array2};
use tracing::debug;

use crate::chunk::scheduler::{self, ExecutionOptions};
use crate::coord::{validate_all, Coordinate};
use crate::error::{GeoError, Result};
use crate::method::{
    normalize_bearing, CalculationMethod, Cartesian, GeodesicModel, Haversine, Vincenty,
};
use crate::settings::CalculationSettings;

pub use filter::{
    indices_within_distance, indices_within_distance_from_point, within_distance_from_point,
    within_distance_map,
};

/// Distances in km; `[i, j]` is row point `i` to column point `j`.
pub type DistanceMatrix = Array2<f64>;

/// Row and column collections for a batch call, or `None` for zero
/// collections. All coordinates are validated.
pub(crate) fn resolve_collections<'a>(
    collections: &[&'a [Coordinate]],
) -> Result<Option<(&'a [Coordinate], &'a [Coordinate])>> {
    let pair = match *collections {
        [] => return Ok(None),
        [only] => (only, only),
        [rows, cols] => (rows, cols),
        _ => return Err(GeoError::InvalidCollections(collections.len())),
    };
    for c in collections {
        validate_all(c)?;
    }
    Ok(Some(pair))
}

/// Pairwise distance map.
///
/// Shape is `(rows.len(), cols.len())`; zero collections give a `(0, 0)` map.
/// With one collection the diagonal is exactly 0 and the map is exactly
/// symmetric. The result does not depend on `options`.
pub fn distance_map(
    collections: &[&[Coordinate]],
    method: CalculationMethod,
    settings: &CalculationSettings,
    options: &ExecutionOptions,
) -> Result<DistanceMatrix> {
    settings.validate()?;
    let Some((rows, cols)) = resolve_collections(collections)? else {
        return Ok(Array2::zeros((0, 0)));
    };
    debug!(
        method = method.name(),
        rows = rows.len(),
        cols = cols.len(),
        "computing distance map"
    );

    let values = match method {
        CalculationMethod::Haversine => pairwise::<Haversine>(rows, cols, settings, options)?,
        CalculationMethod::Vincenty => pairwise::<Vincenty>(rows, cols, settings, options)?,
        CalculationMethod::Cartesian => pairwise::<Cartesian>(rows, cols, settings, options)?,
    };
    Ok(Array2::from_shape_vec((rows.len(), cols.len()), values)?)
}

fn pairwise<M: GeodesicModel>(
    rows: &[Coordinate],
    cols: &[Coordinate],
    settings: &CalculationSettings,
    options: &ExecutionOptions,
) -> Result<Vec<f64>> {
    scheduler::evaluate_rows(rows.len(), cols.len(), options, |i, j| {
        M::distance(&rows[i], &cols[j], settings)
    })
}

/// Distance from one point to every point of a collection.
pub fn distance_from_point(
    point: &Coordinate,
    collection: &[Coordinate],
    method: CalculationMethod,
    settings: &CalculationSettings,
    options: &ExecutionOptions,
) -> Result<Array1<f64>> {
    let map = distance_map(
        &[collection, std::slice::from_ref(point)],
        method,
        settings,
        options,
    )?;
    Ok(map.column(0).to_owned())
}

/// Apply the same offset to every point of a collection, in order.
pub fn offset_many(
    starts: &[Coordinate],
    distance: f64,
    bearing: f64,
    method: CalculationMethod,
    settings: &CalculationSettings,
) -> Result<Vec<Coordinate>> {
    // Fail on bad scalars even when the collection is empty.
    settings.validate()?;
    normalize_bearing(bearing)?;
    if !distance.is_finite() {
        return Err(GeoError::NonFiniteInput(format!("distance {distance}")));
    }
    validate_all(starts)?;

    starts
        .iter()
        .map(|s| method.offset(s, distance, bearing, settings))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const ALL: [CalculationMethod; 3] = [
        CalculationMethod::Haversine,
        CalculationMethod::Vincenty,
        CalculationMethod::Cartesian,
    ];

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    /// Points inside a 120° longitude band, so no pair is near-antipodal.
    fn regional_points(seed: u64, n: usize) -> Vec<Coordinate> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| c(rng.gen_range(-80.0..=80.0), rng.gen_range(-60.0..=60.0)))
            .collect()
    }

    fn seq() -> ExecutionOptions {
        ExecutionOptions::sequential()
    }

    #[test]
    fn test_zero_collections() {
        let s = CalculationSettings::default();
        let m = distance_map(&[], CalculationMethod::Haversine, &s, &seq()).unwrap();
        assert_eq!(m.dim(), (0, 0));
    }

    #[test]
    fn test_empty_collections() {
        let s = CalculationSettings::default();
        let pts = regional_points(1, 3);

        let m = distance_map(&[&[]], CalculationMethod::Haversine, &s, &seq()).unwrap();
        assert_eq!(m.dim(), (0, 0));
        let m = distance_map(&[&pts, &[]], CalculationMethod::Haversine, &s, &seq()).unwrap();
        assert_eq!(m.dim(), (3, 0));
        let m = distance_map(&[&[], &pts], CalculationMethod::Haversine, &s, &seq()).unwrap();
        assert_eq!(m.dim(), (0, 3));
    }

    #[test]
    fn test_too_many_collections() {
        let s = CalculationSettings::default();
        let pts = regional_points(1, 2);
        let err = distance_map(&[&pts, &pts, &pts], CalculationMethod::Haversine, &s, &seq())
            .unwrap_err();
        assert!(matches!(err, GeoError::InvalidCollections(3)));
    }

    #[test]
    fn test_single_point_map() {
        let s = CalculationSettings::default();
        for m in ALL {
            let map = distance_map(&[&[c(45.0, 7.0)]], m, &s, &seq()).unwrap();
            assert_eq!(map.dim(), (1, 1));
            assert_eq!(map[[0, 0]], 0.0);
        }
    }

    #[test]
    fn test_self_map_symmetric_with_zero_diagonal() {
        let s = CalculationSettings::default();
        let pts = regional_points(3, 40);
        for m in ALL {
            let map = distance_map(&[&pts], m, &s, &seq()).unwrap();
            assert_eq!(map.dim(), (40, 40));
            for i in 0..40 {
                assert_eq!(map[[i, i]], 0.0);
                for j in 0..40 {
                    assert_eq!(map[[i, j]].to_bits(), map[[j, i]].to_bits());
                }
            }
        }
    }

    #[test]
    fn test_cross_map_orientation() {
        let s = CalculationSettings::default();
        let rows = vec![c(0.0, 0.0), c(10.0, 10.0)];
        let cols = vec![c(0.0, 1.0), c(0.0, 2.0), c(-5.0, 3.0)];
        for m in ALL {
            let map = distance_map(&[&rows, &cols], m, &s, &seq()).unwrap();
            assert_eq!(map.dim(), (2, 3));
            for (i, a) in rows.iter().enumerate() {
                for (j, b) in cols.iter().enumerate() {
                    assert_eq!(map[[i, j]], m.distance(a, b, &s).unwrap());
                }
            }
        }
    }

    #[test]
    fn test_threaded_is_bit_identical() {
        let s = CalculationSettings::default();
        let rows = regional_points(10, 90);
        let cols = regional_points(11, 70);
        for m in ALL {
            let expected = distance_map(&[&rows, &cols], m, &s, &seq()).unwrap();
            for k in [1, 2, 4, 8] {
                let got = distance_map(&[&rows, &cols], m, &s, &ExecutionOptions::threaded(k))
                    .unwrap();
                assert_eq!(got, expected, "{m:?} with {k} workers");
            }
        }
    }

    #[test]
    fn test_invalid_coordinate_rejected_before_work() {
        let s = CalculationSettings::default();
        let good = regional_points(4, 5);
        let bad = vec![c(0.0, 0.0), Coordinate { lat: 0.0, lon: 200.0 }];
        let err = distance_map(&[&good, &bad], CalculationMethod::Haversine, &s, &seq())
            .unwrap_err();
        assert!(matches!(err, GeoError::InvalidCoordinate { .. }));
    }

    #[test]
    fn test_convergence_failure_propagates() {
        let s = CalculationSettings {
            max_iterations: 1,
            ..Default::default()
        };
        let pts = vec![c(10.0, 10.0), c(20.0, 20.0)];
        let err = distance_map(&[&pts], CalculationMethod::Vincenty, &s, &seq()).unwrap_err();
        assert!(matches!(err, GeoError::Convergence { .. }));

        let many = regional_points(12, 80);
        let forced = ExecutionOptions {
            min_parallel_cells: 0,
            ..ExecutionOptions::threaded(4)
        };
        let err = distance_map(&[&many], CalculationMethod::Vincenty, &s, &forced).unwrap_err();
        assert!(matches!(err.root_cause(), GeoError::Convergence { .. }));
    }

    #[test]
    fn test_distance_from_point() {
        let s = CalculationSettings::default();
        let pts = regional_points(6, 25);
        let origin = c(1.0, 2.0);
        let d = distance_from_point(&origin, &pts, CalculationMethod::Haversine, &s, &seq())
            .unwrap();
        assert_eq!(d.len(), 25);
        for (got, p) in d.iter().zip(&pts) {
            assert_eq!(*got, CalculationMethod::Haversine.distance(p, &origin, &s).unwrap());
        }
    }

    #[test]
    fn test_offset_many() {
        let s = CalculationSettings::default();
        let starts = vec![c(0.0, 0.0), c(0.0, 10.0)];
        let out = offset_many(&starts, s.km_per_degree(), 90.0, CalculationMethod::Haversine, &s)
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[0].lon, 1.0, epsilon = 1e-9);
        assert_relative_eq!(out[1].lon, 11.0, epsilon = 1e-9);

        assert!(offset_many(&[], f64::NAN, 0.0, CalculationMethod::Haversine, &s).is_err());
    }
}
