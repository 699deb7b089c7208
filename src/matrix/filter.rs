//! Threshold maps.
//!
//! Each model supplies a cheap lower bound on its distance. A pair whose bound
//! already exceeds the threshold (plus a small margin for rounding) is false
//! without evaluating the model; every other pair is decided by the exact
//! `distance <= threshold`. The prefilter only ever skips pairs the exact test
//! would reject, so the map equals `distance_map(..) <= threshold`.
//!
//! The `indices_*` variants return, per row, the column indices that passed.

use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array1, Array2, ArrayView1};
use tracing::{debug, enabled, Level};

use crate::chunk::scheduler::{self, ExecutionOptions};
use crate::coord::Coordinate;
use crate::error::Result;
use crate::method::{check_threshold, CalculationMethod, Cartesian, GeodesicModel, Haversine, Vincenty};
use crate::settings::CalculationSettings;

use super::resolve_collections;

/// Relative and absolute slack added to the threshold before trusting a bound.
const BOUND_MARGIN: f64 = 1e-9;

pub type WithinDistanceMatrix = Array2<bool>;

/// Boolean map of `distance(row, col) <= threshold`.
///
/// Same shapes and collection rules as [`distance_map`](super::distance_map).
/// A negative threshold gives an all-false map and `+inf` an all-true one.
/// A NaN threshold is rejected. A model failure in a pair the bound rules out
/// is never observed.
pub fn within_distance_map(
    collections: &[&[Coordinate]],
    threshold: f64,
    method: CalculationMethod,
    settings: &CalculationSettings,
    options: &ExecutionOptions,
) -> Result<WithinDistanceMatrix> {
    check_threshold(threshold)?;
    settings.validate()?;
    let Some((rows, cols)) = resolve_collections(collections)? else {
        return Ok(Array2::from_elem((0, 0), false));
    };

    let values = match method {
        CalculationMethod::Haversine => {
            pairwise_within::<Haversine>(rows, cols, threshold, settings, options)?
        }
        CalculationMethod::Vincenty => {
            pairwise_within::<Vincenty>(rows, cols, threshold, settings, options)?
        }
        CalculationMethod::Cartesian => {
            pairwise_within::<Cartesian>(rows, cols, threshold, settings, options)?
        }
    };
    Ok(Array2::from_shape_vec((rows.len(), cols.len()), values)?)
}

fn pairwise_within<M: GeodesicModel>(
    rows: &[Coordinate],
    cols: &[Coordinate],
    threshold: f64,
    settings: &CalculationSettings,
    options: &ExecutionOptions,
) -> Result<Vec<bool>> {
    let cutoff = threshold + threshold.abs() * BOUND_MARGIN + BOUND_MARGIN;
    // Skips are only counted for the debug log.
    let count_skips = enabled!(Level::DEBUG);
    let skipped = AtomicUsize::new(0);

    let values = scheduler::evaluate_rows(rows.len(), cols.len(), options, |i, j| {
        let (a, b) = (&rows[i], &cols[j]);
        if M::lower_bound(a, b, settings) > cutoff {
            if count_skips {
                skipped.fetch_add(1, Ordering::Relaxed);
            }
            return Ok(false);
        }
        M::within_distance(a, b, threshold, settings)
    })?;

    if count_skips {
        debug!(
            threshold,
            cells = values.len(),
            skipped = skipped.load(Ordering::Relaxed),
            "threshold map complete"
        );
    }
    Ok(values)
}

/// Whether each point of `collection` lies within `threshold` km of `point`.
pub fn within_distance_from_point(
    point: &Coordinate,
    collection: &[Coordinate],
    threshold: f64,
    method: CalculationMethod,
    settings: &CalculationSettings,
    options: &ExecutionOptions,
) -> Result<Array1<bool>> {
    let map = within_distance_map(
        &[collection, std::slice::from_ref(point)],
        threshold,
        method,
        settings,
        options,
    )?;
    Ok(map.column(0).to_owned())
}

fn retained_indices(row: ArrayView1<'_, bool>) -> Vec<usize> {
    row.iter()
        .enumerate()
        .filter_map(|(j, &inside)| inside.then_some(j))
        .collect()
}

/// For each row, the column indices within `threshold` km, ascending.
///
/// Same collection rules as [`within_distance_map`]; zero collections give an
/// empty list and a row with no match gives an empty entry.
pub fn indices_within_distance(
    collections: &[&[Coordinate]],
    threshold: f64,
    method: CalculationMethod,
    settings: &CalculationSettings,
    options: &ExecutionOptions,
) -> Result<Vec<Vec<usize>>> {
    let map = within_distance_map(collections, threshold, method, settings, options)?;
    Ok(map.rows().into_iter().map(retained_indices).collect())
}

/// Indices of the points of `collection` within `threshold` km of `point`.
pub fn indices_within_distance_from_point(
    point: &Coordinate,
    collection: &[Coordinate],
    threshold: f64,
    method: CalculationMethod,
    settings: &CalculationSettings,
    options: &ExecutionOptions,
) -> Result<Vec<usize>> {
    let mask =
        within_distance_from_point(point, collection, threshold, method, settings, options)?;
    Ok(retained_indices(mask.view()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeoError;
    use crate::matrix::distance_map;
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

    fn points(seed: u64, n: usize) -> Vec<Coordinate> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pts: Vec<Coordinate> = (0..n)
            .map(|_| c(rng.gen_range(-90.0..=90.0), rng.gen_range(-60.0..=60.0)))
            .collect();
        pts.extend([c(90.0, 0.0), c(-90.0, 45.0), c(89.9, -60.0)]);
        pts
    }

    fn assert_consistent(
        rows: &[Coordinate],
        cols: &[Coordinate],
        threshold: f64,
        method: CalculationMethod,
        options: &ExecutionOptions,
    ) {
        let s = CalculationSettings::default();
        let distances = distance_map(&[rows, cols], method, &s, options).unwrap();
        let within = within_distance_map(&[rows, cols], threshold, method, &s, options).unwrap();
        assert_eq!(within.dim(), distances.dim());
        for ((idx, &inside), &d) in within.indexed_iter().zip(distances.iter()) {
            assert_eq!(inside, d <= threshold, "{method:?} at {idx:?}: d={d} t={threshold}");
        }
    }

    #[test]
    fn test_matches_distance_map() {
        let rows = points(20, 60);
        let cols = points(21, 50);
        for m in ALL {
            for t in [0.0, 10.0, 500.0, 2500.0, 9000.0, 25000.0] {
                assert_consistent(&rows, &cols, t, m, &ExecutionOptions::sequential());
            }
        }
    }

    #[test]
    fn test_matches_distance_map_threaded() {
        let rows = points(30, 90);
        let cols = points(31, 70);
        for m in ALL {
            for k in [2, 4, 8] {
                assert_consistent(&rows, &cols, 1200.0, m, &ExecutionOptions::threaded(k));
            }
        }
    }

    #[test]
    fn test_threshold_at_exact_distance_is_inclusive() {
        let s = CalculationSettings::default();
        let pts = vec![c(0.0, 0.0), c(1.0, 0.0)];
        for m in ALL {
            let d = m.distance(&pts[0], &pts[1], &s).unwrap();
            let map = within_distance_map(&[&pts], d, m, &s, &ExecutionOptions::sequential())
                .unwrap();
            assert!(map.iter().all(|&v| v), "{m:?}");
        }
    }

    #[test]
    fn test_threshold_extremes() {
        let s = CalculationSettings::default();
        let pts = points(40, 10);
        let opts = ExecutionOptions::sequential();
        let none = within_distance_map(&[&pts], -1.0, CalculationMethod::Haversine, &s, &opts)
            .unwrap();
        assert!(none.iter().all(|&v| !v));
        let all = within_distance_map(&[&pts], f64::INFINITY, CalculationMethod::Haversine, &s, &opts)
            .unwrap();
        assert!(all.iter().all(|&v| v));
        assert!(matches!(
            within_distance_map(&[&pts], f64::NAN, CalculationMethod::Haversine, &s, &opts),
            Err(GeoError::NonFiniteInput(_))
        ));
    }

    #[test]
    fn test_zero_collections() {
        let s = CalculationSettings::default();
        let map = within_distance_map(&[], 1.0, CalculationMethod::Cartesian, &s, &ExecutionOptions::sequential())
            .unwrap();
        assert_eq!(map.dim(), (0, 0));
    }

    #[test]
    fn test_bound_skips_unconverging_pair() {
        let s = CalculationSettings {
            max_iterations: 1,
            ..Default::default()
        };
        let pts = vec![c(10.0, 10.0), c(20.0, 20.0)];
        let opts = ExecutionOptions::sequential();
        assert!(distance_map(&[&pts], CalculationMethod::Vincenty, &s, &opts).is_err());
        // 10° of latitude rules the pair out at 100 km without iterating.
        let map = within_distance_map(&[&pts], 100.0, CalculationMethod::Vincenty, &s, &opts)
            .unwrap();
        assert!(map[[0, 0]] && map[[1, 1]]);
        assert!(!map[[0, 1]] && !map[[1, 0]]);
    }

    #[test]
    fn test_from_point() {
        let s = CalculationSettings::default();
        let origin = c(0.0, 0.0);
        let pts = vec![c(0.0, 0.5), c(0.0, 5.0), c(-0.5, 0.0)];
        let got = within_distance_from_point(
            &origin,
            &pts,
            100.0,
            CalculationMethod::Haversine,
            &s,
            &ExecutionOptions::sequential(),
        )
        .unwrap();
        assert_eq!(got.to_vec(), vec![true, false, true]);
    }

    #[test]
    fn test_same_pole_pairs_are_within_any_threshold() {
        let s = CalculationSettings::default();
        let pts = vec![c(90.0, 0.0), c(90.0, 135.0), c(-90.0, -170.0), c(-90.0, 170.0)];
        let opts = ExecutionOptions::sequential();
        for m in [CalculationMethod::Haversine, CalculationMethod::Vincenty] {
            let map = within_distance_map(&[&pts], 1.0, m, &s, &opts).unwrap();
            for ((i, j), &inside) in map.indexed_iter() {
                let same_pole = (i < 2) == (j < 2);
                assert_eq!(inside, same_pole, "{m:?} at ({i}, {j})");
            }
        }
    }

    #[test]
    fn test_indices_match_boolean_map() {
        let s = CalculationSettings::default();
        let rows = points(50, 30);
        let cols = points(51, 25);
        for m in ALL {
            for opts in [ExecutionOptions::sequential(), ExecutionOptions::threaded(4)] {
                let map = within_distance_map(&[&rows, &cols], 3000.0, m, &s, &opts).unwrap();
                let indices = indices_within_distance(&[&rows, &cols], 3000.0, m, &s, &opts).unwrap();
                assert_eq!(indices.len(), rows.len());
                for (i, found) in indices.iter().enumerate() {
                    let expected: Vec<usize> = (0..cols.len()).filter(|&j| map[[i, j]]).collect();
                    assert_eq!(found, &expected, "{m:?} row {i}");
                }
            }
        }
    }

    #[test]
    fn test_indices_edge_cases() {
        let s = CalculationSettings::default();
        let opts = ExecutionOptions::sequential();
        let pts = vec![c(0.0, 0.0), c(0.0, 0.5), c(0.0, 5.0)];

        let none = indices_within_distance(&[], 10.0, CalculationMethod::Haversine, &s, &opts).unwrap();
        assert!(none.is_empty());

        let isolated = indices_within_distance(&[&pts], -1.0, CalculationMethod::Haversine, &s, &opts).unwrap();
        assert_eq!(isolated, vec![Vec::<usize>::new(); 3]);

        let own = indices_within_distance(&[&pts], 100.0, CalculationMethod::Haversine, &s, &opts).unwrap();
        assert_eq!(own, vec![vec![0, 1], vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_indices_from_point() {
        let s = CalculationSettings::default();
        let pts = vec![c(0.0, 0.5), c(0.0, 5.0), c(-0.5, 0.0)];
        let got = indices_within_distance_from_point(
            &c(0.0, 0.0),
            &pts,
            100.0,
            CalculationMethod::Haversine,
            &s,
            &ExecutionOptions::sequential(),
        )
        .unwrap();
        assert_eq!(got, vec![0, 2]);
    }
}
