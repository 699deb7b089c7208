//! Batch bindings over `(n, 2)` arrays of `[lat, lon]` rows.

use ndarray::{Array2, ArrayView2};
use numpy::{PyArray1, PyArray2, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyTuple;

use crate::chunk::ExecutionOptions;
use crate::coord::Coordinate;
use crate::matrix;
use crate::py::settings::{resolve, PySettings};
use crate::py::{parse_method, point, to_py_err, MethodArg};

fn coordinates(array: ArrayView2<'_, f64>) -> PyResult<Vec<Coordinate>> {
    if array.ncols() != 2 {
        return Err(PyValueError::new_err(format!(
            "coordinates must have shape (n, 2), got {:?}",
            array.shape()
        )));
    }
    Ok(array
        .rows()
        .into_iter()
        .map(|r| Coordinate { lat: r[0], lon: r[1] })
        .collect())
}

fn execution_options(threaded: bool, max_workers: Option<usize>) -> ExecutionOptions {
    let defaults = ExecutionOptions::default();
    ExecutionOptions {
        threaded,
        max_workers: max_workers.unwrap_or(defaults.max_workers),
        ..defaults
    }
}

fn collections(
    a: PyReadonlyArray2<'_, f64>,
    b: Option<PyReadonlyArray2<'_, f64>>,
) -> PyResult<(Vec<Coordinate>, Option<Vec<Coordinate>>)> {
    let a = coordinates(a.as_array())?;
    let b = b.map(|b| coordinates(b.as_array())).transpose()?;
    Ok((a, b))
}

/// Pairwise distance map in km.
///
/// Args:
///     a: (n, 2) array of [lat, lon] rows.
///     b: Optional (m, 2) array. If omitted, `a` is compared with itself.
///     method: CalculationMethod member or its name. Defaults to haversine.
///     settings: Optional CalculationSettings.
///     threaded: Spread rows over a worker pool.
///     max_workers: Upper bound on workers. Defaults to the CPU count.
///
/// Returns:
///     (n, m) array of distances.
#[pyfunction]
#[pyo3(signature = (a, b=None, method=None, settings=None, threaded=false, max_workers=None))]
pub fn distance_map<'py>(
    py: Python<'py>,
    a: PyReadonlyArray2<'py, f64>,
    b: Option<PyReadonlyArray2<'py, f64>>,
    method: Option<MethodArg>,
    settings: Option<PyRef<'py, PySettings>>,
    threaded: bool,
    max_workers: Option<usize>,
) -> PyResult<Bound<'py, PyArray2<f64>>> {
    let method = method.map(parse_method).transpose()?.unwrap_or_default();
    let settings = resolve(settings);
    let options = execution_options(threaded, max_workers);
    let (a, b) = collections(a, b)?;

    let result: Array2<f64> = py
        .allow_threads(move || match &b {
            Some(b) => matrix::distance_map(&[&a, b], method, &settings, &options),
            None => matrix::distance_map(&[&a], method, &settings, &options),
        })
        .map_err(to_py_err)?;

    Ok(PyArray2::from_owned_array(py, result))
}

/// Boolean map of `distance <= threshold`.
///
/// Same arguments as `distance_map` plus `threshold` in km.
#[pyfunction]
#[pyo3(signature = (a, threshold, b=None, method=None, settings=None, threaded=false, max_workers=None))]
#[allow(clippy::too_many_arguments)]
pub fn within_distance_map<'py>(
    py: Python<'py>,
    a: PyReadonlyArray2<'py, f64>,
    threshold: f64,
    b: Option<PyReadonlyArray2<'py, f64>>,
    method: Option<MethodArg>,
    settings: Option<PyRef<'py, PySettings>>,
    threaded: bool,
    max_workers: Option<usize>,
) -> PyResult<Bound<'py, PyArray2<bool>>> {
    let method = method.map(parse_method).transpose()?.unwrap_or_default();
    let settings = resolve(settings);
    let options = execution_options(threaded, max_workers);
    let (a, b) = collections(a, b)?;

    let result: Array2<bool> = py
        .allow_threads(move || match &b {
            Some(b) => matrix::within_distance_map(&[&a, b], threshold, method, &settings, &options),
            None => matrix::within_distance_map(&[&a], threshold, method, &settings, &options),
        })
        .map_err(to_py_err)?;

    Ok(PyArray2::from_owned_array(py, result))
}

fn index_array<'py>(py: Python<'py>, indices: Vec<usize>) -> Bound<'py, PyArray1<u64>> {
    PyArray1::from_iter(py, indices.into_iter().map(|i| i as u64))
}

/// Indices of the points in `b` (or `a`) within `threshold` km of each row of `a`.
///
/// Same arguments as `within_distance_map`.
///
/// Returns:
///     Tuple with one uint64 array per row of `a`.
#[pyfunction]
#[pyo3(signature = (a, threshold, b=None, method=None, settings=None, threaded=false, max_workers=None))]
#[allow(clippy::too_many_arguments)]
pub fn indices_within_distance<'py>(
    py: Python<'py>,
    a: PyReadonlyArray2<'py, f64>,
    threshold: f64,
    b: Option<PyReadonlyArray2<'py, f64>>,
    method: Option<MethodArg>,
    settings: Option<PyRef<'py, PySettings>>,
    threaded: bool,
    max_workers: Option<usize>,
) -> PyResult<Bound<'py, PyTuple>> {
    let method = method.map(parse_method).transpose()?.unwrap_or_default();
    let settings = resolve(settings);
    let options = execution_options(threaded, max_workers);
    let (a, b) = collections(a, b)?;

    let rows: Vec<Vec<usize>> = py
        .allow_threads(move || match &b {
            Some(b) => {
                matrix::indices_within_distance(&[&a, b], threshold, method, &settings, &options)
            }
            None => matrix::indices_within_distance(&[&a], threshold, method, &settings, &options),
        })
        .map_err(to_py_err)?;

    PyTuple::new(py, rows.into_iter().map(|row| index_array(py, row)))
}

/// Indices of the points in `collection` within `threshold` km of `origin`.
///
/// Args:
///     origin: (lat, lon) in degrees.
///     collection: (n, 2) array of [lat, lon] rows.
///     threshold: Distance in km.
///
/// Returns:
///     uint64 array of indices into `collection`.
#[pyfunction]
#[pyo3(signature = (origin, collection, threshold, method=None, settings=None, threaded=false, max_workers=None))]
#[allow(clippy::too_many_arguments)]
pub fn indices_within_distance_of_point<'py>(
    py: Python<'py>,
    origin: (f64, f64),
    collection: PyReadonlyArray2<'py, f64>,
    threshold: f64,
    method: Option<MethodArg>,
    settings: Option<PyRef<'py, PySettings>>,
    threaded: bool,
    max_workers: Option<usize>,
) -> PyResult<Bound<'py, PyArray1<u64>>> {
    let method = method.map(parse_method).transpose()?.unwrap_or_default();
    let settings = resolve(settings);
    let options = execution_options(threaded, max_workers);
    let origin = point(origin);
    let collection = coordinates(collection.as_array())?;

    let indices = py
        .allow_threads(move || {
            matrix::indices_within_distance_from_point(
                &origin,
                &collection,
                threshold,
                method,
                &settings,
                &options,
            )
        })
        .map_err(to_py_err)?;

    Ok(index_array(py, indices))
}
