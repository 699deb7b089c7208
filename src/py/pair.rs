//! Single-pair bindings.

use pyo3::prelude::*;

use crate::py::settings::{resolve, PySettings};
use crate::py::{parse_method, point, to_py_err, MethodArg};

/// Distance in km between two (lat, lon) points.
///
/// Args:
///     source: (lat, lon) in degrees.
///     destination: (lat, lon) in degrees.
///     method: CalculationMethod member or its name. Defaults to haversine.
///     settings: Optional CalculationSettings.
#[pyfunction]
#[pyo3(signature = (source, destination, method=None, settings=None))]
pub fn distance(
    source: (f64, f64),
    destination: (f64, f64),
    method: Option<MethodArg>,
    settings: Option<PyRef<'_, PySettings>>,
) -> PyResult<f64> {
    let method = method.map(parse_method).transpose()?.unwrap_or_default();
    let settings = resolve(settings);
    let (a, b) = (point(source), point(destination));
    method.distance(&a, &b, &settings).map_err(to_py_err)
}

/// Destination (lat, lon) after moving `distance` km on `bearing` degrees.
#[pyfunction]
#[pyo3(signature = (start, distance, bearing, method=None, settings=None))]
pub fn offset(
    start: (f64, f64),
    distance: f64,
    bearing: f64,
    method: Option<MethodArg>,
    settings: Option<PyRef<'_, PySettings>>,
) -> PyResult<(f64, f64)> {
    let method = method.map(parse_method).transpose()?.unwrap_or_default();
    let settings = resolve(settings);
    method
        .offset(&point(start), distance, bearing, &settings)
        .map(Into::into)
        .map_err(to_py_err)
}
