use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::coord::Coordinate;
use crate::error::GeoError;
use crate::method::CalculationMethod;

mod matrix;
mod pair;
mod settings;

/// Register all Python-visible functions and types.
pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyMethod>()?;
    m.add_class::<settings::PySettings>()?;
    m.add_function(wrap_pyfunction!(pair::distance, m)?)?;
    m.add_function(wrap_pyfunction!(pair::offset, m)?)?;
    m.add_function(wrap_pyfunction!(matrix::distance_map, m)?)?;
    m.add_function(wrap_pyfunction!(matrix::within_distance_map, m)?)?;
    m.add_function(wrap_pyfunction!(matrix::indices_within_distance, m)?)?;
    m.add_function(wrap_pyfunction!(matrix::indices_within_distance_of_point, m)?)?;
    m.add_function(wrap_pyfunction!(settings::debug_info, m)?)?;
    Ok(())
}

/// Calculation model exposed to Python.
#[pyclass(name = "CalculationMethod", eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PyMethod {
    #[pyo3(name = "HAVERSINE")]
    Haversine,
    #[pyo3(name = "VINCENTY")]
    Vincenty,
    #[pyo3(name = "CARTESIAN")]
    Cartesian,
}

#[pymethods]
impl PyMethod {
    #[staticmethod]
    fn from_name(name: &str) -> PyResult<Self> {
        parse_method(MethodArg::Name(name.to_string())).map(Self::from)
    }

    #[getter]
    fn name(&self) -> &'static str {
        CalculationMethod::from(*self).name()
    }
}

impl From<PyMethod> for CalculationMethod {
    fn from(m: PyMethod) -> Self {
        match m {
            PyMethod::Haversine => Self::Haversine,
            PyMethod::Vincenty => Self::Vincenty,
            PyMethod::Cartesian => Self::Cartesian,
        }
    }
}

impl From<CalculationMethod> for PyMethod {
    fn from(m: CalculationMethod) -> Self {
        match m {
            CalculationMethod::Haversine => Self::Haversine,
            CalculationMethod::Vincenty => Self::Vincenty,
            CalculationMethod::Cartesian => Self::Cartesian,
        }
    }
}

/// A method given either by name or as a `CalculationMethod` member.
#[derive(FromPyObject)]
pub(crate) enum MethodArg {
    Method(PyMethod),
    Name(String),
}

pub(crate) fn parse_method(arg: MethodArg) -> PyResult<CalculationMethod> {
    match arg {
        MethodArg::Method(m) => Ok(m.into()),
        MethodArg::Name(name) => CalculationMethod::from_name(&name)
            .ok_or_else(|| PyValueError::new_err(format!("Unknown calculation method: '{name}'"))),
    }
}

/// Bad input maps to `ValueError`, numerical or pool failures to `RuntimeError`.
pub(crate) fn to_py_err(e: GeoError) -> PyErr {
    match e.root_cause() {
        GeoError::Convergence { .. } | GeoError::ThreadPool(_) => {
            PyRuntimeError::new_err(e.to_string())
        }
        _ => PyValueError::new_err(e.to_string()),
    }
}

/// Unchecked (lat, lon) pair; the engine validates it.
pub(crate) fn point((lat, lon): (f64, f64)) -> Coordinate {
    Coordinate { lat, lon }
}
