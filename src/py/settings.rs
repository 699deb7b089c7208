//! Python view of the calculation settings.

use std::collections::BTreeMap;

use pyo3::prelude::*;

use crate::settings::{self, CalculationSettings};

/// Numeric parameters shared by every calculation. Lengths are kilometres.
#[pyclass(name = "CalculationSettings", get_all, set_all)]
#[derive(Clone, Debug)]
pub struct PySettings {
    pub spherical_radius: f64,
    pub ellipse_a: f64,
    pub ellipse_b: f64,
    pub ellipse_f: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub eps: f64,
}

#[pymethods]
impl PySettings {
    #[new]
    #[pyo3(signature = (
        spherical_radius=settings::RADIUS,
        ellipse_a=settings::ELLIPSE_WGS84_A,
        ellipse_b=settings::ELLIPSE_WGS84_B,
        ellipse_f=settings::ELLIPSE_WGS84_F,
        tolerance=settings::TOLERANCE,
        max_iterations=settings::MAX_ITERATIONS,
        eps=f64::EPSILON,
    ))]
    fn new(
        spherical_radius: f64,
        ellipse_a: f64,
        ellipse_b: f64,
        ellipse_f: f64,
        tolerance: f64,
        max_iterations: usize,
        eps: f64,
    ) -> Self {
        Self {
            spherical_radius,
            ellipse_a,
            ellipse_b,
            ellipse_f,
            tolerance,
            max_iterations,
            eps,
        }
    }

    fn __repr__(&self) -> String {
        self.to_settings().to_string()
    }
}

impl PySettings {
    pub(crate) fn to_settings(&self) -> CalculationSettings {
        CalculationSettings {
            spherical_radius: self.spherical_radius,
            ellipse_a: self.ellipse_a,
            ellipse_b: self.ellipse_b,
            ellipse_f: self.ellipse_f,
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
            eps: self.eps,
        }
    }
}

/// Resolve an optional Python settings object, falling back to defaults.
pub(crate) fn resolve(settings: Option<PyRef<'_, PySettings>>) -> CalculationSettings {
    settings.map(|s| s.to_settings()).unwrap_or_default()
}

/// Constants in effect for the given (or default) settings.
///
/// Returns:
///     Dict with keys default_workers, workers_count, eps, tolerance,
///     spherical_radius, ellipse_a, ellipse_b, ellipse_f, max_iterations.
#[pyfunction]
#[pyo3(signature = (settings=None))]
pub fn debug_info(settings: Option<PyRef<'_, PySettings>>) -> BTreeMap<String, f64> {
    settings::debug_info(Some(&resolve(settings))).to_map()
}
