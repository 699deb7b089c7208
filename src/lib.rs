//! Geodesic distances and offsets between latitude/longitude points.
//!
//! Three models share one API: spherical [`Haversine`], ellipsoidal
//! [`Vincenty`] and a flat [`Cartesian`] approximation. Single-pair
//! operations live at the crate root; batch maps are in [`matrix`] and can be
//! spread over a scoped worker pool with [`ExecutionOptions`].

pub mod chunk;
pub mod coord;
pub mod error;
pub mod matrix;
pub mod method;
pub mod settings;

#[cfg(feature = "python")]
mod py;

pub use chunk::ExecutionOptions;
pub use coord::Coordinate;
pub use error::{GeoError, Result};
pub use matrix::{
    distance_from_point, distance_map, indices_within_distance,
    indices_within_distance_from_point, offset_many, within_distance_from_point,
    within_distance_map, DistanceMatrix,
};
pub use method::{CalculationMethod, Cartesian, GeodesicModel, Haversine, Vincenty};
pub use settings::{debug_info, CalculationSettings, DebugInfo};

/// Distance in km from `source` to `destination`.
pub fn distance(
    source: &Coordinate,
    destination: &Coordinate,
    method: CalculationMethod,
    settings: &CalculationSettings,
) -> Result<f64> {
    method.distance(source, destination, settings)
}

/// Point reached from `start` after `distance` km on `bearing` degrees.
pub fn offset(
    start: &Coordinate,
    distance: f64,
    bearing: f64,
    method: CalculationMethod,
    settings: &CalculationSettings,
) -> Result<Coordinate> {
    method.offset(start, distance, bearing, settings)
}

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// A Python module implemented in Rust.
#[cfg(feature = "python")]
#[pymodule]
fn geodistances(m: &Bound<'_, PyModule>) -> PyResult<()> {
    py::register(m)?;
    Ok(())
}
