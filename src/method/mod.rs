//! Distance and offset models.

pub mod cartesian;
pub mod haversine;
pub mod vincenty;

use serde::{Deserialize, Serialize};

use crate::coord::Coordinate;
use crate::error::{GeoError, Result};
use crate::settings::CalculationSettings;

pub use cartesian::Cartesian;
pub use haversine::Haversine;
pub use vincenty::Vincenty;

/// Capability set shared by every model.
///
/// Implementors are zero-sized; everything numeric comes from
/// [`CalculationSettings`]. The functions here assume their inputs were
/// already validated, which [`CalculationMethod`] and the batch evaluators do
/// once up front.
pub trait GeodesicModel: Send + Sync {
    /// Distance in kilometres. Must be exactly 0 for identical points and
    /// return the same bits for `(a, b)` and `(b, a)`.
    fn distance(a: &Coordinate, b: &Coordinate, settings: &CalculationSettings) -> Result<f64>;

    /// Destination after travelling `distance` km from `start` on `bearing`
    /// degrees clockwise from north (already reduced into [0, 360)).
    fn offset(
        start: &Coordinate,
        distance: f64,
        bearing: f64,
        settings: &CalculationSettings,
    ) -> Result<Coordinate>;

    fn within_distance(
        a: &Coordinate,
        b: &Coordinate,
        threshold: f64,
        settings: &CalculationSettings,
    ) -> Result<bool> {
        Ok(Self::distance(a, b, settings)? <= threshold)
    }

    /// A cheap value never greater than `distance(a, b)`.
    fn lower_bound(_a: &Coordinate, _b: &Coordinate, _settings: &CalculationSettings) -> f64 {
        0.0
    }
}

/// Available calculation models.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationMethod {
    /// Great circle on a sphere of `spherical_radius`.
    #[default]
    Haversine,
    /// Geodesic on the `(ellipse_a, ellipse_b, ellipse_f)` ellipsoid.
    Vincenty,
    /// Flat approximation. Only meaningful over small extents away from the poles.
    Cartesian,
}

impl CalculationMethod {
    /// Parse from a string name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "haversine" => Some(Self::Haversine),
            "vincenty" => Some(Self::Vincenty),
            "cartesian" => Some(Self::Cartesian),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Haversine => "haversine",
            Self::Vincenty => "vincenty",
            Self::Cartesian => "cartesian",
        }
    }

    pub fn distance(
        &self,
        a: &Coordinate,
        b: &Coordinate,
        settings: &CalculationSettings,
    ) -> Result<f64> {
        settings.validate()?;
        a.validate()?;
        b.validate()?;
        match self {
            Self::Haversine => Haversine::distance(a, b, settings),
            Self::Vincenty => Vincenty::distance(a, b, settings),
            Self::Cartesian => Cartesian::distance(a, b, settings),
        }
    }

    pub fn offset(
        &self,
        start: &Coordinate,
        distance: f64,
        bearing: f64,
        settings: &CalculationSettings,
    ) -> Result<Coordinate> {
        settings.validate()?;
        start.validate()?;
        let bearing = normalize_bearing(bearing)?;
        if !distance.is_finite() {
            return Err(GeoError::NonFiniteInput(format!("distance {distance}")));
        }
        if distance == 0.0 {
            return Ok(*start);
        }
        match self {
            Self::Haversine => Haversine::offset(start, distance, bearing, settings),
            Self::Vincenty => Vincenty::offset(start, distance, bearing, settings),
            Self::Cartesian => Cartesian::offset(start, distance, bearing, settings),
        }
    }

    pub fn within_distance(
        &self,
        a: &Coordinate,
        b: &Coordinate,
        threshold: f64,
        settings: &CalculationSettings,
    ) -> Result<bool> {
        check_threshold(threshold)?;
        settings.validate()?;
        a.validate()?;
        b.validate()?;
        match self {
            Self::Haversine => Haversine::within_distance(a, b, threshold, settings),
            Self::Vincenty => Vincenty::within_distance(a, b, threshold, settings),
            Self::Cartesian => Cartesian::within_distance(a, b, threshold, settings),
        }
    }
}

/// Reduce a bearing into [0, 360). Bearings are continuous, so out-of-range
/// values are wrapped rather than rejected.
pub fn normalize_bearing(bearing: f64) -> Result<f64> {
    if !bearing.is_finite() {
        return Err(GeoError::NonFiniteInput(format!("bearing {bearing}")));
    }
    Ok(bearing.rem_euclid(360.0))
}

pub(crate) fn check_threshold(threshold: f64) -> Result<()> {
    if threshold.is_nan() || threshold == f64::NEG_INFINITY {
        return Err(GeoError::NonFiniteInput(format!("threshold {threshold}")));
    }
    Ok(())
}
