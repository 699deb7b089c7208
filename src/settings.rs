//! Per-call calculation parameters and the diagnostic snapshot exported to bindings.
//!
//! All lengths are kilometres. Settings are plain `Copy` values: every operation
//! reads one snapshot and worker threads share it by reference.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chunk::scheduler;
use crate::error::{GeoError, Result};

/// Mean Earth radius (km) for spherical models.
pub const RADIUS: f64 = 6373.0;

/// WGS84 semi-major axis (km).
pub const ELLIPSE_WGS84_A: f64 = 6378.137;
/// WGS84 semi-minor axis (km).
pub const ELLIPSE_WGS84_B: f64 = 6356.752314245;
/// WGS84 flattening.
pub const ELLIPSE_WGS84_F: f64 = 1.0 / 298.257_223_563;

pub const TOLERANCE: f64 = 1e-12;
pub const MAX_ITERATIONS: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationSettings {
    /// Radius of the Earth assuming a sphere. Used by Haversine and Cartesian.
    pub spherical_radius: f64,
    /// Ellipsoid semi-major axis (`a`). Used by Vincenty.
    pub ellipse_a: f64,
    /// Ellipsoid semi-minor axis (`b`). Used by Vincenty.
    pub ellipse_b: f64,
    /// Ellipsoid flattening (`f`, not `1/f`). Used by Vincenty.
    pub ellipse_f: f64,
    /// Vincenty stops iterating once the change in the auxiliary angle is below this.
    ///
    /// The check is on radians before the ellipsoid is applied, so the resulting
    /// distance is only accurate to roughly `tolerance * ellipse_b`.
    pub tolerance: f64,
    /// Vincenty iteration budget; exhausting it is a convergence error.
    pub max_iterations: usize,
    /// Two values closer than this are treated as identical.
    pub eps: f64,
}

impl Default for CalculationSettings {
    fn default() -> Self {
        Self {
            spherical_radius: RADIUS,
            ellipse_a: ELLIPSE_WGS84_A,
            ellipse_b: ELLIPSE_WGS84_B,
            ellipse_f: ELLIPSE_WGS84_F,
            tolerance: TOLERANCE,
            max_iterations: MAX_ITERATIONS,
            eps: f64::EPSILON,
        }
    }
}

impl CalculationSettings {
    /// Default settings on a sphere of the given radius.
    pub fn with_radius(spherical_radius: f64) -> Self {
        Self {
            spherical_radius,
            ..Self::default()
        }
    }

    /// Ellipsoid from semi-major axis and flattening, other fields default.
    pub fn with_ellipsoid(a: f64, f: f64) -> Self {
        Self {
            ellipse_a: a,
            ellipse_b: a * (1.0 - f),
            ellipse_f: f,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(GeoError::Configuration(format!(
                    "{name} must be positive and finite, got {v}"
                )))
            }
        };

        positive("spherical_radius", self.spherical_radius)?;
        positive("ellipse_a", self.ellipse_a)?;
        positive("ellipse_b", self.ellipse_b)?;
        positive("tolerance", self.tolerance)?;

        if self.ellipse_b > self.ellipse_a {
            return Err(GeoError::Configuration(format!(
                "ellipse_b ({}) must not exceed ellipse_a ({})",
                self.ellipse_b, self.ellipse_a
            )));
        }
        if !(0.0..1.0).contains(&self.ellipse_f) {
            return Err(GeoError::Configuration(format!(
                "ellipse_f must be in [0, 1), got {}",
                self.ellipse_f
            )));
        }
        if self.max_iterations == 0 {
            return Err(GeoError::Configuration(
                "max_iterations must be at least 1".into(),
            ));
        }
        if !(self.eps.is_finite() && self.eps >= 0.0) {
            return Err(GeoError::Configuration(format!(
                "eps must be non-negative and finite, got {}",
                self.eps
            )));
        }

        Ok(())
    }

    /// Kilometres per degree of arc on the spherical model.
    pub fn km_per_degree(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.spherical_radius / 360.0
    }
}

impl fmt::Display for CalculationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CalculationSettings:")?;
        writeln!(f, "  - {:20}= {:>22?}", "spherical_radius", self.spherical_radius)?;
        writeln!(f, "  - {:20}= {:>22?}", "ellipse_a", self.ellipse_a)?;
        writeln!(f, "  - {:20}= {:>22?}", "ellipse_b", self.ellipse_b)?;
        writeln!(f, "  - {:20}= {:>22?}", "ellipse_f", self.ellipse_f)?;
        writeln!(f, "  - {:20}= {:>22?}", "tolerance", self.tolerance)?;
        writeln!(f, "  - {:20}= {:>22?}", "max_iterations", self.max_iterations)?;
        write!(f, "  - {:20}= {:>22?}", "eps", self.eps)
    }
}

/// Constants in effect for a settings snapshot, for cross-checking against
/// reference implementations.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DebugInfo {
    pub default_workers: usize,
    pub workers_count: usize,
    pub eps: f64,
    pub tolerance: f64,
    pub spherical_radius: f64,
    pub ellipse_a: f64,
    pub ellipse_b: f64,
    pub ellipse_f: f64,
    pub max_iterations: usize,
}

impl DebugInfo {
    pub fn new(settings: &CalculationSettings) -> Self {
        Self {
            default_workers: scheduler::DEFAULT_WORKERS,
            workers_count: scheduler::workers_count(),
            eps: settings.eps,
            tolerance: settings.tolerance,
            spherical_radius: settings.spherical_radius,
            ellipse_a: settings.ellipse_a,
            ellipse_b: settings.ellipse_b,
            ellipse_f: settings.ellipse_f,
            max_iterations: settings.max_iterations,
        }
    }

    /// Flatten to a name -> value mapping; counts are widened to `f64`.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let entries = [
            ("default_workers", self.default_workers as f64),
            ("workers_count", self.workers_count as f64),
            ("eps", self.eps),
            ("tolerance", self.tolerance),
            ("spherical_radius", self.spherical_radius),
            ("ellipse_a", self.ellipse_a),
            ("ellipse_b", self.ellipse_b),
            ("ellipse_f", self.ellipse_f),
            ("max_iterations", self.max_iterations as f64),
        ];
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

/// Diagnostic snapshot of the given (or default) settings.
pub fn debug_info(settings: Option<&CalculationSettings>) -> DebugInfo {
    DebugInfo::new(&settings.copied().unwrap_or_default())
}
