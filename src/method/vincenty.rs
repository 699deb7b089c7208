//! Vincenty's inverse and direct solutions of geodesics on the ellipsoid.
//!
//! Accurate to well under a millimetre on WGS84, but iterative: the inverse
//! problem fails to converge for nearly antipodal points. That failure is
//! reported as [`GeoError::Convergence`]; falling back to another model is the
//! caller's decision.
//!
//! Symbols follow Vincenty (1975): `u` reduced latitude, `sigma` angular
//! distance on the auxiliary sphere, `alpha` azimuth of the geodesic at the
//! equator, `sigma_m` angular distance from the equator to the line midpoint.

use std::cmp::Ordering;
use std::f64::consts::{FRAC_PI_2, PI};

use crate::coord::{wrap_longitude, Coordinate};
use crate::error::{GeoError, Result};
use crate::settings::CalculationSettings;

use super::GeodesicModel;

/// `sin²σ` below this means the points coincide (or sit at the same pole).
const COINCIDENT_SIN_SQ_SIGMA: f64 = 1e-24;

pub struct Vincenty;

/// Solution of the inverse problem.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Inverse {
    /// Geodesic length (same unit as the ellipsoid axes).
    pub distance: f64,
    /// Bearing at the first point, degrees clockwise from north in [0, 360).
    pub initial_bearing: f64,
    /// Bearing on arrival at the second point, degrees in [0, 360).
    pub final_bearing: f64,
}

/// Reduced latitude of a geodetic latitude in radians, as (sin U, cos U).
fn reduced_latitude(lat: f64, f: f64) -> (f64, f64) {
    let tan_u = (1.0 - f) * lat.tan();
    let cos_u = 1.0 / (1.0 + tan_u * tan_u).sqrt();
    (tan_u * cos_u, cos_u)
}

/// Vincenty's A and B series coefficients for `cos²α`.
fn series_coefficients(cos_sq_alpha: f64, settings: &CalculationSettings) -> (f64, f64) {
    let (a, b) = (settings.ellipse_a, settings.ellipse_b);
    let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    (big_a, big_b)
}

fn delta_sigma(big_b: f64, sin_sigma: f64, cos_sigma: f64, cos_2sigma_m: f64) -> f64 {
    let cos_sq_2sigma_m = cos_2sigma_m * cos_2sigma_m;
    big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_sq_2sigma_m)
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                        * (-3.0 + 4.0 * cos_sq_2sigma_m)))
}

/// Longitude correction term shared by both problems (without the leading `L +`).
fn lambda_correction(
    f: f64,
    cos_sq_alpha: f64,
    sin_alpha: f64,
    sigma: f64,
    sin_sigma: f64,
    cos_sigma: f64,
    cos_2sigma_m: f64,
) -> f64 {
    let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
    (1.0 - c)
        * f
        * sin_alpha
        * (sigma
            + c * sin_sigma
                * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)))
}

impl Vincenty {
    /// Distance plus initial and final bearings from `a` to `b`.
    pub fn inverse(a: &Coordinate, b: &Coordinate, settings: &CalculationSettings) -> Result<Inverse> {
        settings.validate()?;
        a.validate()?;
        b.validate()?;
        solve_inverse(a, b, settings)
    }
}

fn solve_inverse(p1: &Coordinate, p2: &Coordinate, settings: &CalculationSettings) -> Result<Inverse> {
    if p1 == p2 {
        return Ok(Inverse {
            distance: 0.0,
            initial_bearing: 0.0,
            final_bearing: 0.0,
        });
    }

    let f = settings.ellipse_f;
    let (lat1, lon1) = p1.to_radians();
    let (lat2, lon2) = p2.to_radians();

    // Longitude difference the short way round.
    let mut l = lon2 - lon1;
    if l > PI {
        l -= 2.0 * PI;
    } else if l < -PI {
        l += 2.0 * PI;
    }

    let (sin_u1, cos_u1) = reduced_latitude(lat1, f);
    let (sin_u2, cos_u2) = reduced_latitude(lat2, f);

    let antipodal = l.abs() > FRAC_PI_2 || (lat2 - lat1).abs() > FRAC_PI_2;

    let mut lambda = l;
    let mut sin_sigma = 0.0;
    let mut cos_sigma = if antipodal { -1.0 } else { 1.0 };
    let mut sigma = if antipodal { PI } else { 0.0 };
    let mut cos_sq_alpha = 1.0;
    let mut cos_2sigma_m = 1.0;
    let mut converged = false;

    for iteration in 1..=settings.max_iterations {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sq_sigma = (cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2);
        if sin_sq_sigma.abs() < COINCIDENT_SIN_SQ_SIGMA {
            // Either the same point (e.g. one pole under two longitudes) or
            // exactly opposite poles; the sign of cos σ tells them apart.
            cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
            if cos_sigma > 0.0 {
                return Ok(Inverse {
                    distance: 0.0,
                    initial_bearing: 0.0,
                    final_bearing: 0.0,
                });
            }
            sin_sigma = 0.0;
            cos_sigma = -1.0;
            sigma = PI;
            converged = true;
            break;
        }

        sin_sigma = sin_sq_sigma.sqrt();
        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);

        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // cos²α == 0 only on an equatorial line.
        cos_2sigma_m = if cos_sq_alpha.abs() > settings.eps {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            0.0
        };

        let lambda_prev = lambda;
        lambda = l + lambda_correction(
            f,
            cos_sq_alpha,
            sin_alpha,
            sigma,
            sin_sigma,
            cos_sigma,
            cos_2sigma_m,
        );

        let iteration_check = if antipodal { lambda.abs() - PI } else { lambda.abs() };
        if iteration_check > PI {
            return Err(GeoError::Convergence {
                iterations: iteration,
            });
        }
        if (lambda - lambda_prev).abs() <= settings.tolerance {
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(GeoError::Convergence {
            iterations: settings.max_iterations,
        });
    }

    let (big_a, big_b) = series_coefficients(cos_sq_alpha, settings);
    let distance = settings.ellipse_b
        * big_a
        * (sigma - delta_sigma(big_b, sin_sigma, cos_sigma, cos_2sigma_m));

    let (sin_lambda, cos_lambda) = lambda.sin_cos();
    let alpha1 = (cos_u2 * sin_lambda).atan2(cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda);
    let alpha2 = (cos_u1 * sin_lambda).atan2(-sin_u1 * cos_u2 + cos_u1 * sin_u2 * cos_lambda);

    Ok(Inverse {
        distance,
        initial_bearing: alpha1.to_degrees().rem_euclid(360.0),
        final_bearing: alpha2.to_degrees().rem_euclid(360.0),
    })
}

impl GeodesicModel for Vincenty {
    fn distance(a: &Coordinate, b: &Coordinate, settings: &CalculationSettings) -> Result<f64> {
        // The iteration is not exactly symmetric in its arguments; solving
        // from the lexicographically smaller point makes the result so.
        let ordered = match (a.lat, a.lon).partial_cmp(&(b.lat, b.lon)) {
            Some(Ordering::Greater) => (b, a),
            _ => (a, b),
        };
        solve_inverse(ordered.0, ordered.1, settings).map(|inv| inv.distance)
    }

    fn offset(
        start: &Coordinate,
        distance: f64,
        bearing: f64,
        settings: &CalculationSettings,
    ) -> Result<Coordinate> {
        let f = settings.ellipse_f;
        let (lat1, lon1) = start.to_radians();
        let (sin_alpha1, cos_alpha1) = bearing.to_radians().sin_cos();

        let (sin_u1, cos_u1) = reduced_latitude(lat1, f);
        let tan_u1 = sin_u1 / cos_u1;
        let sigma1 = tan_u1.atan2(cos_alpha1);
        let sin_alpha = cos_u1 * sin_alpha1;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        let (big_a, big_b) = series_coefficients(cos_sq_alpha, settings);

        let first_guess = distance / (settings.ellipse_b * big_a);
        let mut sigma = first_guess;
        let mut converged = false;
        for _ in 0..settings.max_iterations {
            let cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
            let (sin_sigma, cos_sigma) = sigma.sin_cos();
            let sigma_prev = sigma;
            sigma = first_guess + delta_sigma(big_b, sin_sigma, cos_sigma, cos_2sigma_m);
            if (sigma - sigma_prev).abs() <= settings.tolerance {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(GeoError::Convergence {
                iterations: settings.max_iterations,
            });
        }

        let cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
        let (sin_sigma, cos_sigma) = sigma.sin_cos();

        let x = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
        let lat2 = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1)
            .atan2((1.0 - f) * (sin_alpha * sin_alpha + x * x).sqrt());
        let lambda = (sin_sigma * sin_alpha1)
            .atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1);
        let l = lambda
            - lambda_correction(
                f,
                cos_sq_alpha,
                sin_alpha,
                sigma,
                sin_sigma,
                cos_sigma,
                cos_2sigma_m,
            );

        Ok(Coordinate {
            lat: lat2.to_degrees().clamp(-90.0, 90.0),
            lon: wrap_longitude((lon1 + l).to_degrees()),
        })
    }

    fn lower_bound(a: &Coordinate, b: &Coordinate, settings: &CalculationSettings) -> f64 {
        // Shortest path between two parallels runs along a meridian, whose
        // radius of curvature never drops below b²/a.
        let min_meridional_radius = settings.ellipse_b * settings.ellipse_b / settings.ellipse_a;
        min_meridional_radius * (a.lat - b.lat).abs().to_radians()
    }
}
