//! Weighted linear ephemeris fit.
//!
//! Mid-transit times are modelled as `tmid(E) = T0 + P·E`. The fit minimizes
//! `Σ wᵢ² (tmidᵢ − T0 − P·Eᵢ)²` with `wᵢ = 1 / σᵢ`, and the parameter covariance is the inverse
//! of the normal matrix scaled by the reduced chi-square `χ² / (N − 2)`.
//!
//! Epochs are centred on their mean before solving: this leaves the slope and its
//! variance untouched and keeps the 2×2 normal matrix well conditioned even for epochs in the
//! thousands.
use nalgebra::{Matrix2, Vector2};

use crate::constants::{Days, Tjd, MIN_POINTS_FOR_REFIT};
use crate::exosched_errors::PeriodFitError;

use super::TimingMeasurement;

/// Result of a linear ephemeris fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodFit {
    /// Fitted period (slope, days)
    pub period: Days,
    /// One-sigma uncertainty of the period (days)
    pub period_err: Days,
    /// Fitted mid-transit time at epoch zero
    pub reference_tmid: Tjd,
    /// Weighted sum of squared residuals
    pub chi_squared: f64,
}

/// Fit period and reference time to a set of timing measurements.
///
/// Arguments
/// -----------------
/// * `points`: timing measurements, in any order
///
/// Return
/// ----------
/// * the fitted [`PeriodFit`]
///
/// Errors
/// ----------
/// * [`PeriodFitError::TooFewPoints`] with fewer than four measurements,
/// * [`PeriodFitError::MalformedPoint`] when a time or an uncertainty is not finite, or an
///   uncertainty is not strictly positive,
/// * [`PeriodFitError::SingularSystem`] when all epochs coincide.
pub fn fit_linear_ephemeris(points: &[TimingMeasurement]) -> Result<PeriodFit, PeriodFitError> {
    if points.len() < MIN_POINTS_FOR_REFIT {
        return Err(PeriodFitError::TooFewPoints {
            found: points.len(),
            required: MIN_POINTS_FOR_REFIT,
        });
    }

    if let Some(bad) = points.iter().position(|p| {
        !p.tmid.is_finite() || !p.tmid_err.is_finite() || p.tmid_err <= 0.0
    }) {
        return Err(PeriodFitError::MalformedPoint(bad));
    }

    let weights: Vec<f64> = points.iter().map(|p| (p.tmid_err * p.tmid_err).recip()).collect();
    let epoch_mean = points.iter().map(|p| p.epoch as f64).sum::<f64>() / points.len() as f64;
    let tmid_origin = points[0].tmid;

    let mut normal = Matrix2::<f64>::zeros();
    let mut rhs = Vector2::<f64>::zeros();
    for (p, &w) in points.iter().zip(&weights) {
        let x = p.epoch as f64 - epoch_mean;
        let y = p.tmid - tmid_origin;
        normal += w * Matrix2::new(1.0, x, x, x * x);
        rhs += w * Vector2::new(y, x * y);
    }

    let inverse = normal
        .try_inverse()
        .ok_or(PeriodFitError::SingularSystem)?;
    let solution = inverse * rhs;
    let (intercept, slope) = (solution[0], solution[1]);

    let chi_squared: f64 = points
        .iter()
        .zip(&weights)
        .map(|(p, w)| {
            let x = p.epoch as f64 - epoch_mean;
            let residual = p.tmid - tmid_origin - intercept - slope * x;
            w * residual * residual
        })
        .sum();

    let dof = (points.len() - 2) as f64;
    let slope_variance = inverse[(1, 1)] * chi_squared / dof;
    if !slope.is_finite() || !slope_variance.is_finite() {
        return Err(PeriodFitError::SingularSystem);
    }

    Ok(PeriodFit {
        period: slope,
        period_err: slope_variance.max(0.0).sqrt(),
        reference_tmid: tmid_origin + intercept - slope * epoch_mean,
        chi_squared,
    })
}
