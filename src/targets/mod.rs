//! # Target model
//!
//! A [`Target`] is one periodic transiting object: its linear ephemeris (reference mid-transit
//! time, epoch, period), the uncertainties attached to it, and the history of timing
//! measurements collected so far.
//!
//! ## Timing error model
//!
//! With `e₀` the uncertainty of the last measured mid-transit time and `σP` the period
//! uncertainty, the uncertainty of a prediction `n` epochs later is
//!
//! ```text
//! e(n) = sqrt(e₀² + (n · σP)²)
//! ```
//!
//! From this model the target derives:
//!
//! * its **expiry** ([`Target::compute_expiry`]): the first predicted transit whose uncertainty
//!   exceeds the accuracy threshold,
//! * its **error at a horizon** ([`Target::compute_error_at_horizon`]): the uncertainty
//!   propagated to a fixed future date,
//! * its **current error** ([`Target::update_current_error`]): the uncertainty propagated to the
//!   evaluation date.
//!
//! Units: times are truncated Julian days, `period`/`period_err`/`last_tmid_err` are days,
//! `duration` and every derived error or threshold are **minutes**, `depth` is milli-magnitudes.
//!
//! ## Lifecycle
//!
//! Targets are built from catalog rows (see [`crate::catalog`]) or through
//! [`Target::builder`]. During a simulation, synthetic measurements are appended with
//! [`Target::record_measurement`] and the period is refined with [`Target::refit_period`].
//!
//! ## See also
//! ------------
//! * [`selection`] – selective / initial strategies deciding whether a target is required.
//! * [`period_fit`] – weighted linear ephemeris fit.
//! * [`depth_limits`] – which telescopes can detect the transit.
pub mod depth_limits;
pub mod period_fit;
pub mod selection;

use std::collections::BTreeSet;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::constants::{
    Days, Degree, Minutes, TelescopeIdx, Tjd, MAX_EXPIRY_EPOCHS, MINUTES_PER_DAY,
};
use crate::exosched_errors::{ExoschedError, PeriodFitError};

use period_fit::{fit_linear_ephemeris, PeriodFit};
use selection::{SelectionStrategy, ThresholdPolicy};

/// One mid-transit time measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingMeasurement {
    /// Orbital epoch of the transit
    pub epoch: i64,
    /// Measured mid-transit time
    pub tmid: Tjd,
    /// One-sigma uncertainty of `tmid` (days)
    pub tmid_err: Days,
}

/// A periodic transiting object and its timing history.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: Arc<str>,
    /// Right ascension (degrees)
    pub ra: Degree,
    /// Declination (degrees)
    pub dec: Degree,
    /// Orbital period (days)
    pub period: Days,
    /// Period uncertainty (days)
    pub period_err: Option<Days>,
    /// Transit duration (minutes)
    pub duration: Minutes,
    /// Transit depth (mmag)
    pub depth: Option<f64>,
    /// Host star magnitude
    pub star_mag: f64,
    /// Most recent mid-transit time
    pub last_tmid: Tjd,
    /// Uncertainty of `last_tmid` (days)
    pub last_tmid_err: Option<Days>,
    /// Epoch of `last_tmid`
    pub last_epoch: i64,
    /// Confirmed object (as opposed to a candidate)
    pub real: bool,
    /// Bypass the moon contamination filter for this target
    pub ignore_moon: bool,

    observations: SmallVec<[TimingMeasurement; 8]>,
    threshold: Minutes,
    expiry: Tjd,
    current_err: Minutes,
    err_at_horizon: Minutes,
    observable_from: BTreeSet<TelescopeIdx>,
}

impl Target {
    /// Start building a target named `name`.
    pub fn builder(name: impl Into<Arc<str>>) -> TargetBuilder {
        TargetBuilder::new(name)
    }

    /// Transit duration in days.
    pub fn duration_days(&self) -> Days {
        self.duration / MINUTES_PER_DAY
    }

    /// Timing measurements recorded so far, in insertion order.
    pub fn observations(&self) -> &[TimingMeasurement] {
        &self.observations
    }

    /// Accuracy threshold (minutes) set by [`Target::determine_threshold`].
    pub fn threshold(&self) -> Minutes {
        self.threshold
    }

    /// Date after which the ephemeris no longer meets the threshold.
    pub fn expiry(&self) -> Tjd {
        self.expiry
    }

    /// Timing error (minutes) propagated to the last evaluation date.
    pub fn current_err(&self) -> Minutes {
        self.current_err
    }

    /// Timing error (minutes) propagated to the selection horizon.
    pub fn err_at_horizon(&self) -> Minutes {
        self.err_at_horizon
    }

    /// Telescopes able to observe this target.
    pub fn observable_from(&self) -> &BTreeSet<TelescopeIdx> {
        &self.observable_from
    }

    pub fn set_observable_from(&mut self, telescopes: impl IntoIterator<Item = TelescopeIdx>) {
        self.observable_from = telescopes.into_iter().collect();
    }

    /// A target takes part in scheduling only with a known depth, a known timing error and
    /// at least one telescope able to observe it.
    pub fn is_eligible(&self) -> bool {
        self.depth.is_some() && self.last_tmid_err.is_some() && !self.observable_from.is_empty()
    }

    /// Set and return the accuracy threshold under `policy`.
    pub fn determine_threshold(&mut self, policy: ThresholdPolicy) -> Minutes {
        self.threshold = policy.threshold_for(self.duration);
        self.threshold
    }

    /// Timing uncertainty (days) of a prediction `epochs` periods after the last measurement.
    ///
    /// A missing period error counts as zero. Returns `None` without a last timing error.
    pub fn propagated_error(&self, epochs: f64) -> Option<Days> {
        let e0 = self.last_tmid_err?;
        let pe = self.period_err.unwrap_or(0.0);
        Some((e0 * e0 + epochs * epochs * pe * pe).sqrt())
    }

    /// Propagate the timing error to `date` and store it (minutes, `+∞` without data).
    pub fn update_current_error(&mut self, date: Tjd) -> Minutes {
        let epochs = ((date - self.last_tmid) / self.period).max(0.0);
        self.current_err = self
            .propagated_error(epochs)
            .map_or(f64::INFINITY, |e| e * MINUTES_PER_DAY);
        self.current_err
    }

    /// Compute the expiry date for an accuracy threshold of `threshold` minutes.
    ///
    /// The expiry is `last_tmid + n·period` with `n` the smallest epoch count for which the
    /// propagated error exceeds the threshold. If the error of the last measurement already
    /// reaches the threshold (equality included), the expiry is the last measurement itself.
    ///
    /// Special cases
    /// -----------------
    /// * no last timing error: expiry is `−∞`, the target is always due,
    /// * zero or missing period error: the error never grows, expiry is `+∞`,
    /// * `n` beyond [`MAX_EXPIRY_EPOCHS`]: expiry is `+∞`.
    ///
    /// Return
    /// ----------
    /// * the new expiry, also stored on the target.
    pub fn compute_expiry(&mut self, threshold: Minutes) -> Tjd {
        self.expiry = match self.last_tmid_err {
            None => f64::NEG_INFINITY,
            Some(e0) => {
                let limit = threshold / MINUTES_PER_DAY;
                let pe = self.period_err.unwrap_or(0.0);
                if e0 >= limit {
                    self.last_tmid
                } else if pe <= 0.0 {
                    f64::INFINITY
                } else {
                    match self.epochs_to_threshold(e0, pe, limit) {
                        Some(n) => self.last_tmid + n as f64 * self.period,
                        None => {
                            warn!(object = %self.name, "expiry search hit its epoch bound");
                            f64::INFINITY
                        }
                    }
                }
            }
        };
        self.expiry
    }

    /// Smallest `n ≥ 1` with `sqrt(e0² + (n·pe)²) > limit`, seeded from the closed form.
    fn epochs_to_threshold(&self, e0: Days, pe: Days, limit: Days) -> Option<u64> {
        let exceeds = |n: u64| {
            let drift = n as f64 * pe;
            (e0 * e0 + drift * drift).sqrt() > limit
        };

        let seed = ((limit * limit - e0 * e0).max(0.0).sqrt() / pe).floor();
        if !seed.is_finite() || seed > MAX_EXPIRY_EPOCHS as f64 {
            return None;
        }
        let mut n = (seed as u64).max(1);
        while n > 1 && exceeds(n - 1) {
            n -= 1;
        }
        while !exceeds(n) {
            n += 1;
            if n > MAX_EXPIRY_EPOCHS {
                return None;
            }
        }
        Some(n)
    }

    /// Propagate the timing error from `current` to `horizon` and store it (minutes).
    ///
    /// `+∞` when the target has no timing error.
    pub fn compute_error_at_horizon(&mut self, current: Tjd, horizon: Tjd) -> Minutes {
        let remaining_epochs = (horizon - current) / self.period;
        self.err_at_horizon = self
            .propagated_error(remaining_epochs)
            .map_or(f64::INFINITY, |e| e * MINUTES_PER_DAY);
        self.err_at_horizon
    }

    /// Whether the target needs new data at `date` under `policy`.
    pub fn is_required(&self, date: Tjd, policy: &impl SelectionStrategy) -> bool {
        policy.is_required(self, date)
    }

    /// Recompute threshold and strategy quantities at `date`, then test the requirement.
    pub fn refresh_selection(
        &mut self,
        date: Tjd,
        policy: &impl SelectionStrategy,
        thresholds: ThresholdPolicy,
    ) -> bool {
        self.threshold = policy.threshold(self, thresholds);
        policy.recalculate(self, date);
        policy.is_required(self, date)
    }

    /// Append a measurement. The "last" ephemeris fields follow the most recent transit.
    pub fn record_measurement(&mut self, measurement: TimingMeasurement) {
        if measurement.tmid > self.last_tmid || self.last_tmid_err.is_none() {
            self.last_epoch = measurement.epoch;
            self.last_tmid = measurement.tmid;
            self.last_tmid_err = Some(measurement.tmid_err);
        }
        self.observations.push(measurement);
    }

    /// Refine period and period error from the recorded measurements.
    ///
    /// The refit is skipped, keeping the previous ephemeris, when there are too few
    /// measurements, when the fit fails numerically, or when it yields a non-positive period.
    ///
    /// Return
    /// ----------
    /// * the applied fit, or `None` when the previous period was kept.
    pub fn refit_period(&mut self) -> Option<PeriodFit> {
        match fit_linear_ephemeris(&self.observations) {
            Ok(fit) if fit.period > 0.0 => {
                debug!(
                    object = %self.name,
                    period = fit.period,
                    period_err = fit.period_err,
                    "period refitted"
                );
                self.period = fit.period;
                self.period_err = Some(fit.period_err);
                Some(fit)
            }
            Ok(fit) => {
                warn!(object = %self.name, period = fit.period, "rejected non-positive period fit");
                None
            }
            Err(PeriodFitError::TooFewPoints { .. }) => None,
            Err(err) => {
                warn!(object = %self.name, %err, "period refit skipped");
                None
            }
        }
    }
}

/// Builder for [`Target`], with validation.
#[derive(Debug, Clone)]
pub struct TargetBuilder {
    target: Target,
}

impl TargetBuilder {
    fn new(name: impl Into<Arc<str>>) -> Self {
        TargetBuilder {
            target: Target {
                name: name.into(),
                ra: 0.0,
                dec: 0.0,
                period: 0.0,
                period_err: None,
                duration: 0.0,
                depth: None,
                star_mag: 0.0,
                last_tmid: 0.0,
                last_tmid_err: None,
                last_epoch: 0,
                real: true,
                ignore_moon: false,
                observations: SmallVec::new(),
                threshold: 0.0,
                expiry: f64::NEG_INFINITY,
                current_err: f64::INFINITY,
                err_at_horizon: f64::INFINITY,
                observable_from: BTreeSet::new(),
            },
        }
    }

    pub fn coordinates(mut self, ra: Degree, dec: Degree) -> Self {
        self.target.ra = ra;
        self.target.dec = dec;
        self
    }

    pub fn period(mut self, v: Days) -> Self {
        self.target.period = v;
        self
    }

    pub fn period_err(mut self, v: Option<Days>) -> Self {
        self.target.period_err = v;
        self
    }

    pub fn duration(mut self, v: Minutes) -> Self {
        self.target.duration = v;
        self
    }

    pub fn depth(mut self, v: Option<f64>) -> Self {
        self.target.depth = v;
        self
    }

    pub fn star_mag(mut self, v: f64) -> Self {
        self.target.star_mag = v;
        self
    }

    /// Reference transit: mid-time, its uncertainty (days) and epoch.
    pub fn last_transit(mut self, tmid: Tjd, tmid_err: Option<Days>, epoch: i64) -> Self {
        self.target.last_tmid = tmid;
        self.target.last_tmid_err = tmid_err;
        self.target.last_epoch = epoch;
        self
    }

    pub fn real(mut self, v: bool) -> Self {
        self.target.real = v;
        self
    }

    pub fn ignore_moon(mut self, v: bool) -> Self {
        self.target.ignore_moon = v;
        self
    }

    pub fn observable_from(mut self, telescopes: impl IntoIterator<Item = TelescopeIdx>) -> Self {
        self.target.set_observable_from(telescopes);
        self
    }

    /// Validate and produce the [`Target`].
    ///
    /// Errors
    /// ----------
    /// * [`ExoschedError::InvalidCatalogRow`] when the period or the duration is not strictly
    ///   positive, the coordinates are out of range, or a time is not finite.
    pub fn build(self) -> Result<Target, ExoschedError> {
        let t = &self.target;
        let reject = |reason: &str| {
            Err(ExoschedError::InvalidCatalogRow {
                name: t.name.to_string(),
                reason: reason.to_string(),
            })
        };

        if !(t.period > 0.0 && t.period.is_finite()) {
            return reject("period must be > 0");
        }
        if !(t.duration > 0.0 && t.duration.is_finite()) {
            return reject("duration must be > 0");
        }
        if !(0.0..=360.0).contains(&t.ra) || !(-90.0..=90.0).contains(&t.dec) {
            return reject("coordinates out of range");
        }
        if !t.last_tmid.is_finite() {
            return reject("last_tmid must be finite");
        }
        if t.last_tmid_err.is_some_and(|e| !(e >= 0.0 && e.is_finite())) {
            return reject("last_tmid_err must be >= 0");
        }
        if t.period_err.is_some_and(|e| !(e >= 0.0 && e.is_finite())) {
            return reject("period_err must be >= 0");
        }

        Ok(self.target)
    }
}

#[cfg(test)]
mod targets_test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn hat_p_7() -> TargetBuilder {
        Target::builder("HAT-P-7b")
            .coordinates(292.25, 47.97)
            .period(2.2047354)
            .period_err(Some(0.0001))
            .duration(240.0)
            .depth(Some(7.0))
            .star_mag(10.5)
            .last_transit(59000.0, Some(5.0 / MINUTES_PER_DAY), 0)
    }

    #[test]
    fn test_builder_rejects_bad_ephemeris() {
        assert!(hat_p_7().build().is_ok());
        assert!(matches!(
            hat_p_7().period(0.0).build(),
            Err(ExoschedError::InvalidCatalogRow { .. })
        ));
        assert!(hat_p_7().duration(-3.0).build().is_err());
        assert!(hat_p_7().coordinates(10.0, 95.0).build().is_err());
        assert!(hat_p_7().period_err(Some(f64::NAN)).build().is_err());
    }

    #[test]
    fn test_expiry_minimal_epoch_count() {
        // threshold 10 min, e0 5 min, σP = 0.0001 d = 0.144 min:
        // sqrt(25 + (0.144 n)²) > 10 first holds for n = 61
        let mut target = hat_p_7().build().unwrap();
        let expiry = target.compute_expiry(10.0);
        assert_abs_diff_eq!(expiry, 59000.0 + 61.0 * 2.2047354, epsilon = 1e-9);

        let e = |n: f64| target.propagated_error(n).unwrap() * MINUTES_PER_DAY;
        assert!(e(60.0) <= 10.0);
        assert!(e(61.0) > 10.0);
    }

    #[test]
    fn test_expiry_already_exceeded() {
        let mut target = hat_p_7()
            .last_transit(59000.0, Some(12.0 / MINUTES_PER_DAY), 3)
            .build()
            .unwrap();
        assert_eq!(target.compute_expiry(10.0), 59000.0);
    }

    #[test]
    fn test_expiry_with_error_at_threshold() {
        let mut target = hat_p_7()
            .last_transit(59000.0, Some(10.0 / MINUTES_PER_DAY), 3)
            .build()
            .unwrap();
        assert_eq!(target.compute_expiry(10.0), 59000.0);
        // just under the threshold the first propagated epoch already crosses it
        let mut target = hat_p_7()
            .last_transit(59000.0, Some(9.999 / MINUTES_PER_DAY), 3)
            .build()
            .unwrap();
        assert_eq!(target.compute_expiry(10.0), 59000.0 + 2.2047354);
    }

    #[test]
    fn test_expiry_without_period_error_never_expires() {
        let mut target = hat_p_7().period_err(Some(0.0)).build().unwrap();
        assert_eq!(target.compute_expiry(10.0), f64::INFINITY);
        let mut target = hat_p_7().period_err(None).build().unwrap();
        assert_eq!(target.compute_expiry(10.0), f64::INFINITY);
    }

    #[test]
    fn test_expiry_without_timing_error_is_always_due() {
        let mut target = hat_p_7().last_transit(59000.0, None, 0).build().unwrap();
        assert_eq!(target.compute_expiry(10.0), f64::NEG_INFINITY);
        assert_eq!(target.compute_error_at_horizon(59000.0, 60000.0), f64::INFINITY);
        assert!(!target.is_eligible());
    }

    #[test]
    fn test_expiry_bounded_for_tiny_period_error() {
        let mut target = hat_p_7().period_err(Some(1e-15)).build().unwrap();
        assert_eq!(target.compute_expiry(10.0), f64::INFINITY);
    }

    #[test]
    fn test_error_at_horizon() {
        let mut target = hat_p_7().build().unwrap();
        let horizon = 59000.0 + 100.0 * 2.2047354;
        let err = target.compute_error_at_horizon(59000.0, horizon);
        // sqrt(5² + 14.4²)
        assert_abs_diff_eq!(err, (25.0_f64 + 14.4 * 14.4).sqrt(), epsilon = 1e-6);
        assert_eq!(target.err_at_horizon(), err);
    }

    #[test]
    fn test_record_measurement_updates_last_fields() {
        let mut target = hat_p_7().build().unwrap();
        target.record_measurement(TimingMeasurement {
            epoch: 10,
            tmid: 59022.05,
            tmid_err: 0.0004,
        });
        assert_eq!(target.last_epoch, 10);
        assert_eq!(target.last_tmid, 59022.05);
        assert_eq!(target.last_tmid_err, Some(0.0004));

        // an older measurement is kept in the history only
        target.record_measurement(TimingMeasurement {
            epoch: 2,
            tmid: 59004.41,
            tmid_err: 0.0003,
        });
        assert_eq!(target.last_epoch, 10);
        assert_eq!(target.observations().len(), 2);
    }

    #[test]
    fn test_refit_keeps_period_with_few_points() {
        let mut target = hat_p_7().build().unwrap();
        for epoch in 1..=3 {
            target.record_measurement(TimingMeasurement {
                epoch,
                tmid: 59000.0 + epoch as f64 * 2.2047354,
                tmid_err: 0.0004,
            });
        }
        assert!(target.refit_period().is_none());
        assert_eq!(target.period, 2.2047354);
        assert_eq!(target.period_err, Some(0.0001));
    }

    #[test]
    fn test_refit_refines_period() {
        let mut target = hat_p_7().period(2.2).build().unwrap();
        for (i, epoch) in [1_i64, 20, 55, 90, 130].into_iter().enumerate() {
            let jitter = if i % 2 == 0 { 1e-5 } else { -1e-5 };
            target.record_measurement(TimingMeasurement {
                epoch,
                tmid: 59000.0 + epoch as f64 * 2.2047354 + jitter,
                tmid_err: 0.0004,
            });
        }
        let fit = target.refit_period().unwrap();
        assert_abs_diff_eq!(target.period, 2.2047354, epsilon = 1e-6);
        assert!(fit.period_err < 0.0001);
        assert_eq!(target.period_err, Some(fit.period_err));
    }

    #[test]
    fn test_rejected_fit_keeps_period() {
        let mut target = hat_p_7().build().unwrap();
        for epoch in 0..5_i64 {
            target.record_measurement(TimingMeasurement {
                epoch,
                tmid: 59000.0,
                tmid_err: if epoch == 4 { -1.0 } else { 0.0004 },
            });
        }
        assert!(target.refit_period().is_none());
        assert_eq!(target.period, 2.2047354);
    }

    proptest! {
        #[test]
        fn propagated_error_grows_with_epochs(
            e0 in 1e-5_f64..1e-2,
            pe in 1e-7_f64..1e-3,
            n in 0_u32..100_000,
        ) {
            let target = hat_p_7()
                .period_err(Some(pe))
                .last_transit(59000.0, Some(e0), 0)
                .build()
                .unwrap();
            let now = target.propagated_error(n as f64).unwrap();
            let next = target.propagated_error(n as f64 + 1.0).unwrap();
            prop_assert!(next > now);
        }
    }
}
