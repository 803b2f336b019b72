//! # Transit forecasting
//!
//! This module predicts the transits of a target over a time window and checks, for every
//! telescope able to observe the target, whether each transit can actually be followed from
//! the ground.
//!
//! ## Pipeline
//!
//! 1. **Epoch enumeration**
//!    Starting from the last measured mid-transit time, epochs `n = 1, 2, …` are stepped one
//!    period at a time. Every centre lying strictly inside the open window `(start, end)` is a
//!    candidate; ingress and egress are `centre ∓ duration/2`.
//!
//! 2. **Visibility** ([`visibility::assess_visibility`])
//!    For each telescope, the night window (Sun below [`ForecastParams::sun_altitude`]) is
//!    intersected with the target window (target above
//!    [`ForecastParams::min_target_altitude`]). The transit must fit this intersection,
//!    completely or, with [`ForecastParams::allow_partial`], for more than
//!    [`ForecastParams::partial_fraction`] of its duration.
//!
//! 3. **Moon filter**
//!    A transit whose centre happens under a bright risen moon is discarded, unless the filter
//!    is disabled or the target carries [`Target::ignore_moon`].
//!
//! 4. **Records**
//!    A transit visible from `k` telescopes produces `k` [`Transit`] records, one per telescope,
//!    each tagged with `visible_from = k` and a [`transit::calculate_priority`] score.
//!
//! ## Example
//!
//! ```rust,no_run
//! use exosched::forecast::{forecast, ForecastParams};
//! use exosched::geometry::Window;
//! # let target: exosched::targets::Target = unimplemented!();
//! # let network: exosched::telescopes::Network = unimplemented!();
//!
//! let params = ForecastParams::builder()
//!     .allow_partial(true)
//!     .max_moon_illumination(0.8)
//!     .build()
//!     .unwrap();
//!
//! let transits = forecast(&target, 0, Window::new(59300.5, 59307.5), &network, &params).unwrap();
//! ```
//!
//! ## See also
//! ------------
//! * [`crate::geometry`] – rise/set solver behind the night and target windows.
//! * [`crate::scheduler`] – packing of the forecast records into bookings.
pub mod transit;
pub mod visibility;

use std::cmp::Ordering::{Equal, Greater};
use std::fmt;

use tracing::debug;

use crate::constants::{
    Degree, TargetIdx, NIGHT_SUN_ALTITUDE, MIN_TARGET_ALTITUDE, PARTIAL_TRANSIT_FRACTION,
};
use crate::exosched_errors::ExoschedError;
use crate::geometry::Window;
use crate::targets::Target;
use crate::telescopes::Network;

pub use transit::{Coverage, Transit};
use transit::calculate_priority;
use visibility::assess_visibility;

/// Parameters of the visibility checks.
///
/// Defaults
/// -----------------
/// * `sun_altitude`: −20° (night below)
/// * `min_target_altitude`: 30°
/// * `allow_partial`: false
/// * `partial_fraction`: 0.55, compared strictly
/// * `moon_filter`: true
/// * `max_moon_illumination`: 0.9
/// * `max_moon_altitude`: 0°
///
/// A transit is rejected by the moon filter when the lunar illumination exceeds
/// `max_moon_illumination` **and** the Moon stands higher than `max_moon_altitude`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastParams {
    pub sun_altitude: Degree,
    pub min_target_altitude: Degree,
    pub allow_partial: bool,
    pub partial_fraction: f64,
    pub moon_filter: bool,
    pub max_moon_illumination: f64,
    pub max_moon_altitude: Degree,
}

impl ForecastParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a [`ForecastParamsBuilder`] initialised with the defaults.
    pub fn builder() -> ForecastParamsBuilder {
        ForecastParamsBuilder::new()
    }
}

impl Default for ForecastParams {
    fn default() -> Self {
        ForecastParams {
            sun_altitude: NIGHT_SUN_ALTITUDE,
            min_target_altitude: MIN_TARGET_ALTITUDE,
            allow_partial: false,
            partial_fraction: PARTIAL_TRANSIT_FRACTION,
            moon_filter: true,
            max_moon_illumination: 0.9,
            max_moon_altitude: 0.0,
        }
    }
}

/// Builder for [`ForecastParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct ForecastParamsBuilder {
    params: ForecastParams,
}

impl ForecastParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: ForecastParams::default(),
        }
    }

    pub fn sun_altitude(mut self, v: Degree) -> Self {
        self.params.sun_altitude = v;
        self
    }
    pub fn min_target_altitude(mut self, v: Degree) -> Self {
        self.params.min_target_altitude = v;
        self
    }
    pub fn allow_partial(mut self, v: bool) -> Self {
        self.params.allow_partial = v;
        self
    }
    pub fn partial_fraction(mut self, v: f64) -> Self {
        self.params.partial_fraction = v;
        self
    }
    pub fn moon_filter(mut self, v: bool) -> Self {
        self.params.moon_filter = v;
        self
    }
    pub fn max_moon_illumination(mut self, v: f64) -> Self {
        self.params.max_moon_illumination = v;
        self
    }
    pub fn max_moon_altitude(mut self, v: Degree) -> Self {
        self.params.max_moon_altitude = v;
        self
    }

    /// Return true iff `x` lies in `[-90, 90]` (NaN rejected).
    #[inline]
    fn is_altitude(x: f64) -> bool {
        (-90.0..=90.0).contains(&x)
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * every altitude lies in `[-90, 90]`,
    /// * `0 < partial_fraction ≤ 1`,
    /// * `0 ≤ max_moon_illumination ≤ 1`.
    pub fn build(self) -> Result<ForecastParams, ExoschedError> {
        let p = &self.params;

        if !Self::is_altitude(p.sun_altitude)
            || !Self::is_altitude(p.min_target_altitude)
            || !Self::is_altitude(p.max_moon_altitude)
        {
            return Err(ExoschedError::InvalidParameter(
                "altitudes must lie in [-90, 90] degrees".into(),
            ));
        }
        if !(p.partial_fraction.partial_cmp(&0.0) == Some(Greater) && p.partial_fraction <= 1.0) {
            return Err(ExoschedError::InvalidParameter(
                "partial_fraction must lie in (0, 1]".into(),
            ));
        }
        if !(matches!(p.max_moon_illumination.partial_cmp(&0.0), Some(Greater | Equal))
            && p.max_moon_illumination <= 1.0)
        {
            return Err(ExoschedError::InvalidParameter(
                "max_moon_illumination must lie in [0, 1]".into(),
            ));
        }

        Ok(self.params)
    }
}

impl fmt::Display for ForecastParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 50;
            writeln!(f, "Forecast Parameters")?;
            writeln!(f, "-------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Night / target]")?;
            line!("sun_altitude          = {:.1} deg", self.sun_altitude, "Night below this Sun altitude")?;
            line!("min_target_altitude   = {:.1} deg", self.min_target_altitude, "Lowest usable target altitude")?;
            line!("allow_partial         = {}", self.allow_partial, "Accept transits with a hidden edge")?;
            line!("partial_fraction      = {:.2}", self.partial_fraction, "Visible share required (strict)")?;

            writeln!(f, "\n[Moon]")?;
            line!("moon_filter           = {}", self.moon_filter, "Reject transits under a bright moon")?;
            line!("max_moon_illumination = {:.2}", self.max_moon_illumination, "Brightest acceptable moon")?;
            line!("max_moon_altitude     = {:.1} deg", self.max_moon_altitude, "Bright moon harmless below this")?;
            Ok(())
        } else {
            write!(
                f,
                "ForecastParams(sun≤{:.1}°, target≥{:.1}°, partial={} (>{:.2}), moon_filter={} (illum>{:.2}, alt>{:.1}°))",
                self.sun_altitude,
                self.min_target_altitude,
                self.allow_partial,
                self.partial_fraction,
                self.moon_filter,
                self.max_moon_illumination,
                self.max_moon_altitude,
            )
        }
    }
}

/// Forecast the observable transits of one target over `window`.
///
/// Arguments
/// -----------------
/// * `target`: the target, its reference transit seeds the epoch enumeration
/// * `target_idx`: index recorded in the produced [`Transit`] records
/// * `window`: open interval the transit centres must fall in
/// * `network`: telescopes, only those in [`Target::observable_from`] are checked
/// * `params`: visibility parameters
///
/// Return
/// ----------
/// * one [`Transit`] per (epoch, telescope) pair that passed every check, in epoch order.
///
/// Errors
/// ----------
/// * [`ExoschedError::UnknownTelescope`] when the target refers to a telescope missing from
///   `network`.
pub fn forecast(
    target: &Target,
    target_idx: TargetIdx,
    window: Window,
    network: &Network,
    params: &ForecastParams,
) -> Result<Vec<Transit>, ExoschedError> {
    let mut transits = Vec::new();
    if !(window.start < window.end) {
        return Ok(transits);
    }

    let telescopes = target
        .observable_from()
        .iter()
        .map(|&idx| network.telescope(idx).map(|telescope| (idx, telescope)))
        .collect::<Result<Vec<_>, _>>()?;

    let skipped = ((window.start - target.last_tmid) / target.period).floor().max(0.0);
    let half = target.duration_days() / 2.0;
    let mut n = skipped as i64 + 1;
    loop {
        let center = target.last_tmid + n as f64 * target.period;
        if center >= window.end {
            break;
        }
        if center > window.start {
            let visible: Vec<_> = telescopes
                .iter()
                .filter_map(|(idx, telescope)| {
                    assess_visibility(target, center, &telescope.location(), params)
                        .map(|v| (*idx, v))
                })
                .collect();

            let visible_from = visible.len();
            let priority = calculate_priority(visible_from, target, window.start);
            transits.extend(visible.into_iter().map(|(telescope, v)| Transit {
                target: target_idx,
                target_name: target.name.clone(),
                telescope,
                epoch: target.last_epoch + n,
                center,
                ingress: center - half,
                egress: center + half,
                duration: target.duration,
                night: v.night,
                target_window: v.target_window,
                window: v.window,
                coverage: v.coverage,
                moon: v.moon,
                visible_from,
                priority,
                scheduled: false,
            }));
        }
        n += 1;
    }

    debug!(object = %target.name, transits = transits.len(), "forecast done");
    Ok(transits)
}

/// Forecast several targets over `window` and merge the records by centre time.
///
/// `selected` holds indices into `targets`; records of equal centre keep the selection order.
pub fn forecast_network(
    targets: &[Target],
    selected: &[TargetIdx],
    window: Window,
    network: &Network,
    params: &ForecastParams,
) -> Result<Vec<Transit>, ExoschedError> {
    let mut transits = Vec::new();
    for &idx in selected {
        let target = targets
            .get(idx)
            .ok_or_else(|| ExoschedError::UnknownTarget(format!("#{idx}")))?;
        transits.extend(forecast(target, idx, window, network, params)?);
    }
    transits.sort_by(|a, b| a.center.total_cmp(&b.center));
    Ok(transits)
}
