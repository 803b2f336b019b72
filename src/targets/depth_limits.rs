//! Photometric detectability of a transit from a given telescope.
//!
//! The shallowest detectable depth depends on the aperture, the transit duration and the
//! host star magnitude. It is tabulated as coefficients `(a, b)` per aperture (rounded to
//! 0.01 m) and duration (rounded to 0.1 h):
//!
//! ```text
//! depth_limit [mmag] = a · exp(b · magnitude) · 10
//! ```
//!
//! The coefficients describe a limit in percent; the factor 10 converts to milli-magnitudes.
use serde::Deserialize;

use crate::constants::{Hours, Meter, Minutes, MINUTES_PER_HOUR};
use crate::telescopes::Network;

use super::Target;

/// One row of a depth-limit table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DepthLimit {
    pub aperture: Meter,
    pub duration_hours: Hours,
    pub a: f64,
    pub b: f64,
}

/// Depth-limit coefficients for a set of apertures and durations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthLimitTable {
    rows: Vec<DepthLimit>,
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (x * scale).round() / scale
}

impl DepthLimitTable {
    pub fn new(rows: Vec<DepthLimit>) -> Self {
        DepthLimitTable { rows }
    }

    pub fn rows(&self) -> &[DepthLimit] {
        &self.rows
    }

    /// Shallowest detectable depth (mmag) for a transit of `duration` minutes on a star of
    /// magnitude `star_mag`, observed with an aperture of `aperture` meters.
    ///
    /// Return
    /// ----------
    /// * `None` when the table has no row for the rounded aperture and duration.
    pub fn limit(&self, aperture: Meter, duration: Minutes, star_mag: f64) -> Option<f64> {
        let aperture = round_to(aperture, 2);
        let duration_hours = round_to(duration / MINUTES_PER_HOUR, 1);
        self.rows
            .iter()
            .find(|row| {
                round_to(row.aperture, 2) == aperture
                    && round_to(row.duration_hours, 1) == duration_hours
            })
            .map(|row| row.a * (row.b * star_mag).exp() * 10.0)
    }
}

/// Rule deciding which telescopes can observe a target.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ObservabilityRule {
    /// Every telescope can observe every target.
    #[default]
    AllInstruments,
    /// A telescope observes a target whose depth exceeds its tabulated limit.
    DepthLimited(DepthLimitTable),
}

impl Target {
    /// Fill the set of telescopes able to observe this target under `rule`.
    ///
    /// With [`ObservabilityRule::DepthLimited`], a target without a depth, or a telescope with
    /// no matching table row, yields no entry.
    pub fn determine_telescope_visibility(&mut self, network: &Network, rule: &ObservabilityRule) {
        let observable: Vec<_> = match rule {
            ObservabilityRule::AllInstruments => network.indices().collect(),
            ObservabilityRule::DepthLimited(table) => match self.depth {
                None => Vec::new(),
                Some(depth) => network
                    .iter()
                    .filter(|(_, telescope)| {
                        table
                            .limit(telescope.aperture, self.duration, self.star_mag)
                            .is_some_and(|limit| depth > limit)
                    })
                    .map(|(idx, _)| idx)
                    .collect(),
            },
        };
        self.set_observable_from(observable);
    }
}
