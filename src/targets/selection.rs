//! Target selection strategies.
//!
//! Two strategies decide whether a target needs new timing data:
//!
//! * [`Selective`] observes targets whose ephemeris has **expired**: the error propagated
//!   from the last measurement has already crossed the accuracy threshold.
//! * [`Initial`] observes targets whose error propagated to a fixed future **horizon** would
//!   still be at or above the threshold.
//!
//! Both implement [`SelectionStrategy`]; [`SelectionPolicy`] is the tagged choice carried
//! by the simulation parameters.
use std::fmt;

use crate::constants::{Minutes, Tjd};

use super::Target;

/// How the per-target accuracy threshold is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdPolicy {
    /// Fixed threshold in minutes, identical for every target.
    Minutes(f64),
    /// Threshold resolving the transit duration to the given significance:
    /// `duration / (4 · sigma)`.
    Sigma(f64),
}

impl ThresholdPolicy {
    /// Accuracy threshold (minutes) for a transit lasting `duration` minutes.
    pub fn threshold_for(&self, duration: Minutes) -> Minutes {
        match *self {
            ThresholdPolicy::Minutes(value) => value,
            ThresholdPolicy::Sigma(sigma) => duration / (4.0 * sigma),
        }
    }

    pub(crate) fn value(&self) -> f64 {
        match *self {
            ThresholdPolicy::Minutes(v) | ThresholdPolicy::Sigma(v) => v,
        }
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::Minutes(10.0)
    }
}

impl fmt::Display for ThresholdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdPolicy::Minutes(v) => write!(f, "{v} min"),
            ThresholdPolicy::Sigma(v) => write!(f, "{v} sigma"),
        }
    }
}

/// Shared capability of the selection strategies.
pub trait SelectionStrategy {
    /// Accuracy threshold (minutes) the strategy holds `target` to.
    fn threshold(&self, target: &Target, thresholds: ThresholdPolicy) -> Minutes {
        thresholds.threshold_for(target.duration)
    }

    /// Refresh the derived quantities of `target` the strategy relies on, at `date`.
    fn recalculate(&self, target: &mut Target, date: Tjd);

    /// Whether `target` needs new timing data at `date`.
    fn is_required(&self, target: &Target, date: Tjd) -> bool;

    /// Sort key among required targets, larger first.
    fn urgency(&self, target: &Target) -> Minutes;
}

/// Observe targets once their ephemeris has expired.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Selective;

impl SelectionStrategy for Selective {
    fn recalculate(&self, target: &mut Target, date: Tjd) {
        target.compute_expiry(target.threshold());
        target.update_current_error(date);
    }

    fn is_required(&self, target: &Target, date: Tjd) -> bool {
        date > target.expiry()
    }

    fn urgency(&self, target: &Target) -> Minutes {
        target.current_err()
    }
}

/// Observe targets whose error at `horizon` would not meet the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Initial {
    pub horizon: Tjd,
}

impl SelectionStrategy for Initial {
    fn recalculate(&self, target: &mut Target, date: Tjd) {
        target.compute_error_at_horizon(date, self.horizon);
        target.update_current_error(date);
    }

    fn is_required(&self, target: &Target, _date: Tjd) -> bool {
        target.err_at_horizon() >= target.threshold()
    }

    fn urgency(&self, target: &Target) -> Minutes {
        target.err_at_horizon()
    }
}

/// Selection strategy chosen for a simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionPolicy {
    Selective(Selective),
    Initial(Initial),
}

impl SelectionPolicy {
    pub fn selective() -> Self {
        SelectionPolicy::Selective(Selective)
    }

    pub fn initial(horizon: Tjd) -> Self {
        SelectionPolicy::Initial(Initial { horizon })
    }

    fn strategy(&self) -> &dyn SelectionStrategy {
        match self {
            SelectionPolicy::Selective(s) => s,
            SelectionPolicy::Initial(s) => s,
        }
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::selective()
    }
}

impl SelectionStrategy for SelectionPolicy {
    fn threshold(&self, target: &Target, thresholds: ThresholdPolicy) -> Minutes {
        self.strategy().threshold(target, thresholds)
    }

    fn recalculate(&self, target: &mut Target, date: Tjd) {
        self.strategy().recalculate(target, date)
    }

    fn is_required(&self, target: &Target, date: Tjd) -> bool {
        self.strategy().is_required(target, date)
    }

    fn urgency(&self, target: &Target) -> Minutes {
        self.strategy().urgency(target)
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::Selective(_) => write!(f, "selective"),
            SelectionPolicy::Initial(Initial { horizon }) => write!(f, "initial (horizon {horizon:.1})"),
        }
    }
}
