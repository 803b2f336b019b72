//! Forecast records and their coverage of a visibility window.
use std::sync::Arc;

use crate::constants::{Days, Minutes, TargetIdx, TelescopeIdx, Tjd};
use crate::geometry::sun_moon::MoonState;
use crate::geometry::Window;
use crate::targets::Target;

/// Age of the last measurement (days) beyond which a transit gains priority.
const STALE_MEASUREMENT_DAYS: Days = 730.0;

/// Period (days) beyond which a transit gains priority.
const LONG_PERIOD_DAYS: Days = 30.0;

/// Portion of a transit falling inside a visibility window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coverage {
    /// First observable instant of the transit, the window start for a partial one
    pub ingress: Tjd,
    /// Last observable instant of the transit, the window end for a partial one
    pub egress: Tjd,
    pub ingress_visible: bool,
    pub egress_visible: bool,
    /// Observable share of the transit duration, `1.0` when fully visible
    pub fraction: f64,
}

impl Coverage {
    pub fn is_full(&self) -> bool {
        self.ingress_visible && self.egress_visible
    }
}

/// Decide whether the transit `[ingress, egress]` can be observed within `window`.
///
/// A transit is fully visible when ingress and egress both fall strictly inside the window.
/// With `allow_partial`, a transit with a single visible edge is kept when the visible share of
/// its duration is **strictly** greater than `partial_fraction`; the hidden edge is then clipped
/// to the window.
///
/// Arguments
/// -----------------
/// * `ingress`, `egress`: predicted transit edges
/// * `window`: controlling visibility window, possibly unbounded
/// * `allow_partial`: accept transits with one hidden edge
/// * `partial_fraction`: minimum visible share for a partial transit
///
/// Return
/// ----------
/// * `None` when the transit is not observable.
pub fn assess_coverage(
    ingress: Tjd,
    egress: Tjd,
    window: &Window,
    allow_partial: bool,
    partial_fraction: f64,
) -> Option<Coverage> {
    let duration = egress - ingress;
    let required = partial_fraction * duration;

    if ingress > window.start {
        if egress < window.end {
            return Some(Coverage {
                ingress,
                egress,
                ingress_visible: true,
                egress_visible: true,
                fraction: 1.0,
            });
        }
        let visible = window.end - ingress;
        if allow_partial && visible > required {
            return Some(Coverage {
                ingress,
                egress: window.end,
                ingress_visible: true,
                egress_visible: false,
                fraction: visible / duration,
            });
        }
    } else if allow_partial && egress < window.end {
        let visible = egress - window.start;
        if visible > required {
            return Some(Coverage {
                ingress: window.start,
                egress,
                ingress_visible: false,
                egress_visible: true,
                fraction: visible / duration,
            });
        }
    }
    None
}

/// Priority score of a transit, larger is more urgent.
///
/// * `+2` when a single telescope can host the transit,
/// * `+1` when the last measurement is older than two years at `reference`,
/// * `+2` when the period exceeds 30 days.
pub fn calculate_priority(visible_from: usize, target: &Target, reference: Tjd) -> u8 {
    let mut score = 0;
    if visible_from == 1 {
        score += 2;
    }
    if reference - target.last_tmid > STALE_MEASUREMENT_DAYS {
        score += 1;
    }
    if target.period > LONG_PERIOD_DAYS {
        score += 2;
    }
    score
}

/// One predicted transit as seen from one telescope.
///
/// A transit observable from several telescopes yields one record per telescope, all sharing
/// `target`, `epoch` and `visible_from`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transit {
    /// Index of the target in the catalog slice the forecast ran over
    pub target: TargetIdx,
    pub target_name: Arc<str>,
    pub telescope: TelescopeIdx,
    pub epoch: i64,
    pub center: Tjd,
    /// Predicted ingress, `center − duration/2`
    pub ingress: Tjd,
    /// Predicted egress, `center + duration/2`
    pub egress: Tjd,
    pub duration: Minutes,
    /// Dark time at the telescope around the centre
    pub night: Window,
    /// Interval with the target above the minimum altitude
    pub target_window: Window,
    /// Intersection of `night` and `target_window`
    pub window: Window,
    pub coverage: Coverage,
    /// Moon condition at the centre
    pub moon: MoonState,
    /// Number of telescopes able to host this transit
    pub visible_from: usize,
    pub priority: u8,
    /// Set once an observing unit has booked the transit
    pub scheduled: bool,
}

impl Transit {
    /// Observable part of the transit.
    pub fn visible_span(&self) -> Window {
        Window::new(self.coverage.ingress, self.coverage.egress)
    }
}

#[cfg(test)]
mod transit_test {
    use super::*;

    #[test]
    fn test_full_transit_inside_window() {
        let window = Window::new(10.0, 11.0);
        let c = assess_coverage(10.2, 10.3, &window, false, 0.55).unwrap();
        assert!(c.is_full());
        assert_eq!(c.fraction, 1.0);
        assert_eq!((c.ingress, c.egress), (10.2, 10.3));

        let c = assess_coverage(10.2, 10.3, &Window::unbounded(), false, 0.55).unwrap();
        assert!(c.is_full());
    }

    #[test]
    fn test_partial_transit_requires_flag() {
        let window = Window::new(0.0, 0.8);
        assert_eq!(assess_coverage(0.1, 1.1, &window, false, 0.55), None);

        let c = assess_coverage(0.1, 1.1, &window, true, 0.55).unwrap();
        assert!(c.ingress_visible && !c.egress_visible);
        assert_eq!(c.egress, 0.8);
        assert!((c.fraction - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_partial_fraction_is_strict() {
        // exactly 55 % of the transit inside the window
        let at_limit = Window::new(-1.0, 0.55);
        assert_eq!(assess_coverage(0.0, 1.0, &at_limit, true, 0.55), None);

        let above = Window::new(-1.0, 0.5501);
        assert!(assess_coverage(0.0, 1.0, &above, true, 0.55).is_some());

        // same boundary on the egress side
        let at_limit = Window::new(0.45, 2.0);
        assert_eq!(assess_coverage(0.0, 1.0, &at_limit, true, 0.55), None);
        let above = Window::new(0.4499, 2.0);
        let c = assess_coverage(0.0, 1.0, &above, true, 0.55).unwrap();
        assert!(!c.ingress_visible && c.egress_visible);
        assert_eq!(c.ingress, 0.4499);
    }

    #[test]
    fn test_window_inside_transit_is_rejected() {
        let window = Window::new(0.2, 0.8);
        assert_eq!(assess_coverage(0.0, 1.0, &window, true, 0.55), None);
    }

    #[test]
    fn test_priority_score() {
        let target = Target::builder("Kepler-167e")
            .coordinates(286.0, 38.9)
            .period(1071.23)
            .duration(960.0)
            .last_transit(57000.0, Some(0.001), 0)
            .build()
            .unwrap();
        assert_eq!(calculate_priority(1, &target, 57100.0), 4);
        assert_eq!(calculate_priority(3, &target, 57100.0), 2);
        assert_eq!(calculate_priority(1, &target, 58000.0), 5);
    }
}
