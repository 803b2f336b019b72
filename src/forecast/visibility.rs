//! Night, target and moon checks for one transit at one site.
//!
//! The night runs from sunset to sunrise, both taken at the configured Sun altitude; the
//! target window runs from the instant the target climbs over the minimum altitude to the
//! instant it drops back under it. Both are computed for the UTC day of the transit centre and,
//! when the leading crossing falls after the centre, for the previous day instead.
//!
//! | Sun                                 | night                |
//! |-------------------------------------|----------------------|
//! | never above the night altitude      | whole day            |
//! | never below the night altitude      | none                 |
//!
//! | Target                              | target window        |
//! |-------------------------------------|----------------------|
//! | never below the minimum altitude    | whole day            |
//! | never above the minimum altitude    | none                 |
use crate::constants::{Days, Degree, Tjd};
use crate::geometry::sun_moon::{moon_state, sun_position, MoonState};
use crate::geometry::{crossing, Crossing, CrossingOrder, GeoSite, Window};
use crate::targets::Target;
use crate::time::midnight_utc;

use super::transit::{assess_coverage, Coverage};
use super::ForecastParams;

/// Geometry of an observable transit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visibility {
    pub night: Window,
    pub target_window: Window,
    pub window: Window,
    pub coverage: Coverage,
    pub moon: MoonState,
}

fn sun_crossing(midnight: Tjd, site: &GeoSite, sun_altitude: Degree) -> Crossing {
    let sun = sun_position(midnight);
    crossing(midnight, sun.ra, sun.dec, site, sun_altitude, CrossingOrder::SetFirst)
}

/// Night around `center` at `site`, `None` when the Sun never gets low enough.
pub fn night_window(center: Tjd, site: &GeoSite, sun_altitude: Degree) -> Option<Window> {
    let midnight = midnight_utc(center);
    let mut outcome = sun_crossing(midnight, site, sun_altitude);
    if let Crossing::RiseSet { set, .. } = outcome {
        if set > center {
            outcome = sun_crossing(midnight - 1.0, site, sun_altitude);
        }
    }
    match outcome {
        Crossing::RiseSet { rise, set } => Some(Window::new(set, rise)),
        Crossing::NeverAbove => Some(Window::unbounded()),
        Crossing::Circumpolar => None,
    }
}

/// Interval around `center` with the target above `min_altitude`, `None` when it never is.
pub fn target_window(
    center: Tjd,
    ra: Degree,
    dec: Degree,
    site: &GeoSite,
    min_altitude: Degree,
) -> Option<Window> {
    let midnight = midnight_utc(center);
    let rise_set = |day: Tjd| crossing(day, ra, dec, site, min_altitude, CrossingOrder::RiseFirst);

    let mut outcome = rise_set(midnight);
    if let Crossing::RiseSet { rise, .. } = outcome {
        if rise > center {
            outcome = rise_set(midnight - 1.0);
        }
    }
    match outcome {
        Crossing::RiseSet { rise, set } => Some(Window::new(rise, set)),
        Crossing::Circumpolar => Some(Window::unbounded()),
        Crossing::NeverAbove => None,
    }
}

/// Length (days) of the night starting on the evening of the UTC day `midnight`.
pub fn night_length(site: &GeoSite, midnight: Tjd, sun_altitude: Degree) -> Days {
    match sun_crossing(midnight, site, sun_altitude) {
        Crossing::RiseSet { rise, set } => (rise - set).max(0.0),
        Crossing::NeverAbove => 1.0,
        Crossing::Circumpolar => 0.0,
    }
}

/// Whether a bright, risen moon spoils observations at `moon`.
pub fn moon_contaminates(moon: &MoonState, params: &ForecastParams) -> bool {
    moon.illumination > params.max_moon_illumination && moon.altitude > params.max_moon_altitude
}

/// Visibility of the transit of `target` centred on `center`, seen from `site`.
///
/// Return
/// ----------
/// * `None` when there is no night, the target never rises high enough, the transit does not
///   fit the intersection of both windows, or the moon filter rejects it.
pub fn assess_visibility(
    target: &Target,
    center: Tjd,
    site: &GeoSite,
    params: &ForecastParams,
) -> Option<Visibility> {
    let half = target.duration_days() / 2.0;
    let (ingress, egress) = (center - half, center + half);

    let night = night_window(center, site, params.sun_altitude)?;
    let target_window = target_window(center, target.ra, target.dec, site, params.min_target_altitude)?;
    let window = night.intersect(&target_window)?;
    let coverage = assess_coverage(
        ingress,
        egress,
        &window,
        params.allow_partial,
        params.partial_fraction,
    )?;

    let moon = moon_state(center, site);
    if params.moon_filter && !target.ignore_moon && moon_contaminates(&moon, params) {
        return None;
    }

    Some(Visibility {
        night,
        target_window,
        window,
        coverage,
        moon,
    })
}

#[cfg(test)]
mod visibility_test {
    use super::*;
    use crate::geometry::{altitude, hour_angle_factor};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn la_palma() -> GeoSite {
        GeoSite::new(28.76, -17.88)
    }

    #[test]
    fn test_night_contains_local_midnight() {
        // 2021-03-10 01:00 UTC, close to local midnight on La Palma
        let center = 59283.5 + 1.0 / 24.0;
        let night = night_window(center, &la_palma(), -20.0).unwrap();
        assert!(night.contains(center));
        assert!(night.length() > 0.3 && night.length() < 0.6);

        // the Sun moves during the day, allow for its drift since the reference midnight
        let sun = sun_position(night.start);
        assert!((altitude(night.start, sun.ra, sun.dec, &la_palma()) + 20.0).abs() < 1.0);
    }

    #[test]
    fn test_night_steps_back_after_midnight() {
        // 05:00 UTC belongs to the night that started the previous evening
        let center = 59283.5 + 5.0 / 24.0;
        let night = night_window(center, &la_palma(), -20.0).unwrap();
        assert!(night.start < midnight_utc(center));
        assert!(night.contains(center));
    }

    #[test]
    fn test_equinox_night_after_midnight() {
        // 2021-09-23 01:12 UTC: still the night that began at about 20:30 UTC on the 22nd
        let center = 59478.55;
        let night = night_window(center, &la_palma(), -20.0).unwrap();
        assert!(night.contains(center));
        assert!(night.start > 59477.5 && night.end < 59478.5 + 0.5);
    }

    #[test]
    fn test_local_midnight_is_always_night() {
        let site = la_palma();
        for day in 0..366 {
            let center = 59215.5 + day as f64 + 0.05;
            let night = night_window(center, &site, -20.0).unwrap();
            assert!(night.contains(center), "night {night:?} misses {center}");
            assert!(night.length() < 0.6);
        }

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let midnight = 58849.5 + rng.random_range(0..3000) as f64;
            let site = GeoSite::new(rng.random_range(-50.0..50.0), rng.random_range(-180.0..180.0));
            let center = midnight + (-site.longitude / 360.0).rem_euclid(1.0);
            let sun = sun_position(center);
            // keep well clear of twilight and of barely dark summer nights
            if altitude(center, sun.ra, sun.dec, &site) > -30.0
                || hour_angle_factor(sun.dec, site.latitude, -20.0) < -0.9
            {
                continue;
            }
            let night = night_window(center, &site, -20.0).unwrap();
            assert!(night.contains(center), "night {night:?} misses {center} at {site:?}");
        }
    }

    #[test]
    fn test_polar_nights_and_days() {
        let north = GeoSite::new(89.0, 0.0);
        // December: the Sun stays far below the horizon
        assert_eq!(night_window(59204.5, &north, -20.0), Some(Window::unbounded()));
        assert_eq!(night_length(&north, 59204.5, -20.0), 1.0);
        // June: it never sets
        assert_eq!(night_window(59386.5, &north, -20.0), None);
        assert_eq!(night_length(&north, 59386.5, -20.0), 0.0);
    }

    #[test]
    fn test_target_window_cases() {
        let site = la_palma();
        // far southern target never climbs over 30 degrees
        assert_eq!(target_window(59283.5, 90.0, -70.0, &site, 30.0), None);
        // a target near the pole of a high latitude site never sets
        let north = GeoSite::new(70.0, 20.0);
        assert_eq!(
            target_window(59283.5, 0.0, 85.0, &north, 30.0),
            Some(Window::unbounded())
        );
        // ordinary target above 30 degrees at its transit
        let w = target_window(59283.5, 150.0, 20.0, &site, 30.0).unwrap();
        assert!(w.start < w.end);
        assert!(w.length() < 1.0);
    }

    #[test]
    fn test_moon_contamination_thresholds() {
        let params = ForecastParams::default();
        let bright_up = MoonState {
            illumination: 0.95,
            altitude: 20.0,
        };
        let bright_down = MoonState {
            illumination: 0.95,
            altitude: -5.0,
        };
        let faint_up = MoonState {
            illumination: 0.4,
            altitude: 60.0,
        };
        assert!(moon_contaminates(&bright_up, &params));
        assert!(!moon_contaminates(&bright_down, &params));
        assert!(!moon_contaminates(&faint_up, &params));
    }
}
