//! # Rise/set geometry
//!
//! Pure functions answering "when is this object above that altitude, seen from this site,
//! on this UTC day?". Nothing in this module keeps state.
//!
//! ## Algorithm
//!
//! For a site at latitude `φ`, an object at declination `δ` and an altitude threshold `h`, the
//! hour angle at which the object crosses the threshold satisfies
//!
//! ```text
//! cos(HA) = (sin h − sin δ · sin φ) / (cos δ · cos φ)
//! ```
//!
//! * a right-hand side below `−1` means the object never dips under the threshold
//!   ([`Crossing::Circumpolar`]),
//! * a right-hand side above `+1` means it never climbs over it ([`Crossing::NeverAbove`]),
//! * otherwise the two crossings sit at local sidereal times `α ∓ HA`.
//!
//! Local sidereal times are turned into UTC instants through the GMST − UTC offset
//! ([`gmst_utc_offset`](crate::time::gmst_utc_offset)). Because that offset drifts by about
//! four minutes per day, it is first evaluated at midnight and then re-evaluated at the
//! estimated crossing instants until the total adjustment drops under one second of time.
//! The fixed point is reached in two or three passes.
//!
//! Two orders are supported:
//!
//! * [`CrossingOrder::RiseFirst`] for targets: the window of interest runs from rise to set,
//! * [`CrossingOrder::SetFirst`] for the Sun: the night runs from sunset to the following sunrise.
//!
//! The Greenwich clock time of the leading crossing (sidereal time minus offset) is reduced to
//! `[0, 24)` before the longitude is applied. If the longitude shift then moves the leading
//! crossing before midnight, the computation is redone for the following day (once, guarded
//! by a skip flag).
//!
//! ## See also
//! ------------
//! * [`sun_moon`] – low precision solar and lunar positions feeding the night and moon checks.
//! * [`Window`] – closed time interval, possibly unbounded, used for night and target windows.
pub mod sun_moon;

use tracing::trace;

use crate::constants::{
    Degree, Hours, Tjd, DEGREES_PER_HOUR, HOURS_PER_DAY, ONE_SECOND_IN_HOURS,
};
use crate::time::{gmst_utc_offset, local_sidereal_degrees};

/// Upper bound on the sidereal/UTC refinement passes.
const MAX_REFINEMENT_ITERATIONS: u32 = 20;

/// Geographic location of an observing site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoSite {
    /// Geodetic latitude (degrees, north positive)
    pub latitude: Degree,
    /// Longitude (degrees, east positive)
    pub longitude: Degree,
}

impl GeoSite {
    pub fn new(latitude: Degree, longitude: Degree) -> Self {
        GeoSite {
            latitude,
            longitude,
        }
    }
}

/// Order in which the two threshold crossings are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingOrder {
    /// Rise, then the following set (target above the threshold in between).
    RiseFirst,
    /// Set, then the following rise (object below the threshold in between).
    SetFirst,
}

/// Outcome of a threshold-crossing computation.
///
/// Both degenerate cases are ordinary results, not errors: callers decide what a circumpolar
/// Sun or a never-rising target means for them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crossing {
    /// The object stays above the altitude threshold all day.
    Circumpolar,
    /// The object never reaches the altitude threshold.
    NeverAbove,
    /// Crossing instants (truncated Julian days). With [`CrossingOrder::SetFirst`], `set`
    /// precedes `rise`.
    RiseSet { rise: Tjd, set: Tjd },
}

/// Closed time interval in truncated Julian days.
///
/// Unbounded sides are encoded with infinities, so that a polar night or a circumpolar
/// target behaves like any other window under intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub start: Tjd,
    pub end: Tjd,
}

impl Window {
    pub fn new(start: Tjd, end: Tjd) -> Self {
        Window { start, end }
    }

    /// The window covering every instant.
    pub fn unbounded() -> Self {
        Window {
            start: f64::NEG_INFINITY,
            end: f64::INFINITY,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.start.is_finite() && self.end.is_finite()
    }

    /// Length of the window in days (`+∞` when unbounded).
    pub fn length(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn contains(&self, t: Tjd) -> bool {
        self.start <= t && t <= self.end
    }

    /// Intersection of two windows, `None` when they do not overlap.
    pub fn intersect(&self, other: &Window) -> Option<Window> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(Window { start, end })
    }
}

/// Cosine of the hour angle at which an object crosses an altitude threshold.
///
/// Arguments
/// -----------------
/// * `declination`: declination of the object (degrees)
/// * `latitude`: latitude of the site (degrees)
/// * `altitude`: altitude threshold (degrees)
///
/// Return
/// ----------
/// * `(sin h − sin δ sin φ) / (cos δ cos φ)`, unbounded. At the geographic poles the
///   denominator vanishes and the value is infinite or NaN.
pub fn hour_angle_factor(declination: Degree, latitude: Degree, altitude: Degree) -> f64 {
    let (sin_dec, cos_dec) = declination.to_radians().sin_cos();
    let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
    (altitude.to_radians().sin() - sin_dec * sin_lat) / (cos_dec * cos_lat)
}

/// Altitude of an object above the horizon (degrees), geometric, without refraction.
///
/// Arguments
/// -----------------
/// * `tjd`: instant of the evaluation
/// * `ra`, `dec`: equatorial coordinates of the object (degrees)
/// * `site`: observing site
pub fn altitude(tjd: Tjd, ra: Degree, dec: Degree, site: &GeoSite) -> Degree {
    let hour_angle = (local_sidereal_degrees(tjd, site.longitude) - ra).to_radians();
    let (sin_dec, cos_dec) = dec.to_radians().sin_cos();
    let (sin_lat, cos_lat) = site.latitude.to_radians().sin_cos();
    (sin_lat * sin_dec + cos_lat * cos_dec * hour_angle.cos())
        .clamp(-1.0, 1.0)
        .asin()
        .to_degrees()
}

/// Threshold crossings of an object for the UTC day starting at `midnight`.
///
/// Arguments
/// -----------------
/// * `midnight`: truncated Julian day of the UTC midnight opening the day
/// * `ra`, `dec`: equatorial coordinates of the object (degrees)
/// * `site`: observing site
/// * `altitude`: altitude threshold (degrees)
/// * `order`: which crossing leads
///
/// Return
/// ----------
/// * [`Crossing::RiseSet`] with absolute instants, or one of the two degenerate outcomes.
///
/// See also
/// ------------
/// * [`hour_angle_factor`] – the spherical-triangle identity used to classify the object.
pub fn crossing(
    midnight: Tjd,
    ra: Degree,
    dec: Degree,
    site: &GeoSite,
    altitude: Degree,
    order: CrossingOrder,
) -> Crossing {
    solve_crossing(midnight, ra, dec, site, altitude, order, false).0
}

/// Crossing computation also reporting the number of refinement passes.
pub(crate) fn solve_crossing(
    midnight: Tjd,
    ra: Degree,
    dec: Degree,
    site: &GeoSite,
    altitude: Degree,
    order: CrossingOrder,
    skip_next_day: bool,
) -> (Crossing, u32) {
    let factor = hour_angle_factor(dec, site.latitude, altitude);

    if factor.is_nan() {
        // pole: the altitude of every object equals its declination
        let outcome = if dec > altitude {
            Crossing::Circumpolar
        } else {
            Crossing::NeverAbove
        };
        return (outcome, 0);
    }
    if factor < -1.0 {
        return (Crossing::Circumpolar, 0);
    }
    if factor > 1.0 {
        return (Crossing::NeverAbove, 0);
    }

    let hour_angle: Hours = factor.acos().to_degrees() / DEGREES_PER_HOUR;
    let ra_hours: Hours = ra / DEGREES_PER_HOUR;

    // local sidereal times of the two crossings, leading one first
    let (lead, trail) = match order {
        CrossingOrder::RiseFirst => (ra_hours - hour_angle, ra_hours + hour_angle),
        CrossingOrder::SetFirst => (ra_hours + hour_angle, ra_hours - hour_angle + HOURS_PER_DAY),
    };

    let lon_hours = site.longitude / DEGREES_PER_HOUR;
    let base_offset = gmst_utc_offset(midnight);
    let unwrap = |offset: Hours| {
        base_offset + (offset - base_offset + HOURS_PER_DAY / 2.0).rem_euclid(HOURS_PER_DAY)
            - HOURS_PER_DAY / 2.0
    };
    // Greenwich clock times of both crossings: the leading one is brought into [0, 24) and the
    // trailing one moves by the same whole days, then the longitude shift is applied
    let utc_hours = |lead_offset: Hours, trail_offset: Hours| -> (Hours, Hours) {
        let greenwich = lead - lead_offset;
        let shift = greenwich.rem_euclid(HOURS_PER_DAY) - greenwich;
        (
            greenwich + shift - lon_hours,
            trail - trail_offset + shift - lon_hours,
        )
    };

    let mut lead_offset = base_offset;
    let mut trail_offset = base_offset;
    let mut iterations = 0;
    loop {
        iterations += 1;
        let (lead_utc, trail_utc) = utc_hours(lead_offset, trail_offset);

        let new_lead = unwrap(gmst_utc_offset(midnight + lead_utc / HOURS_PER_DAY));
        let new_trail = unwrap(gmst_utc_offset(midnight + trail_utc / HOURS_PER_DAY));
        let adjustment = (new_lead - lead_offset).abs() + (new_trail - trail_offset).abs();
        lead_offset = new_lead;
        trail_offset = new_trail;

        if adjustment < ONE_SECOND_IN_HOURS || iterations >= MAX_REFINEMENT_ITERATIONS {
            break;
        }
    }
    trace!(iterations, midnight, ra, dec, "crossing refined");

    let (lead_utc, trail_utc) = utc_hours(lead_offset, trail_offset);

    if lead_utc < 0.0 && !skip_next_day {
        // east of Greenwich the leading crossing can fall on the previous day: take the next one
        let (outcome, extra) =
            solve_crossing(midnight + 1.0, ra, dec, site, altitude, order, true);
        return (outcome, iterations + extra);
    }

    let lead_tjd = midnight + lead_utc / HOURS_PER_DAY;
    let trail_tjd = midnight + trail_utc / HOURS_PER_DAY;
    let outcome = match order {
        CrossingOrder::RiseFirst => Crossing::RiseSet {
            rise: lead_tjd,
            set: trail_tjd,
        },
        CrossingOrder::SetFirst => Crossing::RiseSet {
            rise: trail_tjd,
            set: lead_tjd,
        },
    };
    (outcome, iterations)
}
