//! Low precision solar and lunar positions.
//!
//! Accuracy is of the order of 0.01° for the Sun and a few tenths of a degree for the Moon
//! (geocentric, parallax ignored), which is ample for twilight limits and moon contamination.
use crate::constants::{Degree, Tjd, DAYS_PER_CENTURY, TJD_J2000};

use super::{altitude, GeoSite};

/// Cosine and sine of the mean obliquity of the ecliptic, for the lunar conversion.
const LUNAR_OBLIQUITY_COS: f64 = 0.9175;
const LUNAR_OBLIQUITY_SIN: f64 = 0.3978;

/// Apparent equatorial coordinates (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equatorial {
    /// Right ascension in `[0, 360)`
    pub ra: Degree,
    pub dec: Degree,
}

/// Moon condition at an instant, seen from a site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoonState {
    /// Illuminated fraction of the disc, `0` at new moon, `1` at full moon
    pub illumination: f64,
    /// Altitude above the site horizon (degrees)
    pub altitude: Degree,
}

fn sin_deg(x: Degree) -> f64 {
    x.to_radians().sin()
}

/// Position of the Sun from its mean longitude and mean anomaly.
///
/// ```text
/// L = 280.460 + 0.9856474 n        g = 357.528 + 0.9856003 n
/// λ = L + 1.915 sin g + 0.020 sin 2g
/// ε = 23.439 − 0.0000004 n
/// ```
///
/// with `n` the number of days since J2000.0.
pub fn sun_position(tjd: Tjd) -> Equatorial {
    let n = tjd - TJD_J2000;
    let mean_longitude = (280.460 + 0.9856474 * n).rem_euclid(360.0);
    let mean_anomaly = (357.528 + 0.9856003 * n).rem_euclid(360.0);
    let ecliptic_longitude = (mean_longitude
        + 1.915 * sin_deg(mean_anomaly)
        + 0.020 * sin_deg(2.0 * mean_anomaly))
    .to_radians();
    let obliquity = (23.439 - 0.0000004 * n).to_radians();

    let ra = (obliquity.cos() * ecliptic_longitude.sin())
        .atan2(ecliptic_longitude.cos())
        .to_degrees()
        .rem_euclid(360.0);
    let dec = (obliquity.sin() * ecliptic_longitude.sin()).asin().to_degrees();
    Equatorial { ra, dec }
}

/// Position of the Moon from the principal periodic terms of its ecliptic longitude and
/// latitude.
pub fn moon_position(tjd: Tjd) -> Equatorial {
    let t = (tjd - TJD_J2000) / DAYS_PER_CENTURY;

    let longitude = 218.32 + 481_267.881 * t
        + 6.29 * sin_deg(135.0 + 477_198.87 * t)
        - 1.27 * sin_deg(259.3 - 413_335.36 * t)
        + 0.66 * sin_deg(235.7 + 890_534.22 * t)
        + 0.21 * sin_deg(269.9 + 954_397.74 * t)
        - 0.19 * sin_deg(357.5 + 35_999.05 * t)
        - 0.11 * sin_deg(186.5 + 966_404.03 * t);
    let latitude = 5.13 * sin_deg(93.3 + 483_202.02 * t)
        + 0.28 * sin_deg(228.2 + 960_400.89 * t)
        - 0.28 * sin_deg(318.3 + 6_003.15 * t)
        - 0.17 * sin_deg(217.6 - 407_332.21 * t);

    let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();
    let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();

    // direction cosines in the equatorial frame
    let l = cos_lat * cos_lon;
    let m = LUNAR_OBLIQUITY_COS * cos_lat * sin_lon - LUNAR_OBLIQUITY_SIN * sin_lat;
    let n = LUNAR_OBLIQUITY_SIN * cos_lat * sin_lon + LUNAR_OBLIQUITY_COS * sin_lat;

    Equatorial {
        ra: m.atan2(l).to_degrees().rem_euclid(360.0),
        dec: n.clamp(-1.0, 1.0).asin().to_degrees(),
    }
}

/// Illuminated fraction of the lunar disc, `(1 − cos ψ) / 2` with `ψ` the Sun–Moon elongation.
pub fn moon_illumination(tjd: Tjd) -> f64 {
    let sun = sun_position(tjd);
    let moon = moon_position(tjd);
    let (sin_ds, cos_ds) = sun.dec.to_radians().sin_cos();
    let (sin_dm, cos_dm) = moon.dec.to_radians().sin_cos();
    let cos_elongation = sin_ds * sin_dm + cos_ds * cos_dm * (sun.ra - moon.ra).to_radians().cos();
    (1.0 - cos_elongation) / 2.0
}

/// Illumination and altitude of the Moon at `tjd` for `site`.
pub fn moon_state(tjd: Tjd, site: &GeoSite) -> MoonState {
    let moon = moon_position(tjd);
    MoonState {
        illumination: moon_illumination(tjd),
        altitude: altitude(tjd, moon.ra, moon.dec, site),
    }
}
