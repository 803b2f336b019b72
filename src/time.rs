use hifitime::Epoch;

use crate::constants::{
    Degree, Hours, Tjd, DAYS_PER_CENTURY, DEGREES_PER_HOUR, HOURS_PER_DAY, SECONDS_PER_DAY,
    TJD_J2000, TJD_OFFSET,
};

/// Convert a [`hifitime::Epoch`] into a truncated Julian day (UTC).
///
/// Argument
/// --------
/// * `epoch`: the instant to convert
///
/// Return
/// ------
/// * `JD(UTC) − 2 400 000`
pub fn epoch_to_tjd(epoch: &Epoch) -> Tjd {
    epoch.to_jde_utc_days() - TJD_OFFSET
}

/// Convert a truncated Julian day (UTC) back into a [`hifitime::Epoch`].
///
/// Argument
/// --------
/// * `tjd`: truncated Julian day
///
/// Return
/// ------
/// * the corresponding UTC epoch
pub fn tjd_to_epoch(tjd: Tjd) -> Epoch {
    Epoch::from_jde_utc(tjd + TJD_OFFSET)
}

/// Truncated Julian day of the UTC midnight that starts the calendar day containing `tjd`.
///
/// Julian days start at noon, so midnight UTC sits on the half day.
pub fn midnight_utc(tjd: Tjd) -> Tjd {
    (tjd + 0.5).floor() - 0.5
}

/// UTC clock time of `tjd`, in hours within `[0, 24)`.
pub fn utc_hours_of_day(tjd: Tjd) -> Hours {
    (tjd + 0.5).rem_euclid(1.0) * HOURS_PER_DAY
}

/// Calendar month (1 = January) of `tjd` in UTC.
pub fn utc_month(tjd: Tjd) -> u8 {
    let (_, month, _, _, _, _, _) = tjd_to_epoch(tjd).to_gregorian_utc();
    month
}

/// Compute the Greenwich Mean Sidereal Time (GMST) in **hours** for a truncated Julian day.
///
/// The expression evaluates the Earth rotation angle from the number of days elapsed since
/// J2000.0 and adds the precession terms as a degree-5 polynomial in Julian centuries:
///
/// ```text
/// GMST[s] = 86400·(0.7790572732640 + 0.00273781191135448·Du + frac(Du))
///         + 0.00096707 + 307.47710227·T + 0.092772113·T² − 0.0000000293·T³
///         + 0.00000199707·T⁴ − 0.000000002453·T⁵
/// ```
///
/// where `Du = JD − 2451545.0` and `T = Du / 36525`.
///
/// Arguments
/// ---------
/// * `tjd`: truncated Julian day (UTC, used as UT1)
///
/// Return
/// ------
/// * GMST in hours, normalized to `[0, 24)`.
///
/// See also
/// ------------
/// * [`gmst_utc_offset`] – difference between sidereal and civil clock at an instant.
pub fn gmst_hours(tjd: Tjd) -> Hours {
    let du = tjd - TJD_J2000;
    let t = du / DAYS_PER_CENTURY;

    let rotation = SECONDS_PER_DAY * (0.7790572732640 + 0.00273781191135448 * du + du.rem_euclid(1.0));
    let precession = 0.00096707
        + t * (307.47710227
            + t * (0.092772113 + t * (-0.0000000293 + t * (0.00000199707 + t * -0.000000002453))));

    ((rotation + precession) / 3600.0).rem_euclid(HOURS_PER_DAY)
}

/// Offset between GMST and the UTC clock at `tjd`, in hours within `[0, 24)`.
///
/// Subtracting this offset (and the east longitude in hours) from a local sidereal time
/// gives the UTC clock time at which that sidereal time is reached.
pub fn gmst_utc_offset(tjd: Tjd) -> Hours {
    (gmst_hours(tjd) - utc_hours_of_day(tjd)).rem_euclid(HOURS_PER_DAY)
}

/// Local mean sidereal time in **degrees** at east longitude `longitude`.
pub fn local_sidereal_degrees(tjd: Tjd, longitude: Degree) -> Degree {
    (gmst_hours(tjd) * DEGREES_PER_HOUR + longitude).rem_euclid(360.0)
}
