//! # Catalog loading
//!
//! Readers for the CSV files a run starts from. Every file has a header row; columns are
//! matched by name, surrounding whitespace is trimmed and empty cells read as missing values.
//!
//! | File              | Columns                                                                 |
//! |-------------------|-------------------------------------------------------------------------|
//! | targets           | `name, ra, dec, period, period_err, duration, depth, last_tmid, last_tmid_err, last_epoch, real, star_mag[, ignore_moon]` |
//! | timings           | `name, epoch, tmid, tmid_err`                                           |
//! | telescopes        | `name, lat, lon, alt, aperture, jan … dec, site, cloud_tolerance, copies` |
//! | depth limits      | `aperture, duration_hours, a, b`                                        |
//!
//! Times are truncated Julian days, errors are days, `duration` is minutes, `depth` is mmag.
//! `real` and `ignore_moon` are `0`/`1` flags.
//!
//! Each reader comes in two flavours: `read_*` over any [`std::io::Read`] and `load_*` from a
//! path.
use std::fs::File;
use std::io::Read;

use camino::Utf8Path;
use serde::Deserialize;
use tracing::debug;

use crate::exosched_errors::ExoschedError;
use crate::targets::depth_limits::{DepthLimit, DepthLimitTable};
use crate::targets::{Target, TimingMeasurement};
use crate::telescopes::{Network, Telescope};

#[derive(Debug, Deserialize)]
struct TargetRecord {
    name: String,
    ra: f64,
    dec: f64,
    period: f64,
    period_err: Option<f64>,
    duration: f64,
    depth: Option<f64>,
    last_tmid: f64,
    last_tmid_err: Option<f64>,
    last_epoch: i64,
    real: u8,
    star_mag: f64,
    ignore_moon: Option<u8>,
}

impl TryFrom<TargetRecord> for Target {
    type Error = ExoschedError;

    fn try_from(r: TargetRecord) -> Result<Self, Self::Error> {
        Target::builder(r.name)
            .coordinates(r.ra, r.dec)
            .period(r.period)
            .period_err(r.period_err)
            .duration(r.duration)
            .depth(r.depth)
            .star_mag(r.star_mag)
            .last_transit(r.last_tmid, r.last_tmid_err, r.last_epoch)
            .real(r.real != 0)
            .ignore_moon(r.ignore_moon.is_some_and(|flag| flag != 0))
            .build()
    }
}

#[derive(Debug, Deserialize)]
struct TimingRecord {
    name: String,
    epoch: i64,
    tmid: f64,
    tmid_err: f64,
}

#[derive(Debug, Deserialize)]
struct TelescopeRecord {
    name: String,
    lat: f64,
    lon: f64,
    alt: f64,
    aperture: f64,
    jan: f64,
    feb: f64,
    mar: f64,
    apr: f64,
    may: f64,
    jun: f64,
    jul: f64,
    aug: f64,
    sep: f64,
    oct: f64,
    nov: f64,
    dec: f64,
    site: String,
    cloud_tolerance: f64,
    copies: u8,
}

impl TryFrom<TelescopeRecord> for Telescope {
    type Error = ExoschedError;

    fn try_from(r: TelescopeRecord) -> Result<Self, Self::Error> {
        let clear_sky = [
            r.jan, r.feb, r.mar, r.apr, r.may, r.jun, r.jul, r.aug, r.sep, r.oct, r.nov, r.dec,
        ];
        if clear_sky.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(ExoschedError::InvalidCatalogRow {
                name: r.name,
                reason: "clear-sky probabilities must lie in [0, 1]".into(),
            });
        }
        if !(0.0..=1.0).contains(&r.cloud_tolerance) {
            return Err(ExoschedError::InvalidCatalogRow {
                name: r.name,
                reason: "cloud tolerance must lie in [0, 1]".into(),
            });
        }
        if r.copies == 0 {
            return Err(ExoschedError::InvalidCatalogRow {
                name: r.name,
                reason: "a telescope needs at least one unit".into(),
            });
        }

        Ok(Telescope::new(r.name, r.lat, r.lon, r.alt, r.aperture)?
            .with_clear_sky(clear_sky)
            .with_site(r.site)
            .with_cloud_tolerance(r.cloud_tolerance)
            .with_copies(r.copies))
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Read a target catalog.
pub fn read_targets<R: Read>(reader: R) -> Result<Vec<Target>, ExoschedError> {
    csv_reader(reader)
        .deserialize::<TargetRecord>()
        .map(|record| Target::try_from(record?))
        .collect()
}

/// Load a target catalog from `path`.
pub fn load_targets(path: &Utf8Path) -> Result<Vec<Target>, ExoschedError> {
    let targets = read_targets(File::open(path)?)?;
    debug!(%path, count = targets.len(), "targets loaded");
    Ok(targets)
}

/// Read timing measurements as `(target name, measurement)` pairs.
pub fn read_timings<R: Read>(
    reader: R,
) -> Result<Vec<(String, TimingMeasurement)>, ExoschedError> {
    csv_reader(reader)
        .deserialize::<TimingRecord>()
        .map(|record| {
            let r = record?;
            Ok((
                r.name,
                TimingMeasurement {
                    epoch: r.epoch,
                    tmid: r.tmid,
                    tmid_err: r.tmid_err,
                },
            ))
        })
        .collect()
}

/// Load timing measurements from `path`.
pub fn load_timings(path: &Utf8Path) -> Result<Vec<(String, TimingMeasurement)>, ExoschedError> {
    read_timings(File::open(path)?)
}

/// Attach timing measurements to their targets.
///
/// Each measurement is appended to the history of the target with the same name; the most
/// recent one becomes the target's reference transit.
///
/// Errors
/// ----------
/// * [`ExoschedError::UnknownTarget`] if a measurement names no catalog target.
pub fn merge_timings(
    targets: &mut [Target],
    timings: impl IntoIterator<Item = (String, TimingMeasurement)>,
) -> Result<(), ExoschedError> {
    for (name, measurement) in timings {
        let target = targets
            .iter_mut()
            .find(|t| *t.name == *name)
            .ok_or(ExoschedError::UnknownTarget(name))?;
        target.record_measurement(measurement);
    }
    Ok(())
}

/// Read a telescope catalog into a [`Network`], indices following the row order.
pub fn read_telescopes<R: Read>(reader: R) -> Result<Network, ExoschedError> {
    let telescopes = csv_reader(reader)
        .deserialize::<TelescopeRecord>()
        .map(|record| Telescope::try_from(record?))
        .collect::<Result<Vec<_>, _>>()?;
    Network::from_telescopes(telescopes)
}

/// Load a telescope catalog from `path`.
pub fn load_telescopes(path: &Utf8Path) -> Result<Network, ExoschedError> {
    let network = read_telescopes(File::open(path)?)?;
    debug!(%path, count = network.len(), "telescopes loaded");
    Ok(network)
}

/// Read a depth-limit coefficient table.
pub fn read_depth_limits<R: Read>(reader: R) -> Result<DepthLimitTable, ExoschedError> {
    let rows = csv_reader(reader)
        .deserialize::<DepthLimit>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DepthLimitTable::new(rows))
}

/// Load a depth-limit coefficient table from `path`.
pub fn load_depth_limits(path: &Utf8Path) -> Result<DepthLimitTable, ExoschedError> {
    read_depth_limits(File::open(path)?)
}
