//! # Constants and type definitions for exosched
//!
//! This module centralizes the **conversion factors**, **scheduling defaults** and
//! **common type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Time scale offsets (Julian day ↔ truncated Julian day)
//! - Unit conversions (days ↔ hours ↔ minutes ↔ seconds)
//! - Defaults shared by the forecaster, the instrument scheduler and the simulation
//! - Type aliases naming the unit carried by an `f64`
//!
//! Instants are carried as **truncated Julian days** ([`Tjd`]), i.e. `JD − 2 400 000`,
//! so that one day is `1.0` and midnight UTC falls on `x.5`.

// -------------------------------------------------------------------------------------------------
// Time scales and unit conversions
// -------------------------------------------------------------------------------------------------

/// Offset between a Julian day and a truncated Julian day
pub const TJD_OFFSET: f64 = 2_400_000.0;

/// Truncated Julian day of the J2000.0 epoch (JD 2451545.0)
pub const TJD_J2000: f64 = 51_545.0;

/// Days in a Julian century
pub const DAYS_PER_CENTURY: f64 = 36_525.0;

/// Number of seconds in a day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Number of minutes in a day
pub const MINUTES_PER_DAY: f64 = 1_440.0;

/// Number of hours in a day
pub const HOURS_PER_DAY: f64 = 24.0;

/// Number of minutes in an hour
pub const MINUTES_PER_HOUR: f64 = 60.0;

/// One second of time expressed in hours
pub const ONE_SECOND_IN_HOURS: f64 = 1.0 / 3_600.0;

/// Degrees of right ascension / hour angle per hour
pub const DEGREES_PER_HOUR: f64 = 15.0;

// -------------------------------------------------------------------------------------------------
// Scheduling defaults
// -------------------------------------------------------------------------------------------------

/// Fraction of the transit duration that must be visible for a partial transit
pub const PARTIAL_TRANSIT_FRACTION: f64 = 0.55;

/// Out-of-transit baseline captured on each visible edge of a booking (minutes)
pub const BASELINE_PAD_MINUTES: f64 = 45.0;

/// Sun altitude below which a site is considered dark (degrees)
pub const NIGHT_SUN_ALTITUDE: f64 = -20.0;

/// Minimum altitude of a target during an observation (degrees)
pub const MIN_TARGET_ALTITUDE: f64 = 30.0;

/// Length of one simulated time block (days)
pub const BLOCK_LENGTH_DAYS: f64 = 7.0;

/// Number of sub-blocks an observation is split into by the weather model
pub const WEATHER_SUB_BLOCKS: u32 = 4;

/// Minimum number of timing measurements before the period is refitted
pub const MIN_POINTS_FOR_REFIT: usize = 4;

/// Upper bound on the epoch count explored by the expiry search
pub const MAX_EXPIRY_EPOCHS: u64 = 10_000_000;

/// Scatter of a simulated mid-transit time around the predicted centre (days)
pub const SIMULATED_TMID_SCATTER: f64 = 0.5 / MINUTES_PER_DAY;

/// Mean of a simulated mid-transit time uncertainty (days)
pub const SIMULATED_TMID_ERR_MEAN: f64 = 0.5 / MINUTES_PER_DAY;

/// Spread of a simulated mid-transit time uncertainty (days)
pub const SIMULATED_TMID_ERR_SPREAD: f64 = 0.01 / MINUTES_PER_DAY;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Duration or clock value in hours
pub type Hours = f64;
/// Duration in minutes
pub type Minutes = f64;
/// Duration in days
pub type Days = f64;
/// Distance in meters
pub type Meter = f64;
/// Truncated Julian day (JD − 2 400 000)
pub type Tjd = f64;

/// Index of a target inside the simulation arena
pub type TargetIdx = usize;
/// Index of a telescope inside a [`Network`](crate::telescopes::Network)
pub type TelescopeIdx = u16;
