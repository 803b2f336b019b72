//! Destinations for accepted bookings.
//!
//! [`CsvLog`] lays a run out on disk as
//!
//! ```text
//! <root>/run<n>/<telescope>.csv       name, start, end, unit
//! <root>/run<n>/all_telescopes.csv    name, telescope, start, end, unit
//! ```
//!
//! with UTC timestamps.
use std::collections::HashMap;
use std::fs::{self, File};
use std::sync::Arc;

use ahash::RandomState;
use camino::{Utf8Path, Utf8PathBuf};

use crate::exosched_errors::ExoschedError;
use crate::telescopes::{Network, Telescope};
use crate::time::tjd_to_epoch;

use super::Booking;

/// Name of the combined network log inside a run directory.
pub const NETWORK_LOG: &str = "all_telescopes.csv";

/// Receiver of the bookings produced by the scheduler.
pub trait BookingSink {
    /// Called once before the first block of run `run`.
    fn start_run(&mut self, _run: u32, _network: &Network) -> Result<(), ExoschedError> {
        Ok(())
    }

    fn record(&mut self, telescope: &Telescope, booking: &Booking) -> Result<(), ExoschedError>;

    /// Called once after the last block of a run.
    fn finish(&mut self) -> Result<(), ExoschedError> {
        Ok(())
    }
}

/// Sink discarding every booking.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl BookingSink for NullLog {
    fn record(&mut self, _telescope: &Telescope, _booking: &Booking) -> Result<(), ExoschedError> {
        Ok(())
    }
}

/// One logged booking.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub run: u32,
    pub telescope: Arc<str>,
    pub booking: Booking,
}

/// Sink keeping every booking in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    run: u32,
    rows: Vec<LogRow>,
}

impl MemoryLog {
    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    /// Rows of run `run` booked on `telescope`.
    pub fn for_telescope<'a>(&'a self, run: u32, telescope: &'a str) -> impl Iterator<Item = &'a LogRow> {
        self.rows
            .iter()
            .filter(move |row| row.run == run && &*row.telescope == telescope)
    }
}

impl BookingSink for MemoryLog {
    fn start_run(&mut self, run: u32, _network: &Network) -> Result<(), ExoschedError> {
        self.run = run;
        Ok(())
    }

    fn record(&mut self, telescope: &Telescope, booking: &Booking) -> Result<(), ExoschedError> {
        self.rows.push(LogRow {
            run: self.run,
            telescope: telescope.name.clone(),
            booking: booking.clone(),
        });
        Ok(())
    }
}

/// Sink writing one CSV file per telescope and a combined network file per run.
#[derive(Debug)]
pub struct CsvLog {
    root: Utf8PathBuf,
    per_telescope: HashMap<Arc<str>, csv::Writer<File>, RandomState>,
    network: Option<csv::Writer<File>>,
}

impl CsvLog {
    /// Log under `root`, created on the first run if missing.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        CsvLog {
            root: root.into(),
            per_telescope: HashMap::default(),
            network: None,
        }
    }

    /// Directory holding the files of run `run`.
    pub fn run_dir(&self, run: u32) -> Utf8PathBuf {
        self.root.join(format!("run{run}"))
    }

    fn open(path: &Utf8Path, header: &[&str]) -> Result<csv::Writer<File>, ExoschedError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(header)?;
        Ok(writer)
    }
}

impl BookingSink for CsvLog {
    fn start_run(&mut self, run: u32, network: &Network) -> Result<(), ExoschedError> {
        self.finish()?;
        let dir = self.run_dir(run);
        fs::create_dir_all(&dir)?;

        self.network = Some(Self::open(
            &dir.join(NETWORK_LOG),
            &["name", "telescope", "start", "end", "unit"],
        )?);
        for (_, telescope) in network.iter() {
            let path = dir.join(format!("{}.csv", telescope.name));
            let writer = Self::open(&path, &["name", "start", "end", "unit"])?;
            self.per_telescope.insert(telescope.name.clone(), writer);
        }
        Ok(())
    }

    fn record(&mut self, telescope: &Telescope, booking: &Booking) -> Result<(), ExoschedError> {
        let start = tjd_to_epoch(booking.start).to_string();
        let end = tjd_to_epoch(booking.end).to_string();
        let unit = booking.unit.to_string();

        let writer = self
            .per_telescope
            .get_mut(&telescope.name)
            .ok_or_else(|| ExoschedError::UnknownTelescope(telescope.name.to_string()))?;
        writer.write_record([&*booking.target_name, start.as_str(), end.as_str(), unit.as_str()])?;

        if let Some(network) = self.network.as_mut() {
            network.write_record([
                &*booking.target_name,
                &*telescope.name,
                start.as_str(),
                end.as_str(),
                unit.as_str(),
            ])?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ExoschedError> {
        for (_, mut writer) in self.per_telescope.drain() {
            writer.flush()?;
        }
        if let Some(mut network) = self.network.take() {
            network.flush()?;
        }
        Ok(())
    }
}
