//! Progress reporting over simulated time blocks.
//!
//! The bar advances once per block. Its message reports how far the run has gone in simulated
//! time and how many simulated days go by per wall-clock second.
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::constants::Days;

/// Simulated days covered so far against wall-clock time since the run started.
pub(crate) struct BlockPace {
    started: Instant,
    simulated: Days,
    bookings: usize,
}

impl BlockPace {
    pub(crate) fn start() -> Self {
        Self {
            started: Instant::now(),
            simulated: 0.0,
            bookings: 0,
        }
    }

    /// Account a finished block of `length` days and the bookings made so far.
    pub(crate) fn record(&mut self, length: Days, bookings: usize) {
        self.simulated += length.max(0.0);
        self.bookings = bookings;
    }

    pub(crate) fn message(&self) -> String {
        pace_message(self.simulated, self.started.elapsed(), self.bookings)
    }
}

/// Status line such as `"21.0 d simulated, 3.5 d/s, 17 bookings"`.
///
/// The rate is left out until some wall-clock time has passed.
pub(crate) fn pace_message(simulated: Days, elapsed: Duration, bookings: usize) -> String {
    let seconds = elapsed.as_secs_f64();
    if seconds > 0.0 {
        format!(
            "{simulated:.1} d simulated, {:.1} d/s, {bookings} bookings",
            simulated / seconds
        )
    } else {
        format!("{simulated:.1} d simulated, {bookings} bookings")
    }
}

/// Progress bar over `total` blocks of run `run`.
pub(crate) fn block_bar(run: u32, total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total.max(1));
    if let Ok(style) = ProgressStyle::with_template(
        "{prefix} {bar:40.cyan/blue} block {pos}/{len} | ETA {eta_precise} | {msg}",
    ) {
        pb.set_style(style);
    }
    pb.set_prefix(format!("run {run}"));
    pb.enable_steady_tick(Duration::from_millis(200));
    pb
}

/// Record a finished block on `pb`.
pub(crate) fn advance(pb: &ProgressBar, pace: &mut BlockPace, length: Days, bookings: usize) {
    pace.record(length, bookings);
    pb.set_message(pace.message());
    pb.inc(1);
}
