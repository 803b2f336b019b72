//! # Simulation feedback loop
//!
//! Simulated campaigns advance through the scheduling window in fixed blocks. Every block runs
//! the same phases over an explicit [`SimulationContext`]:
//!
//! 1. **Select** – eligible targets refresh their threshold, expiry or horizon error under the
//!    active [`SelectionPolicy`]; the required ones are sorted by decreasing urgency.
//! 2. **Forecast** – observable transits of the required targets inside the block.
//! 3. **Schedule** – per telescope, candidates are ordered and packed into bookings
//!    ([`crate::scheduler::schedule`]), every booking reported to the [`BookingSink`].
//! 4. **Observe** – weather draws and synthetic timing measurements per booking.
//! 5. **Update** – measurements are appended to their targets, whose period is refitted.
//! 6. **Account** – night and clear-sky time of the block is added to the run totals.
//!
//! Blocks are strictly sequential since target state carries over from one to the next.
//! A run is reproducible: its random generator is seeded with `seed + run`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use exosched::scheduler::booking_log::MemoryLog;
//! use exosched::simulation::{Simulation, SimulationParams};
//! use hifitime::Epoch;
//! # let network: exosched::telescopes::Network = unimplemented!();
//! # let targets: Vec<exosched::targets::Target> = unimplemented!();
//!
//! let params = SimulationParams::builder()
//!     .start(Epoch::from_gregorian_utc_at_midnight(2021, 1, 1))
//!     .window_length(365.0)
//!     .repeats(5)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let report = Simulation::new(network, targets, params)
//!     .run_all(&mut MemoryLog::default())
//!     .unwrap();
//! for summary in &report.runs {
//!     println!("{summary}");
//! }
//! ```
#[cfg(feature = "progress")]
pub(crate) mod progress_bar;

use std::cmp::Ordering::Greater;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use camino::Utf8Path;
use hifitime::Epoch;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::constants::{Days, Minutes, TargetIdx, TelescopeIdx, Tjd, BLOCK_LENGTH_DAYS};
use crate::exosched_errors::ExoschedError;
use crate::forecast::visibility::night_length;
use crate::forecast::{forecast, forecast_network, ForecastParams, Transit};
use crate::geometry::Window;
use crate::scheduler::booking_log::BookingSink;
use crate::scheduler::observe::{simulate_observations, SyntheticMeasurement};
use crate::scheduler::{self, Booking, SchedulerParams};
use crate::targets::depth_limits::ObservabilityRule;
use crate::targets::selection::{SelectionPolicy, SelectionStrategy, ThresholdPolicy};
use crate::targets::Target;
use crate::telescopes::Network;
use crate::time::epoch_to_tjd;

/// Parameters of a simulated campaign.
///
/// Fields
/// -----------------
/// * `start`, `end` – scheduling window (truncated Julian days)
/// * `block_length` – length of one time block (days, default 7)
/// * `selection` – selective (default) or initial policy
/// * `threshold` – accuracy threshold policy (default 10 minutes)
/// * `repeats` – number of independent runs (default 1)
/// * `seed` – base seed of the random generators (default 0)
/// * `observability` – telescopes able to observe each target (default: all of them)
/// * `forecast`, `scheduler` – nested parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub start: Tjd,
    pub end: Tjd,
    pub block_length: Days,
    pub selection: SelectionPolicy,
    pub threshold: ThresholdPolicy,
    pub repeats: u32,
    pub seed: u64,
    pub observability: ObservabilityRule,
    pub forecast: ForecastParams,
    pub scheduler: SchedulerParams,
}

impl SimulationParams {
    /// The window has no default: set a start and either an end or a length.
    pub fn builder() -> SimulationParamsBuilder {
        SimulationParamsBuilder::default()
    }

    /// Number of blocks needed to cover the window.
    pub fn block_count(&self) -> u64 {
        ((self.end - self.start) / self.block_length).ceil().max(0.0) as u64
    }
}

/// Builder for [`SimulationParams`], with validation.
#[derive(Debug, Clone)]
pub struct SimulationParamsBuilder {
    start: Option<Tjd>,
    end: Option<Tjd>,
    window_length: Option<Days>,
    block_length: Days,
    selection: SelectionPolicy,
    threshold: ThresholdPolicy,
    repeats: u32,
    seed: u64,
    observability: ObservabilityRule,
    forecast: ForecastParams,
    scheduler: SchedulerParams,
}

impl Default for SimulationParamsBuilder {
    fn default() -> Self {
        SimulationParamsBuilder {
            start: None,
            end: None,
            window_length: None,
            block_length: BLOCK_LENGTH_DAYS,
            selection: SelectionPolicy::default(),
            threshold: ThresholdPolicy::default(),
            repeats: 1,
            seed: 0,
            observability: ObservabilityRule::default(),
            forecast: ForecastParams::default(),
            scheduler: SchedulerParams::default(),
        }
    }
}

impl SimulationParamsBuilder {
    pub fn start(self, epoch: Epoch) -> Self {
        self.start_tjd(epoch_to_tjd(&epoch))
    }
    pub fn start_tjd(mut self, v: Tjd) -> Self {
        self.start = Some(v);
        self
    }
    pub fn end(self, epoch: Epoch) -> Self {
        self.end_tjd(epoch_to_tjd(&epoch))
    }
    pub fn end_tjd(mut self, v: Tjd) -> Self {
        self.end = Some(v);
        self
    }
    pub fn window_length(mut self, v: Days) -> Self {
        self.window_length = Some(v);
        self
    }
    pub fn block_length(mut self, v: Days) -> Self {
        self.block_length = v;
        self
    }
    pub fn selection(mut self, v: SelectionPolicy) -> Self {
        self.selection = v;
        self
    }
    pub fn threshold(mut self, v: ThresholdPolicy) -> Self {
        self.threshold = v;
        self
    }
    pub fn repeats(mut self, v: u32) -> Self {
        self.repeats = v;
        self
    }
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }
    pub fn observability(mut self, v: ObservabilityRule) -> Self {
        self.observability = v;
        self
    }
    pub fn forecast(mut self, v: ForecastParams) -> Self {
        self.forecast = v;
        self
    }
    pub fn scheduler(mut self, v: SchedulerParams) -> Self {
        self.scheduler = v;
        self
    }

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * a start is required,
    /// * exactly one of end and window length is given,
    /// * the window does not end before it starts,
    /// * `block_length > 0`, `repeats ≥ 1`, the threshold value is `> 0`.
    ///
    /// Errors
    /// ----------
    /// * [`ExoschedError::OverdefinedWindow`], [`ExoschedError::UnderdefinedWindow`],
    ///   [`ExoschedError::WindowEndsBeforeStart`] for window problems,
    /// * [`ExoschedError::InvalidParameter`] otherwise.
    pub fn build(self) -> Result<SimulationParams, ExoschedError> {
        let start = self
            .start
            .filter(|s| s.is_finite())
            .ok_or_else(|| ExoschedError::InvalidParameter("a finite start date is required".into()))?;

        let end = match (self.end, self.window_length) {
            (Some(_), Some(_)) => return Err(ExoschedError::OverdefinedWindow),
            (None, None) => return Err(ExoschedError::UnderdefinedWindow),
            (Some(end), None) => end,
            (None, Some(length)) => start + length,
        };
        if end.is_nan() || end < start {
            return Err(ExoschedError::WindowEndsBeforeStart { start, end });
        }

        if !Self::gt0(self.block_length) {
            return Err(ExoschedError::InvalidParameter("block_length must be > 0".into()));
        }
        if self.repeats == 0 {
            return Err(ExoschedError::InvalidParameter("repeats must be >= 1".into()));
        }
        if !Self::gt0(self.threshold.value()) {
            return Err(ExoschedError::InvalidParameter("threshold must be > 0".into()));
        }

        Ok(SimulationParams {
            start,
            end,
            block_length: self.block_length,
            selection: self.selection,
            threshold: self.threshold,
            repeats: self.repeats,
            seed: self.seed,
            observability: self.observability,
            forecast: self.forecast,
            scheduler: self.scheduler,
        })
    }
}

impl fmt::Display for SimulationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 50;
            writeln!(f, "Simulation Parameters")?;
            writeln!(f, "---------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            line!("start        = {:.3}", self.start, "First instant simulated (TJD)")?;
            line!("end          = {:.3}", self.end, "Last instant simulated (TJD)")?;
            line!("block_length = {:.1} d", self.block_length, "Length of one time block")?;
            line!("selection    = {}", self.selection, "Target selection strategy")?;
            line!("threshold    = {}", self.threshold, "Accuracy threshold policy")?;
            line!("repeats      = {}", self.repeats, "Independent runs")?;
            line!("seed         = {}", self.seed, "Base random seed")?;
            let rule = match self.observability {
                ObservabilityRule::AllInstruments => "all instruments",
                ObservabilityRule::DepthLimited(_) => "depth limited",
            };
            line!("observability= {}", rule, "Telescopes able to observe a target")?;
            writeln!(f)?;
            write!(f, "{:#}", self.forecast)?;
            writeln!(f)?;
            write!(f, "{:#}", self.scheduler)
        } else {
            write!(
                f,
                "SimulationParams([{:.2}, {:.2}], block={:.1}d, {}, threshold={}, repeats={}, seed={})",
                self.start,
                self.end,
                self.block_length,
                self.selection,
                self.threshold,
                self.repeats,
                self.seed,
            )
        }
    }
}

/// Targets taking part in a block and those among them that need data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Number of eligible targets
    pub eligible: usize,
    /// Required targets, most urgent first
    pub required: Vec<TargetIdx>,
}

impl Selection {
    /// Share of the eligible targets that need data (percent, 0 without eligible targets).
    pub fn percent_required(&self) -> f64 {
        if self.eligible == 0 {
            0.0
        } else {
            self.required.len() as f64 / self.eligible as f64 * 100.0
        }
    }
}

/// Counters accumulated over the blocks of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunTotals {
    pub bookings: usize,
    pub observations: usize,
    pub observation_days: Days,
    pub night_days: Days,
    pub clear_days: Days,
}

/// Mutable state of one run, threaded through the phases of every block.
#[derive(Debug)]
pub struct SimulationContext {
    pub run: u32,
    pub block_start: Tjd,
    pub blocks: u32,
    pub totals: RunTotals,
    rng: StdRng,
    targets: Vec<Target>,
}

impl SimulationContext {
    /// Prepare run `run`: copy the catalog, resolve observability and thresholds.
    pub fn new(run: u32, catalog: &[Target], network: &Network, params: &SimulationParams) -> Self {
        let mut targets = catalog.to_vec();
        for target in &mut targets {
            target.determine_telescope_visibility(network, &params.observability);
            target.determine_threshold(params.threshold);
        }
        SimulationContext {
            run,
            block_start: params.start,
            blocks: 0,
            totals: RunTotals::default(),
            rng: StdRng::seed_from_u64(params.seed.wrapping_add(u64::from(run))),
            targets,
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Current block, clipped to the end of the window.
    pub fn block(&self, params: &SimulationParams) -> Window {
        Window::new(
            self.block_start,
            (self.block_start + params.block_length).min(params.end),
        )
    }

    /// Refresh every eligible target at the block start and keep the required ones.
    pub fn select(&mut self, policy: &SelectionPolicy, thresholds: ThresholdPolicy) -> Selection {
        let date = self.block_start;
        let mut selection = Selection::default();
        for (idx, target) in self.targets.iter_mut().enumerate() {
            if !target.is_eligible() {
                continue;
            }
            selection.eligible += 1;
            if target.refresh_selection(date, policy, thresholds) {
                selection.required.push(idx);
            }
        }

        let targets = &self.targets;
        selection
            .required
            .sort_by(|&a, &b| policy.urgency(&targets[b]).total_cmp(&policy.urgency(&targets[a])));
        selection
    }

    /// Forecast the required targets over `block`, most urgent first.
    pub fn forecast(
        &self,
        required: &[TargetIdx],
        block: Window,
        network: &Network,
        params: &ForecastParams,
    ) -> Result<Vec<Transit>, ExoschedError> {
        let mut transits = Vec::new();
        for &idx in required {
            transits.extend(forecast(&self.targets[idx], idx, block, network, params)?);
        }
        Ok(transits)
    }

    /// Simulate the bookings of every telescope, in telescope order.
    pub fn observe(
        &mut self,
        network: &Network,
        schedule: &BTreeMap<TelescopeIdx, Vec<Booking>>,
    ) -> Result<Vec<SyntheticMeasurement>, ExoschedError> {
        let mut measurements = Vec::new();
        for (&idx, bookings) in schedule {
            let telescope = network.telescope(idx)?;
            let outcome = simulate_observations(telescope, bookings, &mut self.rng)?;
            self.totals.bookings += outcome.attempted;
            self.totals.observations += outcome.successes();
            self.totals.observation_days += outcome.time_used;
            measurements.extend(outcome.measurements);
        }
        Ok(measurements)
    }

    /// Append measurements to their targets, then refit the period of each updated target.
    pub fn update(&mut self, measurements: Vec<SyntheticMeasurement>) {
        let updated = measurements.iter().map(|m| m.target).unique().collect_vec();
        for m in measurements {
            self.targets[m.target].record_measurement(m.measurement);
        }
        for idx in updated {
            self.targets[idx].refit_period();
        }
    }

    /// Add the night and clear-sky time of `block` for every telescope unit.
    ///
    /// A night belongs to the block containing the UTC noon that precedes it.
    pub fn account_nights(&mut self, block: Window, network: &Network, sun_altitude: f64) {
        for (_, telescope) in network.iter() {
            let site = telescope.location();
            let units = f64::from(telescope.copies);
            let mut midnight = (block.start - 1.0).ceil() + 0.5;
            while midnight + 0.5 < block.end {
                let night = night_length(&site, midnight, sun_altitude) * units;
                self.totals.night_days += night;
                self.totals.clear_days += night * telescope.clear_probability_at(midnight);
                midnight += 1.0;
            }
        }
    }
}

/// Target still needing data at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingTarget {
    pub run: u32,
    pub name: Arc<str>,
    pub period: Days,
    pub duration: Minutes,
    pub depth: Option<f64>,
}

/// Figures of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run: u32,
    pub eligible: usize,
    pub still_required: usize,
    /// Share of eligible targets still requiring data in the last block (percent)
    pub percent_required: f64,
    pub totals: RunTotals,
}

impl RunSummary {
    /// Share of eligible targets with an up to date ephemeris (percent).
    pub fn performance(&self) -> f64 {
        100.0 - self.percent_required
    }

    pub fn percent_night_used(&self) -> f64 {
        percent(self.totals.observation_days, self.totals.night_days)
    }

    pub fn percent_clear_used(&self) -> f64 {
        percent(self.totals.observation_days, self.totals.clear_days)
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {}: {:.1}% of {} targets still required, {} observations ({:.2} d), \
             {:.2} night days, {:.1}% of night used, {:.1}% of clear time used",
            self.run,
            self.percent_required,
            self.eligible,
            self.totals.observations,
            self.totals.observation_days,
            self.totals.night_days,
            self.percent_night_used(),
            self.percent_clear_used(),
        )
    }
}

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub summary: RunSummary,
    pub missing: Vec<MissingTarget>,
    /// Targets as they stand after the last block
    pub targets: Vec<Target>,
}

/// Outcome of every run of a simulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationReport {
    pub runs: Vec<RunSummary>,
    pub missing: Vec<MissingTarget>,
}

impl SimulationReport {
    /// Write `results.csv` and `missing_targets.csv` into `dir`.
    pub fn write_csv(&self, dir: &Utf8Path) -> Result<(), ExoschedError> {
        let mut results = csv::Writer::from_path(dir.join("results.csv"))?;
        results.write_record([
            "run",
            "percent_required",
            "observations",
            "observation_days",
            "night_days",
            "percent_night_used",
            "percent_clear_used",
        ])?;
        for s in &self.runs {
            results.write_record([
                s.run.to_string(),
                s.percent_required.to_string(),
                s.totals.observations.to_string(),
                s.totals.observation_days.to_string(),
                s.totals.night_days.to_string(),
                s.percent_night_used().to_string(),
                s.percent_clear_used().to_string(),
            ])?;
        }
        results.flush()?;

        let mut missing = csv::Writer::from_path(dir.join("missing_targets.csv"))?;
        missing.write_record(["run", "name", "period", "duration", "depth"])?;
        for m in &self.missing {
            missing.write_record([
                m.run.to_string(),
                m.name.to_string(),
                m.period.to_string(),
                m.duration.to_string(),
                m.depth.map(|d| d.to_string()).unwrap_or_default(),
            ])?;
        }
        missing.flush()?;
        Ok(())
    }
}

/// A campaign over a telescope network and a target catalog.
#[derive(Debug, Clone)]
pub struct Simulation {
    network: Network,
    catalog: Vec<Target>,
    params: SimulationParams,
}

impl Simulation {
    pub fn new(network: Network, catalog: Vec<Target>, params: SimulationParams) -> Self {
        Simulation {
            network,
            catalog,
            params,
        }
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn catalog(&self) -> &[Target] {
        &self.catalog
    }

    /// Forecast every target required at `window.start` over `window`, sorted by centre time.
    pub fn forecast_window(&self, window: Window) -> Result<Vec<Transit>, ExoschedError> {
        let mut ctx = SimulationContext::new(0, &self.catalog, &self.network, &self.params);
        ctx.block_start = window.start;
        let selection = ctx.select(&self.params.selection, self.params.threshold);
        info!(
            required = selection.required.len(),
            eligible = selection.eligible,
            "forecasting required targets"
        );
        forecast_network(
            ctx.targets(),
            &selection.required,
            window,
            &self.network,
            &self.params.forecast,
        )
    }

    /// Simulate run number `run` (from 1), reporting bookings to `sink`.
    pub fn run(&self, run: u32, sink: &mut dyn BookingSink) -> Result<RunResult, ExoschedError> {
        let params = &self.params;
        sink.start_run(run, &self.network)?;
        let mut ctx = SimulationContext::new(run, &self.catalog, &self.network, params);
        info!(
            run,
            targets = self.catalog.len(),
            telescopes = self.network.len(),
            start = params.start,
            end = params.end,
            "simulation run started"
        );

        #[cfg(feature = "progress")]
        let (pb, mut pace) = (
            progress_bar::block_bar(run, params.block_count()),
            progress_bar::BlockPace::start(),
        );

        let mut selection = Selection::default();
        while ctx.block_start < params.end {
            let block = ctx.block(params);
            selection = ctx.select(&params.selection, params.threshold);
            info!(
                run,
                block = ctx.blocks,
                block_start = block.start,
                required = selection.required.len(),
                percent_required = selection.percent_required(),
                observations = ctx.totals.observations,
                "block started"
            );

            let transits = ctx.forecast(&selection.required, block, &self.network, &params.forecast)?;
            debug!(candidates = transits.len(), "block forecast");
            let schedule = scheduler::schedule(&self.network, transits, &params.scheduler, sink)?;
            let measurements = ctx.observe(&self.network, &schedule)?;
            ctx.update(measurements);
            ctx.account_nights(block, &self.network, params.forecast.sun_altitude);

            ctx.block_start = block.end;
            ctx.blocks += 1;

            #[cfg(feature = "progress")]
            progress_bar::advance(&pb, &mut pace, block.length(), ctx.totals.bookings);
        }

        #[cfg(feature = "progress")]
        pb.finish_and_clear();
        sink.finish()?;

        let missing = selection
            .required
            .iter()
            .map(|&idx| {
                let t = &ctx.targets[idx];
                MissingTarget {
                    run,
                    name: t.name.clone(),
                    period: t.period,
                    duration: t.duration,
                    depth: t.depth,
                }
            })
            .collect();
        let summary = RunSummary {
            run,
            eligible: selection.eligible,
            still_required: selection.required.len(),
            percent_required: selection.percent_required(),
            totals: ctx.totals,
        };
        info!(run, %summary, "simulation run finished");

        Ok(RunResult {
            summary,
            missing,
            targets: ctx.targets,
        })
    }

    /// Simulate every run in turn.
    pub fn run_all(&self, sink: &mut dyn BookingSink) -> Result<SimulationReport, ExoschedError> {
        let mut report = SimulationReport::default();
        for run in 1..=self.params.repeats {
            let result = self.run(run, sink)?;
            report.runs.push(result.summary);
            report.missing.extend(result.missing);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod simulation_test {
    use super::*;
    use crate::scheduler::booking_log::{MemoryLog, NullLog};
    use crate::telescopes::Telescope;

    fn params() -> SimulationParamsBuilder {
        SimulationParams::builder().start_tjd(59204.5)
    }

    #[test]
    fn test_window_validation() {
        assert_eq!(params().build().unwrap_err(), ExoschedError::UnderdefinedWindow);
        assert_eq!(
            params().end_tjd(59300.5).window_length(10.0).build().unwrap_err(),
            ExoschedError::OverdefinedWindow
        );
        assert_eq!(
            params().end_tjd(59200.5).build().unwrap_err(),
            ExoschedError::WindowEndsBeforeStart {
                start: 59204.5,
                end: 59200.5
            }
        );
        assert!(matches!(
            SimulationParams::builder().window_length(3.0).build(),
            Err(ExoschedError::InvalidParameter(_))
        ));
        assert!(params().window_length(7.0).repeats(0).build().is_err());
        assert!(params().window_length(7.0).block_length(0.0).build().is_err());
        assert!(params()
            .window_length(7.0)
            .threshold(ThresholdPolicy::Minutes(-1.0))
            .build()
            .is_err());

        let p = params().window_length(20.0).build().unwrap();
        assert_eq!(p.end, 59224.5);
        assert_eq!(p.block_count(), 3);
    }

    #[test]
    fn test_start_from_epoch() {
        let p = SimulationParams::builder()
            .start(Epoch::from_gregorian_utc_at_midnight(2021, 1, 1))
            .window_length(7.0)
            .build()
            .unwrap();
        assert!((p.start - 59215.5).abs() < 1e-6);
    }

    fn polar_setup() -> (Network, Vec<Target>) {
        let network = Network::from_telescopes([Telescope::new("Polar", 89.0, 0.0, 0.0, 1.0)
            .unwrap()
            .with_copies(2)])
        .unwrap();
        let target = |name: &str, err_min: f64| {
            Target::builder(name)
                .coordinates(37.95, 80.0)
                .period(1.7)
                .period_err(Some(1e-4))
                .duration(100.0)
                .depth(Some(8.0))
                .last_transit(59100.0, Some(err_min / 1440.0), 0)
                .ignore_moon(true)
                .build()
                .unwrap()
        };
        (network, vec![target("A", 6.0), target("B", 12.0), target("C", 1.0)])
    }

    #[test]
    fn test_select_sorts_by_urgency() {
        let (network, targets) = polar_setup();
        let p = params().window_length(7.0).build().unwrap();
        let mut ctx = SimulationContext::new(1, &targets, &network, &p);
        let selection = ctx.select(&p.selection, p.threshold);
        assert_eq!(selection.eligible, 3);
        // B starts above the threshold, A expires after 56 epochs, C much later
        assert_eq!(selection.required, vec![1, 0]);
        assert!((selection.percent_required() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_account_nights_polar_winter() {
        let (network, targets) = polar_setup();
        let p = params().window_length(7.0).build().unwrap();
        let mut ctx = SimulationContext::new(1, &targets, &network, &p);
        let block = ctx.block(&p);
        ctx.account_nights(block, &network, -20.0);
        // seven full nights on two units, clear sky by default
        assert!((ctx.totals.night_days - 14.0).abs() < 1e-9);
        assert!((ctx.totals.clear_days - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_observes_required_targets() {
        let (network, targets) = polar_setup();
        let p = params().window_length(14.0).seed(9).build().unwrap();
        let sim = Simulation::new(network, targets, p);

        let mut log = MemoryLog::default();
        let result = sim.run(1, &mut log).unwrap();
        let summary = &result.summary;

        assert!(summary.totals.bookings > 0);
        assert_eq!(summary.totals.observations, summary.totals.bookings);
        assert_eq!(log.rows().len(), summary.totals.bookings);
        assert!((summary.totals.night_days - 28.0).abs() < 1e-9);
        assert!(summary.percent_night_used() > 0.0);
        // new data only ever lands on required targets
        assert_eq!(result.targets[2].observations().len(), 0);
        assert!(result.targets[1].last_tmid > 59204.5);
    }

    #[test]
    fn test_runs_are_reproducible() {
        let (network, targets) = polar_setup();
        let p = params().window_length(21.0).seed(5).repeats(2).build().unwrap();
        let sim = Simulation::new(network, targets, p);
        let a = sim.run_all(&mut NullLog).unwrap();
        let b = sim.run_all(&mut NullLog).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.runs.len(), 2);
        assert_eq!(a.runs[1].run, 2);
    }

    #[test]
    fn test_report_csv() {
        let (network, targets) = polar_setup();
        let p = params().window_length(7.0).build().unwrap();
        let report = Simulation::new(network, targets, p).run_all(&mut NullLog).unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        report.write_csv(dir).unwrap();
        let results = std::fs::read_to_string(dir.join("results.csv")).unwrap();
        assert_eq!(results.lines().count(), 2);
        assert!(results.starts_with("run,percent_required"));
    }

    #[test]
    fn test_forecast_window_sorted() {
        let (network, targets) = polar_setup();
        let p = params().window_length(7.0).build().unwrap();
        let sim = Simulation::new(network, targets, p);
        let transits = sim.forecast_window(Window::new(59204.5, 59211.5)).unwrap();
        assert!(!transits.is_empty());
        assert!(transits.windows(2).all(|w| w[0].center <= w[1].center));
        assert!(transits.iter().all(|t| t.target != 2));
    }
}
