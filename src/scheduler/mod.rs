//! # Instrument scheduler
//!
//! Greedy packing of forecast transits into exclusive bookings on each telescope.
//!
//! ## Packing
//!
//! Candidates competing for one telescope are ordered by the caller (see
//! [`order_candidates`]) and offered to its observing units in turn. For each unit, a
//! transit is accepted when its padded interval does not overlap any booking already accepted
//! for that unit. Once a unit has accepted a transit it is marked
//! [`scheduled`](crate::forecast::Transit::scheduled) and is not offered to later units.
//!
//! A booking covers the observable part of the transit, extended by
//! [`SchedulerParams::baseline_pad`] minutes on every edge that is itself visible, so that
//! out-of-transit flux is recorded on both sides.
//!
//! Two bookings overlap when `a.start < b.end && b.start < a.end`; touching intervals do not.
//!
//! ## See also
//! ------------
//! * [`booking_log`] – where the accepted bookings are written.
//! * [`observe`] – weather draw and synthetic timing measurement for each booking.
pub mod booking_log;
pub mod observe;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use tracing::debug;

use crate::constants::{Days, Minutes, TargetIdx, TelescopeIdx, Tjd, BASELINE_PAD_MINUTES, MINUTES_PER_DAY};
use crate::exosched_errors::ExoschedError;
use crate::forecast::Transit;
use crate::telescopes::{Network, Telescope};

use booking_log::BookingSink;

/// Order in which transits are offered to the observing units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackingOrder {
    /// Transits hosted by fewer telescopes first.
    #[default]
    VisibleFrom,
    /// Highest priority score first, ties broken by `visible_from`.
    Priority,
}

impl fmt::Display for PackingOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackingOrder::VisibleFrom => write!(f, "visible-from"),
            PackingOrder::Priority => write!(f, "priority"),
        }
    }
}

/// Parameters of the packing step.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerParams {
    /// Baseline added on each visible transit edge (minutes)
    pub baseline_pad: Minutes,
    pub order: PackingOrder,
}

impl SchedulerParams {
    pub fn builder() -> SchedulerParamsBuilder {
        SchedulerParamsBuilder::default()
    }
}

impl Default for SchedulerParams {
    fn default() -> Self {
        SchedulerParams {
            baseline_pad: BASELINE_PAD_MINUTES,
            order: PackingOrder::default(),
        }
    }
}

/// Builder for [`SchedulerParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct SchedulerParamsBuilder {
    params: SchedulerParams,
}

impl SchedulerParamsBuilder {
    pub fn baseline_pad(mut self, v: Minutes) -> Self {
        self.params.baseline_pad = v;
        self
    }
    pub fn order(mut self, v: PackingOrder) -> Self {
        self.params.order = v;
        self
    }

    /// Finalize the builder; the baseline pad must be finite and non-negative.
    pub fn build(self) -> Result<SchedulerParams, ExoschedError> {
        let pad = self.params.baseline_pad;
        if !(pad >= 0.0 && pad.is_finite()) {
            return Err(ExoschedError::InvalidParameter(
                "baseline_pad must be a non-negative number of minutes".into(),
            ));
        }
        Ok(self.params)
    }
}

impl fmt::Display for SchedulerParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Scheduler Parameters")?;
            writeln!(f, "--------------------")?;
            writeln!(f, "  baseline_pad = {:.1} min", self.baseline_pad)?;
            writeln!(f, "  order        = {}", self.order)
        } else {
            write!(
                f,
                "SchedulerParams(pad={:.1}min, order={})",
                self.baseline_pad, self.order
            )
        }
    }
}

/// A reservation of one observing unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub target: TargetIdx,
    pub target_name: Arc<str>,
    pub telescope: TelescopeIdx,
    /// Observing unit of the telescope, from 0
    pub unit: u8,
    pub epoch: i64,
    /// Predicted transit centre
    pub center: Tjd,
    pub start: Tjd,
    pub end: Tjd,
}

impl Booking {
    /// Booking for `transit` on `unit`, padded by `pad` days on each visible edge.
    pub fn from_transit(transit: &Transit, unit: u8, pad: Days) -> Self {
        let span = transit.visible_span();
        let start = span.start - if transit.coverage.ingress_visible { pad } else { 0.0 };
        let end = span.end + if transit.coverage.egress_visible { pad } else { 0.0 };
        Booking {
            target: transit.target,
            target_name: transit.target_name.clone(),
            telescope: transit.telescope,
            unit,
            epoch: transit.epoch,
            center: transit.center,
            start,
            end,
        }
    }

    /// Length of the booking in days.
    pub fn duration(&self) -> Days {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Booking) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Sort candidates in place for packing; the sort is stable.
pub fn order_candidates(transits: &mut [Transit], order: PackingOrder) {
    match order {
        PackingOrder::VisibleFrom => transits.sort_by_key(|t| t.visible_from),
        PackingOrder::Priority => {
            transits.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.visible_from.cmp(&b.visible_from))
            })
        }
    }
}

/// Split forecast records by telescope, keeping their relative order.
pub fn group_by_telescope(
    transits: impl IntoIterator<Item = Transit>,
) -> BTreeMap<TelescopeIdx, Vec<Transit>> {
    transits
        .into_iter()
        .into_group_map_by(|t| t.telescope)
        .into_iter()
        .collect()
}

/// Pack `transits`, all forecast for `telescope`, into bookings on its units.
///
/// Arguments
/// -----------------
/// * `telescope`: the instrument, its `copies` field gives the number of units
/// * `transits`: candidates in the order they should be offered; accepted ones get
///   `scheduled = true`, already scheduled ones are skipped
/// * `params`: packing parameters
///
/// Return
/// ----------
/// * the accepted bookings sorted by start time.
pub fn pack(telescope: &Telescope, transits: &mut [Transit], params: &SchedulerParams) -> Vec<Booking> {
    let pad = params.baseline_pad / MINUTES_PER_DAY;
    let mut bookings = Vec::new();

    for unit in 0..telescope.copies {
        let mut accepted: Vec<Booking> = Vec::new();
        for transit in transits.iter_mut().filter(|t| !t.scheduled) {
            let candidate = Booking::from_transit(transit, unit, pad);
            if accepted.iter().all(|b| !b.overlaps(&candidate)) {
                transit.scheduled = true;
                accepted.push(candidate);
            }
        }
        bookings.extend(accepted);
    }

    bookings.sort_by(|a, b| a.start.total_cmp(&b.start));
    debug!(
        telescope = %telescope.name,
        candidates = transits.len(),
        booked = bookings.len(),
        "telescope packed"
    );
    bookings
}

/// Order, group and pack forecast records for every telescope of `network`, and report each
/// booking to `sink`.
///
/// Return
/// ----------
/// * bookings per telescope index, each list sorted by start time.
///
/// Errors
/// ----------
/// * [`ExoschedError::UnknownTelescope`] when a record names a telescope missing from
///   `network`,
/// * any error raised by `sink`.
pub fn schedule(
    network: &Network,
    transits: Vec<Transit>,
    params: &SchedulerParams,
    sink: &mut dyn BookingSink,
) -> Result<BTreeMap<TelescopeIdx, Vec<Booking>>, ExoschedError> {
    let mut schedule = BTreeMap::new();
    for (idx, mut candidates) in group_by_telescope(transits) {
        let telescope = network.telescope(idx)?;
        order_candidates(&mut candidates, params.order);
        let bookings = pack(telescope, &mut candidates, params);
        for booking in &bookings {
            sink.record(telescope, booking)?;
        }
        schedule.insert(idx, bookings);
    }
    Ok(schedule)
}

#[cfg(test)]
mod scheduler_test {
    use super::*;
    use crate::forecast::Coverage;
    use crate::geometry::sun_moon::MoonState;
    use crate::geometry::Window;

    fn transit(target: usize, ingress: Tjd, egress: Tjd, visible_from: usize) -> Transit {
        Transit {
            target,
            target_name: format!("T{target}").into(),
            telescope: 0,
            epoch: 1,
            center: (ingress + egress) / 2.0,
            ingress,
            egress,
            duration: (egress - ingress) * MINUTES_PER_DAY,
            night: Window::unbounded(),
            target_window: Window::unbounded(),
            window: Window::unbounded(),
            coverage: Coverage {
                ingress,
                egress,
                ingress_visible: true,
                egress_visible: true,
                fraction: 1.0,
            },
            moon: MoonState {
                illumination: 0.0,
                altitude: -30.0,
            },
            visible_from,
            priority: 0,
            scheduled: false,
        }
    }

    fn telescope(copies: u8) -> Telescope {
        Telescope::new("INT", 28.76, -17.88, 2336.0, 2.54)
            .unwrap()
            .with_copies(copies)
    }

    #[test]
    fn test_two_units_three_overlapping_transits() {
        let mut transits = vec![
            transit(0, 10.0, 10.1, 1),
            transit(1, 10.02, 10.12, 1),
            transit(2, 10.04, 10.14, 1),
        ];
        let bookings = pack(&telescope(2), &mut transits, &SchedulerParams::default());
        assert_eq!(bookings.len(), 2);
        assert_eq!(bookings.iter().map(|b| b.unit).sorted().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(transits.iter().filter(|t| t.scheduled).count(), 2);
        assert!(!transits[2].scheduled);
    }

    #[test]
    fn test_padding_applies_to_visible_edges_only() {
        // dawn cuts the transit before egress: the booking stops with the observable part
        let mut partial = transit(0, 10.0, 10.1, 1);
        partial.coverage.egress = 10.08;
        partial.coverage.egress_visible = false;
        let b = Booking::from_transit(&partial, 0, 45.0 / MINUTES_PER_DAY);
        assert_eq!(partial.visible_span(), Window::new(10.0, 10.08));
        assert!((b.start - (10.0 - 45.0 / MINUTES_PER_DAY)).abs() < 1e-12);
        assert_eq!(b.end, 10.08);
    }

    #[test]
    fn test_touching_bookings_do_not_overlap() {
        let params = SchedulerParams::builder().baseline_pad(0.0).build().unwrap();
        let mut transits = vec![transit(0, 10.0, 10.1, 1), transit(1, 10.1, 10.2, 1)];
        let bookings = pack(&telescope(1), &mut transits, &params);
        assert_eq!(bookings.len(), 2);
        assert!(bookings.windows(2).all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn test_order_candidates() {
        let mut transits = vec![transit(0, 1.0, 1.1, 3), transit(1, 2.0, 2.1, 1), transit(2, 3.0, 3.1, 2)];
        transits[0].priority = 5;
        order_candidates(&mut transits, PackingOrder::VisibleFrom);
        assert_eq!(transits.iter().map(|t| t.target).collect::<Vec<_>>(), vec![1, 2, 0]);
        order_candidates(&mut transits, PackingOrder::Priority);
        assert_eq!(transits.iter().map(|t| t.target).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_scarce_transit_wins_the_slot() {
        let network = Network::from_telescopes([telescope(1)]).unwrap();
        let transits = vec![transit(0, 10.0, 10.1, 3), transit(1, 10.05, 10.15, 1)];
        let mut log = booking_log::MemoryLog::default();
        let schedule = schedule(&network, transits, &SchedulerParams::default(), &mut log).unwrap();
        let booked = &schedule[&0];
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].target, 1);
        assert_eq!(log.rows().len(), 1);
    }

    #[test]
    fn test_builder_rejects_negative_pad() {
        assert!(SchedulerParams::builder().baseline_pad(-1.0).build().is_err());
        assert!(SchedulerParams::builder().baseline_pad(f64::NAN).build().is_err());
    }
}
