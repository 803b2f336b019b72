//! Simulated execution of bookings.
//!
//! Each booking is split into [`WEATHER_SUB_BLOCKS`] equal sub-blocks. With `p` the effective
//! clear-sky probability of the booking month, every sub-block is clear independently with
//! probability `p^(1/4)`, so the whole booking is clear with probability `p`. Clear sub-blocks
//! count as used telescope time whatever the outcome.
//!
//! A booking whose sub-blocks are all clear yields one synthetic timing measurement:
//!
//! ```text
//! tmid     ~ N(centre, 0.5 min)
//! tmid_err = |N(0.5 min, 0.01 min)|
//! ```
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::constants::{
    Days, TargetIdx, SIMULATED_TMID_ERR_MEAN, SIMULATED_TMID_ERR_SPREAD, SIMULATED_TMID_SCATTER,
    WEATHER_SUB_BLOCKS,
};
use crate::exosched_errors::ExoschedError;
use crate::targets::TimingMeasurement;
use crate::telescopes::Telescope;

use super::Booking;

/// Timing measurement produced for a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticMeasurement {
    pub target: TargetIdx,
    pub measurement: TimingMeasurement,
}

/// Result of simulating the bookings of one telescope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationOutcome {
    pub measurements: Vec<SyntheticMeasurement>,
    /// Telescope time spent under clear sky (days)
    pub time_used: Days,
    pub attempted: usize,
}

impl ObservationOutcome {
    pub fn successes(&self) -> usize {
        self.measurements.len()
    }
}

/// Draw the weather and the synthetic measurements for `bookings` made on `telescope`.
///
/// Errors
/// ----------
/// * [`ExoschedError::NoiseInjectionError`] if a Gaussian cannot be built.
pub fn simulate_observations<R: Rng + ?Sized>(
    telescope: &Telescope,
    bookings: &[Booking],
    rng: &mut R,
) -> Result<ObservationOutcome, ExoschedError> {
    let err_dist = Normal::new(SIMULATED_TMID_ERR_MEAN, SIMULATED_TMID_ERR_SPREAD)?;
    let sub_blocks = f64::from(WEATHER_SUB_BLOCKS);
    let mut outcome = ObservationOutcome {
        attempted: bookings.len(),
        ..ObservationOutcome::default()
    };

    for booking in bookings {
        let p = telescope.clear_probability_at(booking.center);
        let p_sub = p.powf(1.0 / sub_blocks);
        let clear = (0..WEATHER_SUB_BLOCKS)
            .filter(|_| rng.random::<f64>() < p_sub)
            .count() as u32;

        outcome.time_used += booking.duration() * f64::from(clear) / sub_blocks;

        if clear == WEATHER_SUB_BLOCKS {
            let tmid = Normal::new(booking.center, SIMULATED_TMID_SCATTER)?.sample(rng);
            let tmid_err = err_dist.sample(rng).abs();
            outcome.measurements.push(SyntheticMeasurement {
                target: booking.target,
                measurement: TimingMeasurement {
                    epoch: booking.epoch,
                    tmid,
                    tmid_err,
                },
            });
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod observe_test {
    use super::*;
    use crate::constants::MINUTES_PER_DAY;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn booking(start: f64) -> Booking {
        Booking {
            target: 7,
            target_name: "HAT-P-7b".into(),
            telescope: 0,
            unit: 0,
            epoch: 40,
            center: start + 0.1,
            start,
            end: start + 0.2,
        }
    }

    fn telescope(clear: f64) -> Telescope {
        Telescope::new("INT", 28.76, -17.88, 2336.0, 2.54)
            .unwrap()
            .with_clear_sky([clear; 12])
    }

    #[test]
    fn test_clear_sky_always_succeeds() {
        let mut rng = StdRng::seed_from_u64(42);
        let bookings: Vec<_> = (0..20).map(|i| booking(59300.0 + i as f64)).collect();
        let outcome = simulate_observations(&telescope(1.0), &bookings, &mut rng).unwrap();

        assert_eq!(outcome.attempted, 20);
        assert_eq!(outcome.successes(), 20);
        assert!((outcome.time_used - 20.0 * 0.2).abs() < 1e-9);
        for (m, b) in outcome.measurements.iter().zip(&bookings) {
            assert_eq!(m.target, 7);
            assert_eq!(m.measurement.epoch, 40);
            // 8 sigma
            assert!((m.measurement.tmid - b.center).abs() < 4.0 / MINUTES_PER_DAY);
            assert!(m.measurement.tmid_err > 0.4 / MINUTES_PER_DAY);
            assert!(m.measurement.tmid_err < 0.6 / MINUTES_PER_DAY);
        }
    }

    #[test]
    fn test_overcast_never_succeeds() {
        let mut rng = StdRng::seed_from_u64(1);
        let bookings: Vec<_> = (0..10).map(|i| booking(59300.0 + i as f64)).collect();
        let outcome = simulate_observations(&telescope(0.0), &bookings, &mut rng).unwrap();
        assert_eq!(outcome.successes(), 0);
        assert_eq!(outcome.time_used, 0.0);
    }

    #[test]
    fn test_success_rate_follows_clear_probability() {
        let mut rng = StdRng::seed_from_u64(7);
        let bookings: Vec<_> = (0..4000).map(|i| booking(59300.0 + (i % 300) as f64)).collect();
        let outcome = simulate_observations(&telescope(0.6), &bookings, &mut rng).unwrap();
        let rate = outcome.successes() as f64 / 4000.0;
        assert!((rate - 0.6).abs() < 0.04, "rate {rate}");
        // partial credit keeps the used time above the successful share
        assert!(outcome.time_used > outcome.successes() as f64 * 0.2);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let bookings: Vec<_> = (0..50).map(|i| booking(59300.0 + i as f64)).collect();
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            simulate_observations(&telescope(0.5), &bookings, &mut rng).unwrap()
        };
        assert_eq!(run(3), run(3));
    }
}
