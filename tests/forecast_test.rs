mod common;

use approx::assert_relative_eq;
use common::load_fixture;
use exosched::forecast::{forecast, forecast_network, ForecastParams};
use exosched::geometry::sun_moon::sun_position;
use exosched::geometry::{altitude, Window};
use exosched::targets::depth_limits::ObservabilityRule;

const JANUARY_2021: Window = Window {
    start: 59215.5,
    end: 59245.5,
};

const DECEMBER_2020: Window = Window {
    start: 59199.5,
    end: 59219.5,
};

#[test]
fn test_la_palma_transits_satisfy_every_check() {
    let (network, mut targets) = load_fixture();
    let params = ForecastParams::builder().moon_filter(false).build().unwrap();
    let wasp = &mut targets[0];
    wasp.set_observable_from([0]);

    let transits = forecast(wasp, 0, JANUARY_2021, &network, &params).unwrap();
    assert!(!transits.is_empty());

    let site = network.telescope(0).unwrap().location();
    for t in &transits {
        assert!(t.center > JANUARY_2021.start && t.center < JANUARY_2021.end);
        assert_relative_eq!(
            (t.center - wasp.last_tmid) / wasp.period,
            (t.epoch - wasp.last_epoch) as f64,
            epsilon = 1e-6
        );
        assert!(t.coverage.is_full());
        assert!(t.window.start < t.ingress && t.egress < t.window.end);
        assert_relative_eq!(t.egress - t.ingress, wasp.duration_days(), epsilon = 1e-9);

        let sun = sun_position(t.center);
        assert!(altitude(t.center, sun.ra, sun.dec, &site) < params.sun_altitude + 1.5);
        assert!(altitude(t.center, wasp.ra, wasp.dec, &site) > params.min_target_altitude - 1.0);
        assert_eq!(t.visible_from, 1);
    }
}

#[test]
fn test_moon_filter_only_removes_transits() {
    let (network, mut targets) = load_fixture();
    let wasp = &mut targets[0];
    wasp.set_observable_from([0]);

    let unfiltered = ForecastParams::builder().moon_filter(false).build().unwrap();
    let filtered = ForecastParams::default();
    let all = forecast(wasp, 0, JANUARY_2021, &network, &unfiltered).unwrap();
    let kept = forecast(wasp, 0, JANUARY_2021, &network, &filtered).unwrap();

    assert!(kept.len() <= all.len());
    assert!(kept.iter().all(|k| all.iter().any(|a| a.epoch == k.epoch)));
    assert!(kept
        .iter()
        .all(|k| !(k.moon.illumination > 0.9 && k.moon.altitude > 0.0)));
}

#[test]
fn test_network_forecast_over_the_fixture() {
    let (network, mut targets) = load_fixture();
    for target in &mut targets {
        target.determine_telescope_visibility(&network, &ObservabilityRule::AllInstruments);
    }
    let selected: Vec<_> = (0..targets.len()).filter(|&i| targets[i].is_eligible()).collect();
    let transits = forecast_network(
        &targets,
        &selected,
        DECEMBER_2020,
        &network,
        &ForecastParams::default(),
    )
    .unwrap();

    assert!(transits.windows(2).all(|w| w[0].center <= w[1].center));
    assert!(transits.iter().all(|t| t.target != 3));
    // polar night: the circumpolar object is seen from the pole at every epoch, 59 to 70
    let polar: Vec<_> = transits.iter().filter(|t| t.target == 4 && t.telescope == 1).collect();
    assert_eq!(polar.len(), 12);
    assert_eq!(polar[0].epoch, 59);
    assert!(polar.iter().all(|t| t.coverage.is_full() && !t.night.is_bounded()));
}
