#![allow(dead_code)]

use camino::Utf8PathBuf;
use exosched::catalog::{load_targets, load_telescopes, load_timings, merge_timings};
use exosched::forecast::{Coverage, Transit};
use exosched::geometry::sun_moon::MoonState;
use exosched::geometry::Window;
use exosched::targets::Target;
use exosched::telescopes::Network;

pub fn data_path(file: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(file)
}

/// Network and targets of `tests/data`, timings merged.
pub fn load_fixture() -> (Network, Vec<Target>) {
    let network = load_telescopes(&data_path("telescopes.csv")).unwrap();
    let mut targets = load_targets(&data_path("targets.csv")).unwrap();
    let timings = load_timings(&data_path("timings.csv")).unwrap();
    merge_timings(&mut targets, timings).unwrap();
    (network, targets)
}

/// Fully visible candidate on telescope 0.
pub fn candidate(target: usize, ingress: f64, egress: f64, visible_from: usize) -> Transit {
    Transit {
        target,
        target_name: format!("T{target}").into(),
        telescope: 0,
        epoch: 1,
        center: (ingress + egress) / 2.0,
        ingress,
        egress,
        duration: (egress - ingress) * 1440.0,
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
