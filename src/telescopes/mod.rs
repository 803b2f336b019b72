//! # Telescopes and the observing network
//!
//! A [`Telescope`] is one physical instrument: a site, an aperture, a number of identical
//! observing units ("copies") that schedule independently, and a monthly clear-sky climatology.
//!
//! Telescopes are registered once per run in a [`Network`], which hands out compact
//! [`TelescopeIdx`] identifiers. Targets and forecast records refer to instruments through these
//! indices only; the telescopes themselves are shared behind [`Arc`].
//!
//! ## Clear-sky model
//!
//! The chance that a booking in month `m` is not clouded out is the monthly clear-sky
//! probability `p(m)`, relaxed by the fraction of cloud cover the instrument tolerates:
//!
//! ```text
//! p_eff = clamp(p + (1 − p) · cloud_tolerance, 0, 1)
//! ```
use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use ordered_float::NotNan;

use crate::constants::{Degree, Meter, TelescopeIdx, Tjd};
use crate::exosched_errors::ExoschedError;
use crate::geometry::GeoSite;
use crate::time::utc_month;

/// One observing instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Telescope {
    pub name: Arc<str>,
    latitude: NotNan<f64>,
    longitude: NotNan<f64>,
    /// Height above sea level (m)
    pub altitude: Meter,
    /// Aperture (m)
    pub aperture: Meter,
    /// Number of identical units observing in parallel
    pub copies: u8,
    /// Clear-sky probability for January to December
    pub clear_sky: [f64; 12],
    /// Observatory label, several telescopes may share one
    pub site: String,
    /// Fraction of cloud cover the instrument can work through, in `[0, 1]`
    pub cloud_tolerance: f64,
}

impl Telescope {
    /// Create a single-unit telescope with an always clear sky.
    ///
    /// Arguments
    /// -----------------
    /// * `name`: unique identifier
    /// * `latitude`: geodetic latitude in degrees, `[-90, 90]`
    /// * `longitude`: east longitude in degrees
    /// * `altitude`: height above sea level in meters
    /// * `aperture`: aperture in meters
    ///
    /// Errors
    /// ----------
    /// * [`ExoschedError::NanCoordinate`] if a coordinate is NaN,
    /// * [`ExoschedError::InvalidParameter`] if the latitude is out of range.
    pub fn new(
        name: impl Into<Arc<str>>,
        latitude: Degree,
        longitude: Degree,
        altitude: Meter,
        aperture: Meter,
    ) -> Result<Self, ExoschedError> {
        let latitude = NotNan::new(latitude)?;
        let longitude = NotNan::new(longitude)?;
        if !(-90.0..=90.0).contains(&latitude.into_inner()) {
            return Err(ExoschedError::InvalidParameter(format!(
                "latitude {latitude} out of [-90, 90]"
            )));
        }
        Ok(Telescope {
            name: name.into(),
            latitude,
            longitude,
            altitude,
            aperture,
            copies: 1,
            clear_sky: [1.0; 12],
            site: String::new(),
            cloud_tolerance: 0.0,
        })
    }

    pub fn with_copies(mut self, copies: u8) -> Self {
        self.copies = copies;
        self
    }

    pub fn with_clear_sky(mut self, clear_sky: [f64; 12]) -> Self {
        self.clear_sky = clear_sky;
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    pub fn with_cloud_tolerance(mut self, tolerance: f64) -> Self {
        self.cloud_tolerance = tolerance;
        self
    }

    pub fn latitude(&self) -> Degree {
        self.latitude.into_inner()
    }

    pub fn longitude(&self) -> Degree {
        self.longitude.into_inner()
    }

    /// Geographic location used by the rise/set geometry.
    pub fn location(&self) -> GeoSite {
        GeoSite::new(self.latitude(), self.longitude())
    }

    /// Effective clear-sky probability for `month` (1 = January).
    pub fn clear_probability(&self, month: u8) -> f64 {
        let idx = usize::from(month.clamp(1, 12) - 1);
        let p = self.clear_sky[idx];
        (p + (1.0 - p) * self.cloud_tolerance).clamp(0.0, 1.0)
    }

    /// Effective clear-sky probability for the UTC month containing `tjd`.
    pub fn clear_probability_at(&self, tjd: Tjd) -> f64 {
        self.clear_probability(utc_month(tjd))
    }
}

/// Registry of the telescopes taking part in a run.
#[derive(Debug, Clone, Default)]
pub struct Network {
    telescopes: Vec<Arc<Telescope>>,
    by_name: HashMap<Arc<str>, TelescopeIdx, RandomState>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a network from telescopes, indices following the iteration order.
    pub fn from_telescopes(
        telescopes: impl IntoIterator<Item = Telescope>,
    ) -> Result<Self, ExoschedError> {
        let mut network = Network::new();
        for telescope in telescopes {
            network.add(telescope)?;
        }
        Ok(network)
    }

    /// Register a telescope and return its index.
    ///
    /// Errors
    /// ----------
    /// * [`ExoschedError::DuplicateTelescope`] if the name is already registered,
    /// * [`ExoschedError::TooManyTelescopes`] once every index is taken.
    pub fn add(&mut self, telescope: Telescope) -> Result<TelescopeIdx, ExoschedError> {
        if self.by_name.contains_key(&telescope.name) {
            return Err(ExoschedError::DuplicateTelescope(telescope.name.to_string()));
        }
        let idx = TelescopeIdx::try_from(self.telescopes.len())
            .map_err(|_| ExoschedError::TooManyTelescopes(self.telescopes.len()))?;
        self.by_name.insert(telescope.name.clone(), idx);
        self.telescopes.push(Arc::new(telescope));
        Ok(idx)
    }

    pub fn get(&self, idx: TelescopeIdx) -> Option<&Arc<Telescope>> {
        self.telescopes.get(usize::from(idx))
    }

    /// Telescope by index, as an error when unknown.
    pub fn telescope(&self, idx: TelescopeIdx) -> Result<&Arc<Telescope>, ExoschedError> {
        self.get(idx)
            .ok_or_else(|| ExoschedError::UnknownTelescope(format!("#{idx}")))
    }

    pub fn index_of(&self, name: &str) -> Option<TelescopeIdx> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TelescopeIdx, &Arc<Telescope>)> {
        self.telescopes
            .iter()
            .enumerate()
            .map(|(i, t)| (i as TelescopeIdx, t))
    }

    pub fn indices(&self) -> impl Iterator<Item = TelescopeIdx> {
        0..self.telescopes.len() as TelescopeIdx
    }

    pub fn len(&self) -> usize {
        self.telescopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.telescopes.is_empty()
    }
}

#[cfg(test)]
mod telescopes_test {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn int() -> Telescope {
        Telescope::new("INT", 28.76, -17.88, 2336.0, 2.54).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_coordinates() {
        assert_eq!(
            Telescope::new("X", f64::NAN, 0.0, 0.0, 1.0),
            Err(ExoschedError::NanCoordinate)
        );
        assert!(matches!(
            Telescope::new("X", 91.0, 0.0, 0.0, 1.0),
            Err(ExoschedError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_clear_probability_with_tolerance() {
        let mut clear = [0.8; 12];
        clear[0] = 0.5;
        let t = int().with_clear_sky(clear).with_cloud_tolerance(0.2);
        assert_abs_diff_eq!(t.clear_probability(1), 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(t.clear_probability(7), 0.84, epsilon = 1e-12);
        // 2021-01-15
        assert_abs_diff_eq!(t.clear_probability_at(59229.5), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_network_indices_and_duplicates() {
        let mut network = Network::new();
        assert_eq!(network.add(int()).unwrap(), 0);
        let wht = Telescope::new("WHT", 28.76, -17.88, 2344.0, 4.2).unwrap();
        assert_eq!(network.add(wht).unwrap(), 1);
        assert_eq!(
            network.add(int()),
            Err(ExoschedError::DuplicateTelescope("INT".into()))
        );

        assert_eq!(network.index_of("WHT"), Some(1));
        assert_eq!(network.index_of("NOT"), None);
        assert_eq!(network.telescope(1).unwrap().aperture, 4.2);
        assert!(matches!(
            network.telescope(7),
            Err(ExoschedError::UnknownTelescope(_))
        ));
        assert_eq!(network.indices().collect::<Vec<_>>(), vec![0, 1]);
    }
}
