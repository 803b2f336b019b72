//! # exosched
//!
//! Scheduling and simulation of transit follow-up campaigns on a network of ground-based
//! telescopes.
//!
//! A catalog of transiting objects ([`targets::Target`]) carries linear ephemerides whose
//! timing uncertainty grows with every orbit. The crate predicts which transits are observable
//! from which telescope ([`forecast`]), packs them onto the telescope units ([`scheduler`])
//! and simulates campaigns where synthetic measurements refine the ephemerides block after
//! block ([`simulation`]).
//!
//! ## Modules
//!
//! * [`time`], [`geometry`] – time scales, sun and moon positions, altitude crossings,
//! * [`targets`], [`telescopes`], [`catalog`] – inputs and their CSV readers,
//! * [`forecast`] – transit prediction and visibility checks,
//! * [`scheduler`] – packing, booking logs and simulated weather,
//! * [`simulation`] – the block feedback loop and run reports.
//!
//! The `progress` feature shows an `indicatif` bar over the blocks of a run.
pub mod catalog;
pub mod constants;
pub mod exosched_errors;
pub mod forecast;
pub mod geometry;
pub mod scheduler;
pub mod simulation;
pub mod targets;
pub mod telescopes;
pub mod time;
