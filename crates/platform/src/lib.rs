//! Host-service abstractions for the charge-state engine
//!
//! The charger engine treats everything outside the charger IC as an opaque
//! service reached through a trait defined here. Firmware wires real
//! implementations (fuel-gauge driver, USB PHY, power-off hook); tests use
//! the implementations in [`mocks`].
//!
//! # Architecture Layers
//!
//! ```text
//! Host integration (property store, scheduler, power-off hook)
//!         ↓
//! Charger engine (charger crate)
//!         ↓
//! Platform services (this crate - trait abstractions)
//!         ↓
//! Fuel gauge / USB power path / interrupt controller
//! ```
//!
//! # Features
//!
//! - `std`: Export [`mocks`] for downstream test suites
//! - `defmt`: Enable defmt logging derives

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::doc_markdown)] // unit names and register names in doc comments
#![allow(clippy::must_use_candidate)] // provider accessors — callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod mocks;
pub mod power;

pub use power::{
    BatteryMetrics, InterruptLine, MetricError, PowerControl, SupplyNotifier, UsbSupply,
};
