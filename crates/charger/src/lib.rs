//! Charge-state engine for TI bq2419x / bq2429x I2C battery chargers
//!
//! The engine programs the charger from a configuration record, then keeps
//! it in line with the battery: JEITA thermal bands, software end-of-charge,
//! thermal mitigation, reported-capacity smoothing and the low-battery
//! shutdown guard. Battery metrics come from an external fuel gauge through
//! the [`platform`] traits.
//!
//! # Architecture Layers
//!
//! ```text
//! Host power-supply layer (properties, suspend/resume, interrupt line)
//!         ↓
//! Charger (device) - periodic tasks, IRQ dispatch, property surface
//!         ↓
//! Pure state machines (thermal, eoc, capacity, soft_cc, arbiter)
//!         ↓
//! Control operations and queries over RegisterTransport
//!         ↓
//! I2C bus (embedded-hal)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let charger: Charger<'_, CriticalSectionRawMutex, _> =
//!     Charger::attach(i2c, DEFAULT_I2C_ADDR, ChargerConfig::default(), providers)?;
//! // Spawn once; drives thermal, end-of-charge, heartbeat and soft-cc ticks.
//! charger.run().await;
//! ```
//!
//! # Features
//!
//! - `soft-cc` (default): soft coulomb counter at 0 % with a charger attached
//! - `defmt`: target logging and `defmt::Format` derives
//! - `tracing`: host logging

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
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::doc_markdown)] // register and field names in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
mod fmt;

pub mod arbiter;
pub mod capacity;
pub mod config;
pub mod control;
pub mod device;
pub mod eoc;
pub mod error;
pub mod irq;
pub mod properties;
pub mod quantize;
pub mod queries;
pub mod registers;
#[cfg(feature = "soft-cc")]
pub mod soft_cc;
pub mod task;
pub mod thermal;
pub mod transport;
pub mod variant;

pub use arbiter::{DisableMask, DisableReason};
pub use config::{ChargerConfig, ShutdownPolicy, TerminationStrategy, ThermalConfig};
pub use control::{ChargeConfig, WatchdogTimeout};
pub use device::{Charger, HeartbeatKick, Providers};
pub use error::{ChargerError, RangeError};
pub use properties::{BatteryProperty, PropertyValue, Technology};
pub use queries::{BatteryHealth, ChargeType, ChargingStatus, SupplyStatus};
pub use registers::DEFAULT_I2C_ADDR;
pub use thermal::ThermalZone;
pub use transport::RegisterTransport;
pub use variant::ChipVariant;
