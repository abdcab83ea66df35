//! Charging-disable arbiter.
//!
//! Independent subsystems veto charging by asserting a [`DisableReason`].
//! Reasons combine with OR: CHG_CONFIG is written "charge" only while the
//! mask is empty. Every request rewrites the hardware field, even when the
//! aggregate did not change, so a request doubles as a forced refresh.
//! A failed hardware write is logged and returned, but the in-memory mask
//! keeps the new request.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::i2c::I2c;

use crate::control::ChargeConfig;
use crate::error::ChargerError;
use crate::transport::RegisterTransport;

/// A single cause that can veto charging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DisableReason {
    /// Host or user request (also seeded from configuration at attach).
    User = 1 << 0,
    /// Top thermal-mitigation level selected.
    Thermal = 1 << 1,
    /// End of charge reached (normal or warm band).
    Current = 1 << 2,
    /// Battery hot or cool.
    Temperature = 1 << 3,
}

impl DisableReason {
    /// Every reason, in bit order.
    pub const ALL: [Self; 4] = [Self::User, Self::Thermal, Self::Current, Self::Temperature];

    /// Bit in the disable mask.
    pub const fn bit(self) -> u8 {
        self as u8
    }

    /// Label for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Thermal => "thermal",
            Self::Current => "current",
            Self::Temperature => "temperature",
        }
    }
}

/// Set of asserted disable reasons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisableMask(u8);

impl DisableMask {
    /// No reason asserted.
    pub const EMPTY: Self = Self(0);

    /// Mask with `reason` asserted or cleared.
    #[must_use]
    pub const fn with(self, reason: DisableReason, disable: bool) -> Self {
        if disable {
            Self(self.0 | reason.bit())
        } else {
            Self(self.0 & !reason.bit())
        }
    }

    /// Whether `reason` is asserted.
    pub const fn contains(self, reason: DisableReason) -> bool {
        self.0 & reason.bit() != 0
    }

    /// Charging is allowed iff no reason is asserted.
    pub const fn charging_allowed(self) -> bool {
        self.0 == 0
    }

    /// Raw bits (User = 1, Thermal = 2, Current = 4, Temperature = 8).
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// Lock-guarded disable mask.
pub struct DisableArbiter<M: RawMutex> {
    mask: Mutex<M, Cell<DisableMask>>,
}

impl<M: RawMutex> Default for DisableArbiter<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> DisableArbiter<M> {
    /// Arbiter with no reason asserted.
    pub const fn new() -> Self {
        Self {
            mask: Mutex::new(Cell::new(DisableMask::EMPTY)),
        }
    }

    /// Current mask.
    pub fn mask(&self) -> DisableMask {
        self.mask.lock(Cell::get)
    }

    /// Assert or clear `reason`, then rewrite CHG_CONFIG from the new mask.
    ///
    /// Returns the new mask. On a bus error the mask is still updated.
    pub fn set_disabled<I: I2c>(
        &self,
        transport: &RegisterTransport<M, I>,
        reason: DisableReason,
        disable: bool,
    ) -> Result<DisableMask, ChargerError> {
        self.mask.lock(|cell| {
            let previous = cell.get();
            let mask = previous.with(reason, disable);
            cell.set(mask);
            info!(
                "reason={} disable={} mask {} -> {}",
                reason.name(),
                disable,
                previous.bits(),
                mask.bits()
            );
            let config = if mask.charging_allowed() {
                ChargeConfig::Charge
            } else {
                ChargeConfig::Disabled
            };
            match transport.set_charge_config(config) {
                Ok(()) => Ok(mask),
                Err(e) => {
                    error!("couldn't apply disable mask {}", mask.bits());
                    Err(e)
                }
            }
        })
    }
}
