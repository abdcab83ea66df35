//! Capability queries.
//!
//! Derived views over the status register and the battery-metrics
//! providers. Register-backed queries propagate transport errors; metric
//! queries never fail and fall back to documented defaults when a provider
//! is missing or cannot answer.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::I2c;
use platform::{BatteryMetrics, MetricError};

use crate::error::ChargerError;
use crate::registers::{
    CHG_CONFIG_CHARGE, CHG_CONFIG_MASK, CHG_CONFIG_OTG, CHRG_STAT_MASK, CHRG_STAT_SHIFT,
    PG_STAT_MASK, REG01_POWER_ON_CONFIG, REG08_SYSTEM_STATUS,
};
use crate::thermal::ThermalZone;
use crate::transport::RegisterTransport;

// ── Fallback values ──────────────────────────────────────────────────────────

/// State of charge reported without a gauge, %.
pub const DEFAULT_CAPACITY_PERCENT: u8 = 50;
/// Temperature reported without a gauge, 0.1 °C (25.0 °C).
pub const DEFAULT_TEMPERATURE_DECIDEGC: i16 = 250;
/// Terminal voltage reported without a gauge, µV (3.7 V).
pub const DEFAULT_VOLTAGE_UV: i32 = 3_700_000;
/// Battery current reported without a gauge, µA.
pub const DEFAULT_CURRENT_UA: i32 = 0;
/// Full-charge and design capacity reported without a gauge, µAh.
pub const DEFAULT_CHARGE_FULL_UAH: i32 = 3_000_000;

/// Gauge flag bit set once the pack is fully charged.
pub const GAUGE_FLAG_FULL_CHARGE: u16 = 0x0200;

// ── Register-derived state ───────────────────────────────────────────────────

/// CHRG_STAT field of REG08.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargingStatus {
    /// Not charging (or charging disabled).
    NotCharging,
    /// Pre-charge, below VBATLOWV.
    PreCharge,
    /// Fast charge, CC or CV phase.
    FastCharge,
    /// Charge termination done.
    Terminated,
}

impl ChargingStatus {
    /// Decode the two CHRG_STAT bits (already shifted down).
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::NotCharging,
            1 => Self::PreCharge,
            2 => Self::FastCharge,
            _ => Self::Terminated,
        }
    }

    /// Label for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NotCharging => "not charging",
            Self::PreCharge => "pre-charge",
            Self::FastCharge => "fast charge",
            Self::Terminated => "terminated",
        }
    }
}

/// Charge phase as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeType {
    /// No charge current.
    None,
    /// Pre-charge.
    Trickle,
    /// Fast charge or termination.
    Fast,
    /// Status register unreadable.
    Unknown,
}

impl ChargeType {
    /// Pre-charge maps to trickle; fast charge and done both map to fast.
    pub fn from_status(status: Result<ChargingStatus, ChargerError>) -> Self {
        match status {
            Ok(ChargingStatus::PreCharge) => Self::Trickle,
            Ok(ChargingStatus::FastCharge | ChargingStatus::Terminated) => Self::Fast,
            Ok(ChargingStatus::NotCharging) => Self::None,
            Err(_) => Self::Unknown,
        }
    }

    /// Label for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Trickle => "trickle",
            Self::Fast => "fast",
            Self::Unknown => "unknown",
        }
    }
}

/// Battery health, derived from the thermal zone alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryHealth {
    /// Normal or warm.
    Good,
    /// Hot.
    Overheat,
    /// Cool.
    Cold,
}

impl BatteryHealth {
    /// Hot reads as overheat, cool as cold.
    pub const fn from_zone(zone: ThermalZone) -> Self {
        match zone {
            ThermalZone::Hot => Self::Overheat,
            ThermalZone::Cool => Self::Cold,
            ThermalZone::Normal | ThermalZone::Warm => Self::Good,
        }
    }

    /// Label for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Overheat => "overheat",
            Self::Cold => "cold",
        }
    }
}

/// Supply status reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SupplyStatus {
    /// Status register unreadable or state inconsistent.
    Unknown,
    /// Pre or fast charge with a charger attached.
    Charging,
    /// Not charging, or charge done.
    Discharging,
    /// Charger attached and battery full.
    Full,
}

impl SupplyStatus {
    /// Combine the charger state with the battery's full flags.
    ///
    /// `raw_soc` is the unsmoothed gauge reading.
    pub fn derive(
        status: Result<ChargingStatus, ChargerError>,
        charger_present: bool,
        raw_soc: u8,
        batt_full: bool,
    ) -> Self {
        let Ok(status) = status else {
            return Self::Unknown;
        };
        if charger_present && (raw_soc == 100 || batt_full) {
            return Self::Full;
        }
        match status {
            ChargingStatus::PreCharge | ChargingStatus::FastCharge if charger_present => {
                Self::Charging
            }
            ChargingStatus::NotCharging | ChargingStatus::Terminated => Self::Discharging,
            _ => Self::Unknown,
        }
    }

    /// Label for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Charging => "charging",
            Self::Discharging => "discharging",
            Self::Full => "full",
        }
    }
}

impl<M: RawMutex, I: I2c> RegisterTransport<M, I> {
    /// Power-good bit of REG08.
    pub fn charger_present(&self) -> Result<bool, ChargerError> {
        Ok(self.read(REG08_SYSTEM_STATUS)? & PG_STAT_MASK != 0)
    }

    /// CHRG_STAT field of REG08.
    pub fn charging_status(&self) -> Result<ChargingStatus, ChargerError> {
        let bits = self.read_field(REG08_SYSTEM_STATUS, CHRG_STAT_MASK, CHRG_STAT_SHIFT)?;
        Ok(ChargingStatus::from_bits(bits))
    }

    /// Whether CHG_CONFIG currently selects "charge".
    pub fn charging_enabled_hw(&self) -> Result<bool, ChargerError> {
        Ok(self.read(REG01_POWER_ON_CONFIG)? & CHG_CONFIG_MASK == CHG_CONFIG_CHARGE)
    }

    /// Whether CHG_CONFIG currently selects OTG boost.
    pub fn otg_enabled(&self) -> Result<bool, ChargerError> {
        Ok(self.read(REG01_POWER_ON_CONFIG)? & CHG_CONFIG_MASK == CHG_CONFIG_OTG)
    }
}

// ── Metrics with fallbacks ───────────────────────────────────────────────────

/// Metric view over the optional gauges.
///
/// `primary` answers every battery query. `secondary` is the voltage-mode
/// coulomb counter, consulted only for diagnostics.
#[derive(Clone, Copy)]
pub struct Metrics<'a> {
    primary: Option<&'a dyn BatteryMetrics>,
    secondary: Option<&'a dyn BatteryMetrics>,
}

fn or_default<T>(value: Option<Result<T, MetricError>>, default: T, what: &'static str) -> T {
    match value {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            debug!("{} {}, using default", what, e.as_str());
            default
        }
        None => default,
    }
}

impl<'a> Metrics<'a> {
    /// View over the primary and secondary gauges.
    pub const fn new(
        primary: Option<&'a dyn BatteryMetrics>,
        secondary: Option<&'a dyn BatteryMetrics>,
    ) -> Self {
        Self { primary, secondary }
    }

    /// Whether a primary gauge is attached.
    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Battery presence, or `cached` when the gauge cannot say.
    pub fn present(&self, cached: bool) -> bool {
        or_default(self.primary.map(|b| b.present()), cached, "presence")
    }

    /// Unsmoothed state of charge, clamped to 100.
    pub fn capacity_percent(&self) -> u8 {
        or_default(
            self.primary.map(|b| b.capacity_percent()),
            DEFAULT_CAPACITY_PERCENT,
            "capacity",
        )
        .min(100)
    }

    /// Terminal voltage in µV.
    pub fn voltage_uv(&self) -> i32 {
        or_default(self.primary.map(|b| b.voltage_uv()), DEFAULT_VOLTAGE_UV, "voltage")
    }

    /// Terminal voltage in mV.
    pub fn voltage_mv(&self) -> i32 {
        self.voltage_uv() / 1000
    }

    /// Battery current in µA, negative while charging.
    pub fn current_ua(&self) -> i32 {
        or_default(self.primary.map(|b| b.current_ua()), DEFAULT_CURRENT_UA, "current")
    }

    /// Battery current in mA, negative while charging.
    pub fn current_ma(&self) -> i32 {
        self.current_ua() / 1000
    }

    /// Pack temperature in 0.1 °C.
    pub fn temperature_decidegc(&self) -> i16 {
        or_default(
            self.primary.map(|b| b.temperature_decidegc()),
            DEFAULT_TEMPERATURE_DECIDEGC,
            "temperature",
        )
    }

    /// Learned full-charge capacity in µAh.
    pub fn charge_full_uah(&self) -> i32 {
        or_default(
            self.primary.map(|b| b.charge_full_uah()),
            DEFAULT_CHARGE_FULL_UAH,
            "charge full",
        )
    }

    /// Design capacity in µAh.
    pub fn charge_full_design_uah(&self) -> i32 {
        or_default(
            self.primary.map(|b| b.charge_full_design_uah()),
            DEFAULT_CHARGE_FULL_UAH,
            "charge full design",
        )
    }

    /// Gauge flag word, `None` when the gauge has none.
    pub fn flags(&self) -> Option<u16> {
        self.primary.and_then(|b| b.flags().ok())
    }

    /// Gauge status word, zero when unavailable.
    pub fn gauge_status(&self) -> u16 {
        or_default(self.primary.map(|b| b.status()), 0, "gauge status")
    }

    /// Remaining capacity in µAh, zero when unavailable.
    pub fn remaining_capacity_uah(&self) -> i32 {
        or_default(
            self.primary.map(|b| b.remaining_capacity_uah()),
            0,
            "remaining capacity",
        )
    }

    /// Secondary gauge state of charge.
    pub fn secondary_capacity_percent(&self) -> Result<u8, ChargerError> {
        let gauge = self
            .secondary
            .ok_or(ChargerError::ConfigMissing("secondary gauge"))?;
        gauge
            .capacity_percent()
            .map_err(|_| ChargerError::NotSupported("secondary capacity"))
    }

    /// Secondary gauge voltage in mV.
    pub fn secondary_voltage_mv(&self) -> Result<i32, ChargerError> {
        let gauge = self
            .secondary
            .ok_or(ChargerError::ConfigMissing("secondary gauge"))?;
        gauge
            .voltage_uv()
            .map(|uv| uv / 1000)
            .map_err(|_| ChargerError::NotSupported("secondary voltage"))
    }
}
