//! Property surface exposed to the host power-supply layer.
//!
//! Reads never fail: providers that are missing or refuse a metric fall back
//! to the documented defaults. Three properties are writable; see
//! [`BatteryProperty::is_writeable`].

use crate::queries::{BatteryHealth, ChargeType, SupplyStatus};

/// Battery properties the engine answers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryProperty {
    /// Thermal health.
    Health,
    /// Charging, discharging, full or unknown.
    Status,
    /// Battery detected.
    Present,
    /// No disable reason from the user. Writable.
    ChargingEnabled,
    /// Charge phase.
    ChargeType,
    /// Reported (smoothed) capacity, %. Writable as a test override.
    Capacity,
    /// Design capacity, µAh.
    ChargeFullDesign,
    /// Terminal voltage, µV.
    VoltageNow,
    /// Battery current, µA, negative while charging.
    CurrentNow,
    /// Pack temperature, 0.1 °C.
    Temperature,
    /// Thermal-mitigation level. Writable.
    ThermalLevel,
    /// Charger attached.
    Online,
    /// Learned full-charge capacity, µAh.
    ChargeFull,
    /// Cell chemistry.
    Technology,
}

impl BatteryProperty {
    /// Every property, in reporting order.
    pub const ALL: [Self; 14] = [
        Self::Health,
        Self::Present,
        Self::Status,
        Self::ChargingEnabled,
        Self::ChargeType,
        Self::Capacity,
        Self::ChargeFullDesign,
        Self::VoltageNow,
        Self::CurrentNow,
        Self::Temperature,
        Self::ThermalLevel,
        Self::Online,
        Self::ChargeFull,
        Self::Technology,
    ];

    /// Whether [`set_property`](crate::Charger::set_property) accepts this
    /// property.
    pub const fn is_writeable(self) -> bool {
        matches!(
            self,
            Self::ChargingEnabled | Self::Capacity | Self::ThermalLevel
        )
    }

    /// Label for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Status => "status",
            Self::Present => "present",
            Self::ChargingEnabled => "charging_enabled",
            Self::ChargeType => "charge_type",
            Self::Capacity => "capacity",
            Self::ChargeFullDesign => "charge_full_design",
            Self::VoltageNow => "voltage_now",
            Self::CurrentNow => "current_now",
            Self::Temperature => "temp",
            Self::ThermalLevel => "system_temp_level",
            Self::Online => "online",
            Self::ChargeFull => "charge_full",
            Self::Technology => "technology",
        }
    }
}

/// Cell chemistry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Technology {
    /// Lithium-ion.
    LiIon,
}

/// Value of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PropertyValue {
    /// Integer quantity in the property's unit.
    Int(i32),
    /// Flag.
    Bool(bool),
    /// [`BatteryProperty::Health`].
    Health(BatteryHealth),
    /// [`BatteryProperty::Status`].
    Status(SupplyStatus),
    /// [`BatteryProperty::ChargeType`].
    ChargeType(ChargeType),
    /// [`BatteryProperty::Technology`].
    Technology(Technology),
}

impl PropertyValue {
    /// Integer view: flags read as 0/1, enums have none.
    pub fn as_int(self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(v),
            Self::Bool(b) => Some(i32::from(b)),
            _ => None,
        }
    }

    /// Flag view: integers read as non-zero.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            Self::Int(v) => Some(v != 0),
            _ => None,
        }
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
