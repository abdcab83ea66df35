//! Power-supply service abstractions
//!
//! The charger engine has no coulomb counter of its own. State of charge,
//! terminal voltage, battery current and temperature all come from a fuel
//! gauge reached through [`BatteryMetrics`]; the USB power path is reached
//! through [`UsbSupply`]. Results flow back to the host through
//! [`SupplyNotifier`] and, as a last resort, [`PowerControl`].
//!
//! Units follow the power-supply property convention: microvolts,
//! microamps, microamp-hours and tenths of a degree Celsius. Battery current
//! is negative while charge flows into the cell.

/// Failure reported by a metrics provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MetricError {
    /// The active gauge variant does not implement this metric.
    NotSupported,
    /// The gauge is present but the read failed this time.
    Unavailable,
}

impl MetricError {
    /// Short label for log lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotSupported => "not supported",
            Self::Unavailable => "unavailable",
        }
    }
}

impl core::fmt::Display for MetricError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Battery-metrics provider (fuel gauge).
///
/// The first five metrics are required. The remaining ones are
/// gauge-specific and default to [`MetricError::NotSupported`].
pub trait BatteryMetrics {
    /// Whether a battery pack is detected.
    fn present(&self) -> Result<bool, MetricError>;

    /// State of charge, 0-100 %.
    fn capacity_percent(&self) -> Result<u8, MetricError>;

    /// Terminal voltage in µV.
    fn voltage_uv(&self) -> Result<i32, MetricError>;

    /// Battery current in µA (negative while charging).
    fn current_ua(&self) -> Result<i32, MetricError>;

    /// Pack temperature in 0.1 °C.
    fn temperature_decidegc(&self) -> Result<i16, MetricError>;

    /// Learned full-charge capacity in µAh.
    fn charge_full_uah(&self) -> Result<i32, MetricError> {
        Err(MetricError::NotSupported)
    }

    /// Design capacity in µAh.
    fn charge_full_design_uah(&self) -> Result<i32, MetricError> {
        Err(MetricError::NotSupported)
    }

    /// Raw gauge flag word (bq27x00 layout: bit 9 = full charge).
    fn flags(&self) -> Result<u16, MetricError> {
        Err(MetricError::NotSupported)
    }

    /// Raw gauge status word.
    fn status(&self) -> Result<u16, MetricError> {
        Err(MetricError::NotSupported)
    }

    /// Remaining capacity in µAh.
    fn remaining_capacity_uah(&self) -> Result<i32, MetricError> {
        Err(MetricError::NotSupported)
    }
}

/// USB power-path provider.
pub trait UsbSupply {
    /// Negotiated input current ceiling in µA.
    fn current_max_ua(&self) -> Result<i32, MetricError>;

    /// Whether the USB supply currently reports itself online.
    fn online(&self) -> Result<bool, MetricError>;

    /// Publish the online state.
    fn set_online(&self, online: bool);

    /// Publish cable presence.
    fn set_present(&self, present: bool);
}

/// Property-changed sink. Called after every state mutation that affects a
/// reported property.
pub trait SupplyNotifier {
    /// Signal observers that one or more properties changed.
    fn changed(&self);
}

/// Hard power-off, used when the host ignores a reported 0 % for too long.
pub trait PowerControl {
    /// Cut system power. Implementations normally do not return.
    fn power_off(&self);
}

/// Charger interrupt line control.
pub trait InterruptLine {
    /// Stop delivering the interrupt.
    fn mask(&self);

    /// Resume delivering the interrupt.
    fn unmask(&self);
}
