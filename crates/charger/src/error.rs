//! Error types.

use core::fmt;

use embedded_hal::i2c::ErrorKind;
use thiserror_no_std::Error;

/// Error returned when a physical value is outside a setter's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangeError {
    /// The value that was out of range.
    pub value: i32,
    /// The inclusive minimum allowed value.
    pub min: i32,
    /// The inclusive maximum allowed value.
    pub max: i32,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} outside [{}, {}]", self.value, self.min, self.max)
    }
}

/// Charger engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChargerError {
    /// Bus transaction failed. Not retried; periodic tasks try again on
    /// their next tick.
    #[error("bus error on register {reg}: {kind}")]
    Transport {
        /// Register being accessed.
        reg: u8,
        /// Bus-level cause.
        kind: ErrorKind,
    },
    /// Input rejected before any hardware write.
    #[error("{0}")]
    Range(RangeError),
    /// An optional provider is not attached.
    #[error("provider not attached: {0}")]
    ConfigMissing(&'static str),
    /// The operation is unavailable with the current configuration or gauge.
    #[error("not supported: {0}")]
    NotSupported(&'static str),
    /// The configuration record was rejected at attach.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The vendor register could not be read at attach.
    #[error("charger not detected")]
    DeviceAbsent,
    /// An interrupt arrived while suspending.
    #[error("interrupt pending")]
    Busy,
    /// Property cannot be written.
    #[error("property is read-only")]
    ReadOnly,
}

impl ChargerError {
    /// Short label for log lines.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Range(_) => "out of range",
            Self::ConfigMissing(_) => "provider missing",
            Self::NotSupported(_) => "not supported",
            Self::InvalidConfig(_) => "invalid config",
            Self::DeviceAbsent => "device absent",
            Self::Busy => "busy",
            Self::ReadOnly => "read-only",
        }
    }
}

impl From<RangeError> for ChargerError {
    fn from(err: RangeError) -> Self {
        Self::Range(err)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChargerError {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            Self::Transport { reg, .. } => defmt::write!(f, "transport (reg {=u8:#x})", reg),
            Self::Range(r) => defmt::write!(f, "{}", r),
            other => defmt::write!(f, "{=str}", other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern crate std;
    use std::string::ToString;

    #[test]
    fn range_error_displays_bounds() {
        let e = ChargerError::from(RangeError {
            value: 5000,
            min: 3504,
            max: 4400,
        });
        assert_eq!(e.to_string(), "5000 outside [3504, 4400]");
        assert_eq!(e.label(), "out of range");
    }

    #[test]
    fn transport_error_names_register() {
        let e = ChargerError::Transport {
            reg: 8,
            kind: ErrorKind::Bus,
        };
        assert!(e.to_string().starts_with("bus error on register 8"));
    }
}
