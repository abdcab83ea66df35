//! Charger configuration record
//!
//! Read once at attach and immutable afterwards. `None` means "not
//! provided"; the matching hardware step is skipped and the chip keeps its
//! power-on default.

use heapless::Vec;

use crate::error::ChargerError;
use crate::quantize::SAFETY_TIMER_MAX_HOURS;
use crate::thermal::{MAX_TEMP_DECIDEGC, MIN_TEMP_DECIDEGC};

/// Capacity of the thermal-mitigation table.
pub const MAX_THERMAL_LEVELS: usize = 8;

/// JEITA band configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThermalConfig {
    /// Float voltage while warm, mV.
    pub warm_float_mv: u16,
    /// Float voltage while cool, mV.
    pub cool_float_mv: u16,
    /// Charge-current cap while warm, mA.
    pub warm_charge_ma: u16,
    /// Charge-current cap while cool, mA.
    pub cool_charge_ma: u16,
    /// Normal-to-warm breakpoint, 0.1 °C.
    pub warm_decidegc: i16,
    /// Normal-to-cool breakpoint, 0.1 °C.
    pub cool_decidegc: i16,
    /// Warm-to-hot breakpoint, 0.1 °C.
    pub hot_decidegc: i16,
    /// Hysteresis applied when leaving a band, 0.1 °C.
    pub hysteresis_decidegc: i16,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            warm_float_mv: 4112,
            cool_float_mv: 4112,
            warm_charge_ma: 1024,
            cool_charge_ma: 512,
            warm_decidegc: 440,
            cool_decidegc: 20,
            hot_decidegc: 500,
            hysteresis_decidegc: 20,
        }
    }
}

impl ThermalConfig {
    /// Reject breakpoints whose hysteresis bands overlap or leave the clamp range.
    pub fn validate(&self) -> Result<(), ChargerError> {
        let hyst = self.hysteresis_decidegc;
        if hyst < 0 {
            return Err(ChargerError::InvalidConfig("negative hysteresis"));
        }
        let cool_exit = self.cool_decidegc.saturating_add(hyst);
        let warm_exit = self.warm_decidegc.saturating_sub(hyst);
        let hot_exit = self.hot_decidegc.saturating_sub(hyst);
        if self.cool_decidegc <= MIN_TEMP_DECIDEGC || self.hot_decidegc >= MAX_TEMP_DECIDEGC {
            return Err(ChargerError::InvalidConfig("thermal breakpoint out of range"));
        }
        if cool_exit >= warm_exit || warm_exit >= hot_exit || self.warm_decidegc >= self.hot_decidegc
        {
            return Err(ChargerError::InvalidConfig("thermal breakpoints overlap"));
        }
        Ok(())
    }
}

/// How normal-band end of charge is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TerminationStrategy {
    /// Battery current tapers below the termination current for several
    /// consecutive fast-charge samples.
    #[default]
    CurrentTaper,
    /// State of charge stays above the given percentage for several
    /// consecutive samples.
    SocThreshold(u8),
    /// Follow the gauge's full-charge flag.
    GaugeFullFlag,
}

impl TerminationStrategy {
    /// Label for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::CurrentTaper => "current taper",
            Self::SocThreshold(_) => "soc threshold",
            Self::GaugeFullFlag => "gauge full flag",
        }
    }
}

/// Low-battery shutdown behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ShutdownPolicy {
    /// Allow a hard 0 % report (and the forced power-off that follows).
    pub enabled: bool,
    /// The system is running the off-mode charging UI.
    pub off_charging: bool,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            off_charging: false,
        }
    }
}

/// Device-tree-like configuration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargerConfig {
    /// Charge regulation voltage, mV.
    pub float_voltage_mv: Option<u16>,
    /// Fast-charge safety timer, hours; 0 disables the timer.
    pub charging_timeout_hours: Option<u8>,
    /// Recharge threshold below float, normal band, mV.
    pub resume_delta_mv: Option<u16>,
    /// Recharge threshold below float, warm band, mV.
    pub warm_resume_delta_mv: Option<u16>,
    /// Voltage measurement tolerance added to resume thresholds, mV.
    pub max_error_tolerance_mv: u16,
    /// Termination current, mA.
    pub termination_current_ma: Option<u16>,
    /// Disable hardware termination and rely on software EOC.
    pub hw_termination_disabled: bool,
    /// Start with charging disabled by the user reason.
    pub charging_disabled: bool,
    /// Input-current ceiling, mA.
    pub max_usb_current_ma: Option<u16>,
    /// Fast-charge current ceiling, mA.
    pub max_battery_current_ma: Option<u16>,
    /// Input voltage limit, mV.
    pub max_input_voltage_mv: Option<u16>,
    /// JEITA bands.
    pub thermal: ThermalConfig,
    /// Gauge correction when hot, % (passed through to the gauge integration).
    pub hot_correction_percent: Option<u8>,
    /// Gauge correction when cold, % (passed through to the gauge integration).
    pub cold_correction_percent: Option<u8>,
    /// Input-current limit per thermal-mitigation level, mA. The last
    /// level stops charging.
    pub thermal_mitigation_ma: Vec<u16, MAX_THERMAL_LEVELS>,
    /// Normal-band end-of-charge rule.
    pub termination: TerminationStrategy,
    /// Low-battery shutdown behaviour.
    pub shutdown: ShutdownPolicy,
    /// Hold 1 % while a charger is attached until the soft coulomb counter
    /// proves net discharge.
    pub soft_coulomb_counter: bool,
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            float_voltage_mv: Some(4352),
            charging_timeout_hours: Some(8),
            resume_delta_mv: Some(100),
            warm_resume_delta_mv: Some(100),
            max_error_tolerance_mv: 50,
            termination_current_ma: Some(256),
            hw_termination_disabled: false,
            charging_disabled: false,
            max_usb_current_ma: Some(1500),
            max_battery_current_ma: Some(2048),
            max_input_voltage_mv: Some(4520),
            thermal: ThermalConfig::default(),
            hot_correction_percent: None,
            cold_correction_percent: None,
            thermal_mitigation_ma: Vec::new(),
            termination: TerminationStrategy::CurrentTaper,
            shutdown: ShutdownPolicy::default(),
            soft_coulomb_counter: cfg!(feature = "soft-cc"),
        }
    }
}

impl ChargerConfig {
    /// Check the record before anything touches the hardware.
    pub fn validate(&self) -> Result<(), ChargerError> {
        if self
            .charging_timeout_hours
            .is_some_and(|h| h > SAFETY_TIMER_MAX_HOURS)
        {
            error!("bad charging timeout");
            return Err(ChargerError::InvalidConfig("charging timeout"));
        }
        if let TerminationStrategy::SocThreshold(soc) = self.termination {
            if soc > 100 {
                return Err(ChargerError::InvalidConfig("soc threshold"));
            }
        }
        self.thermal.validate()
    }

    /// Number of thermal-mitigation levels (0 when unsupported).
    pub fn thermal_levels(&self) -> usize {
        self.thermal_mitigation_ma.len()
    }

    /// Float voltage to program in the normal band, falling back to the
    /// chip default.
    pub fn normal_float_mv(&self) -> u16 {
        self.float_voltage_mv.unwrap_or(DEFAULT_FLOAT_VOLTAGE_MV)
    }

    /// Software end-of-charge threshold.
    pub fn termination_ma(&self) -> u16 {
        self.termination_current_ma
            .unwrap_or(DEFAULT_TERMINATION_CURRENT_MA)
    }

    /// Normal-band recharge window below float.
    pub fn resume_delta(&self) -> u16 {
        self.resume_delta_mv.unwrap_or(DEFAULT_RESUME_DELTA_MV)
    }

    /// Warm-band recharge window below float.
    pub fn warm_resume_delta(&self) -> u16 {
        self.warm_resume_delta_mv.unwrap_or(DEFAULT_RESUME_DELTA_MV)
    }
}

/// bq24190 power-on VREG.
pub const DEFAULT_FLOAT_VOLTAGE_MV: u16 = 4208;
/// bq24190 power-on ITERM.
pub const DEFAULT_TERMINATION_CURRENT_MA: u16 = 256;
/// bq24190 power-on VRECHG.
pub const DEFAULT_RESUME_DELTA_MV: u16 = 100;
