//! Control operations.
//!
//! Each setter converts a physical value into its register field via
//! [`crate::quantize`] and commits it with a masked write. Range errors are
//! returned before the bus is touched.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::I2c;

use crate::error::{ChargerError, RangeError};
use crate::quantize::{
    input_current_index, input_current_ma, recharge_threshold_bits, safety_timer_index,
    LinearField, FAST_CHARGE_CURRENT_MA, FLOAT_VOLTAGE_MV, INPUT_VOLTAGE_LIMIT_MV,
    SAFETY_TIMER_MAX_HOURS, TERMINATION_CURRENT_MA,
};
use crate::registers::{
    CHG_CONFIG_CHARGE, CHG_CONFIG_DISABLED, CHG_CONFIG_MASK, CHG_CONFIG_OTG, CHG_TIMER_MASK,
    CHG_TIMER_SHIFT, EN_HIZ_MASK, EN_TERM_MASK, EN_TIMER_MASK, IINLIM_MASK, INT_MASK_MASK,
    REG00_INPUT_SOURCE, REG01_POWER_ON_CONFIG, REG04_CHARGE_VOLTAGE, REG05_TERM_TIMER,
    REG07_MISC_OPERATION, TMR2X_EN_MASK, VRECHG_MASK, WATCHDOG_MASK, WATCHDOG_SHIFT,
    WD_RESET_MASK,
};
use crate::transport::RegisterTransport;
use crate::variant::ChipVariant;

/// I2C watchdog period (REG05 WATCHDOG).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WatchdogTimeout {
    /// Watchdog off; the charger never falls back to defaults.
    Disabled = 0,
    /// 40 s.
    Secs40 = 1,
    /// 80 s.
    Secs80 = 2,
    /// 160 s.
    Secs160 = 3,
}

/// REG01 CHG_CONFIG setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeConfig {
    /// Charging and boost both off.
    Disabled,
    /// Battery charging enabled.
    Charge,
    /// OTG boost enabled. Mutually exclusive with charging.
    Otg,
}

impl ChargeConfig {
    const fn bits(self) -> u8 {
        match self {
            Self::Disabled => CHG_CONFIG_DISABLED,
            Self::Charge => CHG_CONFIG_CHARGE,
            Self::Otg => CHG_CONFIG_OTG,
        }
    }
}

impl<M: RawMutex, I: I2c> RegisterTransport<M, I> {
    fn write_linear(&self, field: &LinearField, value: u16) -> Result<(), ChargerError> {
        let bits = field.encode(value)?;
        self.masked_write(field.reg, field.mask, bits)
    }

    /// Set the charge regulation (float) voltage, 3504-4400 mV in 16 mV steps.
    pub fn set_float_voltage(&self, mv: u16) -> Result<(), ChargerError> {
        self.write_linear(&FLOAT_VOLTAGE_MV, mv)
    }

    /// Read back the committed float voltage.
    pub fn float_voltage(&self) -> Result<u16, ChargerError> {
        let raw = self.read(FLOAT_VOLTAGE_MV.reg)?;
        FLOAT_VOLTAGE_MV.decode(raw).map_err(|e| {
            warn!("float voltage register holds {} mV", e.value);
            ChargerError::Range(e)
        })
    }

    /// Set the recharge threshold, 50-300 mV below VREG (two-point field).
    pub fn set_recharge_threshold(&self, mv: u16) -> Result<(), ChargerError> {
        let bits = recharge_threshold_bits(mv)?;
        self.masked_write(REG04_CHARGE_VOLTAGE, VRECHG_MASK, bits)
    }

    /// Set the termination current, 128-1024 mA in 128 mA steps, and enable
    /// hardware termination.
    pub fn set_termination_current(
        &self,
        ma: u16,
        variant: ChipVariant,
    ) -> Result<(), ChargerError> {
        self.write_linear(&TERMINATION_CURRENT_MA, ma)?;
        self.set_hardware_termination(true, variant)
    }

    /// Enable or disable hardware charge termination. On 2419x parts the
    /// TERM_STAT bit is cleared alongside.
    pub fn set_hardware_termination(
        &self,
        enabled: bool,
        variant: ChipVariant,
    ) -> Result<(), ChargerError> {
        let mask = EN_TERM_MASK | variant.fields().term_stat_mask;
        let value = if enabled { EN_TERM_MASK } else { 0 };
        self.masked_write(REG05_TERM_TIMER, mask, value)
    }

    /// Set the fast-charge current, 512-3008 mA in 64 mA steps.
    pub fn set_fast_charge_current(&self, ma: u16) -> Result<(), ChargerError> {
        self.write_linear(&FAST_CHARGE_CURRENT_MA, ma)
    }

    /// Read back the committed fast-charge current.
    pub fn fast_charge_current(&self) -> Result<u16, ChargerError> {
        let raw = self.read(FAST_CHARGE_CURRENT_MA.reg)?;
        Ok(FAST_CHARGE_CURRENT_MA.decode(raw)?)
    }

    /// Set the input voltage limit, 3880-5080 mV in 80 mV steps.
    pub fn set_input_voltage_limit(&self, mv: u16) -> Result<(), ChargerError> {
        self.write_linear(&INPUT_VOLTAGE_LIMIT_MV, mv)
    }

    /// Set the input current limit from the discrete IINLIM table.
    ///
    /// Never fails on range: the largest entry not above `ma` is used, or the
    /// smallest entry for requests below the table. Returns the applied limit.
    pub fn set_input_current_limit(&self, ma: u16) -> Result<u16, ChargerError> {
        let index = input_current_index(ma);
        self.masked_write(REG00_INPUT_SOURCE, IINLIM_MASK, index)?;
        Ok(input_current_ma(index))
    }

    /// Read back the committed input current limit.
    pub fn input_current_limit(&self) -> Result<u16, ChargerError> {
        Ok(input_current_ma(self.read(REG00_INPUT_SOURCE)? & IINLIM_MASK))
    }

    /// Program the fast-charge safety timer. Zero disables it; otherwise the
    /// shortest period of at least `hours` is chosen.
    pub fn set_safety_timer(&self, hours: u8) -> Result<(), ChargerError> {
        if hours == 0 {
            return self.masked_write(REG05_TERM_TIMER, EN_TIMER_MASK, 0);
        }
        let index = safety_timer_index(hours).ok_or(RangeError {
            value: i32::from(hours),
            min: 0,
            max: i32::from(SAFETY_TIMER_MAX_HOURS),
        })?;
        self.masked_write(REG05_TERM_TIMER, CHG_TIMER_MASK, index << CHG_TIMER_SHIFT)?;
        self.masked_write(REG05_TERM_TIMER, EN_TIMER_MASK, EN_TIMER_MASK)
    }

    /// Program the I2C watchdog period.
    pub fn set_watchdog(&self, timeout: WatchdogTimeout) -> Result<(), ChargerError> {
        self.masked_write(
            REG05_TERM_TIMER,
            WATCHDOG_MASK,
            (timeout as u8) << WATCHDOG_SHIFT,
        )
    }

    /// Reset the I2C watchdog timer.
    pub fn kick_watchdog(&self) -> Result<(), ChargerError> {
        self.masked_write(REG01_POWER_ON_CONFIG, WD_RESET_MASK, WD_RESET_MASK)
    }

    /// Set the CHG_CONFIG field.
    pub fn set_charge_config(&self, config: ChargeConfig) -> Result<(), ChargerError> {
        self.masked_write(REG01_POWER_ON_CONFIG, CHG_CONFIG_MASK, config.bits())
    }

    /// Enter or leave high-impedance input mode.
    pub fn set_hiz(&self, hiz: bool) -> Result<(), ChargerError> {
        self.masked_write(REG00_INPUT_SOURCE, EN_HIZ_MASK, if hiz { EN_HIZ_MASK } else { 0 })
    }

    /// Allow or forbid the 2x safety-timer slowdown during DPM.
    pub fn set_timer_slowdown(&self, enabled: bool) -> Result<(), ChargerError> {
        self.masked_write(
            REG07_MISC_OPERATION,
            TMR2X_EN_MASK,
            if enabled { TMR2X_EN_MASK } else { 0 },
        )
    }

    /// Enable the CHRG_FAULT and BAT_FAULT interrupts.
    pub fn enable_fault_interrupts(&self) -> Result<(), ChargerError> {
        self.masked_write(REG07_MISC_OPERATION, INT_MASK_MASK, INT_MASK_MASK)
    }
}
