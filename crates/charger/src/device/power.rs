//! Input current, charge current and float voltage application.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::I2c;

use super::{Charger, CurrentState};
use crate::arbiter::DisableReason;
use crate::error::{ChargerError, RangeError};
use crate::quantize::{FAST_CHARGE_CURRENT_MA, INPUT_CURRENT_FLOOR_MA};
use crate::thermal::ThermalZone;

/// Requests at or below this are treated as "unconfigured", mA.
const UNCONFIGURED_INPUT_MA: u16 = 2;

impl<'a, M: RawMutex, I: I2c> Charger<'a, M, I> {
    /// Recompute and program the input current limit from the negotiated
    /// USB current, the thermal-mitigation level and the configured ceiling.
    ///
    /// Returns the applied limit, or `None` when skipped because the battery
    /// is absent.
    pub fn apply_input_current(&self) -> Result<Option<u16>, ChargerError> {
        let battery_present = self.battery_present();
        self.current
            .lock(|cell| self.apply_input_current_with(cell.get(), battery_present))
    }

    fn apply_input_current_with(
        &self,
        state: CurrentState,
        battery_present: bool,
    ) -> Result<Option<u16>, ChargerError> {
        if !battery_present {
            debug!("battery absent, input current left alone");
            return Ok(None);
        }
        let levels = self.config.thermal_levels();
        let mut ma = state.usb_ma;
        if state.thermal_level > 0 && state.thermal_level < levels.saturating_sub(1) {
            if let Some(&limit) = self.config.thermal_mitigation_ma.get(state.thermal_level) {
                ma = ma.min(limit);
            }
        }
        if let Some(max) = self.config.max_usb_current_ma {
            ma = ma.min(max);
        }
        if ma <= UNCONFIGURED_INPUT_MA {
            ma = INPUT_CURRENT_FLOOR_MA;
        }
        let applied = self.transport.set_input_current_limit(ma)?;
        info!(
            "input limit {} mA (usb {} mA, level {})",
            applied, state.usb_ma, state.thermal_level
        );
        Ok(Some(applied))
    }

    /// Select a thermal-mitigation level.
    ///
    /// Levels above the table clamp to the top level, which stops charging;
    /// leaving the top level lets charging resume.
    pub fn set_thermal_level(&self, level: i32) -> Result<(), ChargerError> {
        let levels = self.config.thermal_levels();
        if levels == 0 {
            return Err(ChargerError::NotSupported("thermal mitigation"));
        }
        let top = levels.saturating_sub(1);
        let Ok(requested) = usize::try_from(level) else {
            return Err(RangeError {
                value: level,
                min: 0,
                max: i32::try_from(top).unwrap_or(i32::MAX),
            }
            .into());
        };
        let level = requested.min(top);
        let battery_present = self.battery_present();

        self.current.lock(|cell| {
            let mut state = cell.get();
            if state.thermal_level == level {
                return Ok(());
            }
            let previous = state.thermal_level;
            state.thermal_level = level;
            cell.set(state);
            info!("thermal level {} -> {} of {}", previous, level, levels);

            if level == top {
                self.arbiter
                    .set_disabled(&self.transport, DisableReason::Thermal, true)?;
                return Ok(());
            }
            self.apply_input_current_with(state, battery_present)?;
            if previous == top {
                self.arbiter
                    .set_disabled(&self.transport, DisableReason::Thermal, false)?;
            }
            Ok(())
        })
    }

    /// Program a fast-charge current request, limited by the configured
    /// ceiling and the thermal band, clamped into the settable range and
    /// quantized down. Returns the applied current.
    pub fn set_charge_current(&self, request_ma: u16) -> Result<u16, ChargerError> {
        let zone = self.zone();
        let thermal = &self.config.thermal;
        let mut ma = request_ma;
        if let Some(max) = self.config.max_battery_current_ma {
            ma = ma.min(max);
        }
        match zone {
            ThermalZone::Cool => ma = ma.min(thermal.cool_charge_ma),
            ThermalZone::Warm => ma = ma.min(thermal.warm_charge_ma),
            ThermalZone::Normal | ThermalZone::Hot => {}
        }
        let ma = FAST_CHARGE_CURRENT_MA.clamp(ma);
        let applied = FAST_CHARGE_CURRENT_MA.decode(FAST_CHARGE_CURRENT_MA.encode(ma)?)?;
        self.current
            .lock(|_| self.transport.set_fast_charge_current(applied))?;
        info!("charge current {} mA ({} requested, {})", applied, request_ma, zone.name());
        Ok(applied)
    }

    /// Reprogram the fast-charge current for the current thermal band.
    pub(super) fn apply_charge_current(&self) -> Result<Option<u16>, ChargerError> {
        let request = match (self.config.max_battery_current_ma, self.zone()) {
            (Some(max), _) => max,
            (None, ThermalZone::Cool | ThermalZone::Warm) => FAST_CHARGE_CURRENT_MA.max,
            (None, ThermalZone::Normal | ThermalZone::Hot) => return Ok(None),
        };
        self.set_charge_current(request).map(Some)
    }

    /// Program float voltage and recharge threshold for `zone`.
    pub(super) fn apply_float_voltage(&self, zone: ThermalZone) -> Result<(), ChargerError> {
        let thermal = &self.config.thermal;
        let (float_mv, resume_mv) = match zone {
            ThermalZone::Warm => (Some(thermal.warm_float_mv), self.config.warm_resume_delta_mv),
            ThermalZone::Cool => (Some(thermal.cool_float_mv), self.config.resume_delta_mv),
            ThermalZone::Normal | ThermalZone::Hot => {
                (self.config.float_voltage_mv, self.config.resume_delta_mv)
            }
        };
        self.current.lock(|_| {
            if let Some(mv) = float_mv {
                self.transport.set_float_voltage(mv)?;
            }
            if let Some(mv) = resume_mv {
                self.transport.set_recharge_threshold(mv)?;
            }
            Ok::<(), ChargerError>(())
        })?;
        debug!("float {} mV for {}", float_mv.unwrap_or(0), zone.name());
        Ok(())
    }

    /// The USB power path changed: pick up the negotiated current and
    /// reconcile the published online state.
    pub fn external_power_changed(&self) {
        let Some(usb) = self.providers.usb else {
            return;
        };
        let ma = match usb.current_max_ua() {
            Ok(ua) => u16::try_from(ua.max(0) / 1000).unwrap_or(u16::MAX),
            Err(e) => {
                debug!("usb current_max {}", e.as_str());
                0
            }
        };
        let battery_present = self.battery_present();
        self.current.lock(|cell| {
            let mut state = cell.get();
            if state.usb_ma == ma {
                return;
            }
            state.usb_ma = ma;
            cell.set(state);
            if let Err(e) = self.apply_input_current_with(state, battery_present) {
                warn!("input limit for {} mA not applied: {}", ma, e.label());
            }
        });

        let online = self.usb_present() && ma != 0;
        if usb.online().ok() != Some(online) {
            info!("usb online -> {}", online);
            usb.set_online(online);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::device::tests::fixture;
    use crate::registers::{
        CHG_CONFIG_MASK, IINLIM_MASK, PG_STAT_MASK, REG00_INPUT_SOURCE, REG01_POWER_ON_CONFIG,
        REG08_SYSTEM_STATUS,
    };

    #[test]
    fn usb_request_picks_table_entry_under_ceiling() {
        let f = fixture();
        f.bus.set_reg(REG08_SYSTEM_STATUS, PG_STAT_MASK);
        let c = f.attach();
        f.usb.current_max_ua.set(1_600_000);
        c.external_power_changed();
        assert_eq!(c.usb_current_ma(), 1600);
        assert_eq!(c.transport().input_current_limit().unwrap(), 1500);
        assert!(f.usb.online.get());
    }

    #[test]
    fn tiny_request_means_100ma() {
        let f = fixture();
        let c = f.attach();
        f.usb.current_max_ua.set(2_000);
        c.external_power_changed();
        assert_eq!(f.bus.reg(REG00_INPUT_SOURCE) & IINLIM_MASK, 0);
        assert!(!f.usb.online.get());
    }

    #[test]
    fn unchanged_usb_current_is_not_rewritten() {
        let f = fixture();
        let c = f.attach();
        f.usb.current_max_ua.set(900_000);
        c.external_power_changed();
        f.bus.clear_log();
        c.external_power_changed();
        assert!(f.bus.writes_to(REG00_INPUT_SOURCE).is_empty());
    }

    #[test]
    fn absent_battery_skips_input_limit() {
        let f = fixture();
        let c = f.attach();
        f.battery.present.set(false);
        assert_eq!(c.apply_input_current().unwrap(), None);
    }

    #[test]
    fn charge_current_clamped_to_ceiling() {
        let f = fixture();
        let c = f.attach();
        assert_eq!(c.set_charge_current(2560).unwrap(), 2048);
        assert_eq!(c.transport().fast_charge_current().unwrap(), 2048);
        assert_eq!(c.set_charge_current(100).unwrap(), 512);
        assert_eq!(c.set_charge_current(1000).unwrap(), 960);
    }

    #[test]
    fn thermal_level_without_table_is_unsupported() {
        let f = fixture();
        let c = f.attach();
        assert_eq!(
            c.set_thermal_level(1),
            Err(ChargerError::NotSupported("thermal mitigation"))
        );
    }

    #[test]
    fn thermal_levels_limit_then_stop_charging() {
        let mut f = fixture();
        f.config.thermal_mitigation_ma = heapless::Vec::from_slice(&[1500, 900, 500, 0]).unwrap();
        let c = f.attach();
        f.usb.current_max_ua.set(1_500_000);
        c.external_power_changed();

        c.set_thermal_level(1).unwrap();
        assert_eq!(c.transport().input_current_limit().unwrap(), 900);

        assert!(matches!(c.set_thermal_level(-1), Err(ChargerError::Range(_))));

        c.set_thermal_level(10).unwrap();
        assert_eq!(c.thermal_level(), 3);
        assert!(c.disable_mask().contains(DisableReason::Thermal));
        assert_eq!(f.bus.reg(REG01_POWER_ON_CONFIG) & CHG_CONFIG_MASK, 0);

        c.set_thermal_level(0).unwrap();
        assert!(!c.disable_mask().contains(DisableReason::Thermal));
        assert_eq!(c.transport().input_current_limit().unwrap(), 1500);
    }
}
