//! Attach, hardware init, suspend and resume.

use embassy_futures::join::join4;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;
use embedded_hal::i2c::I2c;

use super::{Charger, Providers};
use crate::arbiter::DisableReason;
use crate::config::ChargerConfig;
use crate::control::{ChargeConfig, WatchdogTimeout};
use crate::error::ChargerError;
use crate::registers::REG0A_VENDOR;
use crate::transport::RegisterTransport;
use crate::variant::ChipVariant;

/// Heartbeat delay after resume, giving the gauge time to settle.
pub const RESUME_HEARTBEAT_DELAY: Duration = Duration::from_secs(5);

impl<'a, M: RawMutex, I: I2c> Charger<'a, M, I> {
    /// Probe the charger at `address`, program it from `config` and arm the
    /// periodic tasks. [`run`](Self::run) must be polled for them to fire.
    pub fn attach(
        bus: I,
        address: u8,
        config: ChargerConfig,
        providers: Providers<'a>,
    ) -> Result<Self, ChargerError> {
        config.validate()?;
        let transport = RegisterTransport::new(bus, address);
        let vendor = transport.read(REG0A_VENDOR).map_err(|e| {
            error!("vendor register unreadable: {}", e.label());
            ChargerError::DeviceAbsent
        })?;
        let variant = ChipVariant::from_vendor(vendor);
        info!("{} at address {}, vendor {}", variant.name(), address, vendor);

        let charger = Self::new(transport, variant, config, providers);
        charger.hw_init()?;
        charger.handle_interrupt();

        charger.tasks.heartbeat.reschedule_now();
        charger.tasks.eoc.reschedule_now();
        charger.tasks.thermal.reschedule_now();
        Ok(charger)
    }

    fn hw_init(&self) -> Result<(), ChargerError> {
        let t = &self.transport;
        let cfg = &self.config;

        t.set_watchdog(WatchdogTimeout::Secs160)?;
        t.set_hiz(false)?;
        self.apply_charge_current()?;
        t.set_timer_slowdown(false)?;
        if let Some(mv) = cfg.max_input_voltage_mv {
            t.set_input_voltage_limit(mv)?;
        }
        t.set_charge_config(ChargeConfig::Charge)?;
        if let Some(mv) = cfg.float_voltage_mv {
            t.set_float_voltage(mv)?;
        }
        if cfg.hw_termination_disabled {
            t.set_hardware_termination(false, self.variant)?;
        } else {
            t.set_termination_current(cfg.termination_ma(), self.variant)?;
        }
        if let Some(hours) = cfg.charging_timeout_hours {
            t.set_safety_timer(hours)?;
        }
        if let Some(mv) = cfg.resume_delta_mv {
            t.set_recharge_threshold(mv)?;
        }
        if self.providers.irq_line.is_some() {
            t.enable_fault_interrupts()?;
        }
        self.set_charging_disabled(DisableReason::User, cfg.charging_disabled)?;

        let present = self.battery_present();
        debug!("hw init done, battery present={}", present);
        Ok(())
    }

    /// Stop the watchdog and the periodic tasks before system sleep.
    ///
    /// Waits for a tick in progress to return; no tick runs afterwards until
    /// [`resume`](Self::resume).
    pub async fn suspend(&self) {
        if let Err(e) = self.transport.set_watchdog(WatchdogTimeout::Disabled) {
            warn!("watchdog not disabled for suspend: {}", e.label());
        }
        self.irq.lock(|s| s.borrow_mut().resume_completed = false);
        #[cfg(feature = "soft-cc")]
        let soft_cc = self.tasks.soft_cc.cancel_and_join();
        #[cfg(not(feature = "soft-cc"))]
        let soft_cc = core::future::ready(());
        join4(
            self.tasks.thermal.cancel_and_join(),
            self.tasks.eoc.cancel_and_join(),
            self.tasks.heartbeat.cancel_and_join(),
            soft_cc,
        )
        .await;
        info!("suspended");
    }

    /// Last check before the interrupt controller sleeps: refuse while an
    /// interrupt is waiting for resume.
    pub fn suspend_noirq(&self) -> Result<(), ChargerError> {
        if self.irq.lock(|s| s.borrow().irq_waiting) {
            info!("interrupt pending, aborting suspend");
            return Err(ChargerError::Busy);
        }
        Ok(())
    }

    /// Leave system sleep: replay a deferred interrupt, re-arm the watchdog
    /// and the periodic tasks.
    pub fn resume(&self) {
        self.soc.lock(|s| s.borrow_mut().fake_soc = None);
        let waiting = self.irq.lock(|s| {
            let mut s = s.borrow_mut();
            s.resume_completed = true;
            core::mem::take(&mut s.irq_waiting)
        });
        if waiting {
            debug!("replaying interrupt deferred during suspend");
            self.handle_interrupt();
            if let Some(line) = self.providers.irq_line {
                line.unmask();
            }
        }

        if let Err(e) = self
            .transport
            .kick_watchdog()
            .and_then(|()| self.transport.set_watchdog(WatchdogTimeout::Secs160))
        {
            warn!("watchdog not restored on resume: {}", e.label());
        }

        self.tasks.heartbeat.reschedule(RESUME_HEARTBEAT_DELAY);
        self.tasks.eoc.reschedule_now();
        self.tasks.thermal.reschedule_now();
        self.notify();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::device::tests::fixture;
    use crate::registers::{
        CHG_CONFIG_CHARGE, CHG_CONFIG_MASK, EN_TERM_MASK, PG_STAT_MASK, REG01_POWER_ON_CONFIG,
        REG05_TERM_TIMER, REG08_SYSTEM_STATUS, WATCHDOG_MASK,
    };

    #[test]
    fn attach_programs_charger() {
        let f = fixture();
        let c = f.attach();
        assert_eq!(c.variant(), ChipVariant::Bq2419x);
        assert_eq!(
            f.bus.reg(REG01_POWER_ON_CONFIG) & CHG_CONFIG_MASK,
            CHG_CONFIG_CHARGE
        );
        assert_eq!(c.transport().float_voltage().unwrap(), 4352);
        assert_eq!(c.transport().fast_charge_current().unwrap(), 2048);
        assert_eq!(f.bus.reg(REG05_TERM_TIMER) & WATCHDOG_MASK, WATCHDOG_MASK);
        assert_ne!(f.bus.reg(REG05_TERM_TIMER) & EN_TERM_MASK, 0);
        assert!(c.tasks.heartbeat.is_armed());
        assert!(c.tasks.eoc.is_armed());
        assert!(c.tasks.thermal.is_armed());
    }

    #[test]
    fn attach_without_vendor_register_fails() {
        let f = fixture();
        f.bus.fail_register(REG0A_VENDOR, true);
        let r = Charger::<embassy_sync::blocking_mutex::raw::NoopRawMutex, _>::attach(
            f.bus.clone(),
            0x6B,
            ChargerConfig::default(),
            f.providers(),
        );
        assert!(matches!(r, Err(ChargerError::DeviceAbsent)));
    }

    #[test]
    fn attach_rejects_bad_config_before_bus_traffic() {
        let f = fixture();
        let mut config = ChargerConfig::default();
        config.charging_timeout_hours = Some(30);
        let r = Charger::<embassy_sync::blocking_mutex::raw::NoopRawMutex, _>::attach(
            f.bus.clone(),
            0x6B,
            config,
            f.providers(),
        );
        assert!(matches!(r, Err(ChargerError::InvalidConfig(_))));
        assert_eq!(f.bus.transaction_count(), 0);
    }

    #[test]
    fn attach_honours_user_disable() {
        let mut f = fixture();
        f.config.charging_disabled = true;
        let c = f.attach();
        assert!(c.disable_mask().contains(DisableReason::User));
        assert_eq!(f.bus.reg(REG01_POWER_ON_CONFIG) & CHG_CONFIG_MASK, 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn suspend_stops_watchdog_and_ticks() {
        let f = fixture();
        let c = f.attach();
        c.suspend().await;
        assert_eq!(f.bus.reg(REG05_TERM_TIMER) & WATCHDOG_MASK, 0);
        assert!(!c.resume_completed());
        assert!(!c.tasks.heartbeat.is_armed());
        assert!(c.suspend_noirq().is_ok());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn interrupt_during_suspend_is_replayed_on_resume() {
        let f = fixture();
        let c = f.attach();
        c.suspend().await;

        f.bus.set_reg(REG08_SYSTEM_STATUS, PG_STAT_MASK);
        c.handle_interrupt();
        assert!(f.irq_line.is_masked());
        assert!(!c.usb_present());
        assert_eq!(c.suspend_noirq(), Err(ChargerError::Busy));

        f.notifier.reset();
        c.resume();
        assert!(c.usb_present());
        assert!(!f.irq_line.is_masked());
        assert_eq!(f.irq_line.unmask_count(), 1);
        assert_eq!(f.bus.reg(REG05_TERM_TIMER) & WATCHDOG_MASK, WATCHDOG_MASK);
        assert!(c.tasks.heartbeat.is_armed());
        assert!(f.notifier.count() >= 1);
        assert!(c.suspend_noirq().is_ok());
    }

    #[test]
    fn resume_clears_fake_capacity() {
        let f = fixture();
        let c = f.attach();
        c.soc.lock(|s| s.borrow_mut().fake_soc = Some(3));
        c.resume();
        assert_eq!(c.reported_capacity(), 50);
    }
}
