//! Periodic task bodies.
//!
//! Each tick returns the delay until its next run. Errors never stop a
//! task: they are logged and the next tick tries again.

use core::sync::atomic::Ordering;

use embassy_futures::join::join4;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant};
use embedded_hal::i2c::I2c;

use super::Charger;
use crate::arbiter::DisableReason;
use crate::capacity::{CapacitySample, SoftCcGate};
use crate::eoc::{eoc_period, EocAction, EocSample};
use crate::queries::{BatteryHealth, ChargeType, SupplyStatus};
#[cfg(feature = "soft-cc")]
use crate::soft_cc::{SoftCcSample, SOFT_CC_PERIOD};
use crate::task::run_periodic;
use crate::thermal::{
    ThermalZone, WarmAction, WarmSample, ZoneChange, THERMAL_OTG_PERIOD, THERMAL_PERIOD,
};

/// Retry delay for ticks that run before resume completes.
pub const NOT_RESUMED_RETRY: Duration = Duration::from_secs(5);
/// Retry delay after a failed watchdog kick.
pub const WATCHDOG_RETRY: Duration = Duration::from_secs(5);
/// Heartbeat period.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(60);
/// Heartbeat period at or below [`HEARTBEAT_LOW_SOC`].
pub const HEARTBEAT_LOW_PERIOD: Duration = Duration::from_secs(20);
/// Capacity at or below which the heartbeat speeds up, %.
pub const HEARTBEAT_LOW_SOC: u8 = 20;
/// Smallest heartbeat override honoured, ms.
pub const MIN_HEARTBEAT_OVERRIDE_MS: u32 = 500;
/// The heartbeat summary is logged at least every this many beats.
const BEAT_LOG_INTERVAL: u32 = 5;

/// Heartbeat snapshot, compared beat to beat to decide whether to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Beat {
    temp: i16,
    voltage_mv: i32,
    capacity: u8,
    status: SupplyStatus,
    charge_type: ChargeType,
    present: bool,
    current_ma: i32,
    health: BatteryHealth,
}

impl<'a, M: RawMutex, I: I2c> Charger<'a, M, I> {
    /// Drive every periodic task. Spawn once; never returns.
    pub async fn run(&self) -> ! {
        let thermal = run_periodic(&self.tasks.thermal, || self.thermal_tick());
        let eoc = run_periodic(&self.tasks.eoc, || self.eoc_tick());
        let heartbeat = run_periodic(&self.tasks.heartbeat, || self.heartbeat_tick());
        #[cfg(feature = "soft-cc")]
        let soft_cc = run_periodic(&self.tasks.soft_cc, || self.soft_cc_tick());
        #[cfg(not(feature = "soft-cc"))]
        let soft_cc = core::future::pending::<()>();
        let (never, ..) = join4(thermal, eoc, heartbeat, soft_cc).await;
        never
    }

    // ── Thermal ──────────────────────────────────────────────────────────────

    /// One JEITA step. Skipped while OTG boost is active: charge monitoring
    /// and boost share CHG_CONFIG.
    pub fn thermal_tick(&self) -> Option<Duration> {
        if !self.resume_completed() {
            return Some(THERMAL_PERIOD);
        }
        if self.transport.otg_enabled().unwrap_or(false) {
            return Some(THERMAL_OTG_PERIOD);
        }
        let temp = self.metrics().temperature_decidegc();
        let change = self.jeita.lock(|j| j.borrow_mut().step(temp));
        if let Some(change) = change {
            self.apply_zone_change(change);
        }
        Some(THERMAL_PERIOD)
    }

    /// A warm-band change drops both full latches and resets both detectors,
    /// so `batt_full` never outlives the Current hold it implies.
    fn apply_zone_change(&self, change: ZoneChange) {
        if change.warm_changed() {
            if let Err(e) = self.apply_input_current() {
                warn!("input current not reapplied: {}", e.label());
            }
            if let Err(e) = self.apply_charge_current() {
                warn!("charge current not reapplied: {}", e.label());
            }
            if let Err(e) = self.apply_float_voltage(change.to) {
                warn!("float voltage not reapplied: {}", e.label());
            }
            self.batt_warm_full.store(false, Ordering::Release);
            self.batt_full.store(false, Ordering::Release);
            self.eoc.lock(|s| {
                let mut s = s.borrow_mut();
                s.warm.reset();
                s.normal.reset();
            });
            self.request_disabled(DisableReason::Current, false);
        }
        self.request_disabled(DisableReason::Temperature, change.to.blocks_charging());
        self.notify();
    }

    // ── End of charge ────────────────────────────────────────────────────────

    /// One end-of-charge step.
    pub fn eoc_tick(&self) -> Option<Duration> {
        if !self.resume_completed() {
            return Some(NOT_RESUMED_RETRY);
        }
        let metrics = self.metrics();
        let soc = metrics.capacity_percent();
        let charger = self.transport.charger_present().unwrap_or(false);
        if !charger {
            self.eoc.lock(|s| {
                let mut s = s.borrow_mut();
                s.normal.reset();
                s.warm.reset();
            });
            return Some(eoc_period(soc, false));
        }

        let float_mv = self
            .transport
            .float_voltage()
            .unwrap_or_else(|_| self.config.normal_float_mv());
        let float_mv = i32::from(float_mv);
        let status = self.transport.charging_status();
        let vbat_mv = metrics.voltage_mv();

        if self.zone() == ThermalZone::Warm {
            let sample = WarmSample {
                soc,
                vbat_mv,
                float_mv,
                status,
            };
            let warm_full = self.batt_warm_full();
            match self.eoc.lock(|s| s.borrow_mut().warm.step(&sample, warm_full)) {
                WarmAction::Latch => self.set_full(&self.batt_warm_full, true),
                WarmAction::Resume => self.set_full(&self.batt_warm_full, false),
                WarmAction::None => {}
            }
        } else {
            let sample = EocSample {
                soc,
                vbat_mv,
                current_ma: metrics.current_ma(),
                float_mv,
                status,
                gauge_flags: metrics.flags(),
            };
            let batt_full = self.batt_full();
            match self.eoc.lock(|s| s.borrow_mut().normal.step(&sample, batt_full)) {
                EocAction::Full => self.set_full(&self.batt_full, true),
                EocAction::Recharge => self.set_full(&self.batt_full, false),
                EocAction::None => {}
            }
        }
        Some(eoc_period(soc, true))
    }

    fn set_full(&self, flag: &core::sync::atomic::AtomicBool, full: bool) {
        flag.store(full, Ordering::Release);
        self.request_disabled(DisableReason::Current, full);
        self.notify();
    }

    // ── Heartbeat ────────────────────────────────────────────────────────────

    /// One heartbeat: kick the watchdog, publish, guard against an ignored
    /// 0 %.
    pub fn heartbeat_tick(&self) -> Option<Duration> {
        if !self.resume_completed() {
            return Some(NOT_RESUMED_RETRY);
        }
        if self.transport.kick_watchdog().is_err() {
            warn!("watchdog kick failed");
            return Some(WATCHDOG_RETRY);
        }

        let metrics = self.metrics();
        let status = self.transport.charging_status();
        let capacity = self.reported_capacity();
        let beat = Beat {
            temp: metrics.temperature_decidegc(),
            voltage_mv: metrics.voltage_mv(),
            capacity,
            status: SupplyStatus::derive(
                status,
                self.usb_present(),
                metrics.capacity_percent(),
                self.batt_full(),
            ),
            charge_type: ChargeType::from_status(status),
            present: self.battery_present(),
            current_ma: metrics.current_ma(),
            health: BatteryHealth::from_zone(self.zone()),
        };

        let override_period = self.heartbeat_kick().period_override();
        let (log, beats) = self.soc.lock(|s| {
            let mut s = s.borrow_mut();
            s.beats = s.beats.wrapping_add(1);
            let changed = s.last_beat != Some(beat);
            s.last_beat = Some(beat);
            let periodic = s.beats.checked_rem(BEAT_LOG_INTERVAL) == Some(0);
            (override_period.is_some() || changed || periodic, s.beats)
        });
        if log {
            info!(
                "beat {}: temp={} vbat={} mV soc={} status={} type={} present={} ibat={} mA health={}",
                beats,
                beat.temp,
                beat.voltage_mv,
                beat.capacity,
                beat.status.name(),
                beat.charge_type.name(),
                beat.present,
                beat.current_ma,
                beat.health.name()
            );
        }

        self.force_power_off_check(capacity);
        self.notify();

        Some(match override_period {
            Some(period) => period,
            None if capacity <= HEARTBEAT_LOW_SOC => HEARTBEAT_LOW_PERIOD,
            None => HEARTBEAT_PERIOD,
        })
    }

    fn force_power_off_check(&self, capacity: u8) {
        let enabled = self.shutdown_enabled.load(Ordering::Acquire);
        let off_charging = self.config.shutdown.off_charging;
        let now = Instant::now();
        let fire = self
            .soc
            .lock(|s| s.borrow_mut().guard.check(capacity, now, enabled, off_charging));
        if fire {
            match self.providers.power {
                Some(power) => power.power_off(),
                None => error!("power off requested but no power control attached"),
            }
        }
    }

    // ── Capacity ─────────────────────────────────────────────────────────────

    /// Capacity the host sees, %: the test override when set, otherwise the
    /// smoothed gauge reading.
    pub fn reported_capacity(&self) -> u8 {
        if let Some(fake) = self.soc.lock(|s| s.borrow().fake_soc) {
            return fake;
        }
        let metrics = self.metrics();
        let sample = CapacitySample {
            raw_soc: metrics.capacity_percent(),
            battery_present: self.battery_present(),
            batt_full: self.batt_full(),
            voltage_uv: metrics.voltage_uv(),
            charger_present: self.usb_present(),
            shutdown_enabled: self.shutdown_enabled.load(Ordering::Acquire),
        };
        let gate = self.soft_cc_gate();
        let now = Instant::now();
        let smoothed = self.soc.lock(|s| s.borrow_mut().smoother.smooth(&sample, now, gate));
        #[cfg(feature = "soft-cc")]
        if smoothed.soft_cc_pending {
            self.launch_soft_cc();
        }
        smoothed.capacity
    }

    #[cfg(feature = "soft-cc")]
    fn soft_cc_gate(&self) -> SoftCcGate {
        if !self.config.soft_coulomb_counter {
            return SoftCcGate::Off;
        }
        if self.soft_cc.lock(|c| c.borrow().discharge_proven()) {
            SoftCcGate::Release
        } else {
            SoftCcGate::Hold
        }
    }

    #[cfg(not(feature = "soft-cc"))]
    fn soft_cc_gate(&self) -> SoftCcGate {
        SoftCcGate::Off
    }

    // ── Soft coulomb counter ─────────────────────────────────────────────────

    #[cfg(feature = "soft-cc")]
    fn launch_soft_cc(&self) {
        if self.soft_cc.lock(|c| c.borrow_mut().launch()) {
            self.tasks.soft_cc.reschedule_now();
        }
    }

    /// One soft coulomb counter sample.
    #[cfg(feature = "soft-cc")]
    pub fn soft_cc_tick(&self) -> Option<Duration> {
        if !self.resume_completed() {
            return Some(SOFT_CC_PERIOD);
        }
        let metrics = self.metrics();
        let sample = SoftCcSample {
            current_ma: metrics.current_ma(),
            voltage_uv: metrics.voltage_uv(),
            raw_soc: metrics.capacity_percent(),
            charger_present: self.usb_present(),
        };
        let again = self.soft_cc.lock(|c| c.borrow_mut().monitor(&sample));
        again.then_some(SOFT_CC_PERIOD)
    }
}
