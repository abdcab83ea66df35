//! Charger device context.
//!
//! One [`Charger`] per physical IC. All methods take `&self`; state is
//! partitioned behind independent locks so the periodic tasks, the interrupt
//! path and host property calls can share one instance.
//!
//! Lock order, outermost first: irq, current-change, jeita, arbiter,
//! transport. Task-local state (end-of-charge detectors, capacity smoothing,
//! soft coulomb counter) sits behind its own lock and is never held while
//! taking another. No lock is held across a provider call or a reschedule.

mod diagnostics;
mod interrupts;
mod lifecycle;
mod power;
mod properties;
mod ticks;

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Duration;
use embedded_hal::i2c::I2c;
use platform::{BatteryMetrics, InterruptLine, PowerControl, SupplyNotifier, UsbSupply};

use crate::arbiter::{DisableArbiter, DisableMask, DisableReason};
use crate::capacity::{CapacitySmoother, ShutdownGuard};
use crate::config::ChargerConfig;
use crate::eoc::EocDetector;
use crate::error::ChargerError;
use crate::irq::IrqTable;
use crate::queries::Metrics;
#[cfg(feature = "soft-cc")]
use crate::soft_cc::SoftCoulombCounter;
use crate::task::TaskHandle;
use crate::thermal::{JeitaMachine, ThermalZone, WarmFullDetector};
use crate::transport::RegisterTransport;
use crate::variant::ChipVariant;

pub use diagnostics::{RegisterDump, REGISTER_COUNT};
pub use interrupts::EOC_AFTER_INSERT_DELAY;
pub use lifecycle::RESUME_HEARTBEAT_DELAY;
pub use ticks::{
    HEARTBEAT_LOW_PERIOD, HEARTBEAT_LOW_SOC, HEARTBEAT_PERIOD, MIN_HEARTBEAT_OVERRIDE_MS,
    NOT_RESUMED_RETRY, WATCHDOG_RETRY,
};

/// External services the engine talks to. Every one is optional.
#[derive(Clone, Copy, Default)]
pub struct Providers<'a> {
    /// Primary fuel gauge.
    pub battery: Option<&'a dyn BatteryMetrics>,
    /// Voltage-mode coulomb counter, diagnostics only.
    pub secondary: Option<&'a dyn BatteryMetrics>,
    /// USB power path.
    pub usb: Option<&'a dyn UsbSupply>,
    /// Property-changed sink.
    pub notifier: Option<&'a dyn SupplyNotifier>,
    /// Hard power-off hook.
    pub power: Option<&'a dyn PowerControl>,
    /// Charger interrupt line.
    pub irq_line: Option<&'a dyn InterruptLine>,
}

/// Input-current inputs, serialized by the current-change lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CurrentState {
    /// Negotiated USB current, mA.
    usb_ma: u16,
    /// Active thermal-mitigation level.
    thermal_level: usize,
}

struct IrqState {
    resume_completed: bool,
    irq_waiting: bool,
    table: IrqTable,
}

struct EocState {
    normal: EocDetector,
    warm: WarmFullDetector,
}

struct SocState {
    smoother: CapacitySmoother,
    guard: ShutdownGuard,
    fake_soc: Option<u8>,
    beats: u32,
    last_beat: Option<ticks::Beat>,
}

/// Periodic task handles.
pub(crate) struct Tasks<M: RawMutex> {
    pub(crate) thermal: TaskHandle<M>,
    pub(crate) eoc: TaskHandle<M>,
    pub(crate) heartbeat: TaskHandle<M>,
    #[cfg(feature = "soft-cc")]
    pub(crate) soft_cc: TaskHandle<M>,
}

impl<M: RawMutex> Tasks<M> {
    const fn new() -> Self {
        Self {
            thermal: TaskHandle::new("thermal"),
            eoc: TaskHandle::new("eoc"),
            heartbeat: TaskHandle::new("heartbeat"),
            #[cfg(feature = "soft-cc")]
            soft_cc: TaskHandle::new("soft-cc"),
        }
    }
}

/// Charge-state engine for one bq2419x/bq2429x.
pub struct Charger<'a, M: RawMutex, I> {
    transport: RegisterTransport<M, I>,
    variant: ChipVariant,
    config: ChargerConfig,
    providers: Providers<'a>,
    arbiter: DisableArbiter<M>,
    current: Mutex<M, Cell<CurrentState>>,
    jeita: Mutex<M, RefCell<JeitaMachine>>,
    irq: Mutex<M, RefCell<IrqState>>,
    eoc: Mutex<M, RefCell<EocState>>,
    soc: Mutex<M, RefCell<SocState>>,
    #[cfg(feature = "soft-cc")]
    soft_cc: Mutex<M, RefCell<SoftCoulombCounter>>,
    usb_present: AtomicBool,
    batt_present: AtomicBool,
    batt_full: AtomicBool,
    batt_warm_full: AtomicBool,
    heartbeat_ms: AtomicU32,
    shutdown_enabled: AtomicBool,
    tasks: Tasks<M>,
}

impl<'a, M: RawMutex, I: I2c> Charger<'a, M, I> {
    fn new(
        transport: RegisterTransport<M, I>,
        variant: ChipVariant,
        config: ChargerConfig,
        providers: Providers<'a>,
    ) -> Self {
        let normal = EocDetector::new(
            config.termination,
            config.termination_ma(),
            config.resume_delta(),
            config.max_error_tolerance_mv,
        );
        let warm = WarmFullDetector::new(config.warm_resume_delta(), config.max_error_tolerance_mv);
        Self {
            transport,
            variant,
            providers,
            arbiter: DisableArbiter::new(),
            current: Mutex::new(Cell::new(CurrentState::default())),
            jeita: Mutex::new(RefCell::new(JeitaMachine::new(config.thermal))),
            irq: Mutex::new(RefCell::new(IrqState {
                resume_completed: true,
                irq_waiting: false,
                table: IrqTable::new(variant),
            })),
            eoc: Mutex::new(RefCell::new(EocState { normal, warm })),
            soc: Mutex::new(RefCell::new(SocState {
                smoother: CapacitySmoother::new(),
                guard: ShutdownGuard::new(),
                fake_soc: None,
                beats: 0,
                last_beat: None,
            })),
            #[cfg(feature = "soft-cc")]
            soft_cc: Mutex::new(RefCell::new(SoftCoulombCounter::new())),
            usb_present: AtomicBool::new(false),
            batt_present: AtomicBool::new(true),
            batt_full: AtomicBool::new(false),
            batt_warm_full: AtomicBool::new(false),
            heartbeat_ms: AtomicU32::new(0),
            shutdown_enabled: AtomicBool::new(config.shutdown.enabled),
            config,
            tasks: Tasks::new(),
        }
    }

    /// Detected chip family.
    pub fn variant(&self) -> ChipVariant {
        self.variant
    }

    /// Configuration the device was attached with.
    pub fn config(&self) -> &ChargerConfig {
        &self.config
    }

    /// Register transport, for diagnostics and direct control operations.
    pub fn transport(&self) -> &RegisterTransport<M, I> {
        &self.transport
    }

    /// Metric view over the attached gauges.
    pub fn metrics(&self) -> Metrics<'a> {
        Metrics::new(self.providers.battery, self.providers.secondary)
    }

    /// Current disable mask.
    pub fn disable_mask(&self) -> DisableMask {
        self.arbiter.mask()
    }

    /// Assert or clear one disable reason and rewrite CHG_CONFIG.
    pub fn set_charging_disabled(
        &self,
        reason: DisableReason,
        disable: bool,
    ) -> Result<DisableMask, ChargerError> {
        self.arbiter.set_disabled(&self.transport, reason, disable)
    }

    /// Current thermal zone.
    pub fn zone(&self) -> ThermalZone {
        self.jeita.lock(|j| j.borrow().zone())
    }

    /// Charger attached, as last seen by the power-good handler.
    pub fn usb_present(&self) -> bool {
        self.usb_present.load(Ordering::Acquire)
    }

    /// Battery present, falling back to the last known state.
    pub fn battery_present(&self) -> bool {
        let present = self
            .metrics()
            .present(self.batt_present.load(Ordering::Acquire));
        self.batt_present.store(present, Ordering::Release);
        present
    }

    /// End of charge latched in the normal band.
    pub fn batt_full(&self) -> bool {
        self.batt_full.load(Ordering::Acquire)
    }

    /// End of charge latched in the warm band.
    pub fn batt_warm_full(&self) -> bool {
        self.batt_warm_full.load(Ordering::Acquire)
    }

    /// Active thermal-mitigation level.
    pub fn thermal_level(&self) -> usize {
        self.current.lock(|c| c.get().thermal_level)
    }

    /// Negotiated USB input current, mA.
    pub fn usb_current_ma(&self) -> u16 {
        self.current.lock(|c| c.get().usb_ma)
    }

    /// Whether resume has completed (ticks and interrupts run normally).
    pub fn resume_completed(&self) -> bool {
        self.irq.lock(|s| s.borrow().resume_completed)
    }

    /// Handle for the fuel-gauge driver and the heartbeat tunables.
    pub fn heartbeat_kick(&self) -> HeartbeatKick<'_, M> {
        HeartbeatKick {
            task: &self.tasks.heartbeat,
            period_ms: &self.heartbeat_ms,
            shutdown_enabled: &self.shutdown_enabled,
        }
    }

    fn notify(&self) {
        if let Some(notifier) = self.providers.notifier {
            notifier.changed();
        }
    }

    /// Apply a disable request from a periodic task; failures are logged and
    /// retried by the next tick that cares.
    fn request_disabled(&self, reason: DisableReason, disable: bool) {
        if let Err(e) = self.set_charging_disabled(reason, disable) {
            warn!("{} disable={} not applied: {}", reason.name(), disable, e.label());
        }
    }
}

/// Reaches a running [`Charger`] from outside its tasks.
///
/// The fuel-gauge driver calls [`gauge_updated`](Self::gauge_updated) after
/// each refresh so the heartbeat publishes fresh numbers immediately.
pub struct HeartbeatKick<'c, M: RawMutex> {
    task: &'c TaskHandle<M>,
    period_ms: &'c AtomicU32,
    shutdown_enabled: &'c AtomicBool,
}

impl<M: RawMutex> Clone for HeartbeatKick<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex> Copy for HeartbeatKick<'_, M> {}

impl<M: RawMutex> HeartbeatKick<'_, M> {
    /// Run the heartbeat now.
    pub fn gauge_updated(&self) {
        self.task.reschedule_now();
    }

    /// Override the heartbeat period. Values below
    /// [`MIN_HEARTBEAT_OVERRIDE_MS`] restore the capacity-based period.
    pub fn set_period_override_ms(&self, ms: u32) {
        self.period_ms.store(ms, Ordering::Release);
        self.task.reschedule_now();
    }

    /// Active override, if any.
    pub fn period_override(&self) -> Option<Duration> {
        let ms = self.period_ms.load(Ordering::Acquire);
        (ms >= MIN_HEARTBEAT_OVERRIDE_MS).then(|| Duration::from_millis(u64::from(ms)))
    }

    /// Allow or forbid the 0 % report and the forced power-off.
    pub fn set_shutdown_enabled(&self, enabled: bool) {
        info!("shutdown at 0 % {}", if enabled { "enabled" } else { "disabled" });
        self.shutdown_enabled.store(enabled, Ordering::Release);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use platform::mocks::{
        MockBattery, MockIrqLine, MockNotifier, MockPowerControl, MockRegisterBus, MockUsbSupply,
    };

    use super::{Charger, Providers};
    use crate::config::ChargerConfig;
    use crate::registers::{DEFAULT_I2C_ADDR, REG0A_VENDOR};

    /// bq24190 part number with DEV_REG 0b11.
    pub(crate) const VENDOR_BQ24190: u8 = 0b0010_0011;

    pub(crate) struct Fixture {
        pub(crate) bus: MockRegisterBus,
        pub(crate) battery: MockBattery,
        pub(crate) usb: MockUsbSupply,
        pub(crate) notifier: MockNotifier,
        pub(crate) power: MockPowerControl,
        pub(crate) irq_line: MockIrqLine,
        pub(crate) config: ChargerConfig,
    }

    pub(crate) fn fixture() -> Fixture {
        let bus = MockRegisterBus::new();
        bus.set_reg(REG0A_VENDOR, VENDOR_BQ24190);
        Fixture {
            bus,
            battery: MockBattery::default(),
            usb: MockUsbSupply::default(),
            notifier: MockNotifier::default(),
            power: MockPowerControl::default(),
            irq_line: MockIrqLine::default(),
            config: ChargerConfig::default(),
        }
    }

    impl Fixture {
        pub(crate) fn providers(&self) -> Providers<'_> {
            Providers {
                battery: Some(&self.battery),
                secondary: None,
                usb: Some(&self.usb),
                notifier: Some(&self.notifier),
                power: Some(&self.power),
                irq_line: Some(&self.irq_line),
            }
        }

        pub(crate) fn attach(&self) -> Charger<'_, NoopRawMutex, MockRegisterBus> {
            Charger::attach(
                self.bus.clone(),
                DEFAULT_I2C_ADDR,
                self.config.clone(),
                self.providers(),
            )
            .unwrap()
        }
    }
}
