//! Reported-capacity smoothing and the low-battery shutdown guard.
//!
//! The host shuts down as soon as it sees 0 %, so a zero is only let
//! through when the battery really is empty: voltage below the shutdown
//! threshold, shutdown allowed, and (on the boot that started empty) a
//! 40 s observation window. Once 0 % has been reported it stays latched for
//! the life of the device context.

use embassy_time::{Duration, Instant};

/// Above this voltage a 0 % gauge reading is reported as 1 %, µV.
pub const SHUTDOWN_VOLTAGE_UV: i32 = 3_400_000;
/// At or below this voltage without a charger, five samples force 0 %, µV.
pub const CRITICAL_VOLTAGE_UV: i32 = 3_200_000;
/// Consecutive critical-voltage samples that force 0 %.
pub const CRITICAL_VOLTAGE_SAMPLES: u8 = 5;
/// Observation window before 0 % is reported on the boot that started empty.
pub const FIRST_BOOT_ZERO_WINDOW: Duration = Duration::from_secs(40);
/// Reported capacity while the battery is absent, %.
pub const ABSENT_BATTERY_CAPACITY: u8 = 50;

/// Inputs for one smoothing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacitySample {
    /// Gauge state of charge, %.
    pub raw_soc: u8,
    /// Battery detected.
    pub battery_present: bool,
    /// End of charge latched.
    pub batt_full: bool,
    /// Terminal voltage, µV.
    pub voltage_uv: i32,
    /// Charger attached.
    pub charger_present: bool,
    /// Shutdown at 0 % is allowed.
    pub shutdown_enabled: bool,
}

/// Soft coulomb counter opinion on a 0 % reading with a charger attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SoftCcGate {
    /// Counter disabled: treat 0 % as any other zero.
    Off,
    /// Not proven yet: hold 1 % and keep monitoring.
    Hold,
    /// Net discharge proven despite the charger: let 0 % through.
    Release,
}

/// Smoothing result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smoothed {
    /// Capacity to report, %.
    pub capacity: u8,
    /// The soft coulomb counter is holding 1 % and needs its monitor.
    pub soft_cc_pending: bool,
}

impl Smoothed {
    const fn report(capacity: u8) -> Self {
        Self {
            capacity,
            soft_cc_pending: false,
        }
    }
}

/// Smoothing state. One per device context.
#[derive(Debug, Clone)]
pub struct CapacitySmoother {
    zero_reported: bool,
    first_boot: bool,
    critical_count: u8,
    zero_window_start: Option<Instant>,
}

impl Default for CapacitySmoother {
    fn default() -> Self {
        Self::new()
    }
}

impl CapacitySmoother {
    /// Fresh state: nothing latched, first boot pending.
    pub const fn new() -> Self {
        Self {
            zero_reported: false,
            first_boot: true,
            critical_count: 0,
            zero_window_start: None,
        }
    }

    /// Whether 0 % has been latched.
    pub fn zero_reported(&self) -> bool {
        self.zero_reported
    }

    fn latch_zero(&mut self) -> Smoothed {
        info!("reporting 0 %, latched");
        self.zero_reported = true;
        self.first_boot = false;
        Smoothed::report(0)
    }

    /// Map a gauge reading to the capacity the host sees.
    pub fn smooth(&mut self, sample: &CapacitySample, now: Instant, soft_cc: SoftCcGate) -> Smoothed {
        if self.first_boot && sample.raw_soc > 0 {
            self.first_boot = false;
        }
        if self.zero_reported {
            return Smoothed::report(0);
        }
        if !sample.battery_present {
            return Smoothed::report(ABSENT_BATTERY_CAPACITY);
        }
        if sample.batt_full {
            return Smoothed::report(100);
        }

        let mut capacity = sample.raw_soc;
        if sample.voltage_uv <= CRITICAL_VOLTAGE_UV && !sample.charger_present {
            self.critical_count = self.critical_count.saturating_add(1);
            debug!("critical voltage {} uV, count {}", sample.voltage_uv, self.critical_count);
            if self.critical_count >= CRITICAL_VOLTAGE_SAMPLES {
                warn!("battery voltage critically low, forcing 0 %");
                capacity = 0;
                self.critical_count = 0;
            }
        } else {
            self.critical_count = 0;
        }

        if capacity != 0 {
            return Smoothed::report(capacity);
        }
        if !sample.shutdown_enabled || sample.voltage_uv > SHUTDOWN_VOLTAGE_UV {
            return Smoothed::report(1);
        }
        if sample.charger_present && soft_cc == SoftCcGate::Hold {
            return Smoothed {
                capacity: 1,
                soft_cc_pending: true,
            };
        }
        if !self.first_boot {
            return self.latch_zero();
        }
        let start = *self.zero_window_start.get_or_insert(now);
        if now.saturating_duration_since(start) >= FIRST_BOOT_ZERO_WINDOW {
            self.latch_zero()
        } else {
            Smoothed::report(1)
        }
    }
}

// ── Shutdown guard ───────────────────────────────────────────────────────────

/// Grace period after 0 % before forcing power off in normal mode.
pub const POWER_OFF_GRACE: Duration = Duration::from_secs(60);
/// Grace period after 0 % before forcing power off in off-mode charging.
pub const OFF_CHARGING_POWER_OFF_GRACE: Duration = Duration::from_secs(600);

/// Forces power off when the host ignores a 0 % report.
#[derive(Debug, Clone, Default)]
pub struct ShutdownGuard {
    zero_since: Option<Instant>,
}

impl ShutdownGuard {
    /// Fresh guard.
    pub const fn new() -> Self {
        Self { zero_since: None }
    }

    /// Observe the reported capacity. Returns true when power must be cut.
    ///
    /// With `enabled` false the guard never fires and forgets any pending
    /// zero.
    pub fn check(&mut self, reported: u8, now: Instant, enabled: bool, off_charging: bool) -> bool {
        if !enabled || reported != 0 {
            self.zero_since = None;
            return false;
        }
        let Some(since) = self.zero_since else {
            debug!("0 % reported, starting power-off grace");
            self.zero_since = Some(now);
            return false;
        };
        let grace = if off_charging {
            OFF_CHARGING_POWER_OFF_GRACE
        } else {
            POWER_OFF_GRACE
        };
        let elapsed = now.saturating_duration_since(since);
        if elapsed >= grace {
            error!("0 % ignored for {} s, powering off", elapsed.as_secs());
            true
        } else {
            false
        }
    }
}
