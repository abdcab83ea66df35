//! Soft coulomb counter.
//!
//! When the gauge reads 0 % while a charger is attached, the charger may or
//! may not be keeping up with the load. The counter samples battery current
//! once a second into a ring; once the ring is full and the running sum is
//! positive (net discharge, since charge current is negative) the 0 % is
//! believed.

use embassy_time::Duration;
use heapless::Deque;

/// Ring length, samples.
pub const SOFT_CC_SAMPLES: usize = 60;
/// Monitor period.
pub const SOFT_CC_PERIOD: Duration = Duration::from_secs(1);
/// Monitoring stops above this voltage, µV.
pub const SOFT_CC_MAX_VOLTAGE_UV: i32 = 3_600_000;
/// Monitoring stops above this state of charge, %.
pub const SOFT_CC_MAX_SOC: u8 = 2;

/// Fixed-size ring of current samples with a running sum.
#[derive(Debug, Clone)]
pub struct SoftCoulombCounter<const N: usize = SOFT_CC_SAMPLES> {
    samples: Deque<i32, N>,
    total: i32,
    launched: bool,
}

impl<const N: usize> Default for SoftCoulombCounter<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// One monitor observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftCcSample {
    /// Battery current, mA (negative while charging).
    pub current_ma: i32,
    /// Terminal voltage, µV.
    pub voltage_uv: i32,
    /// Gauge state of charge, %.
    pub raw_soc: u8,
    /// Charger attached.
    pub charger_present: bool,
}

impl<const N: usize> SoftCoulombCounter<N> {
    /// Empty ring, monitor not launched.
    pub const fn new() -> Self {
        Self {
            samples: Deque::new(),
            total: 0,
            launched: false,
        }
    }

    /// Append a sample, evicting the oldest once full. O(1).
    pub fn append(&mut self, current_ma: i32) {
        if self.samples.is_full() {
            if let Some(oldest) = self.samples.pop_front() {
                self.total = self.total.saturating_sub(oldest);
            }
        }
        if self.samples.push_back(current_ma).is_ok() {
            self.total = self.total.saturating_add(current_ma);
        }
    }

    /// Drop every sample and clear the launched flag.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.total = 0;
        self.launched = false;
    }

    /// Running sum of the samples held, mA.
    pub fn total(&self) -> i32 {
        self.total
    }

    /// Samples held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples are held.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The ring holds `N` samples and their sum is positive.
    pub fn discharge_proven(&self) -> bool {
        self.samples.is_full() && self.total > 0
    }

    /// Whether the monitor has been started since the last reset.
    pub fn launched(&self) -> bool {
        self.launched
    }

    /// Start a monitoring run from an empty ring. Returns false when a run
    /// is already in progress.
    pub fn launch(&mut self) -> bool {
        if self.launched {
            return false;
        }
        self.reset();
        self.launched = true;
        info!("soc 0 with charger attached, starting soft coulomb counter");
        true
    }

    /// One monitor tick. Returns true when the monitor should run again.
    pub fn monitor(&mut self, sample: &SoftCcSample) -> bool {
        let in_window = sample.voltage_uv <= SOFT_CC_MAX_VOLTAGE_UV
            && sample.raw_soc <= SOFT_CC_MAX_SOC
            && sample.charger_present;
        if !in_window {
            info!(
                "soft cc reset, soc={} charger={}",
                sample.raw_soc, sample.charger_present
            );
            self.reset();
            return false;
        }
        self.append(sample.current_ma);
        trace!("soft cc total={} n={}", self.total, self.len());
        !self.discharge_proven()
    }
}
