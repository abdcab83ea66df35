//! JEITA thermal machine.
//!
//! A Mealy machine: each sample is compared against the threshold pair left
//! behind by the previous transition, so the band edges move with the
//! zone and leaving a zone always costs the configured hysteresis.
//!
//! ```text
//!            rising                   rising              rising
//!   Cool ─────────────▶ Normal ─────────────▶ Warm ─────────────▶ Hot
//!        ◀───────────── (cool,warm) ◀────────  (warm-h,hot) ◀────  (hot-h,MAX)
//!   (MIN,cool+h) falling           falling              falling
//! ```
//!
//! The machine only decides the zone. Applying currents, float voltage and
//! the temperature disable reason is the device's job, driven by the
//! [`ZoneChange`] each step returns.

use embassy_time::Duration;

use crate::config::ThermalConfig;
use crate::eoc::{Debounce, CONSECUTIVE_COUNT};
use crate::queries::ChargingStatus;

/// Lowest temperature the machine reasons about, 0.1 °C.
pub const MIN_TEMP_DECIDEGC: i16 = -300;
/// Highest temperature the machine reasons about, 0.1 °C.
pub const MAX_TEMP_DECIDEGC: i16 = 800;

/// Tick period while charging is possible.
pub const THERMAL_PERIOD: Duration = Duration::from_secs(2);
/// Tick period while OTG boost is active.
pub const THERMAL_OTG_PERIOD: Duration = Duration::from_secs(60);

/// Battery temperature zone. Exactly one zone holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThermalZone {
    /// Between the cool and warm breakpoints.
    #[default]
    Normal,
    /// Below the cool breakpoint; charging stops.
    Cool,
    /// Above the warm breakpoint; reduced current and float voltage.
    Warm,
    /// Above the hot breakpoint; charging stops.
    Hot,
}

impl ThermalZone {
    /// Whether the battery is hot.
    pub const fn is_hot(self) -> bool {
        matches!(self, Self::Hot)
    }

    /// Whether the battery is warm.
    pub const fn is_warm(self) -> bool {
        matches!(self, Self::Warm)
    }

    /// Whether the battery is cool.
    pub const fn is_cool(self) -> bool {
        matches!(self, Self::Cool)
    }

    /// Zones in which the temperature reason vetoes charging.
    pub const fn blocks_charging(self) -> bool {
        matches!(self, Self::Hot | Self::Cool)
    }

    /// Label for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Cool => "cool",
            Self::Warm => "warm",
            Self::Hot => "hot",
        }
    }
}

/// Band edges for the next sample, 0.1 °C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Thresholds {
    /// Samples strictly below this are "falling".
    pub low: i16,
    /// Samples strictly above this are "rising".
    pub high: i16,
}

/// Coarse classification of a sample against the current thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Above,
    Below,
    Within,
}

/// Result of a step that moved the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ZoneChange {
    /// Zone before the step.
    pub from: ThermalZone,
    /// Zone after the step.
    pub to: ThermalZone,
}

impl ZoneChange {
    /// Entered or left the warm zone: currents and float voltage need
    /// reapplying.
    pub const fn warm_changed(&self) -> bool {
        self.from.is_warm() != self.to.is_warm()
    }

    /// Entered or left hot or cool: the temperature reason needs updating.
    pub const fn hot_cool_changed(&self) -> bool {
        self.from.is_hot() != self.to.is_hot() || self.from.is_cool() != self.to.is_cool()
    }
}

/// Zone plus the thresholds that carry the hysteresis between steps.
#[derive(Debug, Clone)]
pub struct JeitaMachine {
    config: ThermalConfig,
    zone: ThermalZone,
    thresholds: Thresholds,
}

impl JeitaMachine {
    /// Start in the normal zone.
    pub fn new(config: ThermalConfig) -> Self {
        Self {
            zone: ThermalZone::Normal,
            thresholds: Self::thresholds_for(&config, ThermalZone::Normal),
            config,
        }
    }

    /// Current zone.
    pub fn zone(&self) -> ThermalZone {
        self.zone
    }

    /// Thresholds the next sample is compared against.
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    fn thresholds_for(config: &ThermalConfig, zone: ThermalZone) -> Thresholds {
        let hyst = config.hysteresis_decidegc;
        match zone {
            ThermalZone::Normal => Thresholds {
                low: config.cool_decidegc,
                high: config.warm_decidegc,
            },
            ThermalZone::Cool => Thresholds {
                low: MIN_TEMP_DECIDEGC,
                high: config.cool_decidegc.saturating_add(hyst),
            },
            ThermalZone::Warm => Thresholds {
                low: config.warm_decidegc.saturating_sub(hyst),
                high: config.hot_decidegc,
            },
            ThermalZone::Hot => Thresholds {
                low: config.hot_decidegc.saturating_sub(hyst),
                high: MAX_TEMP_DECIDEGC,
            },
        }
    }

    /// Feed one temperature sample.
    ///
    /// Returns the transition when the zone moved.
    pub fn step(&mut self, temp_decidegc: i16) -> Option<ZoneChange> {
        let temp = temp_decidegc.clamp(MIN_TEMP_DECIDEGC, MAX_TEMP_DECIDEGC);
        let band = if temp > self.thresholds.high {
            Band::Above
        } else if temp < self.thresholds.low {
            Band::Below
        } else {
            Band::Within
        };

        let next = match (band, self.zone) {
            (Band::Above, ThermalZone::Cool) => ThermalZone::Normal,
            (Band::Above, ThermalZone::Normal) => ThermalZone::Warm,
            (Band::Above, ThermalZone::Warm) => ThermalZone::Hot,
            (Band::Below, ThermalZone::Normal) => ThermalZone::Cool,
            (Band::Below, ThermalZone::Warm) => ThermalZone::Normal,
            (Band::Below, ThermalZone::Hot) => ThermalZone::Warm,
            _ => return None,
        };

        let change = ZoneChange {
            from: self.zone,
            to: next,
        };
        self.zone = next;
        self.thresholds = Self::thresholds_for(&self.config, next);
        info!(
            "temp={} zone {} -> {}, thresholds [{}, {}]",
            temp,
            change.from.name(),
            change.to.name(),
            self.thresholds.low,
            self.thresholds.high
        );
        Some(change)
    }
}

// ── Warm-band end of charge ──────────────────────────────────────────────────

/// State of charge above which a warm battery counts as full, %.
pub const WARM_FULL_SOC: u8 = 75;

/// One warm-band observation.
#[derive(Debug, Clone, Copy)]
pub struct WarmSample {
    /// Unsmoothed state of charge, %.
    pub soc: u8,
    /// Terminal voltage, mV.
    pub vbat_mv: i32,
    /// Committed float voltage, mV.
    pub float_mv: i32,
    /// Charger state.
    pub status: Result<ChargingStatus, crate::error::ChargerError>,
}

/// What the warm path wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WarmAction {
    /// Nothing to do.
    None,
    /// Latch warm-full and stop charging.
    Latch,
    /// Voltage sagged enough: resume charging.
    Resume,
}

/// Warm-band termination by state of charge.
///
/// In the warm band the float voltage is lowered, so the normal current
/// taper never shows up; the pack is declared full once it holds more than
/// [`WARM_FULL_SOC`] for several fast-charge samples.
#[derive(Debug, Clone)]
pub struct WarmFullDetector {
    debounce: Debounce,
    resume_window_mv: i32,
}

impl WarmFullDetector {
    /// `resume_delta_mv` and `tolerance_mv` set the voltage window below
    /// float inside which charging is considered finished.
    pub fn new(resume_delta_mv: u16, tolerance_mv: u16) -> Self {
        Self {
            debounce: Debounce::new(CONSECUTIVE_COUNT),
            resume_window_mv: i32::from(resume_delta_mv).saturating_add(i32::from(tolerance_mv)),
        }
    }

    /// Forget accumulated samples.
    pub fn reset(&mut self) {
        self.debounce.reset();
    }

    /// Feed one sample. `warm_full` is the current latch state.
    pub fn step(&mut self, sample: &WarmSample, warm_full: bool) -> WarmAction {
        let resume_below = sample.float_mv.saturating_sub(self.resume_window_mv);
        if warm_full {
            if sample.vbat_mv <= resume_below {
                info!("warm recharge, vbat={} mV", sample.vbat_mv);
                self.debounce.reset();
                return WarmAction::Resume;
            }
            return WarmAction::None;
        }
        if !matches!(sample.status, Ok(ChargingStatus::FastCharge)) {
            debug!("warm band, not fast charging");
            return WarmAction::None;
        }
        if sample.vbat_mv < resume_below {
            debug!("warm band, vbat {} below {}", sample.vbat_mv, resume_below);
            self.debounce.reset();
            return WarmAction::None;
        }
        if sample.soc > WARM_FULL_SOC {
            if self.debounce.hit() {
                info!("warm end of charge, soc={}", sample.soc);
                return WarmAction::Latch;
            }
            debug!("warm eoc count {}", self.debounce.count());
        } else {
            self.debounce.reset();
        }
        WarmAction::None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    extern crate std;
    use std::vec::Vec;

    fn machine() -> JeitaMachine {
        JeitaMachine::new(ThermalConfig::default())
    }

    #[test]
    fn starts_normal_with_cool_warm_band() {
        let m = machine();
        assert_eq!(m.zone(), ThermalZone::Normal);
        assert_eq!(m.thresholds(), Thresholds { low: 20, high: 440 });
    }

    #[test]
    fn rising_sweep_visits_every_zone_once() {
        let mut m = machine();
        let mut visited = Vec::new();
        visited.push(m.step(MIN_TEMP_DECIDEGC).unwrap().to);
        for t in (MIN_TEMP_DECIDEGC + 1)..=MAX_TEMP_DECIDEGC {
            if let Some(change) = m.step(t) {
                visited.push(change.to);
            }
        }
        assert_eq!(
            visited,
            [
                ThermalZone::Cool,
                ThermalZone::Normal,
                ThermalZone::Warm,
                ThermalZone::Hot
            ]
        );
    }

    #[test]
    fn falling_sweep_visits_every_zone_once() {
        let mut m = machine();
        for t in 0..=MAX_TEMP_DECIDEGC {
            m.step(t);
        }
        assert_eq!(m.zone(), ThermalZone::Hot);
        let mut visited = Vec::new();
        for t in (MIN_TEMP_DECIDEGC..=MAX_TEMP_DECIDEGC).rev() {
            if let Some(change) = m.step(t) {
                visited.push(change.to);
            }
        }
        assert_eq!(
            visited,
            [ThermalZone::Warm, ThermalZone::Normal, ThermalZone::Cool]
        );
    }

    #[test]
    fn no_oscillation_inside_hysteresis() {
        let mut m = machine();
        assert_eq!(m.step(441).unwrap().to, ThermalZone::Warm);
        // Dither between the warm breakpoint and the lowered exit edge.
        for t in [439, 441, 425, 440, 420] {
            assert_eq!(m.step(t), None);
        }
        assert_eq!(m.step(419).unwrap().to, ThermalZone::Normal);
    }

    #[test]
    fn samples_are_clamped() {
        let mut m = machine();
        assert_eq!(m.step(i16::MIN).unwrap().to, ThermalZone::Cool);
        assert_eq!(m.step(i16::MIN), None);
        assert_eq!(m.thresholds().low, MIN_TEMP_DECIDEGC);
    }

    #[test]
    fn change_flags() {
        let warm = ZoneChange {
            from: ThermalZone::Normal,
            to: ThermalZone::Warm,
        };
        assert!(warm.warm_changed());
        assert!(!warm.hot_cool_changed());
        let hot = ZoneChange {
            from: ThermalZone::Warm,
            to: ThermalZone::Hot,
        };
        assert!(hot.warm_changed());
        assert!(hot.hot_cool_changed());
        assert!(ThermalZone::Hot.blocks_charging());
        assert!(!ThermalZone::Warm.blocks_charging());
    }

    fn warm_sample(soc: u8, vbat_mv: i32) -> WarmSample {
        WarmSample {
            soc,
            vbat_mv,
            float_mv: 4112,
            status: Ok(ChargingStatus::FastCharge),
        }
    }

    #[test]
    fn warm_full_latches_on_fifth_sample() {
        let mut d = WarmFullDetector::new(100, 50);
        for _ in 0..4 {
            assert_eq!(d.step(&warm_sample(80, 4100), false), WarmAction::None);
        }
        assert_eq!(d.step(&warm_sample(80, 4100), false), WarmAction::Latch);
    }

    #[test]
    fn warm_full_resumes_below_window() {
        let mut d = WarmFullDetector::new(100, 50);
        assert_eq!(d.step(&warm_sample(80, 3963), true), WarmAction::None);
        assert_eq!(d.step(&warm_sample(80, 3962), true), WarmAction::Resume);
    }

    #[test]
    fn low_soc_resets_warm_counter() {
        let mut d = WarmFullDetector::new(100, 50);
        for _ in 0..4 {
            d.step(&warm_sample(80, 4100), false);
        }
        d.step(&warm_sample(70, 4100), false);
        for _ in 0..4 {
            assert_eq!(d.step(&warm_sample(80, 4100), false), WarmAction::None);
        }
        assert_eq!(d.step(&warm_sample(80, 4100), false), WarmAction::Latch);
    }
}
