//! End-of-charge detection for the normal temperature band.
//!
//! The detector is fed one [`EocSample`] per tick and answers with an
//! [`EocAction`]; the device applies it (full flag, Current disable reason,
//! notification). The warm band is handled by
//! [`WarmFullDetector`](crate::thermal::WarmFullDetector) instead.

use embassy_time::Duration;

use crate::config::TerminationStrategy;
use crate::error::ChargerError;
use crate::queries::{ChargingStatus, GAUGE_FLAG_FULL_CHARGE};

/// Qualifying samples needed before end of charge is declared.
pub const CONSECUTIVE_COUNT: u8 = 5;

/// Tick period while charging above [`EOC_SLOW_SOC`].
pub const EOC_PERIOD: Duration = Duration::from_secs(10);
/// Tick period with no charger or a low battery.
pub const EOC_SLOW_PERIOD: Duration = Duration::from_secs(100);
/// At or below this state of charge the detector ticks slowly, %.
pub const EOC_SLOW_SOC: u8 = 60;

/// Next tick delay.
pub fn eoc_period(soc: u8, charger_present: bool) -> Duration {
    if soc <= EOC_SLOW_SOC || !charger_present {
        EOC_SLOW_PERIOD
    } else {
        EOC_PERIOD
    }
}

/// Consecutive-sample counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debounce {
    count: u8,
    needed: u8,
}

impl Debounce {
    /// Counter that fires on the `needed`-th consecutive hit.
    pub const fn new(needed: u8) -> Self {
        Self { count: 0, needed }
    }

    /// Record a qualifying sample. True once `needed` have been seen in a row.
    pub fn hit(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        if self.count >= self.needed {
            self.count = 0;
            true
        } else {
            false
        }
    }

    /// Record a non-qualifying sample.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Samples counted so far.
    pub fn count(&self) -> u8 {
        self.count
    }
}

/// One normal-band observation.
#[derive(Debug, Clone, Copy)]
pub struct EocSample {
    /// Unsmoothed state of charge, %.
    pub soc: u8,
    /// Terminal voltage, mV.
    pub vbat_mv: i32,
    /// Battery current, mA (negative while charging).
    pub current_ma: i32,
    /// Committed float voltage, mV.
    pub float_mv: i32,
    /// Charger state.
    pub status: Result<ChargingStatus, ChargerError>,
    /// Gauge flag word, if the gauge has one.
    pub gauge_flags: Option<u16>,
}

/// What the detector wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EocAction {
    /// Nothing to do.
    None,
    /// Set the full flag and stop charging.
    Full,
    /// Clear the full flag and resume charging.
    Recharge,
}

/// Normal-band end-of-charge detector.
#[derive(Debug, Clone)]
pub struct EocDetector {
    strategy: TerminationStrategy,
    termination_ma: i32,
    resume_window_mv: i32,
    debounce: Debounce,
}

impl EocDetector {
    /// Detector terminating below `termination_ma`; recharge starts once
    /// voltage falls below float by more than `resume_delta_mv + tolerance_mv`.
    pub fn new(
        strategy: TerminationStrategy,
        termination_ma: u16,
        resume_delta_mv: u16,
        tolerance_mv: u16,
    ) -> Self {
        Self {
            strategy,
            termination_ma: i32::from(termination_ma),
            resume_window_mv: i32::from(resume_delta_mv).saturating_add(i32::from(tolerance_mv)),
            debounce: Debounce::new(CONSECUTIVE_COUNT),
        }
    }

    /// Active strategy.
    pub fn strategy(&self) -> TerminationStrategy {
        self.strategy
    }

    /// Qualifying samples counted so far.
    pub fn count(&self) -> u8 {
        self.debounce.count()
    }

    /// Forget accumulated samples (charger removed).
    pub fn reset(&mut self) {
        self.debounce.reset();
    }

    /// Feed one sample. `batt_full` is the current full flag.
    pub fn step(&mut self, sample: &EocSample, batt_full: bool) -> EocAction {
        if let TerminationStrategy::GaugeFullFlag = self.strategy {
            let full = sample
                .gauge_flags
                .is_some_and(|f| f & GAUGE_FLAG_FULL_CHARGE != 0);
            return match (batt_full, full) {
                (false, true) => EocAction::Full,
                (true, false) => EocAction::Recharge,
                _ => EocAction::None,
            };
        }

        if batt_full {
            let resume_below = sample.float_mv.saturating_sub(self.resume_window_mv);
            if sample.vbat_mv < resume_below {
                info!("recharge, vbat={} mV below {}", sample.vbat_mv, resume_below);
                self.debounce.reset();
                return EocAction::Recharge;
            }
            return EocAction::None;
        }

        let qualifies = match self.strategy {
            TerminationStrategy::CurrentTaper => {
                if !matches!(sample.status, Ok(ChargingStatus::FastCharge)) {
                    debug!("not in fast charge");
                    return EocAction::None;
                }
                let taper = sample.current_ma.saturating_neg() <= self.termination_ma;
                if !taper {
                    debug!("not at eoc, ibat={} mA", sample.current_ma);
                } else if sample.current_ma > 0 {
                    debug!("charging but system load exceeds input");
                }
                taper && sample.current_ma <= 0
            }
            TerminationStrategy::SocThreshold(threshold) => sample.soc > threshold,
            TerminationStrategy::GaugeFullFlag => false,
        };

        if !qualifies {
            self.debounce.reset();
            return EocAction::None;
        }
        if self.debounce.hit() {
            info!("end of charge ({})", self.strategy.name());
            EocAction::Full
        } else {
            debug!("eoc count {}", self.debounce.count());
            EocAction::None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ITERM: u16 = 256;

    fn taper() -> EocDetector {
        EocDetector::new(TerminationStrategy::CurrentTaper, ITERM, 100, 50)
    }

    fn sample(current_ma: i32) -> EocSample {
        EocSample {
            soc: 90,
            vbat_mv: 4300,
            current_ma,
            float_mv: 4352,
            status: Ok(ChargingStatus::FastCharge),
            gauge_flags: None,
        }
    }

    #[test]
    fn full_on_fifth_qualifying_tick() {
        let mut d = taper();
        let s = sample(-(i32::from(ITERM) - 1));
        for _ in 0..4 {
            assert_eq!(d.step(&s, false), EocAction::None);
        }
        assert_eq!(d.step(&s, false), EocAction::Full);
    }

    #[test]
    fn high_current_resets_counter() {
        let mut d = taper();
        let s = sample(-(i32::from(ITERM) - 1));
        for _ in 0..4 {
            d.step(&s, false);
        }
        assert_eq!(d.step(&sample(-(i32::from(ITERM) + 1)), false), EocAction::None);
        assert_eq!(d.count(), 0);
        for _ in 0..4 {
            assert_eq!(d.step(&s, false), EocAction::None);
        }
        assert_eq!(d.step(&s, false), EocAction::Full);
    }

    #[test]
    fn discharge_does_not_qualify() {
        let mut d = taper();
        for _ in 0..10 {
            assert_eq!(d.step(&sample(20), false), EocAction::None);
        }
    }

    #[test]
    fn precharge_is_ignored() {
        let mut d = taper();
        let mut s = sample(-100);
        s.status = Ok(ChargingStatus::PreCharge);
        for _ in 0..10 {
            assert_eq!(d.step(&s, false), EocAction::None);
        }
    }

    #[test]
    fn recharge_below_resume_window() {
        let mut d = taper();
        let mut s = sample(0);
        s.vbat_mv = 4202;
        assert_eq!(d.step(&s, true), EocAction::None);
        s.vbat_mv = 4201;
        assert_eq!(d.step(&s, true), EocAction::Recharge);
    }

    #[test]
    fn soc_threshold_strategy() {
        let mut d = EocDetector::new(TerminationStrategy::SocThreshold(95), ITERM, 100, 50);
        let mut s = sample(-900);
        s.soc = 96;
        for _ in 0..4 {
            assert_eq!(d.step(&s, false), EocAction::None);
        }
        assert_eq!(d.step(&s, false), EocAction::Full);
    }

    #[test]
    fn gauge_flag_strategy_mirrors_flag() {
        let mut d = EocDetector::new(TerminationStrategy::GaugeFullFlag, ITERM, 100, 50);
        let mut s = sample(-900);
        s.gauge_flags = Some(GAUGE_FLAG_FULL_CHARGE);
        assert_eq!(d.step(&s, false), EocAction::Full);
        assert_eq!(d.step(&s, true), EocAction::None);
        s.gauge_flags = Some(0);
        assert_eq!(d.step(&s, true), EocAction::Recharge);
    }

    #[test]
    fn period_slows_down() {
        assert_eq!(eoc_period(90, true), EOC_PERIOD);
        assert_eq!(eoc_period(60, true), EOC_SLOW_PERIOD);
        assert_eq!(eoc_period(90, false), EOC_SLOW_PERIOD);
    }
}
