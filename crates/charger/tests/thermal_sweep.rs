//! JEITA machine driven across the whole clamp range.
//!
//! Run with: cargo test -p charger --test thermal_sweep

use charger::thermal::{JeitaMachine, MAX_TEMP_DECIDEGC, MIN_TEMP_DECIDEGC};
use charger::{ThermalConfig, ThermalZone};

fn rank(zone: ThermalZone) -> i8 {
    match zone {
        ThermalZone::Cool => 0,
        ThermalZone::Normal => 1,
        ThermalZone::Warm => 2,
        ThermalZone::Hot => 3,
    }
}

/// Sweep up then down in 0.5 °C steps, one sample per step.
fn sweep() -> Vec<i16> {
    let up: Vec<i16> = (MIN_TEMP_DECIDEGC..=MAX_TEMP_DECIDEGC).step_by(5).collect();
    let down: Vec<i16> = up.iter().rev().copied().collect();
    up.into_iter().chain(down).collect()
}

#[test]
fn sweep_moves_one_zone_at_a_time_and_returns_to_cool() {
    let mut jeita = JeitaMachine::new(ThermalConfig::default());
    let mut seen = Vec::new();
    for t in sweep() {
        if let Some(change) = jeita.step(t) {
            let jump = (rank(change.to) - rank(change.from)).abs();
            assert_eq!(jump, 1, "{:?} -> {:?} at {}", change.from, change.to, t);
            seen.push((t, change.to));
        }
    }
    assert_eq!(jeita.zone(), ThermalZone::Cool);
    let zones: Vec<ThermalZone> = seen.iter().map(|(_, z)| *z).collect();
    assert_eq!(
        zones,
        [
            ThermalZone::Cool,
            ThermalZone::Normal,
            ThermalZone::Warm,
            ThermalZone::Hot,
            ThermalZone::Warm,
            ThermalZone::Normal,
            ThermalZone::Cool,
        ]
    );
}

#[test]
fn leaving_a_zone_costs_the_hysteresis() {
    let cfg = ThermalConfig::default();
    let mut jeita = JeitaMachine::new(cfg);
    let mut entered = std::collections::HashMap::new();
    let mut left = std::collections::HashMap::new();
    for t in sweep() {
        if let Some(change) = jeita.step(t) {
            entered.entry(rank(change.to)).or_insert(t);
            left.insert(rank(change.from), t);
        }
    }
    // Rising edges fire just above the breakpoint, falling edges only once
    // the temperature is a hysteresis below it.
    assert!(entered[&rank(ThermalZone::Warm)] > cfg.warm_decidegc);
    assert!(left[&rank(ThermalZone::Warm)] < cfg.warm_decidegc - cfg.hysteresis_decidegc + 5);
    assert!(entered[&rank(ThermalZone::Hot)] > cfg.hot_decidegc);
    assert!(left[&rank(ThermalZone::Hot)] < cfg.hot_decidegc - cfg.hysteresis_decidegc + 5);
    assert!(left[&rank(ThermalZone::Cool)] > cfg.cool_decidegc + cfg.hysteresis_decidegc - 5);
}

#[test]
fn dithering_at_a_breakpoint_does_not_chatter() {
    let cfg = ThermalConfig::default();
    let mut jeita = JeitaMachine::new(cfg);
    jeita.step(cfg.warm_decidegc + 1);
    assert_eq!(jeita.zone(), ThermalZone::Warm);
    for i in 0..50 {
        let t = if i % 2 == 0 {
            cfg.warm_decidegc - 5
        } else {
            cfg.warm_decidegc + 5
        };
        assert!(jeita.step(t).is_none());
    }
    assert_eq!(jeita.zone(), ThermalZone::Warm);
}

#[test]
fn out_of_range_samples_clamp() {
    let mut jeita = JeitaMachine::new(ThermalConfig::default());
    jeita.step(i16::MAX);
    assert_eq!(jeita.zone(), ThermalZone::Warm);
    jeita.step(i16::MAX);
    assert_eq!(jeita.zone(), ThermalZone::Hot);
    assert!(jeita.step(i16::MAX).is_none());
}
