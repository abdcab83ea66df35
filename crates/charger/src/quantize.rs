//! Bounded linear quantization between physical units and register fields.
//!
//! Every linear setter follows the same rule: validate `value` against
//! `[min, max]`, compute `field = (value - min) / step`, shift the field into
//! position. Out-of-range input is rejected before anything touches the bus.
//! Decoding is the inverse and re-validates the result, so a register holding
//! a field code beyond `max` reads back as an error rather than a bogus value.

use crate::error::RangeError;
use crate::registers::{
    ICHG_MASK, ICHG_SHIFT, INPUT_CURRENT_LIMIT_MA, ITERM_MASK, REG00_INPUT_SOURCE,
    REG02_CHARGE_CURRENT, REG03_PRECHARGE_TERM, REG04_CHARGE_VOLTAGE, SAFETY_TIMER_HOURS,
    VINDPM_MASK, VINDPM_SHIFT, VREG_MASK, VREG_SHIFT, VRECHG_MASK,
};

/// A register field holding `min + code * step` in some physical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearField {
    /// Register address.
    pub reg: u8,
    /// Field mask within the register.
    pub mask: u8,
    /// Bit position of the field's LSB.
    pub shift: u8,
    /// Smallest accepted value.
    pub min: u16,
    /// Largest accepted value.
    pub max: u16,
    /// Value represented by one LSB.
    pub step: u16,
}

impl LinearField {
    fn range_error(&self, value: u16) -> RangeError {
        RangeError {
            value: i32::from(value),
            min: i32::from(self.min),
            max: i32::from(self.max),
        }
    }

    /// Check `value` against `[min, max]`.
    pub fn check(&self, value: u16) -> Result<(), RangeError> {
        if value < self.min || value > self.max {
            Err(self.range_error(value))
        } else {
            Ok(())
        }
    }

    /// Clamp `value` into `[min, max]`.
    pub fn clamp(&self, value: u16) -> u16 {
        value.clamp(self.min, self.max)
    }

    /// Encode `value` into register bits, already shifted into position.
    pub fn encode(&self, value: u16) -> Result<u8, RangeError> {
        self.check(value)?;
        // Safety: value >= min checked above; step is non-zero for every field.
        #[allow(clippy::arithmetic_side_effects)]
        let code = (value - self.min) / self.step;
        let code = u8::try_from(code).map_err(|_| self.range_error(value))?;
        Ok(code.checked_shl(u32::from(self.shift)).unwrap_or(0) & self.mask)
    }

    /// Decode register bits back to the physical value they represent.
    pub fn decode(&self, raw: u8) -> Result<u16, RangeError> {
        let code = u16::from((raw & self.mask) >> self.shift);
        let value = code
            .saturating_mul(self.step)
            .saturating_add(self.min);
        self.check(value)?;
        Ok(value)
    }
}

/// VREG: charge regulation (float) voltage, mV.
pub const FLOAT_VOLTAGE_MV: LinearField = LinearField {
    reg: REG04_CHARGE_VOLTAGE,
    mask: VREG_MASK,
    shift: VREG_SHIFT,
    min: 3504,
    max: 4400,
    step: 16,
};

/// ITERM: termination current, mA.
pub const TERMINATION_CURRENT_MA: LinearField = LinearField {
    reg: REG03_PRECHARGE_TERM,
    mask: ITERM_MASK,
    shift: 0,
    min: 128,
    max: 1024,
    step: 128,
};

/// ICHG: fast-charge current, mA.
pub const FAST_CHARGE_CURRENT_MA: LinearField = LinearField {
    reg: REG02_CHARGE_CURRENT,
    mask: ICHG_MASK,
    shift: ICHG_SHIFT,
    min: 512,
    max: 3008,
    step: 64,
};

/// VINDPM: input voltage limit, mV.
pub const INPUT_VOLTAGE_LIMIT_MV: LinearField = LinearField {
    reg: REG00_INPUT_SOURCE,
    mask: VINDPM_MASK,
    shift: VINDPM_SHIFT,
    min: 3880,
    max: 5080,
    step: 80,
};

/// Smallest accepted recharge threshold, mV.
pub const RECHARGE_THRESHOLD_MIN_MV: u16 = 50;
/// Largest accepted recharge threshold, mV.
pub const RECHARGE_THRESHOLD_MAX_MV: u16 = 300;

/// Encode a recharge threshold into the single VRECHG bit.
///
/// The bit selects 100 mV (0) or 300 mV (1) below VREG. Requests are mapped
/// as `mv / 300`: only a 300 mV request selects the high setting, and every
/// request from 50 to 299 mV selects 100 mV.
pub fn recharge_threshold_bits(mv: u16) -> Result<u8, RangeError> {
    if !(RECHARGE_THRESHOLD_MIN_MV..=RECHARGE_THRESHOLD_MAX_MV).contains(&mv) {
        return Err(RangeError {
            value: i32::from(mv),
            min: i32::from(RECHARGE_THRESHOLD_MIN_MV),
            max: i32::from(RECHARGE_THRESHOLD_MAX_MV),
        });
    }
    Ok(if mv >= RECHARGE_THRESHOLD_MAX_MV {
        VRECHG_MASK
    } else {
        0
    })
}

/// Smallest IINLIM setting, mA.
pub const INPUT_CURRENT_FLOOR_MA: u16 = 100;

/// IINLIM index for a requested input current: the largest table entry not
/// above `ma`, or the smallest entry when `ma` is below all of them.
pub fn input_current_index(ma: u16) -> u8 {
    let mut index = 0u8;
    for (i, &limit) in INPUT_CURRENT_LIMIT_MA.iter().enumerate() {
        if limit <= ma {
            index = u8::try_from(i).unwrap_or(index);
        }
    }
    index
}

/// Input current represented by an IINLIM index.
pub fn input_current_ma(index: u8) -> u16 {
    INPUT_CURRENT_LIMIT_MA
        .get(usize::from(index))
        .copied()
        .unwrap_or(INPUT_CURRENT_FLOOR_MA)
}

/// Longest programmable safety-timer period, hours.
pub const SAFETY_TIMER_MAX_HOURS: u8 = 20;

/// CHG_TIMER index for a requested safety-timer period: the first entry at
/// or above `hours`, or `None` when the request exceeds the longest period.
pub fn safety_timer_index(hours: u8) -> Option<u8> {
    SAFETY_TIMER_HOURS
        .iter()
        .position(|&h| hours <= h)
        .and_then(|i| u8::try_from(i).ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── Linear fields ───────────────────────────────────────────────────────

    #[test]
    fn float_voltage_endpoints() {
        assert_eq!(FLOAT_VOLTAGE_MV.encode(3504), Ok(0));
        assert_eq!(FLOAT_VOLTAGE_MV.encode(4400), Ok(56 << 2));
        assert_eq!(FLOAT_VOLTAGE_MV.encode(4208), Ok(44 << 2));
    }

    #[test]
    fn float_voltage_rejects_out_of_range() {
        let err = FLOAT_VOLTAGE_MV.encode(4416).unwrap_err();
        assert_eq!(err, RangeError { value: 4416, min: 3504, max: 4400 });
        assert!(FLOAT_VOLTAGE_MV.encode(3503).is_err());
    }

    #[test]
    fn decode_rejects_codes_past_max() {
        // Code 57 would be 4416 mV.
        assert!(FLOAT_VOLTAGE_MV.decode(57 << 2).is_err());
        assert_eq!(FLOAT_VOLTAGE_MV.decode((56 << 2) | 0b11), Ok(4400));
    }

    #[test]
    fn fast_charge_current_quantizes_down() {
        // 2560 mA is exactly code 32; 2600 mA also lands on code 32.
        assert_eq!(FAST_CHARGE_CURRENT_MA.encode(2560), Ok(32 << 2));
        assert_eq!(FAST_CHARGE_CURRENT_MA.encode(2600), Ok(32 << 2));
        assert_eq!(FAST_CHARGE_CURRENT_MA.decode(32 << 2), Ok(2560));
    }

    #[test]
    fn termination_and_input_voltage_codes() {
        assert_eq!(TERMINATION_CURRENT_MA.encode(256), Ok(1));
        assert_eq!(TERMINATION_CURRENT_MA.encode(1024), Ok(7));
        assert_eq!(INPUT_VOLTAGE_LIMIT_MV.encode(4360), Ok(6 << 3));
        assert_eq!(INPUT_VOLTAGE_LIMIT_MV.encode(5080), Ok(15 << 3));
    }

    #[test]
    fn every_field_has_nonzero_step_and_fits_mask() {
        for f in [
            FLOAT_VOLTAGE_MV,
            TERMINATION_CURRENT_MA,
            FAST_CHARGE_CURRENT_MA,
            INPUT_VOLTAGE_LIMIT_MV,
        ] {
            assert_ne!(f.step, 0);
            let top = f.encode(f.max).unwrap();
            assert_eq!(f.decode(top).unwrap(), f.max - (f.max - f.min) % f.step);
        }
    }

    // ── Recharge threshold ──────────────────────────────────────────────────

    #[test]
    fn recharge_threshold_two_point_encoding() {
        assert_eq!(recharge_threshold_bits(50), Ok(0));
        assert_eq!(recharge_threshold_bits(100), Ok(0));
        assert_eq!(recharge_threshold_bits(299), Ok(0));
        assert_eq!(recharge_threshold_bits(300), Ok(VRECHG_MASK));
        assert!(recharge_threshold_bits(49).is_err());
        assert!(recharge_threshold_bits(301).is_err());
    }

    // ── Tables ──────────────────────────────────────────────────────────────

    #[test]
    fn input_current_picks_largest_entry_not_above_request() {
        assert_eq!(input_current_ma(input_current_index(1600)), 1500);
        assert_eq!(input_current_ma(input_current_index(1500)), 1500);
        assert_eq!(input_current_ma(input_current_index(5000)), 3000);
        assert_eq!(input_current_ma(input_current_index(499)), 150);
    }

    #[test]
    fn input_current_below_table_uses_smallest_entry() {
        assert_eq!(input_current_index(0), 0);
        assert_eq!(input_current_index(99), 0);
    }

    #[test]
    fn safety_timer_rounds_up() {
        assert_eq!(safety_timer_index(1), Some(0));
        assert_eq!(safety_timer_index(5), Some(0));
        assert_eq!(safety_timer_index(6), Some(1));
        assert_eq!(safety_timer_index(20), Some(3));
        assert_eq!(safety_timer_index(21), None);
    }
}
