//! bq2419x / bq2429x register map.
//!
//! Reference: Texas Instruments bq24190 (SLUSAW5) and bq24296 (SLUSBT8)
//! datasheets, register map §8.6. Both families expose eleven 8-bit
//! registers at 0x00-0x0A. Fields shared by both families are defined here;
//! bits whose meaning differs by family live in [`crate::variant`].

/// 7-bit I2C device address (fixed in silicon for both families).
pub const DEFAULT_I2C_ADDR: u8 = 0x6B;
/// Highest addressable register.
pub const LAST_REGISTER: u8 = 0x0A;

/// REG00: Input source control (EN_HIZ, VINDPM, IINLIM).
pub const REG00_INPUT_SOURCE: u8 = 0x00;
/// REG01: Power-on configuration (REG_RESET, WD_RST, CHG_CONFIG, SYS_MIN, BOOST_LIM).
pub const REG01_POWER_ON_CONFIG: u8 = 0x01;
/// REG02: Charge current control (ICHG, FORCE_20PCT).
pub const REG02_CHARGE_CURRENT: u8 = 0x02;
/// REG03: Pre-charge / termination current control (IPRECHG, ITERM).
pub const REG03_PRECHARGE_TERM: u8 = 0x03;
/// REG04: Charge voltage control (VREG, BATLOWV, VRECHG).
pub const REG04_CHARGE_VOLTAGE: u8 = 0x04;
/// REG05: Termination / timer control (EN_TERM, TERM_STAT, WATCHDOG, EN_TIMER, CHG_TIMER).
pub const REG05_TERM_TIMER: u8 = 0x05;
/// REG06: IR compensation / thermal regulation (2419x) or boost thresholds (2429x).
pub const REG06_THERMAL_REGULATION: u8 = 0x06;
/// REG07: Misc operation control (DPDM_EN, TMR2X_EN, BATFET_DIS, INT_MASK).
pub const REG07_MISC_OPERATION: u8 = 0x07;
/// REG08: System status (VBUS_STAT, CHRG_STAT, DPM_STAT, PG_STAT, THERM_STAT, VSYS_STAT).
pub const REG08_SYSTEM_STATUS: u8 = 0x08;
/// REG09: Fault (WATCHDOG_FAULT, BOOST_FAULT, CHRG_FAULT, BAT_FAULT, NTC_FAULT).
pub const REG09_FAULT: u8 = 0x09;
/// REG0A: Vendor / part / revision.
pub const REG0A_VENDOR: u8 = 0x0A;

// ── REG00 ────────────────────────────────────────────────────────────────────

/// IINLIM[2:0]: input current limit table index.
pub const IINLIM_MASK: u8 = 0b0000_0111;
/// VINDPM[6:3]: input voltage limit, 3880 mV + 80 mV/LSB.
pub const VINDPM_MASK: u8 = 0b0111_1000;
/// Bit position of VINDPM.
pub const VINDPM_SHIFT: u8 = 3;
/// EN_HIZ: disconnect the input path.
pub const EN_HIZ_MASK: u8 = 1 << 7;

// ── REG01 ────────────────────────────────────────────────────────────────────

/// CHG_CONFIG[5:4]: charger / OTG configuration.
pub const CHG_CONFIG_MASK: u8 = 0b0011_0000;
/// CHG_CONFIG = 00: charging disabled.
pub const CHG_CONFIG_DISABLED: u8 = 0b00 << 4;
/// CHG_CONFIG = 01: battery charge enabled.
pub const CHG_CONFIG_CHARGE: u8 = 0b01 << 4;
/// CHG_CONFIG = 10: OTG boost enabled.
pub const CHG_CONFIG_OTG: u8 = 0b10 << 4;
/// WD_RST: I2C watchdog timer reset (self-clearing).
pub const WD_RESET_MASK: u8 = 1 << 6;

// ── REG02 ────────────────────────────────────────────────────────────────────

/// ICHG[7:2]: fast-charge current, 512 mA + 64 mA/LSB.
pub const ICHG_MASK: u8 = 0b1111_1100;
/// Bit position of ICHG.
pub const ICHG_SHIFT: u8 = 2;

// ── REG03 ────────────────────────────────────────────────────────────────────

/// ITERM[3:0]: termination current, 128 mA + 128 mA/LSB.
pub const ITERM_MASK: u8 = 0b0000_1111;

// ── REG04 ────────────────────────────────────────────────────────────────────

/// VRECHG: recharge threshold below VREG (0 = 100 mV, 1 = 300 mV).
pub const VRECHG_MASK: u8 = 1 << 0;
/// VREG[7:2]: charge (float) voltage, 3504 mV + 16 mV/LSB.
pub const VREG_MASK: u8 = 0b1111_1100;
/// Bit position of VREG.
pub const VREG_SHIFT: u8 = 2;

// ── REG05 ────────────────────────────────────────────────────────────────────

/// CHG_TIMER[2:1]: fast-charge safety timer period.
pub const CHG_TIMER_MASK: u8 = 0b0000_0110;
/// Bit position of CHG_TIMER.
pub const CHG_TIMER_SHIFT: u8 = 1;
/// EN_TIMER: safety timer enable.
pub const EN_TIMER_MASK: u8 = 1 << 3;
/// WATCHDOG[5:4]: I2C watchdog period.
pub const WATCHDOG_MASK: u8 = 0b0011_0000;
/// Bit position of WATCHDOG.
pub const WATCHDOG_SHIFT: u8 = 4;
/// EN_TERM: charge termination enable.
pub const EN_TERM_MASK: u8 = 1 << 7;

// ── REG07 ────────────────────────────────────────────────────────────────────

/// INT_MASK[1:0]: CHRG_FAULT and BAT_FAULT interrupt enables.
pub const INT_MASK_MASK: u8 = 0b0000_0011;
/// TMR2X_EN: slow the safety timer during DPM / thermal regulation.
pub const TMR2X_EN_MASK: u8 = 1 << 6;

// ── REG08 ────────────────────────────────────────────────────────────────────

/// VSYS_STAT: system in VSYSMIN regulation.
pub const VSYS_STAT_MASK: u8 = 1 << 0;
/// THERM_STAT: die in thermal regulation.
pub const THERM_STAT_MASK: u8 = 1 << 1;
/// PG_STAT: power good (input source present).
pub const PG_STAT_MASK: u8 = 1 << 2;
/// DPM_STAT: input DPM active.
pub const DPM_STAT_MASK: u8 = 1 << 3;
/// CHRG_STAT[5:4]: charge state.
pub const CHRG_STAT_MASK: u8 = 0b0011_0000;
/// Bit position of CHRG_STAT.
pub const CHRG_STAT_SHIFT: u8 = 4;
/// VBUS_STAT[7:6]: input source type.
pub const VBUS_STAT_MASK: u8 = 0b1100_0000;

// ── REG09 ────────────────────────────────────────────────────────────────────

/// BAT_FAULT: battery over-voltage.
pub const BAT_FAULT_MASK: u8 = 1 << 3;
/// CHRG_FAULT[5:4]: input fault / thermal shutdown / safety timer expiry.
pub const CHRG_FAULT_MASK: u8 = 0b0011_0000;
/// WATCHDOG_FAULT: I2C watchdog expired.
pub const WATCHDOG_FAULT_MASK: u8 = 1 << 7;

// ── REG0A ────────────────────────────────────────────────────────────────────

/// DEV_REG[1:0] on 2419x parts; always zero on 2429x parts.
pub const VENDOR_DEV_REG_MASK: u8 = 0b0000_0011;

// ── Discrete tables ──────────────────────────────────────────────────────────

/// IINLIM encodings, mA, indexed by field value.
pub const INPUT_CURRENT_LIMIT_MA: [u16; 8] = [100, 150, 500, 900, 1000, 1500, 2000, 3000];

/// CHG_TIMER encodings, hours, indexed by field value.
pub const SAFETY_TIMER_HOURS: [u8; 4] = [5, 8, 12, 20];
