//! Chip-family descriptors.
//!
//! The 2419x and 2429x families share the register map but differ in a
//! handful of bits: the 2429x has no TERM_STAT or JEITA bits, a two-bit NTC
//! fault field and an OTG fault where the 2419x reports a boost fault. Each
//! family supplies one [`VariantFields`] table, selected once at attach from
//! the vendor register.

use crate::registers::VENDOR_DEV_REG_MASK;

/// Charger IC family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipVariant {
    /// bq24190 / bq24192 / bq24192I.
    Bq2419x,
    /// bq24295 / bq24296 / bq24297.
    Bq2429x,
}

/// Per-family bit layout differences.
#[derive(Debug, PartialEq, Eq)]
pub struct VariantFields {
    /// Family label for log lines.
    pub name: &'static str,
    /// REG05 TERM_STAT bit, cleared together with EN_TERM; 0 when absent.
    pub term_stat_mask: u8,
    /// REG09 NTC fault field.
    pub ntc_fault_mask: u8,
    /// REG09 bit 6: boost fault (2419x) or OTG fault (2429x).
    pub boost_fault_mask: u8,
    /// Diagnostic names for REG09 bits 0-7.
    pub fault_bit_names: [&'static str; 8],
}

static BQ2419X_FIELDS: VariantFields = VariantFields {
    name: "bq2419x",
    term_stat_mask: 1 << 6,
    ntc_fault_mask: 0b0000_0111,
    boost_fault_mask: 1 << 6,
    fault_bit_names: [
        "NTC_fault0",
        "NTC_fault1",
        "NTC_fault2",
        "BAT_fault",
        "CHG_fault0",
        "CHG_fault1",
        "BOOST_fault",
        "WDOG_fault",
    ],
};

static BQ2429X_FIELDS: VariantFields = VariantFields {
    name: "bq2429x",
    term_stat_mask: 0,
    ntc_fault_mask: 0b0000_0011,
    boost_fault_mask: 1 << 6,
    fault_bit_names: [
        "NTC_fault0",
        "NTC_fault1",
        "reserved",
        "BAT_fault",
        "CHG_fault0",
        "CHG_fault1",
        "OTG_fault",
        "WDOG_fault",
    ],
};

/// Diagnostic names for REG08 bits 0-7 (identical on both families).
pub const STATUS_BIT_NAMES: [&str; 8] = [
    "sys_voltage_status",
    "THERM_status",
    "PG_status",
    "DPM_status",
    "chg_status0",
    "chg_status1",
    "VBUS_status0",
    "VBUS_status1",
];

impl ChipVariant {
    /// Identify the family from a raw REG0A value.
    ///
    /// 2419x parts report a non-zero DEV_REG field; on 2429x parts those
    /// bits hold the revision and read back as zero on shipped silicon.
    pub const fn from_vendor(vendor: u8) -> Self {
        if vendor & VENDOR_DEV_REG_MASK != 0 {
            Self::Bq2419x
        } else {
            Self::Bq2429x
        }
    }

    /// Bit layout table for this family.
    pub fn fields(self) -> &'static VariantFields {
        match self {
            Self::Bq2419x => &BQ2419X_FIELDS,
            Self::Bq2429x => &BQ2429X_FIELDS,
        }
    }

    /// Family label.
    pub fn name(self) -> &'static str {
        self.fields().name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{BAT_FAULT_MASK, CHRG_FAULT_MASK, WATCHDOG_FAULT_MASK};

    #[test]
    fn vendor_dev_bits_select_family() {
        assert_eq!(ChipVariant::from_vendor(0b0010_0011), ChipVariant::Bq2419x);
        assert_eq!(ChipVariant::from_vendor(0b0010_0001), ChipVariant::Bq2419x);
        assert_eq!(ChipVariant::from_vendor(0b0010_0000), ChipVariant::Bq2429x);
        assert_eq!(ChipVariant::from_vendor(0), ChipVariant::Bq2429x);
    }

    #[test]
    fn fault_fields_do_not_overlap_shared_bits() {
        for v in [ChipVariant::Bq2419x, ChipVariant::Bq2429x] {
            let f = v.fields();
            let shared = BAT_FAULT_MASK | CHRG_FAULT_MASK | WATCHDOG_FAULT_MASK;
            assert_eq!(f.ntc_fault_mask & shared, 0, "{}", f.name);
            assert_eq!(f.boost_fault_mask & shared, 0, "{}", f.name);
            assert_eq!(f.ntc_fault_mask & f.boost_fault_mask, 0, "{}", f.name);
        }
    }

    #[test]
    fn only_2419x_has_term_stat() {
        assert_ne!(ChipVariant::Bq2419x.fields().term_stat_mask, 0);
        assert_eq!(ChipVariant::Bq2429x.fields().term_stat_mask, 0);
    }
}
