//! Interrupt dispatch table.
//!
//! Two status registers, eight bits each. Every bit has a diagnostic name,
//! an optional handler and a pair of edge counters. A dispatch pass reads
//! both registers, XORs against the previous value and reports each edge;
//! the device runs the handlers outside the table lock.

use heapless::Vec;

use crate::registers::{
    BAT_FAULT_MASK, CHRG_FAULT_MASK, REG08_SYSTEM_STATUS, REG09_FAULT, WATCHDOG_FAULT_MASK,
};
use crate::variant::{ChipVariant, STATUS_BIT_NAMES};

/// Status registers scanned on every interrupt.
pub const IRQ_STATUS_REGISTERS: [u8; 2] = [REG08_SYSTEM_STATUS, REG09_FAULT];

/// Handler attached to a status bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqHandler {
    /// VSYS regulation.
    SystemVoltage,
    /// Thermal regulation.
    Therm,
    /// Power good: charger attach and detach.
    PowerGood,
    /// Input DPM.
    Dpm,
    /// Charge status field.
    ChargeStatus,
    /// VBUS status field.
    VbusStatus,
    /// NTC hot or cold fault.
    HotCold,
    /// Battery over-voltage.
    BatteryFault,
    /// Charge fault field.
    ChargeFault,
    /// Boost (2419x) or OTG (2429x) fault.
    BoostFault,
    /// Watchdog expiry.
    WatchdogFault,
}

impl IrqHandler {
    const STATUS: [Option<Self>; 8] = [
        Some(Self::SystemVoltage),
        Some(Self::Therm),
        Some(Self::PowerGood),
        Some(Self::Dpm),
        Some(Self::ChargeStatus),
        Some(Self::ChargeStatus),
        Some(Self::VbusStatus),
        Some(Self::VbusStatus),
    ];

    fn for_fault_bit(variant: ChipVariant, bit: u8) -> Option<Self> {
        let fields = variant.fields();
        let mask = 1u8.checked_shl(u32::from(bit)).unwrap_or(0);
        if fields.ntc_fault_mask & mask != 0 {
            Some(Self::HotCold)
        } else if BAT_FAULT_MASK & mask != 0 {
            Some(Self::BatteryFault)
        } else if CHRG_FAULT_MASK & mask != 0 {
            Some(Self::ChargeFault)
        } else if fields.boost_fault_mask & mask != 0 {
            Some(Self::BoostFault)
        } else if WATCHDOG_FAULT_MASK & mask != 0 {
            Some(Self::WatchdogFault)
        } else {
            None
        }
    }
}

/// One bit's descriptor and edge counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqBit {
    /// Diagnostic name.
    pub name: &'static str,
    /// Handler, if any.
    pub handler: Option<IrqHandler>,
    /// Rising edges seen.
    pub high: u32,
    /// Falling edges seen.
    pub low: u32,
}

impl IrqBit {
    const fn new(name: &'static str, handler: Option<IrqHandler>) -> Self {
        Self {
            name,
            handler,
            high: 0,
            low: 0,
        }
    }
}

/// One status register's bits plus its last observed value.
#[derive(Debug, Clone)]
pub struct StatusRegister {
    /// Register address.
    pub reg: u8,
    prev: u8,
    /// Per-bit descriptors, bit 0 first.
    pub bits: [IrqBit; 8],
}

/// A detected bit transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqEdge {
    /// Register the bit lives in.
    pub reg: u8,
    /// Bit position.
    pub bit: u8,
    /// Bit name.
    pub name: &'static str,
    /// New level.
    pub level: bool,
    /// Full new register value.
    pub value: u8,
    /// Handler to run.
    pub handler: Option<IrqHandler>,
}

/// Edges found in one register.
pub type Edges = Vec<IrqEdge, 8>;

/// Dispatch table for both status registers.
#[derive(Debug, Clone)]
pub struct IrqTable {
    registers: [StatusRegister; 2],
}

impl IrqTable {
    /// Table for `variant`; fault-bit names and handlers follow the family.
    pub fn new(variant: ChipVariant) -> Self {
        let fault_names = variant.fields().fault_bit_names;
        let status = StatusRegister {
            reg: REG08_SYSTEM_STATUS,
            prev: 0,
            bits: core::array::from_fn(|i| {
                IrqBit::new(
                    STATUS_BIT_NAMES.get(i).copied().unwrap_or("?"),
                    IrqHandler::STATUS.get(i).copied().flatten(),
                )
            }),
        };
        let fault = StatusRegister {
            reg: REG09_FAULT,
            prev: 0,
            bits: core::array::from_fn(|i| {
                let bit = u8::try_from(i).unwrap_or(0);
                IrqBit::new(
                    fault_names.get(i).copied().unwrap_or("?"),
                    IrqHandler::for_fault_bit(variant, bit),
                )
            }),
        };
        Self {
            registers: [status, fault],
        }
    }

    /// Both registers, status first.
    pub fn registers(&self) -> &[StatusRegister; 2] {
        &self.registers
    }

    /// Compare a fresh read of `reg` with the previous one, count the edges
    /// and remember the new value.
    pub fn record(&mut self, reg: u8, value: u8) -> Edges {
        let mut edges = Edges::new();
        let Some(entry) = self.registers.iter_mut().find(|r| r.reg == reg) else {
            return edges;
        };
        let changed = entry.prev ^ value;
        for (bit, info) in (0u8..).zip(entry.bits.iter_mut()) {
            let mask = 1u8.checked_shl(u32::from(bit)).unwrap_or(0);
            if changed & mask == 0 {
                continue;
            }
            let level = value & mask != 0;
            if level {
                info.high = info.high.saturating_add(1);
            } else {
                info.low = info.low.saturating_add(1);
            }
            // Never more than eight edges per register.
            let _ = edges.push(IrqEdge {
                reg,
                bit,
                name: info.name,
                level,
                value,
                handler: info.handler,
            });
        }
        entry.prev = value;
        edges
    }

    /// Sum of every edge counter.
    pub fn total_edges(&self) -> u32 {
        self.registers
            .iter()
            .flat_map(|r| r.bits.iter())
            .fold(0u32, |acc, b| acc.saturating_add(b.high).saturating_add(b.low))
    }
}
