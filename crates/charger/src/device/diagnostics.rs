//! Debug surface: register dump, interrupt counters, raw peek/poke and the
//! bus-suppression switches.
//!
//! Nothing here is needed for charging. Integrations expose it through
//! whatever debug channel the product has.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::I2c;
use heapless::Vec;

use super::Charger;
use crate::error::ChargerError;
use crate::irq::IrqTable;
use crate::registers::LAST_REGISTER;

/// Number of registers in a full dump.
pub const REGISTER_COUNT: usize = LAST_REGISTER as usize + 1;

/// `(register, value)` pairs from a dump.
pub type RegisterDump = Vec<(u8, u8), REGISTER_COUNT>;

impl<'a, M: RawMutex, I: I2c> Charger<'a, M, I> {
    /// Read REG00..REG0A. Unreadable registers are left out.
    pub fn register_dump(&self) -> RegisterDump {
        let mut dump = RegisterDump::new();
        for reg in 0..=LAST_REGISTER {
            match self.transport().read(reg) {
                // Capacity covers every register.
                Ok(value) => {
                    let _ = dump.push((reg, value));
                }
                Err(e) => debug!("dump: register {} unreadable: {}", reg, e.label()),
            }
        }
        dump
    }

    /// Snapshot of the interrupt table with its edge counters.
    pub fn irq_table(&self) -> IrqTable {
        self.irq.lock(|s| s.borrow().table.clone())
    }

    /// Read one register.
    pub fn peek(&self, reg: u8) -> Result<u8, ChargerError> {
        self.transport().read(reg)
    }

    /// Write one register, ignoring the write-suppression switch.
    pub fn poke(&self, reg: u8, value: u8) -> Result<(), ChargerError> {
        warn!("poke register {} = {}", reg, value);
        self.transport().poke(reg, value)
    }

    /// Make every read return 0 without touching the bus.
    pub fn set_skip_reads(&self, skip: bool) {
        info!("skip reads {}", skip);
        self.transport().set_skip_reads(skip);
    }

    /// Turn every write into a no-op.
    pub fn set_skip_writes(&self, skip: bool) {
        info!("skip writes {}", skip);
        self.transport().set_skip_writes(skip);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use crate::device::tests::{fixture, VENDOR_BQ24190};
    use crate::registers::{REG03_PRECHARGE_TERM, REG09_FAULT, REG0A_VENDOR};

    #[test]
    fn dump_lists_every_register_in_order() {
        let f = fixture();
        let c = f.attach();
        let dump = c.register_dump();
        assert_eq!(dump.len(), 11);
        assert_eq!(dump[0].0, 0);
        assert_eq!(dump[10], (REG0A_VENDOR, VENDOR_BQ24190));
    }

    #[test]
    fn dump_skips_failed_registers() {
        let f = fixture();
        let c = f.attach();
        f.bus.fail_register(REG03_PRECHARGE_TERM, true);
        let dump = c.register_dump();
        assert_eq!(dump.len(), 10);
        assert!(dump.iter().all(|(reg, _)| *reg != REG03_PRECHARGE_TERM));
    }

    #[test]
    fn poke_bypasses_skip_writes() {
        let f = fixture();
        let c = f.attach();
        c.set_skip_writes(true);
        c.transport().write(REG03_PRECHARGE_TERM, 0x55).unwrap();
        assert_ne!(f.bus.reg(REG03_PRECHARGE_TERM), 0x55);
        c.poke(REG03_PRECHARGE_TERM, 0x55).unwrap();
        assert_eq!(c.peek(REG03_PRECHARGE_TERM).unwrap(), 0x55);
    }

    #[test]
    fn skip_reads_hides_the_bus() {
        let f = fixture();
        let c = f.attach();
        c.set_skip_reads(true);
        f.bus.clear_log();
        assert_eq!(c.peek(REG0A_VENDOR).unwrap(), 0);
        assert_eq!(f.bus.transaction_count(), 0);
    }

    #[test]
    fn irq_snapshot_is_detached_from_live_table() {
        let f = fixture();
        let c = f.attach();
        let before = c.irq_table();
        f.bus.set_reg(REG09_FAULT, 0x80);
        c.handle_interrupt();
        assert_eq!(before.total_edges(), 0);
        assert_eq!(c.irq_table().total_edges(), 1);
    }
}
