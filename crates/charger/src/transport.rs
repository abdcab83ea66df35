//! Serialized register access.
//!
//! Every read, write and read-modify-write holds the transport lock for its
//! whole critical section, so no two tasks ever interleave on the register
//! file. Two bench toggles short-circuit the bus: `skip_reads` makes every
//! read return zero and `skip_writes` turns writes into no-ops. Bus errors
//! are logged and handed back as [`ChargerError::Transport`]; nothing here
//! retries.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::i2c::{Error as _, I2c};

use crate::error::ChargerError;

/// Lock-guarded register file on an I2C bus.
pub struct RegisterTransport<M: RawMutex, I> {
    bus: Mutex<M, RefCell<I>>,
    address: u8,
    skip_reads: AtomicBool,
    skip_writes: AtomicBool,
}

impl<M: RawMutex, I: I2c> RegisterTransport<M, I> {
    /// Wrap `bus`, talking to the device at 7-bit `address`.
    pub fn new(bus: I, address: u8) -> Self {
        Self {
            bus: Mutex::new(RefCell::new(bus)),
            address,
            skip_reads: AtomicBool::new(false),
            skip_writes: AtomicBool::new(false),
        }
    }

    /// 7-bit device address.
    pub fn address(&self) -> u8 {
        self.address
    }

    fn bus_read(&self, bus: &mut I, reg: u8) -> Result<u8, ChargerError> {
        let mut buf = [0u8; 1];
        bus.write_read(self.address, &[reg], &mut buf)
            .map_err(|e| {
                warn!("read of register {} failed", reg);
                ChargerError::Transport { reg, kind: e.kind() }
            })?;
        let [value] = buf;
        Ok(value)
    }

    fn bus_write(&self, bus: &mut I, reg: u8, value: u8) -> Result<(), ChargerError> {
        bus.write(self.address, &[reg, value]).map_err(|e| {
            warn!("write of {} to register {} failed", value, reg);
            ChargerError::Transport { reg, kind: e.kind() }
        })
    }

    /// Read one register.
    pub fn read(&self, reg: u8) -> Result<u8, ChargerError> {
        if self.skip_reads.load(Ordering::Relaxed) {
            return Ok(0);
        }
        self.bus.lock(|cell| self.bus_read(&mut cell.borrow_mut(), reg))
    }

    /// Write one register.
    pub fn write(&self, reg: u8, value: u8) -> Result<(), ChargerError> {
        if self.skip_writes.load(Ordering::Relaxed) {
            return Ok(());
        }
        self.bus
            .lock(|cell| self.bus_write(&mut cell.borrow_mut(), reg, value))
    }

    /// Read-modify-write: replace the bits selected by `mask` with the
    /// corresponding bits of `value`, preserving everything else.
    pub fn masked_write(&self, reg: u8, mask: u8, value: u8) -> Result<(), ChargerError> {
        if self.skip_writes.load(Ordering::Relaxed) {
            return Ok(());
        }
        let skip_reads = self.skip_reads.load(Ordering::Relaxed);
        self.bus.lock(|cell| {
            let mut bus = cell.borrow_mut();
            let current = if skip_reads {
                0
            } else {
                self.bus_read(&mut bus, reg)?
            };
            let next = (current & !mask) | (value & mask);
            trace!("masked write reg {} {} -> {}", reg, current, next);
            self.bus_write(&mut bus, reg, next)
        })
    }

    /// Read `reg` and return `(value & mask) >> shift`.
    pub fn read_field(&self, reg: u8, mask: u8, shift: u8) -> Result<u8, ChargerError> {
        Ok((self.read(reg)? & mask) >> shift)
    }

    /// Write a register regardless of the skip-write toggle.
    pub(crate) fn poke(&self, reg: u8, value: u8) -> Result<(), ChargerError> {
        self.bus
            .lock(|cell| self.bus_write(&mut cell.borrow_mut(), reg, value))
    }

    /// Force every read to return zero without touching the bus.
    pub fn set_skip_reads(&self, skip: bool) {
        self.skip_reads.store(skip, Ordering::Relaxed);
    }

    /// Whether reads are being skipped.
    pub fn skip_reads(&self) -> bool {
        self.skip_reads.load(Ordering::Relaxed)
    }

    /// Turn every write and masked write into a no-op.
    pub fn set_skip_writes(&self, skip: bool) {
        self.skip_writes.store(skip, Ordering::Relaxed);
    }

    /// Whether writes are being skipped.
    pub fn skip_writes(&self) -> bool {
        self.skip_writes.load(Ordering::Relaxed)
    }
}
