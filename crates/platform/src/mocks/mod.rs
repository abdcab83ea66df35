//! Mock implementations for testing
//!
//! This module provides mock implementations of the platform traits and an
//! I2C register-file device for use in unit and integration tests.

#![cfg(any(test, feature = "std"))]

extern crate std;

use core::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::power::{
    BatteryMetrics, InterruptLine, MetricError, PowerControl, SupplyNotifier, UsbSupply,
};

/// Number of registers modelled by [`MockRegisterBus`].
pub const MOCK_REGISTER_COUNT: usize = 16;

/// Error returned by [`MockRegisterBus`] when a failure is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockBusError(pub ErrorKind);

impl embedded_hal::i2c::Error for MockBusError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[derive(Debug)]
struct BusState {
    regs: [u8; MOCK_REGISTER_COUNT],
    writes: Vec<(u8, u8)>,
    reads: Vec<u8>,
    transactions: usize,
    failing: u16,
    fail_all: bool,
    last_address: Option<u8>,
}

/// Register-file I2C device with a shared handle.
///
/// Cloning yields a second handle onto the same register file, so a test can
/// keep one clone after moving the other into the driver under test.
/// A write of `[reg, value]` stores `value`; a write of `[reg]` followed by a
/// read returns consecutive registers starting at `reg`.
#[derive(Debug, Clone)]
pub struct MockRegisterBus {
    inner: Rc<RefCell<BusState>>,
}

impl Default for MockRegisterBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegisterBus {
    /// Create a bus with every register cleared.
    pub fn new() -> Self {
        Self::with_registers([0; MOCK_REGISTER_COUNT])
    }

    /// Create a bus with a preset register file.
    pub fn with_registers(regs: [u8; MOCK_REGISTER_COUNT]) -> Self {
        Self {
            inner: Rc::new(RefCell::new(BusState {
                regs,
                writes: Vec::new(),
                reads: Vec::new(),
                transactions: 0,
                failing: 0,
                fail_all: false,
                last_address: None,
            })),
        }
    }

    /// Current register value (0 for out-of-range addresses).
    pub fn reg(&self, addr: u8) -> u8 {
        self.inner
            .borrow()
            .regs
            .get(usize::from(addr))
            .copied()
            .unwrap_or(0)
    }

    /// Overwrite a register without logging a write.
    pub fn set_reg(&self, addr: u8, value: u8) {
        if let Some(slot) = self.inner.borrow_mut().regs.get_mut(usize::from(addr)) {
            *slot = value;
        }
    }

    /// Every `(register, value)` write seen since the last [`clear_log`](Self::clear_log).
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.inner.borrow().writes.clone()
    }

    /// Writes that targeted `addr`, oldest first.
    pub fn writes_to(&self, addr: u8) -> Vec<u8> {
        self.inner
            .borrow()
            .writes
            .iter()
            .filter(|(reg, _)| *reg == addr)
            .map(|(_, value)| *value)
            .collect()
    }

    /// Start registers of every read seen since the last clear.
    pub fn reads(&self) -> Vec<u8> {
        self.inner.borrow().reads.clone()
    }

    /// Total transactions attempted, including failed ones.
    pub fn transaction_count(&self) -> usize {
        self.inner.borrow().transactions
    }

    /// 7-bit address of the most recent transaction.
    pub fn last_address(&self) -> Option<u8> {
        self.inner.borrow().last_address
    }

    /// Forget logged reads, writes and the transaction count.
    pub fn clear_log(&self) {
        let mut state = self.inner.borrow_mut();
        state.writes.clear();
        state.reads.clear();
        state.transactions = 0;
    }

    /// Make every transaction that addresses `addr` fail.
    pub fn fail_register(&self, addr: u8, fail: bool) {
        let bit = 1u16.checked_shl(u32::from(addr)).unwrap_or(0);
        let mut state = self.inner.borrow_mut();
        if fail {
            state.failing |= bit;
        } else {
            state.failing &= !bit;
        }
    }

    /// Make every transaction fail.
    pub fn fail_all(&self, fail: bool) {
        self.inner.borrow_mut().fail_all = fail;
    }
}

impl ErrorType for MockRegisterBus {
    type Error = MockBusError;
}

impl I2c for MockRegisterBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.inner.borrow_mut();
        state.transactions = state.transactions.saturating_add(1);
        state.last_address = Some(address);

        let target = operations.iter().find_map(|op| match op {
            Operation::Write(data) => data.first().copied(),
            Operation::Read(_) => None,
        });
        if let Some(reg) = target {
            let bit = 1u16.checked_shl(u32::from(reg)).unwrap_or(0);
            if state.fail_all || state.failing & bit != 0 {
                return Err(MockBusError(ErrorKind::NoAcknowledge(
                    NoAcknowledgeSource::Data,
                )));
            }
        }

        let mut pointer = usize::from(target.unwrap_or(0));
        for op in operations.iter_mut() {
            match op {
                Operation::Write(data) => {
                    if let Some((&reg, values)) = data.split_first() {
                        pointer = usize::from(reg);
                        for &value in values {
                            if let Some(slot) = state.regs.get_mut(pointer) {
                                *slot = value;
                            }
                            state.writes.push((reg, value));
                            pointer = pointer.saturating_add(1);
                        }
                    }
                }
                Operation::Read(buf) => {
                    if let Ok(start) = u8::try_from(pointer) {
                        state.reads.push(start);
                    }
                    for byte in buf.iter_mut() {
                        *byte = state.regs.get(pointer).copied().unwrap_or(0);
                        pointer = pointer.saturating_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Scripted fuel gauge.
#[derive(Debug)]
pub struct MockBattery {
    /// Pack detected.
    pub present: Cell<bool>,
    /// State of charge, %.
    pub capacity: Cell<u8>,
    /// Terminal voltage, µV.
    pub voltage_uv: Cell<i32>,
    /// Battery current, µA (negative while charging).
    pub current_ua: Cell<i32>,
    /// Temperature, 0.1 °C.
    pub temperature: Cell<i16>,
    /// Gauge flag word; `None` reports `NotSupported`.
    pub flags: Cell<Option<u16>>,
    /// Learned full-charge capacity; `None` reports `NotSupported`.
    pub charge_full_uah: Cell<Option<i32>>,
    /// When set, every required metric reports `Unavailable`.
    pub failing: Cell<bool>,
}

impl Default for MockBattery {
    fn default() -> Self {
        Self {
            present: Cell::new(true),
            capacity: Cell::new(50),
            voltage_uv: Cell::new(3_800_000),
            current_ua: Cell::new(0),
            temperature: Cell::new(250),
            flags: Cell::new(None),
            charge_full_uah: Cell::new(None),
            failing: Cell::new(false),
        }
    }
}

impl MockBattery {
    fn check(&self) -> Result<(), MetricError> {
        if self.failing.get() {
            Err(MetricError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl BatteryMetrics for MockBattery {
    fn present(&self) -> Result<bool, MetricError> {
        self.check()?;
        Ok(self.present.get())
    }

    fn capacity_percent(&self) -> Result<u8, MetricError> {
        self.check()?;
        Ok(self.capacity.get())
    }

    fn voltage_uv(&self) -> Result<i32, MetricError> {
        self.check()?;
        Ok(self.voltage_uv.get())
    }

    fn current_ua(&self) -> Result<i32, MetricError> {
        self.check()?;
        Ok(self.current_ua.get())
    }

    fn temperature_decidegc(&self) -> Result<i16, MetricError> {
        self.check()?;
        Ok(self.temperature.get())
    }

    fn charge_full_uah(&self) -> Result<i32, MetricError> {
        self.charge_full_uah.get().ok_or(MetricError::NotSupported)
    }

    fn flags(&self) -> Result<u16, MetricError> {
        self.flags.get().ok_or(MetricError::NotSupported)
    }
}

/// Scripted USB power path that records what the engine publishes.
#[derive(Debug, Default)]
pub struct MockUsbSupply {
    /// Negotiated current ceiling, µA.
    pub current_max_ua: Cell<i32>,
    /// Online state (updated by `set_online`).
    pub online: Cell<bool>,
    /// Last published presence.
    pub present: Cell<bool>,
    /// Number of `set_online` calls.
    pub set_online_calls: Cell<usize>,
}

impl UsbSupply for MockUsbSupply {
    fn current_max_ua(&self) -> Result<i32, MetricError> {
        Ok(self.current_max_ua.get())
    }

    fn online(&self) -> Result<bool, MetricError> {
        Ok(self.online.get())
    }

    fn set_online(&self, online: bool) {
        self.online.set(online);
        self.set_online_calls
            .set(self.set_online_calls.get().saturating_add(1));
    }

    fn set_present(&self, present: bool) {
        self.present.set(present);
    }
}

/// Counts property-changed notifications.
#[derive(Debug, Default)]
pub struct MockNotifier {
    count: Cell<usize>,
}

impl MockNotifier {
    /// Notifications received so far.
    pub fn count(&self) -> usize {
        self.count.get()
    }

    /// Reset the counter to zero.
    pub fn reset(&self) {
        self.count.set(0);
    }
}

impl SupplyNotifier for MockNotifier {
    fn changed(&self) {
        self.count.set(self.count.get().saturating_add(1));
    }
}

/// Records power-off requests instead of cutting power.
#[derive(Debug, Default)]
pub struct MockPowerControl {
    requests: Cell<usize>,
}

impl MockPowerControl {
    /// Power-off requests received so far.
    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

impl PowerControl for MockPowerControl {
    fn power_off(&self) {
        self.requests.set(self.requests.get().saturating_add(1));
    }
}

/// Interrupt line that tracks its mask state.
#[derive(Debug, Default)]
pub struct MockIrqLine {
    masked: Cell<bool>,
    unmask_count: Cell<usize>,
}

impl MockIrqLine {
    /// Whether the line is currently masked.
    pub fn is_masked(&self) -> bool {
        self.masked.get()
    }

    /// Number of unmask calls.
    pub fn unmask_count(&self) -> usize {
        self.unmask_count.get()
    }
}

impl InterruptLine for MockIrqLine {
    fn mask(&self) {
        self.masked.set(true);
    }

    fn unmask(&self) {
        self.masked.set(false);
        self.unmask_count
            .set(self.unmask_count.get().saturating_add(1));
    }
}
