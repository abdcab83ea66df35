//! Shared rig for the device-level integration tests.

#![allow(dead_code)]

use charger::registers::{REG08_SYSTEM_STATUS, REG0A_VENDOR};
use charger::{Charger, ChargerConfig, Providers, DEFAULT_I2C_ADDR};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use platform::mocks::{
    MockBattery, MockIrqLine, MockNotifier, MockPowerControl, MockRegisterBus, MockUsbSupply,
};

/// REG0A of a bq24190: PN 0b100, DEV_REG 0b11.
pub const BQ24190_VENDOR: u8 = 0b0010_0011;
/// REG0A of a bq24296: DEV_REG 0b00.
pub const BQ24296_VENDOR: u8 = 0b0010_0000;

/// REG08 with power good and CHRG_STAT = fast charge.
pub const FAST_CHARGING: u8 = 0b0010_0100;

pub type TestCharger<'a> = Charger<'a, NoopRawMutex, MockRegisterBus>;

/// One charger IC plus every host service, all scripted.
pub struct Rig {
    pub bus: MockRegisterBus,
    pub battery: MockBattery,
    pub usb: MockUsbSupply,
    pub notifier: MockNotifier,
    pub power: MockPowerControl,
    pub irq_line: MockIrqLine,
    pub config: ChargerConfig,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_vendor(BQ24190_VENDOR)
    }

    pub fn with_vendor(vendor: u8) -> Self {
        let bus = MockRegisterBus::new();
        bus.set_reg(REG0A_VENDOR, vendor);
        Self {
            bus,
            battery: MockBattery::default(),
            usb: MockUsbSupply::default(),
            notifier: MockNotifier::default(),
            power: MockPowerControl::default(),
            irq_line: MockIrqLine::default(),
            config: ChargerConfig::default(),
        }
    }

    pub fn attach(&self) -> TestCharger<'_> {
        let providers = Providers {
            battery: Some(&self.battery),
            secondary: None,
            usb: Some(&self.usb),
            notifier: Some(&self.notifier),
            power: Some(&self.power),
            irq_line: Some(&self.irq_line),
        };
        Charger::attach(
            self.bus.clone(),
            DEFAULT_I2C_ADDR,
            self.config.clone(),
            providers,
        )
        .unwrap()
    }

    /// Raise the interrupt with REG08 showing `status`.
    pub fn set_status(&self, device: &TestCharger<'_>, status: u8) {
        self.bus.set_reg(REG08_SYSTEM_STATUS, status);
        device.handle_interrupt();
    }
}
