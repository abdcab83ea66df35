//! Interrupt dispatch.
//!
//! The status registers are sampled and diffed under the irq lock; handlers
//! run afterwards so they are free to take the other locks.

use core::sync::atomic::Ordering;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;
use embedded_hal::i2c::I2c;
use heapless::Vec;

use super::Charger;
use crate::arbiter::DisableReason;
use crate::irq::{IrqEdge, IrqHandler, IRQ_STATUS_REGISTERS};
use crate::queries::ChargingStatus;
use crate::registers::{CHRG_STAT_MASK, CHRG_STAT_SHIFT};

/// Delay before the first end-of-charge sample after a charger appears.
pub const EOC_AFTER_INSERT_DELAY: Duration = Duration::from_secs(2);

impl<'a, M: RawMutex, I: I2c> Charger<'a, M, I> {
    /// Service the charger interrupt line.
    ///
    /// Before resume completes the line is masked and the interrupt is
    /// replayed by [`resume`](Self::resume).
    pub fn handle_interrupt(&self) {
        let edges = self.irq.lock(|s| {
            let mut s = s.borrow_mut();
            let mut edges: Vec<IrqEdge, 16> = Vec::new();
            if !s.resume_completed {
                s.irq_waiting = true;
                return None;
            }
            for reg in IRQ_STATUS_REGISTERS {
                let value = match self.transport.read(reg) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("irq status {} unreadable: {}", reg, e.label());
                        continue;
                    }
                };
                for edge in s.table.record(reg, value) {
                    // Two registers of eight bits fit.
                    let _ = edges.push(edge);
                }
            }
            Some(edges)
        });

        let Some(edges) = edges else {
            debug!("interrupt before resume, deferring");
            if let Some(line) = self.providers.irq_line {
                line.mask();
            }
            return;
        };

        let mut handled = false;
        let mut status_done = false;
        let mut vbus_done = false;
        for edge in &edges {
            trace!("irq {} -> {}", edge.name, edge.level);
            let Some(handler) = edge.handler else {
                continue;
            };
            // Multi-bit fields run their handler once per read.
            match handler {
                IrqHandler::ChargeStatus if status_done => continue,
                IrqHandler::ChargeStatus => status_done = true,
                IrqHandler::VbusStatus if vbus_done => continue,
                IrqHandler::VbusStatus => vbus_done = true,
                _ => {}
            }
            self.dispatch(handler, edge);
            handled = true;
        }

        if handled {
            self.tasks.heartbeat.reschedule_now();
            self.tasks.eoc.reschedule_now();
        }
    }

    fn dispatch(&self, handler: IrqHandler, edge: &IrqEdge) {
        match handler {
            IrqHandler::PowerGood => self.power_good_changed(edge.level),
            IrqHandler::ChargeStatus => {
                let bits = (edge.value & CHRG_STAT_MASK) >> CHRG_STAT_SHIFT;
                info!("charge status {}", ChargingStatus::from_bits(bits).name());
            }
            IrqHandler::SystemVoltage
            | IrqHandler::Therm
            | IrqHandler::Dpm
            | IrqHandler::VbusStatus => {
                debug!("{} = {}", edge.name, edge.level);
            }
            IrqHandler::HotCold
            | IrqHandler::BatteryFault
            | IrqHandler::ChargeFault
            | IrqHandler::BoostFault
            | IrqHandler::WatchdogFault => {
                if edge.level {
                    warn!("fault {} raised (reg {} = {})", edge.name, edge.reg, edge.value);
                } else {
                    info!("fault {} cleared", edge.name);
                }
            }
        }
    }

    fn power_good_changed(&self, present: bool) {
        info!("charger {}", if present { "inserted" } else { "removed" });
        self.usb_present.store(present, Ordering::Release);
        if let Some(usb) = self.providers.usb {
            usb.set_present(present);
        }
        if present {
            self.tasks.eoc.reschedule(EOC_AFTER_INSERT_DELAY);
            return;
        }
        self.batt_full.store(false, Ordering::Release);
        self.batt_warm_full.store(false, Ordering::Release);
        self.eoc.lock(|s| {
            let mut s = s.borrow_mut();
            s.normal.reset();
            s.warm.reset();
        });
        self.request_disabled(DisableReason::Current, false);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use crate::arbiter::DisableReason;
    use crate::device::tests::fixture;
    use crate::registers::{PG_STAT_MASK, REG08_SYSTEM_STATUS, REG09_FAULT};

    #[test]
    fn power_good_edges_track_presence() {
        let f = fixture();
        let c = f.attach();
        f.bus.set_reg(REG08_SYSTEM_STATUS, PG_STAT_MASK);
        c.handle_interrupt();
        assert!(c.usb_present());
        assert!(f.usb.present.get());

        c.set_charging_disabled(DisableReason::Current, true).unwrap();
        f.bus.set_reg(REG08_SYSTEM_STATUS, 0);
        c.handle_interrupt();
        assert!(!c.usb_present());
        assert!(!f.usb.present.get());
        assert!(!c.batt_full());
        assert!(!c.disable_mask().contains(DisableReason::Current));
    }

    #[test]
    fn fault_edges_are_counted_both_ways() {
        let f = fixture();
        let c = f.attach();
        f.bus.set_reg(REG09_FAULT, 0x80);
        c.handle_interrupt();
        c.handle_interrupt();
        f.bus.set_reg(REG09_FAULT, 0);
        c.handle_interrupt();
        let bit = c.irq.lock(|s| s.borrow().table.registers()[1].bits[7]);
        assert_eq!((bit.high, bit.low), (1, 1));
        assert!(c.tasks.heartbeat.is_armed());
    }

    #[test]
    fn unreadable_status_register_is_skipped() {
        let f = fixture();
        let c = f.attach();
        f.bus.fail_register(REG08_SYSTEM_STATUS, true);
        f.bus.set_reg(REG09_FAULT, 0x80);
        c.handle_interrupt();
        assert_eq!(c.irq.lock(|s| s.borrow().table.total_edges()), 1);
        assert!(!c.usb_present());
    }

    #[test]
    fn deferred_interrupt_masks_line() {
        let f = fixture();
        let c = f.attach();
        c.irq.lock(|s| s.borrow_mut().resume_completed = false);
        f.bus.clear_log();
        c.handle_interrupt();
        assert!(f.irq_line.is_masked());
        assert_eq!(f.bus.transaction_count(), 0);
        assert!(c.irq.lock(|s| s.borrow().irq_waiting));
    }
}
