//! Battery property surface.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::I2c;

use super::Charger;
use crate::arbiter::DisableReason;
use crate::error::ChargerError;
use crate::properties::{BatteryProperty, PropertyValue, Technology};
use crate::queries::{BatteryHealth, ChargeType, SupplyStatus};

impl<'a, M: RawMutex, I: I2c> Charger<'a, M, I> {
    /// Read one battery property.
    pub fn get_property(&self, property: BatteryProperty) -> PropertyValue {
        let metrics = self.metrics();
        match property {
            BatteryProperty::ChargingEnabled => {
                PropertyValue::Bool(!self.disable_mask().contains(DisableReason::User))
            }
            BatteryProperty::Status => {
                let charger = self.transport.charger_present().unwrap_or(false);
                PropertyValue::Status(SupplyStatus::derive(
                    self.transport.charging_status(),
                    charger,
                    metrics.capacity_percent(),
                    self.batt_full(),
                ))
            }
            BatteryProperty::Present => PropertyValue::Bool(self.battery_present()),
            BatteryProperty::ChargeType => {
                PropertyValue::ChargeType(ChargeType::from_status(self.transport.charging_status()))
            }
            BatteryProperty::Capacity => PropertyValue::Int(i32::from(self.reported_capacity())),
            BatteryProperty::Health => PropertyValue::Health(BatteryHealth::from_zone(self.zone())),
            BatteryProperty::Technology => PropertyValue::Technology(Technology::LiIon),
            BatteryProperty::VoltageNow => PropertyValue::Int(metrics.voltage_uv()),
            BatteryProperty::CurrentNow => PropertyValue::Int(metrics.current_ua()),
            BatteryProperty::Temperature => {
                PropertyValue::Int(i32::from(metrics.temperature_decidegc()))
            }
            BatteryProperty::ChargeFull => PropertyValue::Int(metrics.charge_full_uah()),
            BatteryProperty::ChargeFullDesign => {
                PropertyValue::Int(metrics.charge_full_design_uah())
            }
            BatteryProperty::ThermalLevel => {
                PropertyValue::Int(i32::try_from(self.thermal_level()).unwrap_or(i32::MAX))
            }
            BatteryProperty::Online => PropertyValue::Bool(self.usb_present()),
        }
    }

    /// Write one battery property. Observers are notified on success.
    pub fn set_property(
        &self,
        property: BatteryProperty,
        value: PropertyValue,
    ) -> Result<(), ChargerError> {
        match property {
            BatteryProperty::ChargingEnabled => {
                let enabled = value.as_bool().ok_or(ChargerError::NotSupported("value type"))?;
                self.set_charging_disabled(DisableReason::User, !enabled)?;
            }
            BatteryProperty::Capacity => {
                let pct = value.as_int().ok_or(ChargerError::NotSupported("value type"))?;
                // Negative clears the override.
                let fake = (pct >= 0).then(|| u8::try_from(pct.min(100)).unwrap_or(100));
                info!("capacity override {}", pct);
                self.soc.lock(|s| s.borrow_mut().fake_soc = fake);
            }
            BatteryProperty::ThermalLevel => {
                let level = value.as_int().ok_or(ChargerError::NotSupported("value type"))?;
                self.set_thermal_level(level)?;
            }
            _ => return Err(ChargerError::ReadOnly),
        }
        self.notify();
        Ok(())
    }

    /// Whether `property` accepts writes.
    pub fn is_writeable(&self, property: BatteryProperty) -> bool {
        property.is_writeable()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::device::tests::fixture;
    use crate::registers::{
        CHG_CONFIG_MASK, PG_STAT_MASK, REG01_POWER_ON_CONFIG, REG08_SYSTEM_STATUS,
    };

    #[test]
    fn charging_enabled_round_trip() {
        let f = fixture();
        let c = f.attach();
        f.notifier.reset();
        c.set_property(BatteryProperty::ChargingEnabled, false.into())
            .unwrap();
        assert_eq!(
            c.get_property(BatteryProperty::ChargingEnabled),
            PropertyValue::Bool(false)
        );
        assert_eq!(f.bus.reg(REG01_POWER_ON_CONFIG) & CHG_CONFIG_MASK, 0);
        assert_eq!(f.notifier.count(), 1);

        c.set_property(BatteryProperty::ChargingEnabled, 1.into())
            .unwrap();
        assert_eq!(
            c.get_property(BatteryProperty::ChargingEnabled),
            PropertyValue::Bool(true)
        );
    }

    #[test]
    fn capacity_override_clamps_and_clears() {
        let f = fixture();
        let c = f.attach();
        c.set_property(BatteryProperty::Capacity, 150.into()).unwrap();
        assert_eq!(c.get_property(BatteryProperty::Capacity), PropertyValue::Int(100));
        c.set_property(BatteryProperty::Capacity, (-1).into()).unwrap();
        assert_eq!(c.get_property(BatteryProperty::Capacity), PropertyValue::Int(50));
    }

    #[test]
    fn read_only_properties_reject_writes() {
        let f = fixture();
        let c = f.attach();
        f.notifier.reset();
        assert_eq!(
            c.set_property(BatteryProperty::VoltageNow, 1.into()),
            Err(ChargerError::ReadOnly)
        );
        assert_eq!(f.notifier.count(), 0);
        assert!(!c.is_writeable(BatteryProperty::Online));
        assert!(c.is_writeable(BatteryProperty::ThermalLevel));
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let f = fixture();
        let c = f.attach();
        assert_eq!(
            c.set_property(
                BatteryProperty::Capacity,
                PropertyValue::Technology(Technology::LiIon)
            ),
            Err(ChargerError::NotSupported("value type"))
        );
    }

    #[test]
    fn status_and_online_follow_charger() {
        let f = fixture();
        f.bus.set_reg(REG08_SYSTEM_STATUS, PG_STAT_MASK | 0b0010_0000);
        let c = f.attach();
        assert_eq!(
            c.get_property(BatteryProperty::Status),
            PropertyValue::Status(SupplyStatus::Charging)
        );
        assert_eq!(c.get_property(BatteryProperty::Online), PropertyValue::Bool(true));
        assert_eq!(
            c.get_property(BatteryProperty::ChargeType),
            PropertyValue::ChargeType(ChargeType::Fast)
        );
        assert_eq!(c.get_property(BatteryProperty::Temperature), PropertyValue::Int(250));
        assert_eq!(
            c.get_property(BatteryProperty::Health),
            PropertyValue::Health(BatteryHealth::Good)
        );
    }
}
