use std::collections::BTreeSet;
use std::sync::Arc;

use btleplug::api::{CharPropFlags, Characteristic, Peripheral as _, Service};
use btleplug::platform::Peripheral;
use uuid::Uuid;

use crate::inner::model::request::{ConcreteOperation, Operation, Request, VirtualOperation};

pub(crate) const BATTERY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);
pub(crate) const BATTERY_LEVEL_UUID: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);
pub(crate) const GENERIC_ATTRIBUTE_SERVICE_UUID: Uuid = Uuid::from_u128(0x00001801_0000_1000_8000_00805f9b34fb);
pub(crate) const SERVICE_CHANGED_UUID: Uuid = Uuid::from_u128(0x00002a05_0000_1000_8000_00805f9b34fb);

/// Read-only view of the services discovered on the connected peripheral.
pub(crate) trait ServiceCatalog {
    fn find_service(&self, uuid: Uuid) -> Option<Service>;

    fn find_characteristic(&self, uuid: Uuid, service: &Service) -> Option<Characteristic> {
        service
            .characteristics
            .iter()
            .find(|characteristic| characteristic.uuid == uuid)
            .cloned()
    }
}

impl ServiceCatalog for Vec<Service> {
    fn find_service(&self, uuid: Uuid) -> Option<Service> {
        self.iter().find(|service| service.uuid == uuid).cloned()
    }
}

/// Iterates in `Ord` order, so among services sharing a UUID the lowest-sorting
/// one is found, not the one the peripheral listed first.
impl ServiceCatalog for BTreeSet<Service> {
    fn find_service(&self, uuid: Uuid) -> Option<Service> {
        self.iter().find(|service| service.uuid == uuid).cloned()
    }
}

/// btleplug keeps discovered services in a `BTreeSet`; see the impl above for
/// which duplicate wins.
impl ServiceCatalog for Peripheral {
    fn find_service(&self, uuid: Uuid) -> Option<Service> {
        self.services().find_service(uuid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum SkipReason {
    #[error("service {0} not found")]
    ServiceNotFound(Uuid),

    #[error("characteristic {characteristic} not found in service {service}")]
    CharacteristicNotFound { service: Uuid, characteristic: Uuid },

    #[error("characteristic {characteristic} lacks {required:?}")]
    MissingProperty {
        characteristic: Uuid,
        required: CharPropFlags,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    Ready(ConcreteOperation),
    Skip(SkipReason),
}

/// Binds virtual requests to a concrete characteristic. The catalog is queried on
/// every call, so a rediscovery is picked up without any invalidation.
pub(crate) struct Resolver {
    catalog: Arc<dyn ServiceCatalog + Send + Sync>,
}

impl Resolver {
    pub(crate) fn new(catalog: Arc<dyn ServiceCatalog + Send + Sync>) -> Self {
        Self { catalog }
    }

    pub(crate) fn resolve(&self, request: &Request) -> Resolution {
        let operation = match request.operation() {
            Operation::Concrete(operation) => return Resolution::Ready(operation.clone()),
            Operation::Virtual(operation) => *operation,
        };

        let resolved = match operation {
            VirtualOperation::ReadBatteryLevel => self
                .battery_level()
                .map(|characteristic| ConcreteOperation::Read {
                    characteristic: Some(characteristic),
                }),
            VirtualOperation::EnableBatteryLevelNotifications => self
                .battery_level()
                .and_then(|characteristic| require(characteristic, CharPropFlags::NOTIFY))
                .map(|characteristic| ConcreteOperation::EnableNotifications {
                    characteristic: Some(characteristic),
                }),
            VirtualOperation::DisableBatteryLevelNotifications => self
                .battery_level()
                .and_then(|characteristic| require(characteristic, CharPropFlags::NOTIFY))
                .map(|characteristic| ConcreteOperation::DisableNotifications { characteristic }),
            VirtualOperation::EnableServiceChangedIndications => self
                .lookup(GENERIC_ATTRIBUTE_SERVICE_UUID, SERVICE_CHANGED_UUID)
                .and_then(|characteristic| require(characteristic, CharPropFlags::INDICATE))
                .map(|characteristic| ConcreteOperation::EnableIndications {
                    characteristic: Some(characteristic),
                }),
        };

        match resolved {
            Ok(operation) => Resolution::Ready(operation),
            Err(reason) => Resolution::Skip(reason),
        }
    }

    fn battery_level(&self) -> Result<Characteristic, SkipReason> {
        self.lookup(BATTERY_SERVICE_UUID, BATTERY_LEVEL_UUID)
    }

    fn lookup(&self, service_uuid: Uuid, characteristic_uuid: Uuid) -> Result<Characteristic, SkipReason> {
        let service = self
            .catalog
            .find_service(service_uuid)
            .ok_or(SkipReason::ServiceNotFound(service_uuid))?;
        self.catalog
            .find_characteristic(characteristic_uuid, &service)
            .ok_or(SkipReason::CharacteristicNotFound {
                service: service_uuid,
                characteristic: characteristic_uuid,
            })
    }
}

fn require(characteristic: Characteristic, required: CharPropFlags) -> Result<Characteristic, SkipReason> {
    if characteristic.properties.contains(required) {
        Ok(characteristic)
    } else {
        Err(SkipReason::MissingProperty {
            characteristic: characteristic.uuid,
            required,
        })
    }
}
