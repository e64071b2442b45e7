use std::sync::Arc;

use btleplug::api::{Characteristic, Descriptor, WriteType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inner::model::request::Request;
use crate::inner::resolver::ServiceCatalog;
use crate::inner::scheduler::RequestScheduler;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) enum WriteTypeDto {
    WithResponse,
    WithoutResponse,
}

impl From<WriteTypeDto> for WriteType {
    fn from(value: WriteTypeDto) -> Self {
        match value {
            WriteTypeDto::WithResponse => WriteType::WithResponse,
            WriteTypeDto::WithoutResponse => WriteType::WithoutResponse,
        }
    }
}

/// One entry of a request plan. Targets are addressed by UUID and looked up in
/// the discovered services when the plan is submitted. Writes without `offset`
/// and `length` send the whole `value`.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) enum RequestDto {
    Read {
        service: Uuid,
        characteristic: Uuid,
    },
    Write {
        service: Uuid,
        characteristic: Uuid,
        value: Vec<u8>,
        offset: Option<usize>,
        length: Option<usize>,
        write_type: Option<WriteTypeDto>,
    },
    ReadDescriptor {
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
    },
    WriteDescriptor {
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: Vec<u8>,
        offset: Option<usize>,
        length: Option<usize>,
    },
    EnableNotifications {
        service: Uuid,
        characteristic: Uuid,
    },
    EnableIndications {
        service: Uuid,
        characteristic: Uuid,
    },
    ReadBatteryLevel,
    EnableBatteryLevelNotifications,
    DisableBatteryLevelNotifications,
    EnableServiceChangedIndications,
}

impl RequestDto {
    /// Hands the entry to `scheduler`, going through its shorthands where one
    /// exists; returns what `enqueue` returns.
    pub(crate) async fn submit(
        &self,
        scheduler: &Arc<RequestScheduler>,
        catalog: &(dyn ServiceCatalog + Sync),
    ) -> bool {
        match self {
            Self::Read { service, characteristic } => {
                let characteristic = find_characteristic(catalog, *service, *characteristic);
                scheduler.read_characteristic(characteristic).await
            }
            Self::Write {
                service,
                characteristic,
                value,
                offset: None,
                length: None,
                write_type: None,
            } => {
                let characteristic = find_characteristic(catalog, *service, *characteristic);
                scheduler.write_characteristic(characteristic, value).await
            }
            Self::ReadDescriptor {
                service,
                characteristic,
                descriptor,
            } => {
                let descriptor = find_descriptor(catalog, *service, *characteristic, *descriptor);
                scheduler.read_descriptor(descriptor).await
            }
            Self::WriteDescriptor {
                service,
                characteristic,
                descriptor,
                value,
                offset: None,
                length: None,
            } => {
                let descriptor = find_descriptor(catalog, *service, *characteristic, *descriptor);
                scheduler.write_descriptor(descriptor, value).await
            }
            Self::EnableNotifications { service, characteristic } => {
                let characteristic = find_characteristic(catalog, *service, *characteristic);
                scheduler.enable_notifications(characteristic).await
            }
            Self::EnableIndications { service, characteristic } => {
                let characteristic = find_characteristic(catalog, *service, *characteristic);
                scheduler.enable_indications(characteristic).await
            }
            Self::ReadBatteryLevel => scheduler.read_battery_level().await,
            Self::EnableBatteryLevelNotifications => scheduler.set_battery_notifications(true).await,
            Self::DisableBatteryLevelNotifications => scheduler.set_battery_notifications(false).await,
            _ => {
                let request = self.to_request(catalog);
                scheduler.enqueue(request).await
            }
        }
    }

    /// Builds the request; a target missing from `catalog` stays absent and the
    /// request fails once it is dispatched.
    pub(crate) fn to_request(&self, catalog: &dyn ServiceCatalog) -> Request {
        match self {
            Self::Read { service, characteristic } => Request::read(find_characteristic(catalog, *service, *characteristic)),
            Self::Write {
                service,
                characteristic,
                value,
                offset,
                length,
                write_type,
            } => {
                let characteristic = find_characteristic(catalog, *service, *characteristic);
                match (offset, length, write_type) {
                    (None, None, None) => Request::write(characteristic, value),
                    (None, None, Some(write_type)) => Request::write_with_type(characteristic, value, (*write_type).into()),
                    (offset, length, None) => Request::write_range(
                        characteristic,
                        value,
                        offset.unwrap_or(0),
                        length.unwrap_or(value.len()),
                    ),
                    (offset, length, Some(write_type)) => Request::write_range_with_type(
                        characteristic,
                        value,
                        offset.unwrap_or(0),
                        length.unwrap_or(value.len()),
                        (*write_type).into(),
                    ),
                }
            }
            Self::ReadDescriptor {
                service,
                characteristic,
                descriptor,
            } => Request::read_descriptor(find_descriptor(catalog, *service, *characteristic, *descriptor)),
            Self::WriteDescriptor {
                service,
                characteristic,
                descriptor,
                value,
                offset,
                length,
            } => {
                let descriptor = find_descriptor(catalog, *service, *characteristic, *descriptor);
                match (offset, length) {
                    (None, None) => Request::write_descriptor(descriptor, value),
                    (offset, length) => Request::write_descriptor_range(
                        descriptor,
                        value,
                        offset.unwrap_or(0),
                        length.unwrap_or(value.len()),
                    ),
                }
            }
            Self::EnableNotifications { service, characteristic } => {
                Request::enable_notifications(find_characteristic(catalog, *service, *characteristic))
            }
            Self::EnableIndications { service, characteristic } => {
                Request::enable_indications(find_characteristic(catalog, *service, *characteristic))
            }
            Self::ReadBatteryLevel => Request::read_battery_level(),
            Self::EnableBatteryLevelNotifications => Request::enable_battery_level_notifications(),
            Self::DisableBatteryLevelNotifications => Request::disable_battery_level_notifications(),
            Self::EnableServiceChangedIndications => Request::enable_service_changed_indications(),
        }
    }
}

fn find_characteristic(catalog: &dyn ServiceCatalog, service: Uuid, characteristic: Uuid) -> Option<Characteristic> {
    let service = catalog.find_service(service)?;
    catalog.find_characteristic(characteristic, &service)
}

fn find_descriptor(
    catalog: &dyn ServiceCatalog,
    service: Uuid,
    characteristic: Uuid,
    descriptor: Uuid,
) -> Option<Descriptor> {
    find_characteristic(catalog, service, characteristic)?
        .descriptors
        .into_iter()
        .find(|candidate| candidate.uuid == descriptor)
}
