use btleplug::api::{Characteristic, Descriptor};
use std::fmt::{Display, Formatter};

use uuid::Uuid;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub(crate) struct ServiceCharacteristicKey {
    pub(crate) service_uuid: Uuid,
    pub(crate) characteristic_uuid: Uuid,
}

impl From<&Characteristic> for ServiceCharacteristicKey {
    fn from(value: &Characteristic) -> Self {
        Self {
            service_uuid: value.service_uuid,
            characteristic_uuid: value.uuid,
        }
    }
}

impl From<&Descriptor> for ServiceCharacteristicKey {
    fn from(value: &Descriptor) -> Self {
        Self {
            service_uuid: value.service_uuid,
            characteristic_uuid: value.characteristic_uuid,
        }
    }
}

impl Display for ServiceCharacteristicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.service_uuid, self.characteristic_uuid)
    }
}

/// Renders a possibly absent characteristic the way logs and events expect it.
pub(crate) fn describe_characteristic(characteristic: Option<&Characteristic>) -> String {
    characteristic
        .map(|characteristic| ServiceCharacteristicKey::from(characteristic).to_string())
        .unwrap_or_else(|| "<none>".to_string())
}

pub(crate) fn describe_descriptor(descriptor: Option<&Descriptor>) -> String {
    descriptor
        .map(|descriptor| format!("{}/{}", ServiceCharacteristicKey::from(descriptor), descriptor.uuid))
        .unwrap_or_else(|| "<none>".to_string())
}
