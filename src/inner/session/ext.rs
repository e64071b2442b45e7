use btleplug::api::CentralEvent;
use btleplug::platform::PeripheralId;

pub(super) trait CentralEventExt {
    fn get_peripheral_id(&self) -> Option<&PeripheralId>;
}

impl CentralEventExt for CentralEvent {
    fn get_peripheral_id(&self) -> Option<&PeripheralId> {
        match self {
            CentralEvent::DeviceDiscovered(id)
            | CentralEvent::DeviceUpdated(id)
            | CentralEvent::DeviceConnected(id)
            | CentralEvent::DeviceDisconnected(id)
            | CentralEvent::ManufacturerDataAdvertisement { id, .. }
            | CentralEvent::ServiceDataAdvertisement { id, .. }
            | CentralEvent::ServicesAdvertisement { id, .. } => Some(id),
            _ => None,
        }
    }
}
