pub(crate) mod adapter_info;
pub(crate) mod battery_level;
pub(crate) mod peripheral_key;
pub(crate) mod queue_event;
pub(crate) mod request;
pub(crate) mod resolved_request;
pub(crate) mod service_characteristic_key;
