use std::fmt::Display;

use btleplug::api::{BDAddr, Peripheral as _};
use btleplug::platform::Peripheral;

use crate::inner::error::QueueResult;

/// What a peripheral is matched on: adapter id, address and advertised name.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) struct PeripheralKey {
    pub(crate) adapter_id: String,
    pub(crate) peripheral_address: BDAddr,
    pub(crate) name: Option<String>,
}

impl Display for PeripheralKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.name.as_deref().unwrap_or("Unknown");
        write!(f, "{} {name}[{}]", self.adapter_id, self.peripheral_address)
    }
}

impl PeripheralKey {
    pub(crate) async fn read(adapter_id: &str, peripheral: &Peripheral) -> QueueResult<Self> {
        let name = peripheral
            .properties()
            .await?
            .and_then(|properties| properties.local_name);

        Ok(Self {
            adapter_id: adapter_id.to_string(),
            peripheral_address: peripheral.address(),
            name,
        })
    }
}
