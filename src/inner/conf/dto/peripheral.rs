use serde::{Deserialize, Serialize};

use crate::inner::conf::filter::{Evaluate, Filter};
use crate::inner::model::peripheral_key::PeripheralKey;

/// Selects the session peripheral; an absent filter matches anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) struct PeripheralSelectorDto {
    pub(crate) adapter: Option<Filter>,
    pub(crate) device_id: Option<Filter>,
    pub(crate) device_name: Option<Filter>,
}

impl PeripheralSelectorDto {
    pub(crate) fn matches_adapter(&self, adapter_id: &str) -> bool {
        self.adapter
            .as_ref()
            .map(|filter| filter.evaluate(adapter_id))
            .unwrap_or(true)
    }
}

impl Evaluate<&PeripheralKey, bool> for PeripheralSelectorDto {
    fn evaluate(&self, source: &PeripheralKey) -> bool {
        let device_id_matches = self
            .device_id
            .as_ref()
            .map(|filter| filter.evaluate(&source.peripheral_address.to_string()))
            .unwrap_or(true);

        let name_matches = match (self.device_name.as_ref(), &source.name) {
            (Some(filter), Some(name)) => filter.evaluate(name),
            (Some(_), None) => false,
            (None, _) => true,
        };

        self.matches_adapter(&source.adapter_id) && device_id_matches && name_matches
    }
}
