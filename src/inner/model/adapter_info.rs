use anyhow::Context;
use std::fmt::{Display, Formatter};

/// Parsed form of `Central::adapter_info`, e.g. `hci0 (usb:v1D6Bp0246d0540)`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct AdapterInfo {
    pub(crate) id: String,
    pub(crate) modalias: String,
}

impl Display for AdapterInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.id, self.modalias)
    }
}

impl TryFrom<String> for AdapterInfo {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut pair = value.split_whitespace();
        let id = pair.next().context("No adapter id")?.to_string();
        let modalias = pair.next().unwrap_or_default().trim();
        let modalias = modalias.strip_prefix('(').unwrap_or(modalias);
        let modalias = modalias.strip_suffix(')').unwrap_or(modalias);
        Ok(Self {
            id,
            modalias: modalias.to_string(),
        })
    }
}
