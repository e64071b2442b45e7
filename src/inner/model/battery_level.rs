use std::fmt::{Display, Formatter};

use bounded_integer::BoundedU8;

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub(crate) enum BatteryLevelError {
    #[error("Battery level value is empty")]
    Empty,

    #[error("Battery level {0} is out of range")]
    OutOfRange(u8),
}

/// Battery Level characteristic value, percent.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct BatteryLevel(BoundedU8<0, 100>);

impl BatteryLevel {
    pub(crate) fn percent(&self) -> u8 {
        self.0.get()
    }
}

impl TryFrom<&[u8]> for BatteryLevel {
    type Error = BatteryLevelError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let first = *value.first().ok_or(BatteryLevelError::Empty)?;
        BoundedU8::new(first)
            .map(Self)
            .ok_or(BatteryLevelError::OutOfRange(first))
    }
}

impl Display for BatteryLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.percent())
    }
}
