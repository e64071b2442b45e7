use std::fmt::{Display, Formatter};
use std::sync::Arc;

use btleplug::api::{CharPropFlags, Characteristic, Descriptor, WriteType};

use crate::inner::model::service_characteristic_key::{describe_characteristic, describe_descriptor};

/// Immutable bytes owned by a single request.
pub(crate) type Payload = Arc<[u8]>;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, strum_macros::Display, strum_macros::EnumIter)]
pub(crate) enum RequestKind {
    Write,
    Read,
    WriteDescriptor,
    ReadDescriptor,
    EnableNotifications,
    EnableIndications,
    ReadBatteryLevel,
    EnableBatteryLevelNotifications,
    DisableBatteryLevelNotifications,
    EnableServiceChangedIndications,
}

impl RequestKind {
    pub(crate) fn is_virtual(&self) -> bool {
        matches!(
            self,
            Self::ReadBatteryLevel
                | Self::EnableBatteryLevelNotifications
                | Self::DisableBatteryLevelNotifications
                | Self::EnableServiceChangedIndications
        )
    }
}

/// An operation bound to a concrete characteristic or descriptor.
///
/// Targets stay optional: an absent target is accepted here and rejected by the
/// executor when the request is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConcreteOperation {
    Write {
        characteristic: Option<Characteristic>,
        payload: Option<Payload>,
        write_type: WriteType,
    },
    Read {
        characteristic: Option<Characteristic>,
    },
    WriteDescriptor {
        descriptor: Option<Descriptor>,
        payload: Option<Payload>,
    },
    ReadDescriptor {
        descriptor: Option<Descriptor>,
    },
    EnableNotifications {
        characteristic: Option<Characteristic>,
    },
    EnableIndications {
        characteristic: Option<Characteristic>,
    },
    /// Only produced by resolving [`VirtualOperation::DisableBatteryLevelNotifications`].
    DisableNotifications {
        characteristic: Characteristic,
    },
}

impl Display for ConcreteOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write {
                characteristic,
                payload,
                write_type,
            } => write!(
                f,
                "write {} {:?} ({write_type:?})",
                describe_characteristic(characteristic.as_ref()),
                payload.as_deref()
            ),
            Self::Read { characteristic } => write!(f, "read {}", describe_characteristic(characteristic.as_ref())),
            Self::WriteDescriptor { descriptor, payload } => write!(
                f,
                "write descriptor {} {:?}",
                describe_descriptor(descriptor.as_ref()),
                payload.as_deref()
            ),
            Self::ReadDescriptor { descriptor } => {
                write!(f, "read descriptor {}", describe_descriptor(descriptor.as_ref()))
            }
            Self::EnableNotifications { characteristic } => write!(
                f,
                "enable notifications {}",
                describe_characteristic(characteristic.as_ref())
            ),
            Self::EnableIndications { characteristic } => write!(
                f,
                "enable indications {}",
                describe_characteristic(characteristic.as_ref())
            ),
            Self::DisableNotifications { characteristic } => write!(
                f,
                "disable notifications {}",
                describe_characteristic(Some(characteristic))
            ),
        }
    }
}

/// Operations expressed in domain terms; the target is looked up in the service
/// catalog once the request reaches the head of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VirtualOperation {
    ReadBatteryLevel,
    EnableBatteryLevelNotifications,
    DisableBatteryLevelNotifications,
    EnableServiceChangedIndications,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operation {
    Concrete(ConcreteOperation),
    Virtual(VirtualOperation),
}

/// A single queued operation. Only the named constructors below build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Request {
    kind: RequestKind,
    operation: Operation,
}

/// Copies `length` bytes of `value` starting at `offset`.
///
/// A range running past the end is truncated to the available bytes, an offset
/// past the end yields no payload at all.
pub(crate) fn copy_payload(value: &[u8], offset: usize, length: usize) -> Option<Payload> {
    if offset > value.len() {
        return None;
    }
    let length = length.min(value.len() - offset);
    Some(Arc::from(&value[offset..offset + length]))
}

/// The write mode a characteristic declares for itself.
pub(crate) fn default_write_type(characteristic: Option<&Characteristic>) -> WriteType {
    match characteristic {
        Some(characteristic) if characteristic.properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) => {
            WriteType::WithoutResponse
        }
        _ => WriteType::WithResponse,
    }
}

impl Request {
    fn concrete(kind: RequestKind, operation: ConcreteOperation) -> Self {
        Self {
            kind,
            operation: Operation::Concrete(operation),
        }
    }

    fn virtual_(kind: RequestKind, operation: VirtualOperation) -> Self {
        Self {
            kind,
            operation: Operation::Virtual(operation),
        }
    }

    pub(crate) fn read(characteristic: impl Into<Option<Characteristic>>) -> Self {
        Self::concrete(
            RequestKind::Read,
            ConcreteOperation::Read {
                characteristic: characteristic.into(),
            },
        )
    }

    /// Writes the whole `value` using the characteristic's own write type.
    pub(crate) fn write(characteristic: impl Into<Option<Characteristic>>, value: &[u8]) -> Self {
        Self::write_range(characteristic, value, 0, value.len())
    }

    pub(crate) fn write_with_type(
        characteristic: impl Into<Option<Characteristic>>,
        value: &[u8],
        write_type: WriteType,
    ) -> Self {
        Self::write_range_with_type(characteristic, value, 0, value.len(), write_type)
    }

    pub(crate) fn write_range(
        characteristic: impl Into<Option<Characteristic>>,
        value: &[u8],
        offset: usize,
        length: usize,
    ) -> Self {
        let characteristic = characteristic.into();
        let write_type = default_write_type(characteristic.as_ref());
        Self::write_range_with_type(characteristic, value, offset, length, write_type)
    }

    pub(crate) fn write_range_with_type(
        characteristic: impl Into<Option<Characteristic>>,
        value: &[u8],
        offset: usize,
        length: usize,
        write_type: WriteType,
    ) -> Self {
        Self::concrete(
            RequestKind::Write,
            ConcreteOperation::Write {
                characteristic: characteristic.into(),
                payload: copy_payload(value, offset, length),
                write_type,
            },
        )
    }

    pub(crate) fn read_descriptor(descriptor: impl Into<Option<Descriptor>>) -> Self {
        Self::concrete(
            RequestKind::ReadDescriptor,
            ConcreteOperation::ReadDescriptor {
                descriptor: descriptor.into(),
            },
        )
    }

    pub(crate) fn write_descriptor(descriptor: impl Into<Option<Descriptor>>, value: &[u8]) -> Self {
        Self::write_descriptor_range(descriptor, value, 0, value.len())
    }

    pub(crate) fn write_descriptor_range(
        descriptor: impl Into<Option<Descriptor>>,
        value: &[u8],
        offset: usize,
        length: usize,
    ) -> Self {
        Self::concrete(
            RequestKind::WriteDescriptor,
            ConcreteOperation::WriteDescriptor {
                descriptor: descriptor.into(),
                payload: copy_payload(value, offset, length),
            },
        )
    }

    pub(crate) fn enable_notifications(characteristic: impl Into<Option<Characteristic>>) -> Self {
        Self::concrete(
            RequestKind::EnableNotifications,
            ConcreteOperation::EnableNotifications {
                characteristic: characteristic.into(),
            },
        )
    }

    pub(crate) fn enable_indications(characteristic: impl Into<Option<Characteristic>>) -> Self {
        Self::concrete(
            RequestKind::EnableIndications,
            ConcreteOperation::EnableIndications {
                characteristic: characteristic.into(),
            },
        )
    }

    /// Reads the first Battery Level characteristic of the first Battery Service.
    pub(crate) fn read_battery_level() -> Self {
        Self::virtual_(RequestKind::ReadBatteryLevel, VirtualOperation::ReadBatteryLevel)
    }

    pub(crate) fn enable_battery_level_notifications() -> Self {
        Self::virtual_(
            RequestKind::EnableBatteryLevelNotifications,
            VirtualOperation::EnableBatteryLevelNotifications,
        )
    }

    pub(crate) fn disable_battery_level_notifications() -> Self {
        Self::virtual_(
            RequestKind::DisableBatteryLevelNotifications,
            VirtualOperation::DisableBatteryLevelNotifications,
        )
    }

    /// Enables indications on Service Changed inside Generic Attribute, if the peripheral has it.
    pub(crate) fn enable_service_changed_indications() -> Self {
        Self::virtual_(
            RequestKind::EnableServiceChangedIndications,
            VirtualOperation::EnableServiceChangedIndications,
        )
    }

    pub(crate) fn kind(&self) -> RequestKind {
        self.kind
    }

    pub(crate) fn operation(&self) -> &Operation {
        &self.operation
    }

    pub(crate) fn payload(&self) -> Option<&[u8]> {
        match &self.operation {
            Operation::Concrete(ConcreteOperation::Write { payload, .. })
            | Operation::Concrete(ConcreteOperation::WriteDescriptor { payload, .. }) => payload.as_deref(),
            _ => None,
        }
    }

    /// Descriptor writes always go out with a response.
    pub(crate) fn write_type(&self) -> Option<WriteType> {
        match &self.operation {
            Operation::Concrete(ConcreteOperation::Write { write_type, .. }) => Some(*write_type),
            Operation::Concrete(ConcreteOperation::WriteDescriptor { .. }) => Some(WriteType::WithResponse),
            _ => None,
        }
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.operation {
            Operation::Concrete(operation) => write!(f, "{operation}"),
            Operation::Virtual(_) => write!(f, "{}", self.kind),
        }
    }
}
