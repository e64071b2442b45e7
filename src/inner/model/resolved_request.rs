use std::fmt::{Display, Formatter};

use crate::inner::model::request::{ConcreteOperation, Payload, RequestKind};

/// Assigned by the scheduler when a request is accepted; correlates completions
/// with the request in flight.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) struct RequestId(pub(crate) u64);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the executor receives: the original kind plus a concrete target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedRequest {
    pub(crate) id: RequestId,
    pub(crate) kind: RequestKind,
    pub(crate) operation: ConcreteOperation,
}

impl ResolvedRequest {
    pub(crate) fn payload(&self) -> Option<&Payload> {
        match &self.operation {
            ConcreteOperation::Write { payload, .. } | ConcreteOperation::WriteDescriptor { payload, .. } => {
                payload.as_ref()
            }
            _ => None,
        }
    }
}

impl Display for ResolvedRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.id, self.kind, self.operation)
    }
}
