use std::fmt::{Display, Formatter};
use std::sync::Arc;

use chrono::Utc;

use crate::inner::model::request::RequestKind;
use crate::inner::model::resolved_request::{RequestId, ResolvedRequest};
use crate::inner::resolver::SkipReason;

/// Published by the scheduler for observers. `SessionClosed` reports the
/// requests dropped by a disconnect; none of them are completed.
#[derive(Debug, Clone)]
pub(crate) enum QueueEvent {
    Enqueued {
        id: RequestId,
        kind: RequestKind,
    },
    Dispatched(Arc<ResolvedRequest>),
    Completed {
        request: Arc<ResolvedRequest>,
        value: Option<Vec<u8>>,
        completed_at: chrono::DateTime<Utc>,
    },
    Failed {
        request: Arc<ResolvedRequest>,
        reason: Arc<String>,
    },
    Skipped {
        id: RequestId,
        kind: RequestKind,
        reason: SkipReason,
    },
    SessionClosed {
        dropped: usize,
    },
}

impl Display for QueueEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enqueued { id, kind } => write!(f, "enqueued {id} {kind}"),
            Self::Dispatched(request) => write!(f, "dispatched {request}"),
            Self::Completed { request, value, .. } => match value {
                Some(value) => write!(f, "completed {request} = {value:?}"),
                None => write!(f, "completed {request}"),
            },
            Self::Failed { request, reason } => write!(f, "failed {request}: {reason}"),
            Self::Skipped { id, kind, reason } => write!(f, "skipped {id} {kind}: {reason}"),
            Self::SessionClosed { dropped } => write!(f, "session closed, {dropped} request(s) dropped"),
        }
    }
}
