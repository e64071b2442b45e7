use std::collections::VecDeque;
use std::sync::Arc;

use crate::inner::model::request::Request;
use crate::inner::model::resolved_request::{RequestId, ResolvedRequest};

#[derive(Debug, Clone)]
pub(crate) struct QueuedRequest {
    pub(crate) id: RequestId,
    pub(crate) request: Request,
}

/// Pending requests in submission order plus the one in flight.
///
/// A default queue belongs to no session and rejects everything until [`RequestQueue::open`].
#[derive(Debug, Default)]
pub(crate) struct RequestQueue {
    pending: VecDeque<QueuedRequest>,
    in_flight: Option<Arc<ResolvedRequest>>,
    connected: bool,
}

impl RequestQueue {
    pub(crate) fn open() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected
    }

    /// Appends at the tail; `false` without touching the queue when disconnected.
    pub(crate) fn enqueue(&mut self, queued: QueuedRequest) -> bool {
        if !self.connected {
            return false;
        }
        self.pending.push_back(queued);
        true
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn peek_head(&self) -> Option<&QueuedRequest> {
        self.pending.front()
    }

    pub(crate) fn pop_head(&mut self) -> Option<QueuedRequest> {
        self.pending.pop_front()
    }

    pub(crate) fn in_flight(&self) -> Option<&Arc<ResolvedRequest>> {
        self.in_flight.as_ref()
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    pub(crate) fn start(&mut self, request: Arc<ResolvedRequest>) {
        debug_assert!(self.in_flight.is_none(), "a request is already in flight");
        self.in_flight = Some(request);
    }

    /// Clears the in-flight slot, but only for the request that occupies it.
    pub(crate) fn finish(&mut self, id: RequestId) -> Option<Arc<ResolvedRequest>> {
        match &self.in_flight {
            Some(request) if request.id == id => self.in_flight.take(),
            _ => None,
        }
    }

    /// Drops everything, in-flight included, and rejects further requests.
    /// Returns the number of requests dropped.
    pub(crate) fn close(&mut self) -> usize {
        self.connected = false;
        let dropped = self.pending.len() + usize::from(self.in_flight.is_some());
        self.pending.clear();
        self.in_flight = None;
        dropped
    }
}
