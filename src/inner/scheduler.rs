use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use btleplug::api::{Characteristic, Descriptor};
use kanal::AsyncSender;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, trace, warn};

use crate::inner::metrics::{
    PENDING_REQUESTS, REQUESTS_COMPLETED, REQUESTS_DISPATCHED, REQUESTS_DROPPED, REQUESTS_ENQUEUED,
    REQUESTS_FAILED, REQUESTS_REJECTED, REQUESTS_SKIPPED,
};
use crate::inner::model::queue_event::QueueEvent;
use crate::inner::model::request::Request;
use crate::inner::model::resolved_request::{RequestId, ResolvedRequest};
use crate::inner::queue::{QueuedRequest, RequestQueue};
use crate::inner::resolver::{Resolution, Resolver, ServiceCatalog};

/// Performs resolved requests against the transport.
///
/// `dispatch` must not block. Every dispatched request has to be settled through
/// its [`Completion`] exactly once; the scheduler stays busy until then.
pub(crate) trait Execute {
    fn dispatch(&self, request: Arc<ResolvedRequest>, completion: Completion);
}

/// The executor's handle for settling one dispatched request.
///
/// Settling consumes the token. A token dropped without being settled reports a
/// failure so the queue keeps moving.
pub(crate) struct Completion {
    id: RequestId,
    scheduler: Weak<RequestScheduler>,
    settled: bool,
}

impl Completion {
    fn new(id: RequestId, scheduler: Weak<RequestScheduler>) -> Self {
        Self {
            id,
            scheduler,
            settled: false,
        }
    }

    pub(crate) async fn complete(self) {
        self.settle(Ok(None)).await
    }

    pub(crate) async fn complete_with_value(self, value: Vec<u8>) {
        self.settle(Ok(Some(value))).await
    }

    pub(crate) async fn fail(self, reason: impl Display) {
        self.settle(Err(reason.to_string())).await
    }

    async fn settle(mut self, outcome: Result<Option<Vec<u8>>, String>) {
        self.settled = true;
        let Some(scheduler) = self.scheduler.upgrade() else {
            debug!(id = %self.id, "Scheduler is gone, nothing to settle");
            return;
        };
        match outcome {
            Ok(value) => scheduler.on_operation_complete(self.id, value).await,
            Err(reason) => scheduler.on_operation_failed(self.id, reason).await,
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Some(scheduler) = self.scheduler.upgrade() else {
            return;
        };
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    scheduler
                        .on_operation_failed(id, "completion dropped without a result".to_string())
                        .await;
                });
            }
            Err(err) => error!(%id, ?err, "Completion dropped outside of a runtime, the queue is stalled"),
        }
    }
}

/// Serializes requests onto a transport that accepts one operation at a time.
///
/// Producers call [`RequestScheduler::enqueue`]; the executor settles each
/// dispatched request through its [`Completion`], which advances the queue.
/// Requests are dispatched strictly in submission order and never overlap.
pub(crate) struct RequestScheduler {
    queue: Mutex<RequestQueue>,
    resolver: Resolver,
    executor: Arc<dyn Execute + Send + Sync>,
    event_sender: AsyncSender<QueueEvent>,
    next_id: AtomicU64,
    idle: Notify,
}

impl RequestScheduler {
    /// Creates the scheduler of a freshly connected session.
    pub(crate) fn new(
        executor: Arc<dyn Execute + Send + Sync>,
        catalog: Arc<dyn ServiceCatalog + Send + Sync>,
        event_sender: AsyncSender<QueueEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(RequestQueue::open()),
            resolver: Resolver::new(catalog),
            executor,
            event_sender,
            next_id: AtomicU64::new(0),
            idle: Notify::new(),
        })
    }

    /// Appends `request` and dispatches it right away when nothing is in flight.
    ///
    /// Returns `false`, leaving the queue untouched, when the session is not
    /// connected. Feasibility of the request is not checked here.
    pub(crate) async fn enqueue(self: &Arc<Self>, request: Request) -> bool {
        let mut queue = self.queue.lock().await;
        let kind = request.kind();
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let payload_len = request.payload().map(<[u8]>::len);
        let write_type = request.write_type();

        if !queue.enqueue(QueuedRequest { id, request }) {
            warn!(%id, %kind, "Rejected request: not connected");
            REQUESTS_REJECTED.increment();
            return false;
        }

        debug!(%id, %kind, is_virtual = kind.is_virtual(), ?payload_len, ?write_type, "Enqueued request");
        REQUESTS_ENQUEUED.increment();
        self.publish(QueueEvent::Enqueued { id, kind }).await;

        if queue.is_idle() {
            self.advance(&mut queue).await;
        }
        PENDING_REQUESTS.gauge(queue.len() as f64);

        true
    }

    pub(crate) async fn on_operation_complete(self: &Arc<Self>, id: RequestId, value: Option<Vec<u8>>) {
        let mut queue = self.queue.lock().await;
        let Some(request) = queue.finish(id) else {
            warn!(
                %id,
                in_flight = ?queue.in_flight().map(|request| request.id),
                "Completion for a request that is not in flight"
            );
            return;
        };

        debug!(%request, "Request completed");
        REQUESTS_COMPLETED.increment();
        self.publish(QueueEvent::Completed {
            request,
            value,
            completed_at: chrono::offset::Utc::now(),
        })
        .await;

        self.advance(&mut queue).await;
        PENDING_REQUESTS.gauge(queue.len() as f64);
    }

    pub(crate) async fn on_operation_failed(self: &Arc<Self>, id: RequestId, reason: String) {
        let mut queue = self.queue.lock().await;
        let Some(request) = queue.finish(id) else {
            warn!(
                %id,
                in_flight = ?queue.in_flight().map(|request| request.id),
                %reason,
                "Failure for a request that is not in flight"
            );
            return;
        };

        warn!(%request, %reason, "Request failed");
        REQUESTS_FAILED.increment();
        self.publish(QueueEvent::Failed {
            request,
            reason: Arc::new(reason),
        })
        .await;

        self.advance(&mut queue).await;
        PENDING_REQUESTS.gauge(queue.len() as f64);
    }

    /// Ends the session: pending and in-flight requests are dropped without any
    /// completion and further requests are rejected until [`RequestScheduler::open`].
    pub(crate) async fn disconnect(&self) -> usize {
        let mut queue = self.queue.lock().await;
        if !queue.is_connected() {
            return 0;
        }
        let dropped = queue.close();
        PENDING_REQUESTS.gauge(0.0);
        if dropped > 0 {
            warn!(dropped, "Dropped requests on disconnect");
            REQUESTS_DROPPED.increment_by(dropped as u64);
        }
        self.publish(QueueEvent::SessionClosed { dropped }).await;
        self.idle.notify_waiters();
        dropped
    }

    /// Starts a new session with an empty queue.
    pub(crate) async fn open(&self) {
        let mut queue = self.queue.lock().await;
        if queue.is_connected() {
            return;
        }
        *queue = RequestQueue::open();
        info!("Request queue reopened");
    }

    pub(crate) async fn is_connected(&self) -> bool {
        self.queue.lock().await.is_connected()
    }

    pub(crate) async fn is_idle(&self) -> bool {
        let queue = self.queue.lock().await;
        queue.is_idle() && queue.is_empty()
    }

    /// Resolves once nothing is in flight and nothing is pending, or the session ended.
    pub(crate) async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if !self.is_connected().await || self.is_idle().await {
                return;
            }
            notified.await;
        }
    }

    /// Pops heads until one is dispatched. Virtual requests without a target are
    /// skipped without touching the executor.
    async fn advance(self: &Arc<Self>, queue: &mut RequestQueue) {
        while let Some(QueuedRequest { id, request }) = queue.pop_head() {
            let operation = match self.resolver.resolve(&request) {
                Resolution::Ready(operation) => operation,
                Resolution::Skip(reason) => {
                    info!(%id, kind = %request.kind(), %reason, "Skipped request");
                    REQUESTS_SKIPPED.increment();
                    self.publish(QueueEvent::Skipped {
                        id,
                        kind: request.kind(),
                        reason,
                    })
                    .await;
                    continue;
                }
            };

            let resolved = Arc::new(ResolvedRequest {
                id,
                kind: request.kind(),
                operation,
            });
            queue.start(Arc::clone(&resolved));
            debug!(request = %resolved, next = ?queue.peek_head().map(|head| head.id), "Dispatching request");
            REQUESTS_DISPATCHED.increment();
            self.publish(QueueEvent::Dispatched(Arc::clone(&resolved))).await;
            self.executor
                .dispatch(resolved, Completion::new(id, Arc::downgrade(self)));
            return;
        }

        trace!("Request queue drained");
        self.idle.notify_waiters();
    }

    async fn publish(&self, event: QueueEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            trace!(?err, "Queue event was not delivered");
        }
    }
}

/// Shorthands mirroring the profile API, each returning what `enqueue` returns.
impl RequestScheduler {
    pub(crate) async fn read_characteristic(self: &Arc<Self>, characteristic: impl Into<Option<Characteristic>>) -> bool {
        self.enqueue(Request::read(characteristic)).await
    }

    pub(crate) async fn write_characteristic(
        self: &Arc<Self>,
        characteristic: impl Into<Option<Characteristic>>,
        value: &[u8],
    ) -> bool {
        self.enqueue(Request::write(characteristic, value)).await
    }

    pub(crate) async fn read_descriptor(self: &Arc<Self>, descriptor: impl Into<Option<Descriptor>>) -> bool {
        self.enqueue(Request::read_descriptor(descriptor)).await
    }

    pub(crate) async fn write_descriptor(self: &Arc<Self>, descriptor: impl Into<Option<Descriptor>>, value: &[u8]) -> bool {
        self.enqueue(Request::write_descriptor(descriptor, value)).await
    }

    pub(crate) async fn enable_notifications(self: &Arc<Self>, characteristic: impl Into<Option<Characteristic>>) -> bool {
        self.enqueue(Request::enable_notifications(characteristic)).await
    }

    pub(crate) async fn enable_indications(self: &Arc<Self>, characteristic: impl Into<Option<Characteristic>>) -> bool {
        self.enqueue(Request::enable_indications(characteristic)).await
    }

    pub(crate) async fn read_battery_level(self: &Arc<Self>) -> bool {
        self.enqueue(Request::read_battery_level()).await
    }

    pub(crate) async fn set_battery_notifications(self: &Arc<Self>, enable: bool) -> bool {
        if enable {
            self.enqueue(Request::enable_battery_level_notifications()).await
        } else {
            self.enqueue(Request::disable_battery_level_notifications()).await
        }
    }
}
