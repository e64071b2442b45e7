use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use btleplug::api::{CharPropFlags, Characteristic, Descriptor, Service};
use kanal::AsyncReceiver;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::inner::model::queue_event::QueueEvent;
use crate::inner::model::resolved_request::ResolvedRequest;
use crate::inner::scheduler::{Completion, Execute, RequestScheduler};

pub(crate) fn short_uuid(value: u16) -> Uuid {
    Uuid::from_u128(((value as u128) << 96) | 0x0000_0000_0000_1000_8000_00805f9b34fb)
}

pub(crate) fn characteristic(uuid: Uuid, properties: CharPropFlags) -> Characteristic {
    characteristic_in(Uuid::nil(), uuid, properties)
}

pub(crate) fn characteristic_in(service_uuid: Uuid, uuid: Uuid, properties: CharPropFlags) -> Characteristic {
    Characteristic {
        uuid,
        service_uuid,
        properties,
        descriptors: BTreeSet::new(),
    }
}

pub(crate) fn descriptor(uuid: Uuid) -> Descriptor {
    Descriptor {
        uuid,
        service_uuid: Uuid::nil(),
        characteristic_uuid: Uuid::nil(),
    }
}

pub(crate) fn service(uuid: Uuid, characteristics: impl IntoIterator<Item = (Uuid, CharPropFlags)>) -> Service {
    Service {
        uuid,
        primary: true,
        characteristics: characteristics
            .into_iter()
            .map(|(characteristic_uuid, properties)| characteristic_in(uuid, characteristic_uuid, properties))
            .collect(),
    }
}

pub(crate) type Dispatched = (Arc<ResolvedRequest>, Completion);

/// Hands every dispatch to the test and tracks how many are outstanding.
struct MockExecutor {
    sender: UnboundedSender<Dispatched>,
    outstanding: Arc<AtomicUsize>,
    max_outstanding: Arc<AtomicUsize>,
}

impl Execute for MockExecutor {
    fn dispatch(&self, request: Arc<ResolvedRequest>, completion: Completion) {
        let outstanding = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_outstanding.fetch_max(outstanding, Ordering::SeqCst);
        self.sender.send((request, completion)).unwrap();
    }
}

/// A scheduler over a [`MockExecutor`], with the dispatches and events it produced.
pub(crate) struct Harness {
    pub(crate) scheduler: Arc<RequestScheduler>,
    pub(crate) dispatched: UnboundedReceiver<Dispatched>,
    events: AsyncReceiver<QueueEvent>,
    pub(crate) outstanding: Arc<AtomicUsize>,
    pub(crate) max_outstanding: Arc<AtomicUsize>,
}

impl Harness {
    pub(crate) fn new(services: Vec<Service>) -> Self {
        let (sender, dispatched) = unbounded_channel();
        let (event_sender, events) = kanal::unbounded_async();
        let outstanding = Arc::new(AtomicUsize::new(0));
        let max_outstanding = Arc::new(AtomicUsize::new(0));
        let executor = MockExecutor {
            sender,
            outstanding: Arc::clone(&outstanding),
            max_outstanding: Arc::clone(&max_outstanding),
        };
        Self {
            scheduler: RequestScheduler::new(Arc::new(executor), Arc::new(services), event_sender),
            dispatched,
            events,
            outstanding,
            max_outstanding,
        }
    }

    pub(crate) fn next_dispatch(&mut self) -> Option<Dispatched> {
        let dispatched = self.dispatched.try_recv().ok()?;
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        Some(dispatched)
    }

    pub(crate) fn events(&self) -> Vec<QueueEvent> {
        let mut events = vec![];
        while let Ok(Some(event)) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
