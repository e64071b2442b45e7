use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{CharPropFlags, Characteristic, Descriptor, WriteType};
use btleplug::platform::Peripheral;
use tokio::time::timeout;
use tracing::{debug, info_span, Instrument, Span};

use crate::inner::error::{QueueError, QueueResult};
use crate::inner::metrics::{Measure, OPERATION_DURATION};
use crate::inner::model::request::{ConcreteOperation, RequestKind};
use crate::inner::model::resolved_request::ResolvedRequest;
use crate::inner::scheduler::{Completion, Execute};

/// The GATT calls an executor needs from a connected peripheral.
pub(crate) trait GattTransport: Send + Sync + 'static {
    fn is_connected(&self) -> impl Future<Output = QueueResult<bool>> + Send;

    fn read(&self, characteristic: &Characteristic) -> impl Future<Output = QueueResult<Vec<u8>>> + Send;

    fn write(
        &self,
        characteristic: &Characteristic,
        data: &[u8],
        write_type: WriteType,
    ) -> impl Future<Output = QueueResult<()>> + Send;

    fn read_descriptor(&self, descriptor: &Descriptor) -> impl Future<Output = QueueResult<Vec<u8>>> + Send;

    fn write_descriptor(&self, descriptor: &Descriptor, data: &[u8]) -> impl Future<Output = QueueResult<()>> + Send;

    fn subscribe(&self, characteristic: &Characteristic) -> impl Future<Output = QueueResult<()>> + Send;

    fn unsubscribe(&self, characteristic: &Characteristic) -> impl Future<Output = QueueResult<()>> + Send;
}

impl GattTransport for Peripheral {
    async fn is_connected(&self) -> QueueResult<bool> {
        Ok(btleplug::api::Peripheral::is_connected(self).await?)
    }

    async fn read(&self, characteristic: &Characteristic) -> QueueResult<Vec<u8>> {
        Ok(btleplug::api::Peripheral::read(self, characteristic).await?)
    }

    async fn write(&self, characteristic: &Characteristic, data: &[u8], write_type: WriteType) -> QueueResult<()> {
        Ok(btleplug::api::Peripheral::write(self, characteristic, data, write_type).await?)
    }

    async fn read_descriptor(&self, descriptor: &Descriptor) -> QueueResult<Vec<u8>> {
        Ok(btleplug::api::Peripheral::read_descriptor(self, descriptor).await?)
    }

    async fn write_descriptor(&self, descriptor: &Descriptor, data: &[u8]) -> QueueResult<()> {
        Ok(btleplug::api::Peripheral::write_descriptor(self, descriptor, data).await?)
    }

    async fn subscribe(&self, characteristic: &Characteristic) -> QueueResult<()> {
        Ok(btleplug::api::Peripheral::subscribe(self, characteristic).await?)
    }

    async fn unsubscribe(&self, characteristic: &Characteristic) -> QueueResult<()> {
        Ok(btleplug::api::Peripheral::unsubscribe(self, characteristic).await?)
    }
}

/// Runs resolved requests against a connected peripheral.
pub(crate) struct PeripheralExecutor<T> {
    transport: Arc<T>,
    operation_timeout: Duration,
    span: Span,
}

impl<T: GattTransport> PeripheralExecutor<T> {
    pub(crate) fn new(transport: Arc<T>, operation_timeout: Duration, span: Span) -> Self {
        Self {
            transport,
            operation_timeout,
            span,
        }
    }
}

impl<T: GattTransport> Execute for PeripheralExecutor<T> {
    fn dispatch(&self, request: Arc<ResolvedRequest>, completion: Completion) {
        let transport = Arc::clone(&self.transport);
        let operation_timeout = self.operation_timeout;
        let span = info_span!(
            parent: &self.span,
            "operation",
            request_id = %request.id,
            kind = %request.kind,
        );

        tokio::spawn(
            async move {
                let result = timeout(operation_timeout, execute(transport.as_ref(), &request))
                    .measure_execution_time(OPERATION_DURATION, Span::current())
                    .await
                    .map_err(QueueError::from)
                    .and_then(|result| result);

                match result {
                    Ok(Some(value)) => completion.complete_with_value(value).await,
                    Ok(None) => completion.complete().await,
                    Err(err) => completion.fail(err).await,
                }
            }
            .instrument(span),
        );
    }
}

async fn execute<T: GattTransport>(transport: &T, request: &ResolvedRequest) -> QueueResult<Option<Vec<u8>>> {
    check(request)?;
    if !transport.is_connected().await? {
        return Err(QueueError::NotConnected);
    }
    debug!(%request, "Executing operation");

    let kind = request.kind;
    let payload = || request.payload().ok_or(QueueError::MissingPayload(kind));
    match &request.operation {
        ConcreteOperation::Read { characteristic } => {
            let characteristic = target(kind, characteristic.as_ref())?;
            Ok(Some(transport.read(characteristic).await?))
        }
        ConcreteOperation::Write {
            characteristic,
            write_type,
            ..
        } => {
            let characteristic = target(kind, characteristic.as_ref())?;
            transport.write(characteristic, payload()?, *write_type).await?;
            Ok(None)
        }
        ConcreteOperation::ReadDescriptor { descriptor } => {
            let descriptor = descriptor.as_ref().ok_or(QueueError::MissingTarget(kind))?;
            Ok(Some(transport.read_descriptor(descriptor).await?))
        }
        ConcreteOperation::WriteDescriptor { descriptor, .. } => {
            let descriptor = descriptor.as_ref().ok_or(QueueError::MissingTarget(kind))?;
            transport.write_descriptor(descriptor, payload()?).await?;
            Ok(None)
        }
        ConcreteOperation::EnableNotifications { characteristic } => {
            let characteristic = target(kind, characteristic.as_ref())?;
            transport.subscribe(characteristic).await?;
            Ok(None)
        }
        // btleplug has no separate indication call: BlueZ and CoreBluetooth pick
        // notifications whenever the characteristic also has NOTIFY.
        ConcreteOperation::EnableIndications { characteristic } => {
            let characteristic = target(kind, characteristic.as_ref())?;
            transport.subscribe(characteristic).await?;
            Ok(None)
        }
        ConcreteOperation::DisableNotifications { characteristic } => {
            transport.unsubscribe(characteristic).await?;
            Ok(None)
        }
    }
}

fn target(kind: RequestKind, characteristic: Option<&Characteristic>) -> QueueResult<&Characteristic> {
    characteristic.ok_or(QueueError::MissingTarget(kind))
}

/// Rejects requests the transport would refuse anyway: absent targets, absent
/// write payloads and characteristics lacking the property the operation needs.
/// Descriptors are only checked for presence.
pub(crate) fn check(request: &ResolvedRequest) -> QueueResult<()> {
    let kind = request.kind;
    match &request.operation {
        ConcreteOperation::Read { characteristic } => require(kind, characteristic.as_ref(), CharPropFlags::READ),
        ConcreteOperation::Write {
            characteristic, payload, ..
        } => {
            require(
                kind,
                characteristic.as_ref(),
                CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE,
            )?;
            payload.as_ref().map(|_| ()).ok_or(QueueError::MissingPayload(kind))
        }
        ConcreteOperation::ReadDescriptor { descriptor } => {
            descriptor.as_ref().map(|_| ()).ok_or(QueueError::MissingTarget(kind))
        }
        ConcreteOperation::WriteDescriptor { descriptor, payload } => {
            descriptor.as_ref().ok_or(QueueError::MissingTarget(kind))?;
            payload.as_ref().map(|_| ()).ok_or(QueueError::MissingPayload(kind))
        }
        ConcreteOperation::EnableNotifications { characteristic } => {
            require(kind, characteristic.as_ref(), CharPropFlags::NOTIFY)
        }
        ConcreteOperation::EnableIndications { characteristic } => {
            require(kind, characteristic.as_ref(), CharPropFlags::INDICATE)
        }
        ConcreteOperation::DisableNotifications { characteristic } => {
            require(kind, Some(characteristic), CharPropFlags::NOTIFY)
        }
    }
}

/// Passes when the characteristic has any of the `required` properties.
fn require(kind: RequestKind, characteristic: Option<&Characteristic>, required: CharPropFlags) -> QueueResult<()> {
    let characteristic = target(kind, characteristic)?;
    if characteristic.properties.intersects(required) {
        Ok(())
    } else {
        Err(QueueError::MissingProperty { kind, required })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use btleplug::api::Service;
    use kanal::AsyncReceiver;
    use uuid::Uuid;

    use super::*;
    use crate::inner::model::queue_event::QueueEvent;
    use crate::inner::model::request::{Operation, Request};
    use crate::inner::model::resolved_request::RequestId;
    use crate::inner::scheduler::RequestScheduler;
    use crate::inner::test_util::{characteristic, descriptor, short_uuid};

    /// Records every GATT call; reads can be made to hang forever.
    #[derive(Default)]
    struct FakeTransport {
        disconnected: bool,
        stall_reads: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeTransport {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl GattTransport for FakeTransport {
        async fn is_connected(&self) -> QueueResult<bool> {
            Ok(!self.disconnected)
        }

        async fn read(&self, _characteristic: &Characteristic) -> QueueResult<Vec<u8>> {
            self.record("read");
            if self.stall_reads {
                std::future::pending::<()>().await;
            }
            Ok(vec![42])
        }

        async fn write(&self, _characteristic: &Characteristic, _data: &[u8], _write_type: WriteType) -> QueueResult<()> {
            self.record("write");
            Ok(())
        }

        async fn read_descriptor(&self, _descriptor: &Descriptor) -> QueueResult<Vec<u8>> {
            self.record("read_descriptor");
            Ok(vec![1, 0])
        }

        async fn write_descriptor(&self, _descriptor: &Descriptor, _data: &[u8]) -> QueueResult<()> {
            self.record("write_descriptor");
            Ok(())
        }

        async fn subscribe(&self, _characteristic: &Characteristic) -> QueueResult<()> {
            self.record("subscribe");
            Ok(())
        }

        async fn unsubscribe(&self, _characteristic: &Characteristic) -> QueueResult<()> {
            self.record("unsubscribe");
            Ok(())
        }
    }

    fn scheduler(transport: &Arc<FakeTransport>) -> (Arc<RequestScheduler>, AsyncReceiver<QueueEvent>) {
        let (sender, events) = kanal::unbounded_async();
        let executor = PeripheralExecutor::new(Arc::clone(transport), Duration::from_millis(50), Span::none());
        let scheduler = RequestScheduler::new(Arc::new(executor), Arc::new(Vec::<Service>::new()), sender);
        (scheduler, events)
    }

    /// Skips bookkeeping events up to the next completion or failure.
    async fn next_settled(events: &AsyncReceiver<QueueEvent>) -> QueueEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
                .await
                .expect("no settled request within a second")
                .unwrap();
            if matches!(event, QueueEvent::Completed { .. } | QueueEvent::Failed { .. }) {
                return event;
            }
        }
    }

    fn resolved(request: Request) -> ResolvedRequest {
        let Operation::Concrete(operation) = request.operation().clone() else {
            panic!("Expected a concrete request: {request}");
        };
        ResolvedRequest {
            id: RequestId(0),
            kind: request.kind(),
            operation,
        }
    }

    fn with(properties: CharPropFlags) -> Characteristic {
        characteristic(short_uuid(0xFFF1), properties)
    }

    #[test]
    fn absent_targets_fail() {
        for request in [
            Request::read(None),
            Request::write(None, &[1]),
            Request::read_descriptor(None),
            Request::write_descriptor(None, &[1]),
            Request::enable_notifications(None),
            Request::enable_indications(None),
        ] {
            let kind = request.kind();
            assert!(
                matches!(check(&resolved(request)), Err(QueueError::MissingTarget(failed)) if failed == kind),
                "{kind} must fail without a target"
            );
        }
    }

    #[test]
    fn read_requires_read_property() {
        assert!(check(&resolved(Request::read(with(CharPropFlags::READ)))).is_ok());
        assert!(matches!(
            check(&resolved(Request::read(with(CharPropFlags::WRITE | CharPropFlags::NOTIFY)))),
            Err(QueueError::MissingProperty {
                kind: RequestKind::Read,
                required
            }) if required == CharPropFlags::READ
        ));
    }

    #[test]
    fn write_accepts_either_write_property() {
        assert!(check(&resolved(Request::write(with(CharPropFlags::WRITE), &[1]))).is_ok());
        assert!(check(&resolved(Request::write(
            with(CharPropFlags::WRITE_WITHOUT_RESPONSE),
            &[1]
        )))
        .is_ok());
        assert!(check(&resolved(Request::write_with_type(
            with(CharPropFlags::WRITE_WITHOUT_RESPONSE),
            &[1],
            WriteType::WithResponse
        )))
        .is_ok());
        assert!(matches!(
            check(&resolved(Request::write(with(CharPropFlags::READ), &[1]))),
            Err(QueueError::MissingProperty {
                kind: RequestKind::Write,
                ..
            })
        ));
    }

    #[test]
    fn write_without_payload_fails() {
        let request = Request::write_range(with(CharPropFlags::WRITE), &[1, 2], 3, 1);
        assert!(matches!(
            check(&resolved(request)),
            Err(QueueError::MissingPayload(RequestKind::Write))
        ));

        let request = Request::write_descriptor_range(descriptor(Uuid::nil()), &[1, 2], 3, 1);
        assert!(matches!(
            check(&resolved(request)),
            Err(QueueError::MissingPayload(RequestKind::WriteDescriptor))
        ));
    }

    #[test]
    fn empty_payload_is_still_a_payload() {
        let request = Request::write_range(with(CharPropFlags::WRITE), &[1, 2], 2, 4);
        assert!(check(&resolved(request)).is_ok());
    }

    #[test]
    fn subscriptions_require_matching_property() {
        let notify = with(CharPropFlags::NOTIFY);
        let indicate = with(CharPropFlags::INDICATE);

        assert!(check(&resolved(Request::enable_notifications(notify.clone()))).is_ok());
        assert!(check(&resolved(Request::enable_indications(indicate.clone()))).is_ok());
        assert!(matches!(
            check(&resolved(Request::enable_notifications(indicate))),
            Err(QueueError::MissingProperty { required, .. }) if required == CharPropFlags::NOTIFY
        ));
        assert!(matches!(
            check(&resolved(Request::enable_indications(notify))),
            Err(QueueError::MissingProperty { required, .. }) if required == CharPropFlags::INDICATE
        ));
    }

    #[test]
    fn descriptors_are_checked_for_presence_only() {
        assert!(check(&resolved(Request::read_descriptor(descriptor(short_uuid(0x2902))))).is_ok());
        assert!(check(&resolved(Request::write_descriptor(descriptor(short_uuid(0x2902)), &[1, 0]))).is_ok());
    }

    #[test]
    fn failure_reason_names_the_kind() {
        let err = check(&resolved(Request::read(None))).unwrap_err();
        assert_eq!(err.to_string(), "Read request has no target");
    }

    #[tokio::test]
    async fn timed_out_operation_fails_and_queue_moves_on() {
        let transport = Arc::new(FakeTransport {
            stall_reads: true,
            ..Default::default()
        });
        let (scheduler, events) = scheduler(&transport);

        assert!(scheduler.enqueue(Request::read(with(CharPropFlags::READ))).await);
        assert!(scheduler.enqueue(Request::write(with(CharPropFlags::WRITE), &[1])).await);

        let QueueEvent::Failed { request, reason } = next_settled(&events).await else {
            panic!("The stalled read must fail");
        };
        assert_eq!(request.kind, RequestKind::Read);
        assert!(reason.starts_with("Timeout error"), "{reason}");

        let QueueEvent::Completed { request, value, .. } = next_settled(&events).await else {
            panic!("The write must run after the timeout");
        };
        assert_eq!(request.kind, RequestKind::Write);
        assert_eq!(value, None);

        scheduler.wait_idle().await;
        assert_eq!(transport.calls(), vec!["read", "write"]);
    }

    #[tokio::test]
    async fn disconnected_transport_fails_with_not_connected() {
        let transport = Arc::new(FakeTransport {
            disconnected: true,
            ..Default::default()
        });
        let (scheduler, events) = scheduler(&transport);

        assert!(scheduler.enqueue(Request::read(with(CharPropFlags::READ))).await);
        assert!(scheduler.enqueue(Request::enable_notifications(with(CharPropFlags::NOTIFY))).await);

        for kind in [RequestKind::Read, RequestKind::EnableNotifications] {
            let QueueEvent::Failed { request, reason } = next_settled(&events).await else {
                panic!("{kind} must fail while disconnected");
            };
            assert_eq!(request.kind, kind);
            assert_eq!(reason.as_str(), QueueError::NotConnected.to_string());
        }

        scheduler.wait_idle().await;
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn capability_rejection_never_reaches_transport() {
        let transport = Arc::new(FakeTransport::default());
        let (scheduler, events) = scheduler(&transport);

        assert!(scheduler.enqueue(Request::read(with(CharPropFlags::WRITE))).await);
        assert!(scheduler.enqueue(Request::read(with(CharPropFlags::READ))).await);

        let QueueEvent::Failed { request, reason } = next_settled(&events).await else {
            panic!("A read of a write-only characteristic must fail");
        };
        assert_eq!(request.kind, RequestKind::Read);
        let rejection = QueueError::MissingProperty {
            kind: RequestKind::Read,
            required: CharPropFlags::READ,
        };
        assert_eq!(reason.as_str(), rejection.to_string());

        let QueueEvent::Completed { value, .. } = next_settled(&events).await else {
            panic!("The readable characteristic must be read");
        };
        assert_eq!(value, Some(vec![42]));

        scheduler.wait_idle().await;
        assert_eq!(transport.calls(), vec!["read"]);
    }

    #[tokio::test]
    async fn indications_subscribe_even_when_notify_is_present() {
        let transport = Arc::new(FakeTransport::default());
        let (scheduler, events) = scheduler(&transport);

        let both = with(CharPropFlags::NOTIFY | CharPropFlags::INDICATE);
        assert!(scheduler.enqueue(Request::enable_indications(both)).await);

        assert!(matches!(
            next_settled(&events).await,
            QueueEvent::Completed { request, value: None, .. } if request.kind == RequestKind::EnableIndications
        ));
        assert_eq!(transport.calls(), vec!["subscribe"]);
    }

    #[tokio::test]
    async fn descriptor_payload_is_handed_to_transport() {
        let transport = Arc::new(FakeTransport::default());
        let (scheduler, events) = scheduler(&transport);

        assert!(scheduler.enqueue(Request::write_descriptor(descriptor(short_uuid(0x2902)), &[1, 0])).await);
        assert!(scheduler.enqueue(Request::read_descriptor(descriptor(short_uuid(0x2902)))).await);

        assert!(matches!(next_settled(&events).await, QueueEvent::Completed { value: None, .. }));
        assert!(matches!(
            next_settled(&events).await,
            QueueEvent::Completed { value: Some(value), .. } if value == vec![1, 0]
        ));
        assert_eq!(transport.calls(), vec!["write_descriptor", "read_descriptor"]);
    }
}
