use futures_util::StreamExt;
use kanal::AsyncReceiver;
use tracing::{debug, info, warn};

use crate::inner::error::{QueueError, QueueResult};
use crate::inner::model::battery_level::BatteryLevel;
use crate::inner::model::queue_event::QueueEvent;
use crate::inner::model::request::RequestKind;

/// Drains the scheduler's event stream into the log.
pub(crate) async fn log_events(receiver: AsyncReceiver<QueueEvent>) -> QueueResult<()> {
    let mut stream = receiver.stream();
    while let Some(event) = stream.next().await {
        match &event {
            QueueEvent::Completed {
                request,
                value: Some(value),
                completed_at,
            } if request.kind == RequestKind::ReadBatteryLevel => match BatteryLevel::try_from(value.as_slice()) {
                Ok(level) => info!(id = %request.id, %level, %completed_at, "Battery level"),
                Err(err) => warn!(id = %request.id, %err, ?value, "Invalid battery level"),
            },
            QueueEvent::Completed { .. } => info!(%event),
            QueueEvent::Failed { .. } | QueueEvent::Skipped { .. } | QueueEvent::SessionClosed { .. } => {
                warn!(%event)
            }
            QueueEvent::Enqueued { .. } | QueueEvent::Dispatched(_) => debug!(%event),
        }
    }

    Err(QueueError::EndOfStream)
}
