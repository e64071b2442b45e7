use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use futures_util::StreamExt;
use kanal::AsyncSender;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::inner::conf::cmd_args::AppConf;
use crate::inner::conf::dto::peripheral::PeripheralSelectorDto;
use crate::inner::conf::dto::request::RequestDto;
use crate::inner::error::{QueueError, QueueResult};
use crate::inner::executor::PeripheralExecutor;
use crate::inner::model::adapter_info::AdapterInfo;
use crate::inner::model::battery_level::BatteryLevel;
use crate::inner::model::peripheral_key::PeripheralKey;
use crate::inner::model::queue_event::QueueEvent;
use crate::inner::resolver::BATTERY_LEVEL_UUID;
use crate::inner::scheduler::RequestScheduler;

mod connection;
mod discovery;
mod ext;

/// A connected peripheral together with the scheduler serializing its operations.
pub(crate) struct PeripheralSession {
    adapter: Adapter,
    adapter_info: AdapterInfo,
    peripheral: Arc<Peripheral>,
    peripheral_key: PeripheralKey,
    scheduler: Arc<RequestScheduler>,
    connect_timeout: Duration,
    span: Span,
}

impl PeripheralSession {
    /// Finds the peripheral matching `selector`, connects, discovers its services
    /// and opens a scheduler on top of it.
    pub(crate) async fn open(
        selector: &PeripheralSelectorDto,
        app_conf: &AppConf,
        event_sender: AsyncSender<QueueEvent>,
    ) -> QueueResult<Arc<Self>> {
        let discovered = discovery::find_peripheral(selector, app_conf.scan_timeout).await?;
        let span = info_span!(
            "session",
            adapter = %discovered.adapter_info.id,
            peripheral = %discovered.peripheral_key.peripheral_address,
        );
        let peripheral = Arc::new(discovered.peripheral);

        connection::connect(&peripheral, app_conf.connect_timeout)
            .instrument(span.clone())
            .await?;

        let executor = PeripheralExecutor::new(Arc::clone(&peripheral), app_conf.operation_timeout, span.clone());
        let scheduler = RequestScheduler::new(Arc::new(executor), peripheral.clone(), event_sender);

        Ok(Arc::new(Self {
            adapter: discovered.adapter,
            adapter_info: discovered.adapter_info,
            peripheral,
            peripheral_key: discovered.peripheral_key,
            scheduler,
            connect_timeout: app_conf.connect_timeout,
            span,
        }))
    }

    pub(crate) fn scheduler(&self) -> &Arc<RequestScheduler> {
        &self.scheduler
    }

    /// Submits the plan in order; returns how many requests were accepted.
    #[tracing::instrument(level = "info", skip_all, parent = &self.span)]
    pub(crate) async fn run_plan(&self, requests: &[RequestDto]) -> usize {
        let mut accepted = 0;
        for dto in requests {
            if dto.submit(&self.scheduler, self.peripheral.as_ref()).await {
                accepted += 1;
            }
        }
        info!(accepted, total = requests.len(), "Plan submitted");
        accepted
    }

    /// Connects again after a disconnect and starts a new, empty queue session.
    #[tracing::instrument(level = "info", skip_all, parent = &self.span, err)]
    pub(crate) async fn reconnect(&self) -> QueueResult<()> {
        connection::connect(&self.peripheral, self.connect_timeout).await?;
        self.scheduler.open().await;
        Ok(())
    }

    /// Ends the queue session whenever the transport reports the peripheral gone,
    /// so pending requests are dropped without completions.
    pub(crate) async fn watch_disconnect(self: Arc<Self>) -> QueueResult<()> {
        let mut stream = self.adapter.events().await?;
        let peripheral_id = self.peripheral.id();

        while let Some(event) = stream.next().await {
            let CentralEvent::DeviceDisconnected(id) = event else {
                continue;
            };
            if id != peripheral_id {
                continue;
            }
            let dropped = self.scheduler.disconnect().await;
            let _entered = self.span.enter();
            warn!(peripheral_key = %self.peripheral_key, dropped, "Peripheral disconnected");
        }

        Err(QueueError::EndOfStream)
    }

    /// Logs value notifications while the session lasts; battery levels are decoded.
    pub(crate) async fn forward_notifications(self: Arc<Self>) -> QueueResult<()> {
        let mut stream = self.peripheral.notifications().await?;

        while let Some(notification) = stream.next().await {
            let _entered = self.span.enter();
            if notification.uuid != BATTERY_LEVEL_UUID {
                info!(characteristic = %notification.uuid, value = ?notification.value, "Notification");
                continue;
            }
            match BatteryLevel::try_from(notification.value.as_slice()) {
                Ok(level) => info!(%level, "Battery level notification"),
                Err(err) => warn!(%err, value = ?notification.value, "Invalid battery level notification"),
            }
        }

        Err(QueueError::EndOfStream)
    }

    /// Ends the queue session and drops the link.
    #[tracing::instrument(level = "info", skip_all, parent = &self.span, err)]
    pub(crate) async fn close(&self) -> QueueResult<()> {
        let dropped = self.scheduler.disconnect().await;
        debug!(adapter_info = %self.adapter_info, dropped, "Closing session");
        connection::disconnect(&self.peripheral).await
    }
}
