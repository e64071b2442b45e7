use btleplug::api::Peripheral as _;
use btleplug::platform::Peripheral;
use tokio::time::timeout;
use tracing::{debug, info, Span};

use crate::inner::error::QueueResult;
use crate::inner::metrics::{Measure, CONNECTING_DURATION, SERVICE_DISCOVERY_DURATION};

#[tracing::instrument(level = "info", skip_all, err)]
pub(super) async fn connect(peripheral: &Peripheral, connect_timeout: std::time::Duration) -> QueueResult<()> {
    if peripheral.is_connected().await? {
        debug!("Already connected");
    } else {
        info!("Connecting to peripheral");
        timeout(connect_timeout, peripheral.connect())
            .measure_execution_time(CONNECTING_DURATION, Span::current())
            .await??;
        info!("Connected to peripheral");
    }

    if peripheral.services().is_empty() {
        info!("Discovering services");
        peripheral
            .discover_services()
            .measure_execution_time(SERVICE_DISCOVERY_DURATION, Span::current())
            .await?;
        info!(services = peripheral.services().len(), "Service discovery completed");
    }

    Ok(())
}

#[tracing::instrument(level = "info", skip_all, err)]
pub(super) async fn disconnect(peripheral: &Peripheral) -> QueueResult<()> {
    if peripheral.is_connected().await? {
        info!("Disconnecting from peripheral");
        peripheral.disconnect().await?;
    }
    Ok(())
}
