use btleplug::api::{Central, Manager as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures_util::StreamExt;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::inner::conf::dto::peripheral::PeripheralSelectorDto;
use crate::inner::conf::filter::Evaluate;
use crate::inner::error::{QueueError, QueueResult};
use crate::inner::model::adapter_info::AdapterInfo;
use crate::inner::model::peripheral_key::PeripheralKey;
use crate::inner::session::ext::CentralEventExt;

pub(super) struct Discovered {
    pub(super) adapter: Adapter,
    pub(super) adapter_info: AdapterInfo,
    pub(super) peripheral: Peripheral,
    pub(super) peripheral_key: PeripheralKey,
}

/// Scans every adapter accepted by `selector` until a matching peripheral shows up
/// or the scan deadline passes.
#[tracing::instrument(level = "info", skip_all, err)]
pub(super) async fn find_peripheral(
    selector: &PeripheralSelectorDto,
    scan_timeout: std::time::Duration,
) -> QueueResult<Discovered> {
    let deadline = Instant::now() + scan_timeout;
    let manager = Manager::new().await?;

    for adapter in manager.adapters().await? {
        let adapter_info = AdapterInfo::try_from(adapter.adapter_info().await?)?;
        if !selector.matches_adapter(&adapter_info.id) {
            debug!(%adapter_info, "Adapter filtered out");
            continue;
        }

        info!(%adapter_info, "Scanning for peripheral");
        match scan(&adapter, &adapter_info, selector, deadline).await {
            Ok(Some((peripheral, peripheral_key))) => {
                adapter.stop_scan().await?;
                info!(%peripheral_key, "Found peripheral");
                return Ok(Discovered {
                    adapter,
                    adapter_info,
                    peripheral,
                    peripheral_key,
                });
            }
            Ok(None) => {}
            Err(QueueError::TimeoutError(_)) => {
                warn!(%adapter_info, "Scan timed out");
            }
            Err(err) => return Err(err),
        }
        adapter.stop_scan().await?;
    }

    Err(QueueError::PeripheralNotFound)
}

async fn scan(
    adapter: &Adapter,
    adapter_info: &AdapterInfo,
    selector: &PeripheralSelectorDto,
    deadline: Instant,
) -> QueueResult<Option<(Peripheral, PeripheralKey)>> {
    let mut stream = adapter.events().await?;
    adapter.start_scan(ScanFilter::default()).await?;

    // Already known to the adapter, e.g. bonded or seen by an earlier scan.
    for peripheral in adapter.peripherals().await? {
        if let Some(found) = evaluate(adapter_info, selector, peripheral).await? {
            return Ok(Some(found));
        }
    }

    while let Some(event) = timeout_at(deadline, stream.next()).await? {
        let Some(peripheral_id) = event.get_peripheral_id() else {
            continue;
        };
        let peripheral = match adapter.peripheral(peripheral_id).await {
            Ok(peripheral) => peripheral,
            Err(err) => {
                debug!(?err, "Peripheral vanished before it could be inspected");
                continue;
            }
        };
        if let Some(found) = evaluate(adapter_info, selector, peripheral).await? {
            return Ok(Some(found));
        }
    }

    debug!("Adapter event stream ended");
    Ok(None)
}

async fn evaluate(
    adapter_info: &AdapterInfo,
    selector: &PeripheralSelectorDto,
    peripheral: Peripheral,
) -> QueueResult<Option<(Peripheral, PeripheralKey)>> {
    let peripheral_key = PeripheralKey::read(&adapter_info.id, &peripheral).await?;
    if selector.evaluate(&peripheral_key) {
        Ok(Some((peripheral, peripheral_key)))
    } else {
        Ok(None)
    }
}
