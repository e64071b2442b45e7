use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::inner::conf::cmd_args::AppConf;
use crate::inner::conf::dto::request_plan::RequestPlanDto;
use crate::inner::error::QueueResult;
use crate::inner::model::queue_event::QueueEvent;
use crate::inner::observer::log_events;
use crate::inner::session::PeripheralSession;

mod init;
mod inner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init::init_tracing()?;

    let app_conf = AppConf::parse();
    if let Some(metrics_address) = app_conf.metrics_address {
        init::init_prometheus(metrics_address, app_conf.metrics_idle_timeout)?;
        info!(%metrics_address, "Serving metrics");
    }

    let plan = RequestPlanDto::try_from(&app_conf)?;
    info!(requests = plan.requests.len(), plan = ?app_conf.plan, "Loaded request plan");

    let (event_sender, event_receiver) = kanal::unbounded_async::<QueueEvent>();
    let session = PeripheralSession::open(&plan.peripheral, &app_conf, event_sender).await?;

    let mut join_set: JoinSet<QueueResult<()>> = JoinSet::new();
    join_set.spawn(log_events(event_receiver));
    join_set.spawn(Arc::clone(&session).watch_disconnect());
    join_set.spawn(Arc::clone(&session).forward_notifications());

    let mut attempts_left = app_conf.reconnect_attempts;
    loop {
        session.run_plan(&plan.requests).await;
        session.scheduler().wait_idle().await;
        if session.scheduler().is_connected().await {
            break;
        }
        if attempts_left == 0 {
            warn!("Session ended before the plan was drained");
            break;
        }
        attempts_left -= 1;
        warn!(attempts_left, "Session ended before the plan was drained, reconnecting");
        session.reconnect().await?;
    }

    if session.scheduler().is_connected().await {
        if !app_conf.listen.is_zero() {
            info!(listen = ?app_conf.listen, "Plan drained, listening for notifications");
            tokio::time::sleep(app_conf.listen).await;
        }
        session.close().await?;
    }

    join_set.abort_all();
    while let Some(result) = join_set.join_next().await {
        if let Ok(Err(err)) = result {
            warn!(%err, "Background task ended");
        }
    }

    Ok(())
}
