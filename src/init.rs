use std::net::SocketAddr;
use std::time::Duration;

use console_subscriber::ConsoleLayer;
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_tracing_context::{MetricsLayer, TracingContextLayer};
use metrics_util::layers::Stack;
use metrics_util::MetricKindMask;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::inner::metrics::describe_metrics;

pub(super) fn init_tracing() -> anyhow::Result<()> {
    let metrics_layer = MetricsLayer::new();
    let console_layer = ConsoleLayer::builder().with_default_env().spawn();
    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_ansi(atty::is(atty::Stream::Stdout))
        .with_target(false);
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(metrics_layer)
        .with(console_layer)
        .init();

    Ok(())
}

/// Serves `/metrics` on `listen_address`; span fields named below become labels.
pub(super) fn init_prometheus(listen_address: SocketAddr, idle_timeout: Duration) -> anyhow::Result<()> {
    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(listen_address)
        .idle_timeout(
            MetricKindMask::COUNTER | MetricKindMask::HISTOGRAM | MetricKindMask::GAUGE,
            Some(idle_timeout),
        )
        .build()?;

    Stack::new(recorder)
        .push(TracingContextLayer::only_allow(["adapter", "peripheral", "kind"]))
        .install()?;

    let handle = tokio::runtime::Handle::try_current()?;
    handle.spawn(exporter);

    describe_metrics();

    Ok(())
}
