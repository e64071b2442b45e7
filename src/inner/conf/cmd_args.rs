use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about,
    long_about = r###"Connects to a BLE peripheral and runs a request plan through a single-in-flight queue
"###
)]
pub(crate) struct AppConf {
    /// A YAML file with the peripheral selector and the requests to run.
    #[arg(long)]
    pub(crate) plan: PathBuf,

    /// How long to scan for a matching peripheral
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    pub(crate) scan_timeout: Duration,

    /// Peripheral connect timeout
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    pub(crate) connect_timeout: Duration,

    /// Timeout of a single GATT operation
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    pub(crate) operation_timeout: Duration,

    /// Keep the session open for this long after the plan is drained, logging notifications
    #[arg(long, value_parser = humantime::parse_duration, default_value = "0s")]
    pub(crate) listen: Duration,

    /// Reconnect and resubmit the whole plan this many times when the link drops
    #[arg(long, default_value_t = 0)]
    pub(crate) reconnect_attempts: u32,

    /// Expose prometheus metrics on this address
    #[arg(long)]
    pub(crate) metrics_address: Option<SocketAddr>,

    /// Drop idle metrics after this time
    #[arg(long, value_parser = humantime::parse_duration, default_value = "60s")]
    pub(crate) metrics_idle_timeout: Duration,
}
