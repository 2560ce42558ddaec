//! sensor-relay binary
//!
//! Run with: sensor-relay [--host 0.0.0.0] [--producer-port 5050] [--subscriber-port 5005]
//!
//! Feed it from a device (or netcat):
//!   nc localhost 5050
//!
//! Watch from any WebSocket client:
//!   websocat ws://localhost:5005

use std::net::IpAddr;
use std::time::Duration;

use clap::{ArgAction, Parser};
use sensor_relay::producer::DEFAULT_MAX_LINE_LENGTH;
use sensor_relay::server::config::{
    DEFAULT_PRODUCER_PORT, DEFAULT_QUEUE_CAPACITY, DEFAULT_READ_BUFFER_SIZE,
    DEFAULT_SUBSCRIBER_PORT,
};
use sensor_relay::{FramingMode, Relay, RelayConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Relay a TCP sensor stream to WebSocket clients", long_about = None)]
struct Args {
    /// Interface to bind both endpoints to
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Raw TCP port the device connects to
    #[arg(long, env = "RELAY_PRODUCER_PORT", default_value_t = DEFAULT_PRODUCER_PORT)]
    producer_port: u16,

    /// WebSocket port display clients connect to
    #[arg(long, env = "RELAY_SUBSCRIBER_PORT", default_value_t = DEFAULT_SUBSCRIBER_PORT)]
    subscriber_port: u16,

    /// Maximum bytes taken from the device per read
    #[arg(long, env = "RELAY_READ_BUFFER_SIZE", default_value_t = DEFAULT_READ_BUFFER_SIZE)]
    read_buffer_size: usize,

    /// `chunk` relays each read as is, `lines` splits on newlines
    #[arg(long, env = "RELAY_FRAMING", default_value = "chunk")]
    framing: FramingMode,

    /// Longest line buffered before it is relayed anyway (lines framing)
    #[arg(long, env = "RELAY_MAX_LINE_LENGTH", default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    max_line_length: usize,

    /// Messages a slow client may have pending before it is dropped
    #[arg(long, env = "RELAY_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Set TCP_NODELAY on accepted sockets (`--tcp-nodelay false` turns it off)
    #[arg(long, env = "RELAY_TCP_NODELAY", default_value_t = true, action = ArgAction::Set)]
    tcp_nodelay: bool,

    /// Seconds between stats log lines (0 disables)
    #[arg(long, env = "RELAY_STATS_INTERVAL_SECS", default_value_t = 0)]
    stats_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensor_relay=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = RelayConfig::default()
        .host(args.host)
        .producer_port(args.producer_port)
        .subscriber_port(args.subscriber_port)
        .read_buffer_size(args.read_buffer_size)
        .framing(args.framing)
        .max_line_length(args.max_line_length)
        .subscriber_queue_capacity(args.queue_capacity)
        .tcp_nodelay(args.tcp_nodelay)
        .stats_interval(Duration::from_secs(args.stats_interval_secs));

    let relay = Relay::bind(config).await?;

    tracing::info!(
        producer = %relay.producer_addr(),
        subscriber = %relay.subscriber_addr(),
        "Relay started"
    );

    relay
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
