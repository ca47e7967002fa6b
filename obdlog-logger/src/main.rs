//! Continuous engine-RPM logger for ELM327-class OBD2 adapters.
//!
//! Connects to the adapter's serial channel (through a TCP bridge), polls
//! the RPM PID on a fixed interval and appends decoded samples to a durable
//! JSON-lines log. Runs unattended; every link fault is recovered by
//! reconnecting.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use obdlog_core::poll::poll_interval_from_ms;
use obdlog_core::{BdAddr, Obd2Link, Poller};

mod config;
mod storage;
mod tcp_link;

use config::Config;
use storage::JsonSampleLog;
use tcp_link::TcpLinkProvider;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "obdlog.json")]
    config: PathBuf,

    /// Override the SPP bridge address (host:port).
    #[arg(long)]
    bridge: Option<String>,

    /// Override the adapter Bluetooth address (AA:BB:CC:DD:EE:FF).
    #[arg(long)]
    adapter: Option<String>,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config);
    if let Some(bridge) = args.bridge {
        config.bridge_addr = bridge;
    }
    if let Some(adapter) = args.adapter {
        config.adapter_mac = adapter;
    }

    if args.write_config {
        let json = serde_json::to_vec_pretty(&config)?;
        storage::write_atomic(&args.config, &json)
            .with_context(|| format!("writing {}", args.config.display()))?;
        info!("wrote configuration to {}", args.config.display());
        return Ok(());
    }

    let address: BdAddr = config
        .adapter_mac
        .parse()
        .with_context(|| format!("adapter address {:?}", config.adapter_mac))?;
    let target: SocketAddr = config
        .bridge_addr
        .to_socket_addrs()
        .with_context(|| format!("bridge address {:?}", config.bridge_addr))?
        .next()
        .with_context(|| format!("bridge address {:?} resolves to nothing", config.bridge_addr))?;

    let provider = TcpLinkProvider::new(target, Duration::from_millis(config.connect_timeout_ms));
    let link = Obd2Link::new(provider);
    let sink = JsonSampleLog::new(&config.sample_log);
    let interval = poll_interval_from_ms(config.poll_interval_ms);

    info!("logging samples to {}", config.sample_log);
    let mut poller = Poller::new(link, sink, address, interval);
    poller.run()
}
