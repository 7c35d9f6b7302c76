//! LoRa mesh node
//!
//! This binary drives a UART LoRa modem and runs one-hop peer discovery:
//! - `run` provisions the modem and beacons for peers until interrupted
//! - `status` prints the module's settings and driver diagnostics
//! - `send` delivers a single payload
//! - `ports` lists serial ports

mod config;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use loranet_mesh::{MeshEvent, MeshNode};
use loranet_modem::{list_ports, Modem, ModemSettings, ModemTasks, SerialInterface};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{NodeConfig, Overrides};

#[derive(Parser)]
#[command(name = "loranet-node")]
#[command(about = "LoRa mesh node with beacon peer discovery")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Serial port of the modem
    #[arg(long, global = true)]
    port: Option<PathBuf>,

    /// Serial baud rate
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Node address
    #[arg(long, global = true)]
    address: Option<u16>,

    /// Network id
    #[arg(long, global = true)]
    network: Option<u8>,

    /// Network password (8 hex digits)
    #[arg(long, global = true)]
    password: Option<String>,

    /// Band: Hz, MHz or a region code (EU, US, ...)
    #[arg(long, global = true)]
    band: Option<String>,

    /// Shared mesh key
    #[arg(long, global = true)]
    key: Option<String>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Provision the modem and discover peers until interrupted
    Run,
    /// Print module settings and driver diagnostics
    Status,
    /// Send one payload
    Send {
        /// Destination address (0 broadcasts)
        #[arg(long, default_value_t = 0)]
        to: u16,
        /// Payload text
        payload: String,
    },
    /// List serial ports
    Ports,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port.clone(),
            baud_rate: self.baud,
            address: self.address,
            network_id: self.network,
            password: self.password.clone(),
            band: self.band.clone(),
            key: self.key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Command::Ports = args.command {
        return print_ports();
    }

    let config = NodeConfig::load(args.config.as_deref(), args.overrides())?;

    match args.command {
        Command::Run => run(config).await,
        Command::Status => status(&config.modem).await,
        Command::Send { to, ref payload } => send(&config.modem, payload, to).await,
        Command::Ports => print_ports(),
    }
}

/// Open the port, spawn the driver and wait until it is provisioned
async fn start_modem(settings: &ModemSettings) -> anyhow::Result<(Modem, ModemTasks)> {
    let link = SerialInterface::from_config(&settings.link)
        .open()
        .with_context(|| format!("Failed to open {}", settings.link.port.display()))?;
    let (modem, mut tasks) = Modem::spawn(link, settings, None);

    let stopped = tokio::select! {
        _ = modem.wait_ready() => None,
        result = &mut tasks.supervisor => Some(result),
    };
    if let Some(result) = stopped {
        tasks.reader.abort();
        task_result(result).context("Modem initialization failed")?;
        bail!("Modem supervisor exited before the modem was ready");
    }

    if let Some(module) = modem.module_info() {
        info!(version = %module.version, uid = %module.uid, "Modem ready");
    }
    Ok((modem, tasks))
}

fn task_result(result: Result<loranet_modem::Result<()>, JoinError>) -> anyhow::Result<()> {
    result.context("Task panicked")?.map_err(Into::into)
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    let (modem, tasks) = start_modem(&config.modem).await?;
    let node = MeshNode::new(Arc::new(modem), config.mesh).context("Invalid mesh configuration")?;

    info!(token = %node.token(), "Mesh token");
    let mut events = node.subscribe();
    let mesh = node.spawn();

    let display = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event display lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let ModemTasks { reader, supervisor } = tasks;
    let outcome = tokio::select! {
        result = supervisor => task_result(result).context("Modem supervisor stopped"),
        result = reader => task_result(result).context("Modem link closed"),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    };

    mesh.abort();
    display.abort();

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    outcome
}

fn print_event(event: &MeshEvent) {
    match event {
        MeshEvent::PeerDiscovered(peer) | MeshEvent::PeerRefreshed(peer) => {
            println!("{} rssi={} snr={}", event.label(), peer.rssi, peer.snr)
        }
        _ => println!("{}", event.label()),
    }
}

async fn status(settings: &ModemSettings) -> anyhow::Result<()> {
    let (modem, tasks) = start_modem(settings).await?;

    let report = modem
        .status_report()
        .await
        .context("Failed to query module settings")?;
    println!("Module settings:");
    for (name, value) in report {
        println!("  {:<12} {}", name, value);
    }

    println!("State: {}", modem.state());
    if let Some(record) = modem.last_error() {
        println!("Last error: {} at {}", record.code, record.at);
    }
    let stats = modem.stats();
    println!("Average command latency: {:.1} ms", stats.avg_command_latency_ms());
    println!("{}", serde_json::to_string_pretty(&stats)?);

    tasks.reader.abort();
    tasks.supervisor.abort();
    Ok(())
}

async fn send(settings: &ModemSettings, payload: &str, to: u16) -> anyhow::Result<()> {
    let (modem, tasks) = start_modem(settings).await?;

    let response = modem
        .send_message(payload, to)
        .await
        .with_context(|| format!("Failed to send to {}", to))?;
    println!("{}", response);

    tasks.reader.abort();
    tasks.supervisor.abort();
    Ok(())
}

fn print_ports() -> anyhow::Result<()> {
    let ports = list_ports().context("Failed to list serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port);
        if let Some(manufacturer) = &port.manufacturer {
            println!("  manufacturer: {}", manufacturer);
        }
    }
    Ok(())
}
