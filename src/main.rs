//! bluez-battery-push: Bluetooth battery levels for a Prometheus Pushgateway
//!
//! Watches one paired BlueZ device and pushes two gauges at a fixed interval:
//! - battery_level: percentage, -1 when the device has no battery service,
//!   0 while disconnected
//! - connected: 1 or 0
//!
//! Both are grouped under the configured job and the device address.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// === Modules ===

mod bluez;
mod config;
mod error;
mod metrics;
mod sampler;

use bluez::{dbus::BluezController, Directory, DeviceReader};
use config::{Config, Layer};
use metrics::PushGateway;
use sampler::Sampler;

// === CLI ===

#[derive(Parser)]
#[command(name = "bluez-battery-push")]
#[command(about = "Push Bluetooth device battery level and link state to a Prometheus Pushgateway")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Device Bluetooth address [env: DEVICE] [default: 00:00:00:00:00:00]
    #[arg(long, global = true)]
    device: Option<String>,

    /// Pushgateway endpoint [env: ENDPOINT, PEP] [default: http://localhost:9091/]
    #[arg(long, visible_alias = "pep", global = true)]
    endpoint: Option<String>,

    /// Job label for every push [env: JOB, PJ] [default: battery]
    #[arg(long, visible_alias = "pj", global = true)]
    job: Option<String>,

    /// Seconds between samples [env: INTERVAL] [default: 30]
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Bluetooth adapter [env: ADAPTER] [default: hci0]
    #[arg(long, global = true)]
    adapter: Option<String>,

    /// Verify the Pushgateway's TLS certificate [env: TLS_VERIFY]
    #[arg(long, global = true)]
    tls_verify: bool,

    /// Config file (default: ~/.config/bluez-battery-push/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the devices known to the adapter
    Devices,
}

impl Cli {
    fn flag_layer(&self) -> Layer {
        Layer {
            device: self.device.clone(),
            endpoint: self.endpoint.clone(),
            job: self.job.clone(),
            interval: self.interval,
            adapter: self.adapter.clone(),
            tls_verify: self.tls_verify.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let file = Config::load_file(cli.config.as_deref())?;
    let env = Layer::from_env(|key| std::env::var(key).ok())?;
    let config = Config::resolve(file, cli.flag_layer(), env)?;

    match cli.command {
        Some(Commands::Devices) => list_devices(&config).await,
        None => run(config).await,
    }
}

/// Print every device under the adapter with its current state
async fn list_devices(config: &Config) -> anyhow::Result<()> {
    let controller = BluezController::connect(&config.adapter, config.call_timeout())
        .await
        .context("Failed to connect to system bus")?;

    let handles = Directory::new(&controller)
        .list_devices()
        .await
        .with_context(|| format!("Failed to enumerate devices on {}", config.adapter))?;

    if handles.is_empty() {
        println!("No devices known to {}", config.adapter);
        return Ok(());
    }

    let reader = DeviceReader::new(&controller);
    println!("{} device(s) on {}:", handles.len(), config.adapter);
    for handle in &handles {
        match reader.read(handle).await {
            Ok(d) => {
                let name = if d.name.is_empty() { "(unknown)" } else { d.name.as_str() };
                let battery = if d.has_battery() {
                    format!("{}%", d.percentage)
                } else {
                    "n/a".to_string()
                };
                println!(
                    "  {}  {:<24} paired: {:<5} connected: {:<5} battery: {}",
                    d.address, name, d.paired, d.connected, battery
                );
            }
            Err(e) => println!("  {}  (unreadable: {})", handle, e),
        }
    }

    Ok(())
}

/// Resolve the device, then sample until the process is killed
async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("Interval: {}s", config.interval.as_secs());
    tracing::info!("Push gateway endpoint: {}", config.endpoint);

    let timeout = config.call_timeout();

    let controller = BluezController::connect(&config.adapter, timeout)
        .await
        .context("Failed to connect to system bus")?;

    let gateway = PushGateway::new(&config.endpoint, &config.job, config.tls_verify, timeout)
        .context("Failed to build Pushgateway client")?;
    if !config.tls_verify && config.endpoint.starts_with("https") {
        tracing::warn!("Pushgateway TLS certificates are not verified (use --tls-verify to enable)");
    }

    let sampler = Sampler::start(controller, gateway, &config.device, config.interval).await?;
    tracing::info!(
        "Sampling {} every {}s as job '{}'",
        sampler.handle(),
        config.interval.as_secs(),
        config.job
    );

    sampler.run().await;
    Ok(())
}
