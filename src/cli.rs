use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::info;

use flowlens::aggregator::Aggregator;
use flowlens::capture;
use flowlens::config::Config;
use flowlens::export::{spawn_rotation, RecordSink, RotatingCsvSink};
use flowlens::geo::{DnsDomainResolver, DomainResolver, GeoResolver, IpinfoResolver, NullResolver};

#[derive(Parser)]
#[command(name = "flowlens")]
#[command(author, version, about = "Per-flow network traffic statistics exporter")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture packets and export per-flow records
    Run {
        /// Interface to capture on
        #[arg(short, long)]
        interface: Option<String>,

        /// Directory for the rotating CSV output
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// List capture interfaces
    Devices,
}

pub async fn run_command(cli: Cli) -> Result<()> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            interface,
            output_dir,
        } => {
            if interface.is_some() {
                config.capture.interface = interface;
            }
            if let Some(dir) = output_dir {
                config.export.output_dir = dir;
            }
            run(config).await
        }
        Commands::Devices => {
            for iface in capture::list_interfaces() {
                let state = if iface.is_up() { "up" } else { "down" };
                let addrs: Vec<String> = iface.ips.iter().map(|ip| ip.to_string()).collect();
                println!("{:<12} {:<5} {}", iface.name, state, addrs.join(", "));
            }
            Ok(())
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let geo: Arc<dyn GeoResolver> = if config.geo.enabled {
        Arc::new(IpinfoResolver::new(&config.geo).context("failed to build geo resolver")?)
    } else {
        info!("geolocation lookups disabled");
        Arc::new(NullResolver)
    };

    let domains: Option<Arc<dyn DomainResolver>> = if config.geo.rdns_enabled {
        Some(Arc::new(DnsDomainResolver::new()))
    } else {
        None
    };

    let rotating = Arc::new(Mutex::new(RotatingCsvSink::open(&config.export.output_dir)?));
    let sink: Arc<Mutex<dyn RecordSink>> = rotating.clone();

    let rotation = spawn_rotation(
        rotating.clone(),
        Duration::from_secs(config.export.rotate_secs.max(1)),
    );

    let (tx, rx) = mpsc::channel(1024);
    let capture_thread = capture::spawn_capture(&config.capture, tx)?;

    let aggregator = Aggregator::new(&config, geo, domains, sink);
    let result = aggregator.run(rx).await;

    rotation.abort();
    drop(capture_thread);

    result.context("record pipeline failed")
}
