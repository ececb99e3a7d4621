use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info};
use port_monitor::{Session, Settings, server};

#[derive(Parser, Debug)]
#[command(name = "port-monitor")]
#[command(about = "Continuously checks that a TCP port is reachable on a set of hosts")]
struct Args {
    /// A space-delimited list of hosts to monitor
    #[arg(long)]
    hosts: Option<String>,

    /// The port to monitor on each host
    #[arg(long, allow_negative_numbers = true)]
    port: Option<i64>,

    /// The interval on which to check each host, in milliseconds (must exceed 1000)
    #[arg(long, allow_negative_numbers = true)]
    interval: Option<i64>,

    /// Address the dashboard listens on
    #[arg(long)]
    listen: Option<String>,

    /// Settings file (defaults to PortMonitor/config.json in the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the resolved settings back to the settings file
    #[arg(long)]
    save: bool,
}

impl Args {
    fn apply(self, mut settings: Settings) -> Settings {
        if let Some(hosts) = self.hosts {
            settings.hosts = hosts;
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(interval) = self.interval {
            settings.interval_ms = interval;
        }
        if let Some(listen) = self.listen {
            settings.listen = listen;
        }
        settings
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let path = match args.config.clone() {
        Some(path) => path,
        None => Settings::get_config_path()?,
    };
    let save = args.save;
    let settings = args.apply(Settings::load_from(&path)?);

    if save {
        settings.save_to(&path)?;
        info!("Saved settings to {}", path.display());
    }

    monitor(&settings).await
}

/// Validates the settings, binds the dashboard and then monitors until either
/// the aggregator or the dashboard stops.
async fn monitor(settings: &Settings) -> Result<()> {
    let config = settings.monitor_config()?;
    let listen: SocketAddr = settings
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", settings.listen))?;
    let listener = server::bind(listen)
        .await
        .with_context(|| format!("could not bind dashboard to {}", listen))?;

    let session = Session::start(&config);
    let dashboard = server::spawn(listener, session.store());

    tokio::select! {
        result = session.wait() => result.context("aggregator stopped unexpectedly"),
        result = dashboard => match result.context("dashboard task panicked")? {
            Ok(()) => bail!("dashboard server stopped"),
            Err(e) => Err(anyhow::Error::from(e).context("dashboard server failed")),
        },
    }
}
