//! deskgauge command line entry point
//!
//! Runs the metric sampler and prints the panel status, or renders a single
//! gauge path.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deskgauge_monitor::{
    config::{LoggingConfig, MonitorConfig},
    gauge::build_gauge_path,
    metric::Sample,
    panel::PanelState,
    sampler::{MetricSampler, StreamStatus},
    source::{MetricSource, MockSource, SysinfoSource},
};

/// deskgauge command line interface
#[derive(Parser)]
#[command(name = "deskgauge")]
#[command(about = "Live memory, CPU temperature and network throughput for the desktop panel")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides the configuration file)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Sample metrics until interrupted
    Run {
        /// Use synthetic readings instead of the host's sensors
        #[arg(long)]
        demo: bool,

        /// Print every sample as a JSON line instead of the panel summary
        #[arg(long)]
        json: bool,
    },

    /// Print the gauge path for a fill percentage
    Gauge {
        /// Fill percentage
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = GaugeFormat::Svg)]
        format: GaugeFormat,
    },

    /// Validate configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GaugeFormat {
    Svg,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };

    if let Err(e) = initialize_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {:#}", e);
        process::exit(1);
    }

    let result = match cli.command {
        Some(Commands::Run { demo, json }) => run_monitor(config, demo, json).await,
        Some(Commands::Gauge { percent, format }) => print_gauge(percent, format),
        Some(Commands::Config { show }) => handle_config(&config, show),
        None => run_monitor(config, false, false).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

/// Load configuration from file, environment and command line
fn load_configuration(cli: &Cli) -> anyhow::Result<MonitorConfig> {
    let path = match &cli.config {
        Some(path) => {
            anyhow::ensure!(path.exists(), "configuration file not found: {}", path.display());
            Some(path.clone())
        }
        None => MonitorConfig::default_config_path().ok(),
    };

    let mut config = MonitorConfig::load_with_fallback(path.as_ref())
        .with_context(|| match &path {
            Some(path) => format!("loading {}", path.display()),
            None => "loading defaults".to_string(),
        })?;

    if let Some(level) = &cli.log_level {
        config.logging.level = level.to_lowercase();
    }
    config.logging.json |= cli.json_logs;
    config.validate()?;

    Ok(config)
}

/// Initialize logging based on configuration
fn initialize_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("deskgauge_monitor={}", logging.level).parse()?)
        .add_directive(format!("deskgauge={}", logging.level).parse()?)
        .add_directive("tokio=warn".parse()?);

    if logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

/// Sample until Ctrl-C or SIGTERM, printing one line per sample
async fn run_monitor(config: MonitorConfig, demo: bool, json: bool) -> anyhow::Result<()> {
    let source: Arc<dyn MetricSource> = if demo {
        info!("Running with synthetic readings");
        Arc::new(MockSource::demo())
    } else {
        Arc::new(SysinfoSource::new())
    };

    let schedules = config.schedules();
    let mut sampler = MetricSampler::new(source);

    // Merge every stream into one channel so the panel sees samples in arrival order.
    let (tx, mut rx) = mpsc::unbounded_channel::<Sample>();
    for schedule in &schedules {
        let tx = tx.clone();
        sampler.subscribe_with(schedule.kind, move |sample: &Sample| {
            let _ = tx.send(sample.clone());
        });
    }
    drop(tx);

    sampler.start(&schedules)?;

    let mut panel = PanelState::default();
    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            sample = rx.recv() => {
                let Some(sample) = sample else { break };
                panel.apply(&sample);
                if json {
                    println!("{}", serde_json::to_string(&sample)?);
                } else {
                    println!("{}", panel.summary());
                }
            }
        }
    }

    sampler.stop().await?;

    for schedule in &schedules {
        if let Some(StreamStatus::Failed(reason)) = sampler.status(schedule.kind) {
            warn!("Stream {} never ran: {}", schedule.kind, reason);
        }
    }
    Ok(())
}

/// Print one gauge path
fn print_gauge(percent: u8, format: GaugeFormat) -> anyhow::Result<()> {
    let path = build_gauge_path(percent);

    match format {
        GaugeFormat::Svg => {
            println!(
                concat!(
                    r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="-5 -5 90 90">"#,
                    r#"<circle cx="40" cy="40" r="40" fill="none" stroke="gray"/>"#,
                    r#"<path d="{}" fill="steelblue"/></svg>"#
                ),
                path.to_svg_path()
            );
        }
        GaugeFormat::Json => {
            let document = serde_json::json!({
                "percent": percent,
                "area": path.area(),
                "points": path.points(),
            });
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }

    Ok(())
}

/// Handle configuration commands
fn handle_config(config: &MonitorConfig, show: bool) -> anyhow::Result<()> {
    if show {
        println!("Effective configuration:");
        println!("{}", config.to_toml()?);
    } else {
        config.validate()?;
        println!("Configuration is valid");
    }

    Ok(())
}

/// Handle shutdown signals
async fn wait_for_shutdown() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl-C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl-C, shutting down");
    }

    Ok(())
}
