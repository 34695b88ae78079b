//! linkwatchd — connection liveness daemon.
//!
//! Probes one HTTP endpoint over a persistent connection, reports when it
//! goes offline, and reconnects with backoff until it comes back or the
//! reconnect budget runs out.
//!
//! # Usage
//!
//! ```text
//! linkwatchd watch --config /etc/linkwatchd.toml
//! linkwatchd watch --target 127.0.0.1:8080 --path /healthz --timeout 2s
//! linkwatchd check-config /etc/linkwatchd.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use linkwatchd::config::{DaemonConfig, Overrides};
use linkwatchd::watch::{self, WatchOutcome};

#[derive(Parser)]
#[command(name = "linkwatchd", about = "Connection liveness daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch a target until interrupted or until reconnection gives up.
    Watch {
        /// Path to linkwatchd.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Target address (host:port). Overrides the config file.
        #[arg(long)]
        target: Option<String>,

        /// Probe request path. Overrides the config file.
        #[arg(long)]
        path: Option<String>,

        /// Connect and probe timeout, e.g. "2s". Overrides the config file.
        #[arg(long)]
        timeout: Option<String>,

        /// Log output format.
        #[arg(long, value_enum, default_value = "text")]
        log_format: LogFormat,
    },
    /// Validate a config file and print the effective settings.
    CheckConfig {
        /// Path to linkwatchd.toml.
        config: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,linkwatch=debug,linkwatchd=debug".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Watch {
            config,
            target,
            path,
            timeout,
            log_format,
        } => {
            init_tracing(log_format);
            let overrides = Overrides {
                address: target,
                path,
                timeout,
            };
            let config = DaemonConfig::load(config.as_deref(), overrides)?;
            run_watch(config).await
        }
        Command::CheckConfig { config } => {
            let config = DaemonConfig::load(Some(&config), Overrides::default())?;
            print!("{}", config.to_effective_toml()?);
            Ok(())
        }
    }
}

async fn run_watch(config: DaemonConfig) -> anyhow::Result<()> {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    match watch::run(&config, shutdown).await? {
        WatchOutcome::Shutdown => {
            info!("linkwatchd stopped");
            Ok(())
        }
        WatchOutcome::GaveUp => {
            anyhow::bail!("gave up reconnecting to {}", config.target.address)
        }
    }
}
