use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use dx_pulse::{client, publish, server, PulseConfig};

#[derive(Parser)]
#[command(name = "dx-pulse")]
#[command(about = "Fan out server-generated notifications to streaming clients", version)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also write logs to daily-rotated files in this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the event stream server
    Serve {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        port: Option<u16>,

        /// Shared token required from stream clients
        #[arg(long)]
        token: Option<String>,

        /// Publish a system:heartbeat event every N seconds
        #[arg(long, value_name = "SECS")]
        heartbeat: Option<u64>,
    },

    /// Follow an event stream and print each event
    Tail {
        #[arg(default_value = "http://127.0.0.1:8080/api/events")]
        url: String,

        #[arg(long)]
        token: Option<String>,
    },

    /// Print the effective configuration
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(level: &str, log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console = tracing_subscriber::fmt::layer();

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "dx-pulse.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(&cli.log_level, cli.log_dir.as_ref());

    match cli.command {
        Commands::Serve {
            config,
            port,
            token,
            heartbeat,
        } => {
            let mut config = PulseConfig::load(config.as_deref())?;
            if let Some(port) = port {
                config.server.port = port;
            }
            config.set_token(token);

            println!(
                "{}",
                format!("🌐 Starting event server on {}...", config.bind_addr())
                    .cyan()
                    .bold()
            );
            if !config.events.enabled {
                println!("{}", "⚠ events disabled: stream requests get 503".yellow());
            }

            let shutdown = CancellationToken::new();
            tokio::spawn({
                let shutdown = shutdown.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::info!("shutdown requested");
                    }
                    shutdown.cancel();
                }
            });

            let heartbeat_cancel = shutdown.clone();
            server::start(&config, shutdown, move |publisher| {
                if let (Some(publisher), Some(secs)) = (publisher, heartbeat) {
                    publish::spawn_heartbeat(
                        publisher,
                        Duration::from_secs(secs.max(1)),
                        heartbeat_cancel,
                    );
                }
            })
            .await?;
        }

        Commands::Tail { url, token } => {
            client::tail(&url, token.as_deref()).await?;
        }

        Commands::Config { config } => {
            let config = PulseConfig::load(config.as_deref())?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
