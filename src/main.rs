use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use shearbook::cli::{self, CommandError};
use shearbook::config::{Config, COMPACT_INTERVAL, ROLLOVER_INTERVAL};
use shearbook::engine::AppointmentStore;
use shearbook::notify::NotifyHub;
use shearbook::remote::JournalRemote;
use shearbook::rollover;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    shearbook::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let remote = Arc::new(JournalRemote::open(&config.journal_path())?);
    let store = Arc::new(AppointmentStore::new(remote.clone(), Arc::new(NotifyHub::new())));

    info!("shearbook started");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  compact_threshold: {}", config.compact_threshold);
    info!("  rollover: {}", if config.rollover { "enabled" } else { "disabled" });
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    if let Err(e) = store.load().await {
        tracing::error!("initial load failed: {e}");
    }

    tokio::spawn(rollover::run_compactor(
        remote.clone(),
        config.compact_threshold,
        COMPACT_INTERVAL,
    ));
    if config.rollover {
        tokio::spawn(rollover::run_rollover(store.clone(), ROLLOVER_INTERVAL));
    }

    // Stop reading on SIGTERM/ctrl-c; the command in progress finishes first.
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("no SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    println!("{}", cli::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("stdin error: {e}");
                        break;
                    }
                };
                let command = match cli::parse_command(&line) {
                    Ok(command) => command,
                    Err(CommandError::Empty) => continue,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                match cli::execute(&store, command).await {
                    Ok(out) => println!("{out}"),
                    Err(e) => println!("error: {e}"),
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    // Leave a compact journal behind.
    if let Err(e) = remote.compact().await {
        tracing::warn!("final compaction failed: {e}");
    }
    info!("shearbook stopped");
    Ok(())
}
