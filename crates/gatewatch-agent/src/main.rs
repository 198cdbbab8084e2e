//! Gatewatch agent
//!
//! Supervises the gateway's cellular modem and logs every change in its
//! status. Usage: `gatewatch-agent [CONFIG]`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gatewatch_core::prelude::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long the supervisor gets to close the modem after shutdown is requested
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Gateway monitoring agent
#[derive(Parser, Debug)]
#[command(name = "gatewatch-agent")]
#[command(author, version, about = "Supervises the cellular modem and logs its status")]
struct Args {
    /// JSON configuration file; built-in defaults when omitted
    #[arg(env = "GATEWATCH_CONFIG")]
    config: Option<PathBuf>,
}

fn init_logging(env: &Environment) {
    // DEBUG / TRACE override RUST_LOG
    let filter = if env.debug || env.trace {
        EnvFilter::new(env.log_filter())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env.log_filter()))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Log a status record, at info level only when it differs from the last one
fn report(last: &mut Option<ModemStatusMessage>, status: ModemStatusMessage) -> Result<()> {
    let json = serde_json::to_string(&status).context("failed to encode modem status")?;
    if last.as_ref() == Some(&status) {
        debug!("Modem status unchanged: {}", json);
    } else {
        info!("Modem status: {}", json);
        *last = Some(status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = Environment::detect();
    init_logging(&env);
    info!("Gatewatch agent v{}", gatewatch_core::VERSION);

    let config = match args.config {
        Some(path) => AgentConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AgentConfig::default(),
    };

    let settings = config.supervisor_settings(&env);
    settings
        .transport
        .validate()
        .context("invalid transport configuration")?;
    info!(
        "Monitoring modem on {} (target device: {})",
        settings.transport.port_name, env.target_device
    );

    let (status_tx, mut status_rx) = mpsc::channel(config.channel_capacity());
    let cancel = CancellationToken::new();
    let mut supervisor =
        Supervisor::new(SerialConnector, settings, status_tx, cancel.clone()).spawn();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut last = None;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            status = status_rx.recv() => match status {
                Some(status) => report(&mut last, status)?,
                None => {
                    warn!("Modem supervisor exited");
                    break;
                }
            },
        }
    }

    cancel.cancel();
    drop(status_rx);

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut supervisor).await {
        Ok(Ok(())) => info!("Modem supervisor stopped"),
        Ok(Err(e)) => error!("Modem supervisor task failed: {}", e),
        Err(_) => {
            warn!(
                "Modem supervisor did not stop within {:?}, exiting anyway",
                SHUTDOWN_GRACE
            );
            std::process::exit(1);
        }
    }

    Ok(())
}
