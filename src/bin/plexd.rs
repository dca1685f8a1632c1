//! plexd - broker daemon
//!
//! Forwards traffic between the input socket and the configured
//! subscriber routes. Invoked with a TOML configuration file path; the
//! file is polled while running so route edits take effect without a
//! restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Context;

use plex::{BrokerConfig, Plex, PlexError};

const RELOAD_POLL_INTERVAL: Duration = Duration::from_secs(2);

fn print_usage(program: &str) {
    eprintln!("Usage: {} <config.toml>", program);
}

fn init_logging(config: &BrokerConfig) {
    let default_directive = if config.log.debug {
        "plex=debug"
    } else {
        "plex=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Dial every configured route, logging per-route failures.
///
/// One unreachable route must not keep the rest from being subscribed.
async fn subscribe_routes(broker: &Plex, routes: &[String]) {
    for route in routes {
        let (is_sub, _) = broker.exists(route).await;
        if is_sub {
            continue;
        }
        if let Err(e) = broker.subscribe_udp(route).await {
            tracing::warn!(route = %route, error = %e, "route subscription failed");
        }
    }
}

/// Poll the config file and reconcile the route set on change.
///
/// Parse failures keep the previous route set. Listen address and buffer
/// size cannot change at runtime.
async fn watch_config(broker: Arc<Plex>, path: PathBuf, mut current: BrokerConfig) {
    let mut last_mtime = file_mtime(&path);
    let mut ticker = tokio::time::interval(RELOAD_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let mtime = file_mtime(&path);
        if mtime == last_mtime {
            continue;
        }
        last_mtime = mtime;

        let reloaded = match BrokerConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "config reload failed, keeping current routes");
                continue;
            }
        };

        if reloaded.listen != current.listen || reloaded.buffer != current.buffer {
            tracing::info!("listen/buffer changes require a restart; routes reconciled only");
        }

        for removed in current
            .routes
            .iter()
            .filter(|r| !reloaded.routes.contains(r))
        {
            tracing::info!(route = %removed, "route removed");
            broker.unsubscribe(removed).await;
        }
        subscribe_routes(&broker, &reloaded.routes).await;

        current = reloaded;
    }
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "plexd".to_string());
    let config_path = match args.next() {
        Some(path) => PathBuf::from(path),
        None => {
            print_usage(&program);
            std::process::exit(1);
        }
    };

    // A malformed config file ends the process before the broker starts.
    let config = match BrokerConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    // One explicitly-owned broker; everything that needs it gets a handle.
    let broker = Arc::new(
        Plex::with_pipe_depth(config.buffer, config.pipe_depth)
            .context("construct broker")?,
    );

    let listen_addr = config.listen.clone();
    let listener = Arc::clone(&broker);
    let mut listen_task =
        tokio::spawn(async move { listener.listen_udp(&listen_addr).await });

    subscribe_routes(&broker, &config.routes).await;

    tokio::spawn(watch_config(
        Arc::clone(&broker),
        config_path,
        config.clone(),
    ));

    // A listener failure is fatal: without ingress the daemon is inert.
    // Only the designed shutdown path (closed pipe) is a clean exit.
    tokio::select! {
        res = &mut listen_task => {
            broker.close().await;
            return match res {
                Ok(Ok(())) | Ok(Err(PlexError::Closed)) => Ok(()),
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("listener failed")),
                Err(e) => Err(anyhow::Error::new(e).context("listener task panicked")),
            };
        }
        res = wait_for_shutdown_signal() => {
            res?;
            tracing::info!("shutdown signal received");
        }
    }

    broker.close().await;
    let _ = tokio::time::timeout(Duration::from_secs(1), listen_task).await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
