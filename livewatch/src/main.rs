//! livewatch - keeps one listener per active AcFun live room.
//!
//! Polls the live room list, starts a listener (and optionally a periodic
//! like) for every room that is live and not filtered, and stops listeners
//! for rooms that went offline.

mod config;
mod engage;
mod filter;
mod listener;
mod logging;
mod metrics;
mod monitor;
mod registry;
mod scheduler;
#[cfg(test)]
mod testutil;
#[cfg(feature = "web")]
mod web;

use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

use acfun_api::{AcfunClient, ClientConfig};

use config::{Args, ConfigFile, Settings};
use listener::{CommentPrinter, EventDispatcher};
use monitor::{LiveMonitor, MonitorSettings};
use registry::Registries;
use scheduler::{Reconciler, ReconcilerConfig, StatusReporter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load config file: explicit path > auto-detect > default
    let file_config = match config::locate_config(args.config.clone()) {
        Some(path) => match config::load_config(&path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e.into());
            }
        },
        None => ConfigFile::default(),
    };

    let settings = match Settings::resolve(args, file_config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    logging::init_logging(
        &settings.log_dir,
        settings.log_retention_days,
        settings.verbose,
        settings.log_level.as_deref(),
    )?;

    info!("livewatch starting...");
    info!("  Account: {}", settings.account);
    info!("  Poll interval: {}s", settings.poll_interval.as_secs());
    info!("  Filter list: {}", settings.filter_list.display());
    info!("  Auto like: {}", settings.auto_like);
    if settings.auto_like {
        info!("  Like interval: {}s", settings.like_interval.as_secs());
    }

    let client = Arc::new(AcfunClient::new(ClientConfig::default())?);
    let session = match client.login(&settings.account, &settings.password).await {
        Ok(session) => Arc::new(session),
        Err(e) => {
            error!("Login failed: {}", e);
            return Err(e.into());
        }
    };

    let registries = Registries::new();
    if let Err(e) = registries.filter.reload(&settings.filter_list).await {
        warn!("Failed to load filter list: {}", e);
    }

    let dispatcher = EventDispatcher::new().with_handler(CommentPrinter);
    let monitor = LiveMonitor::new(
        session,
        client.clone(),
        client.clone(),
        dispatcher,
        registries,
        MonitorSettings {
            auto_engage: settings.auto_like,
            engage_interval: settings.like_interval,
        },
    );

    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&monitor),
        client.clone(),
        ReconcilerConfig {
            poll_interval: settings.poll_interval,
        },
    ));
    let reconciler_task = reconciler.start();

    let reporter_task = StatusReporter::new(Arc::clone(&monitor), settings.status_interval).start();

    spawn_status_api(&settings, &monitor);

    shutdown_signal().await;
    info!("Received stop signal, shutting down...");

    monitor.stop().await;
    let _ = reconciler_task.await;
    let _ = reporter_task.await;

    info!("livewatch stopped");
    Ok(())
}

#[cfg(feature = "web")]
fn spawn_status_api(settings: &Settings, monitor: &Arc<LiveMonitor>) {
    let Some(web_listen) = settings.web_listen else {
        return;
    };
    let web_state = Arc::new(web::WebState::new(
        Arc::clone(monitor),
        settings.filter_list.clone(),
    ));
    tokio::spawn(async move {
        if let Err(e) = web::start_web_server(web_listen, web_state).await {
            error!("Status API error: {}", e);
        }
    });
}

#[cfg(not(feature = "web"))]
fn spawn_status_api(settings: &Settings, _monitor: &Arc<LiveMonitor>) {
    if settings.web_listen.is_some() {
        warn!("Status API requested but livewatch was built without the web feature");
    }
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
