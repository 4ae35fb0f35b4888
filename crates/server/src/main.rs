// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `plrd`: the Planroom pipeline daemon binary.

use plr_core::PipelineConfig;
use plr_server::Daemon;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // File logging when PLANROOM_LOG_DIR is set, stderr otherwise.
    let _guard = match std::env::var_os("PLANROOM_LOG_DIR") {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "plrd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_writer(std::io::stderr)
                .init();
            None
        }
    };

    let mut config = match std::env::var_os("PLANROOM_CONFIG") {
        Some(path) => match PipelineConfig::load(std::path::Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "failed to load config");
                return ExitCode::FAILURE;
            }
        },
        None => PipelineConfig::default(),
    };
    if let Some(dir) = std::env::var_os("PLANROOM_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Ok(addr) = std::env::var("PLANROOM_LISTEN") {
        config.listen_addr = addr;
    }

    let daemon = match Daemon::start(config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!(error = %e, "daemon startup failed");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %daemon.addr(), "listening");

    shutdown_signal().await;
    daemon.shutdown().await;
    ExitCode::SUCCESS
}

/// Wait for ctrl-c or, on unix, SIGTERM (what orchestrators send on stop).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!(error = %e, "signal wait failed");
                        }
                    }
                    _ = sigterm.recv() => info!("received SIGTERM"),
                }
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "signal wait failed");
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "signal wait failed");
        }
    }
}
