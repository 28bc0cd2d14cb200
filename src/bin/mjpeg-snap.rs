//! Snapshot server
//!
//! Run with: mjpeg-snap --rtc-host rtsp://127.0.0.1:8554 --cameras Lobby,Garage
//!
//! Every flag can also be set through its environment variable (`RTC_HOST`,
//! `CAMERAS`, `FPS`, `QUALITY`, `HOST`, `PORT`, ...). Log output is controlled
//! with `RUST_LOG`.
//!
//! Fetch a frame:
//!   curl -o lobby.jpg http://localhost:8000/Lobby
//!
//! Start a camera without waiting for a frame:
//!   curl http://localhost:8000/start/Lobby

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mjpeg_snap::cli::Args;
use mjpeg_snap::HttpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mjpeg_snap=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    let registry_config = args.registry_config().context("invalid configuration")?;
    let server_config = args.server_config();

    tracing::info!(
        base_url = %registry_config.base_url,
        decoder = %registry_config.decoder.program,
        fps = registry_config.decoder.fps,
        quality = registry_config.decoder.quality,
        cameras = server_config.preload.len(),
        "Starting snapshot server"
    );

    let server = HttpServer::new(server_config, registry_config);
    let addr = server.bind_addr();

    server
        .run_until(shutdown_signal())
        .await
        .with_context(|| format!("server on {addr} failed"))?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
