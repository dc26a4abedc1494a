//! HTTP surface: axum router, handlers and server start-up.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::WebConfig;
use state::AppState;

/// Binds `config.host:config.port` and serves until SIGINT or SIGTERM.
pub async fn run_server(config: WebConfig, state: Arc<AppState>) -> Result<(), std::io::Error> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let app = routes::build(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install CTRL+C signal handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
