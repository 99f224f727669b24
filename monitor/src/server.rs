//! axumサーバー起動・シャットダウンハンドリング

use crate::common::error::{MonitorError, MonitorResult};
use crate::AppState;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// axumサーバーを起動し、シャットダウンシグナルを待機する
///
/// Ctrl+C / SIGTERM のほか、`stop` がキャンセルされた場合
/// （スケジューラの致命的エラーなど）にも停止する。
pub async fn run(state: AppState, bind_addr: &str, stop: CancellationToken) -> MonitorResult<()> {
    let app = crate::api::create_app(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| MonitorError::Config(format!("failed to bind {bind_addr}: {e}")))?;

    info!("Endpoint monitor listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(stop))
        .await
        .map_err(|e| MonitorError::Internal(format!("server error: {e}")))?;

    info!("Server shutdown complete");
    Ok(())
}

/// シャットダウンシグナルを待機
async fn shutdown_signal(stop: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = stop.cancelled() => {
            info!("Scheduler stopped, shutting down...");
        }
    }
}
