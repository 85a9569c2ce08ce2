//! Web server: router assembly, binding and graceful shutdown.

pub mod router;
pub mod types;

pub use router::create_router;
pub use types::ServerState;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use smarthome_core::config::HttpConfig;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Bind the configured address and serve until Ctrl+C / SIGTERM.
pub async fn run(state: ServerState, http: &HttpConfig) -> anyhow::Result<()> {
    let addr = http.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(category = "server", addr = %listener.local_addr()?, "server_start");

    let app = create_router(state, http);
    serve(
        listener,
        app,
        crate::shutdown::shutdown_signal(),
        http.shutdown_timeout,
    )
    .await
}

/// Serve `app` until `shutdown` resolves, then drain in-flight requests for
/// at most `shutdown_timeout`.
pub async fn serve<S>(
    listener: TcpListener,
    app: Router,
    shutdown: S,
    shutdown_timeout: Duration,
) -> anyhow::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let drain = Arc::new(Notify::new());
    let mut server = {
        let drain = drain.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { drain.notified().await })
                .await
        })
    };

    tokio::select! {
        result = &mut server => {
            // The server stopped on its own.
            result??;
            return Ok(());
        }
        _ = shutdown => {}
    }

    tracing::info!(category = "server", "server_shutdown");
    drain.notify_one();

    match tokio::time::timeout(shutdown_timeout, server).await {
        Ok(result) => {
            result??;
            tracing::info!(category = "server", "shutdown_ok");
            Ok(())
        }
        Err(_) => {
            tracing::warn!(
                category = "server",
                timeout_ms = shutdown_timeout.as_millis() as u64,
                "shutdown_timeout"
            );
            anyhow::bail!("graceful shutdown timed out after {:?}", shutdown_timeout)
        }
    }
}
