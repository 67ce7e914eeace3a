//! HTTP listeners for promgate
//!
//! The application router answers every request through the dispatcher.
//! The metrics endpoint runs on its own listener unless
//! `metrics.use_server_addr` mounts it on the application listener.

use axum::{Router, routing::any};
use futures::FutureExt;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::handlers::{self, AppState};

/// Build the application router
///
/// Unknown paths fall through to the dispatcher, which answers 404 and
/// counts them as unmatched. The metrics path, when mounted here, answers
/// any method and never reaches the dispatcher.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new();

    if state.config().metrics.use_server_addr() {
        let metrics_path = state.config().metrics.path().to_string();
        router = router.route(&metrics_path, any(handlers::metrics::handler));
    }

    router
        .fallback(handlers::dispatch::handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the standalone metrics router
pub fn metrics_app(state: AppState) -> Router {
    let metrics_path = state.config().metrics.path().to_string();

    Router::new()
        .route(&metrics_path, any(handlers::metrics::handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bound listeners, ready to serve
#[derive(Debug)]
pub struct Listeners {
    pub app: TcpListener,
    /// `None` when the metrics endpoint shares the application listener
    pub metrics: Option<TcpListener>,
}

/// Bind the application listener and, unless disabled, the metrics listener
///
/// # Errors
///
/// Returns `AppError::Bind` naming the address that could not be bound.
pub async fn bind(config: &Config) -> AppResult<Listeners> {
    let app = bind_address(&config.server.bind_address()).await?;

    let metrics = if config.metrics.use_server_addr() {
        None
    } else {
        Some(bind_address(config.metrics.address()).await?)
    };

    Ok(Listeners { app, metrics })
}

async fn bind_address(address: &str) -> AppResult<TcpListener> {
    TcpListener::bind(address)
        .await
        .map_err(|source| AppError::Bind {
            address: address.to_string(),
            source,
        })
}

/// Serve both listeners until `shutdown` resolves
///
/// Both listeners stop accepting on shutdown and drain in-flight requests.
/// An error on either listener ends the whole server.
pub async fn run<F>(state: AppState, listeners: Listeners, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = shutdown.shared();

    let app_server = axum::serve(
        listeners.app,
        app(state.clone()).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.clone())
    .into_future()
    .map(|result| result.map_err(|source| AppError::Serve { source }));

    match listeners.metrics {
        Some(listener) => {
            let metrics_server = axum::serve(
                listener,
                metrics_app(state).into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown)
            .into_future()
            .map(|result| result.map_err(|source| AppError::Serve { source }));

            tokio::try_join!(app_server, metrics_server)?;
        }
        None => app_server.await?,
    }

    Ok(())
}

/// Load state, bind and serve until Ctrl-C
pub async fn serve(config: Config) -> AppResult<()> {
    let state = AppState::new(Arc::new(config))?;
    let listeners = bind(state.config()).await?;

    if let Ok(addr) = listeners.app.local_addr() {
        tracing::info!(
            address = %addr,
            routes = state.routes().len(),
            server = %state.config().server.name,
            "Listening for requests"
        );
    }
    match &listeners.metrics {
        Some(listener) => {
            if let Ok(addr) = listener.local_addr() {
                tracing::info!(
                    "Metrics available at http://{}{}",
                    addr,
                    state.config().metrics.path()
                );
            }
        }
        None => tracing::info!(
            path = %state.config().metrics.path(),
            "Metrics served on the application listener"
        ),
    }

    run(state, listeners, shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl-C handler");
        // Without a signal handler the server runs until killed
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
