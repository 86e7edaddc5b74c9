//! HTTP server assembly and graceful shutdown.

use std::{future::Future, io};

use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{routes, state::SharedState};

/// Build the top-level router and attach cross-cutting middleware layers.
pub fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve until `signal` resolves, then stop the broker and drain connections.
///
/// Live match streams only end once the broker closes their queues, so the
/// broker is shut down before waiting on open connections.
pub async fn serve<F>(listener: TcpListener, state: SharedState, signal: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state.clone());
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            signal.await;
            info!("shutdown requested; closing match streams");
            state.broker().shutdown().await;
        })
        .await
}
