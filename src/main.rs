//! Live match back binary entrypoint wiring REST, SSE, and the match store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_match_back::{
    config::AppConfig,
    dao::match_store::MemoryMatchStore,
    server,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    install_store(&app_state).await;

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    server::serve(listener, app_state, shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the MongoDB supervisor when configured, otherwise fall back to memory.
#[cfg(feature = "mongo-store")]
async fn install_store(state: &SharedState) {
    use live_match_back::{
        dao::{
            match_store::{
                MatchStore,
                mongodb::{MongoConfig, MongoMatchStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    if env::var_os("MONGO_URI").is_none() {
        install_memory_store(state, "MONGO_URI not set").await;
        return;
    }

    tokio::spawn(storage_supervisor::run(state.clone(), || async {
        let config = MongoConfig::from_env().await?;
        let store = MongoMatchStore::connect(config).await?;
        Ok::<Arc<dyn MatchStore>, StorageError>(Arc::new(store))
    }));
}

#[cfg(not(feature = "mongo-store"))]
async fn install_store(state: &SharedState) {
    install_memory_store(state, "built without mongo-store").await;
}

async fn install_memory_store(state: &SharedState, reason: &str) {
    warn!(reason, "using the in-memory match store; data is lost on restart");
    state
        .install_match_store(Arc::new(MemoryMatchStore::new()))
        .await;
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
