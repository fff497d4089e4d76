//! scrim-queue-back binary entrypoint wiring REST and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{Router, http::HeaderValue};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scrim_queue_back::{
    config::AppConfig,
    dao::memory::{MemoryPartyDirectory, MemoryPostStore},
    routes,
    state::{AppState, SharedState, StorageBackend},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let state = AppState::new(config);

    install_storage(&state).await;

    let app = build_router(state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the storage backend: MongoDB under supervision when `MONGO_URI`
/// is set, the in-memory store otherwise.
async fn install_storage(state: &SharedState) {
    #[cfg(feature = "mongo-store")]
    if env::var("MONGO_URI").is_ok() {
        use scrim_queue_back::services::storage_supervisor;
        tokio::spawn(storage_supervisor::run(state.clone(), connect_mongo));
        return;
    }

    info!("MONGO_URI not set; using the in-memory store");
    state
        .install_backend(StorageBackend {
            posts: Arc::new(MemoryPostStore::new()),
            parties: Arc::new(MemoryPartyDirectory::new()),
        })
        .await;
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo()
-> Result<StorageBackend, scrim_queue_back::dao::storage::StorageError> {
    use scrim_queue_back::dao::{
        mongodb::{MongoBackend, MongoConfig},
        storage::StorageError,
    };

    let config = MongoConfig::from_env().await.map_err(|err| {
        StorageError::unavailable("loading MongoDB configuration".into(), err)
    })?;
    let backend = MongoBackend::connect(config)
        .await
        .map_err(|err| StorageError::unavailable("connecting to MongoDB".into(), err))?;

    Ok(StorageBackend {
        posts: Arc::new(backend.post_store()),
        parties: Arc::new(backend.party_directory()),
    })
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    let cors = cors_layer(state.config().allowed_origins());
    routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Restrict CORS to the configured origins, falling back to permissive
/// when none parse.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if parsed.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
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
