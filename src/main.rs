//! Content Battle Back binary entrypoint wiring REST, SSE and the storage backend.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use content_battle_back::{
    config::{AppConfig, StorageBackend},
    dao::{
        battle_store::{BattleStore, MemoryBattleStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    if config.admin_token.is_none() {
        warn!("no admin token configured; admin endpoints will reject every request");
    }
    let storage = config.storage.clone();
    let app_state = AppState::new(config);

    spawn_storage(app_state.clone(), storage.backend, storage.mongo_uri, storage.mongo_db);
    let app = build_router(app_state);

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

/// Start the storage supervisor for the configured backend.
fn spawn_storage(
    state: SharedState,
    backend: StorageBackend,
    mongo_uri: String,
    mongo_db: Option<String>,
) {
    match backend {
        StorageBackend::Memory => {
            info!("using in-memory storage; data is lost on restart");
            tokio::spawn(storage_supervisor::run(state, || async {
                Ok::<_, StorageError>(Arc::new(MemoryBattleStore::new()) as Arc<dyn BattleStore>)
            }));
        }
        #[cfg(feature = "mongo-store")]
        StorageBackend::Mongo => {
            use content_battle_back::dao::battle_store::mongodb::{MongoBattleStore, MongoConfig};

            info!(uri = %mongo_uri, "using MongoDB storage");
            tokio::spawn(storage_supervisor::run(state, move || {
                let uri = mongo_uri.clone();
                let db = mongo_db.clone();
                async move {
                    let config = MongoConfig::from_uri(&uri, db.as_deref()).await?;
                    let store = MongoBattleStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn BattleStore>)
                }
            }));
        }
        #[cfg(not(feature = "mongo-store"))]
        StorageBackend::Mongo => {
            let _ = (mongo_uri, mongo_db);
            warn!("built without the `mongo-store` feature; falling back to in-memory storage");
            spawn_storage(state, StorageBackend::Memory, String::new(), None);
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
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

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "could not install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
