mod auth;
mod config;
mod filesystem;
pub mod guard;
mod setup;
mod state;

pub use state::AppState;

use crate::config::SharedSettings;
use crate::core::arguments::Arguments;
use crate::core::telemetry;
use crate::fs::ClientPath;
use crate::index::{FileWatcher, IndexFilter, IndexManager};
use crate::progress::ProgressTrackers;
use crate::store;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{error, info, warn};

const SETTINGS_PATH: &str = "app-config.json";
const DATABASE_PATH: &str = "app.db";
const INDEX_DIR: &str = "index";

/// Maximum size of JSON request bodies on the control routes.
const JSON_BODY_LIMIT: usize = 4096;

/// Starts the Filer server and blocks until shutdown.
pub async fn run() -> anyhow::Result<()> {
    telemetry::init();
    let args = Arguments::parse();

    info!("starting server...");

    let settings = SharedSettings::load(SETTINGS_PATH)?;
    let current = settings.current();
    let port = args.port.unwrap_or(current.port);

    let db = store::open(DATABASE_PATH).await?;
    store::migrate(&db).await?;

    let index = Arc::new(IndexManager::open(
        INDEX_DIR,
        current.root_path.to_native(),
    )?);

    let state = AppState {
        settings: settings.clone(),
        db,
        index: index.clone(),
        trackers: Arc::new(ProgressTrackers::default()),
    };

    if !args.disable_indexing && current.indexing_enabled {
        if index.is_empty() {
            let index = index.clone();
            let settings = settings.clone();
            task::spawn_blocking(move || {
                let filter = IndexFilter::from_settings(&settings.current());
                if let Err(e) = index.rebuild(&filter) {
                    error!("initial file indexing failed: {e}");
                }
            });
        } else {
            info!("file index already populated, skipping initial indexing");
        }

        if !args.disable_file_watchers && current.file_watcher_enabled {
            spawn_watcher(index.clone(), settings.clone());
        }
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("listening on http://127.0.0.1:{port}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

/// Builds the full `/api` surface over the shared state.
pub fn router(state: AppState) -> Router {
    let filesystem_routes = Router::new()
        .route(
            "/",
            get(filesystem::list_entries).delete(filesystem::delete_filesystem_entries),
        )
        .route("/new", post(filesystem::new_entry))
        .route("/copy", post(filesystem::copy_filesystem_entries))
        .route("/move", post(filesystem::move_filesystem_entries))
        .route("/download", get(filesystem::download))
        .route("/upload", post(filesystem::upload))
        .route("/upload/progress/:upload_id", get(filesystem::upload_progress))
        .route("/archive", post(filesystem::archive))
        .route("/archive/status/:tracker_id", get(filesystem::archive_status))
        .route("/search", get(filesystem::search))
        .route("/refresh-index", post(filesystem::refresh_index))
        .route("/indexer/stats", get(filesystem::indexer_stats))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_auth,
        ))
        .layer(DefaultBodyLimit::disable());

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/validate-token", get(auth::validate_token))
        .route("/users", post(auth::create_user).get(auth::list_users))
        .route(
            "/users/:username",
            get(auth::get_user)
                .put(auth::update_user)
                .delete(auth::delete_user),
        )
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT));

    let config_routes = Router::new()
        .route(
            "/",
            get(config::get_settings)
                .post(config::update_settings)
                .delete(config::reset_settings),
        )
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT));

    let setup_routes = Router::new()
        .route("/", get(setup::get_internal_state))
        .route(
            "/complete-first-run-setup",
            post(setup::complete_first_run_setup),
        );

    let api = Router::new()
        .nest("/filesystem", filesystem_routes)
        .nest("/auth", auth_routes)
        .nest("/config", config_routes)
        .nest("/ic-config", setup_routes)
        .fallback(api_not_found);

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::cors_headers,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::authorized_hosts,
        ))
        .with_state(state)
}

/// Feeds filesystem change events into incremental index updates until the
/// watcher or the runtime shuts down.
fn spawn_watcher(index: Arc<IndexManager>, settings: SharedSettings) {
    let root = index.root().to_path_buf();
    let (tx, mut rx) = mpsc::channel(256);

    let watcher = match FileWatcher::new(&root, tx) {
        Ok(watcher) => {
            info!("watching {} for changes", root.display());
            watcher
        }
        Err(e) => {
            error!("failed to start file watcher: {e}");
            return;
        }
    };

    tokio::spawn(async move {
        // Tie the watcher's lifetime to the event loop.
        let _watcher = watcher;
        while let Some(event) = rx.recv().await {
            let index = index.clone();
            let settings = settings.clone();
            let result = task::spawn_blocking(move || {
                let filter = IndexFilter::from_settings(&settings.current());
                index.apply_event(&event, &filter)
            })
            .await;

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("failed to apply filesystem event to index: {e}"),
                Err(e) => warn!("index update task panicked: {e}"),
            }
        }
    });
}

async fn api_not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "API endpoint not found" })),
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
}
