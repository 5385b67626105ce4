pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod rbac;
pub mod routes;
pub mod services;
pub mod telemetry;

use std::sync::Arc;

use axum::{extract::FromRef, routing::get, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::Settings;
use crate::services::photo_store::{PhotoStore, PENDING_PREFIX, VERIFIED_PREFIX};
use crate::services::recognizer::FaceRecognizer;

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub settings: Arc<Settings>,
    pub photos: PhotoStore,
    pub recognizer: Arc<dyn FaceRecognizer>,
}

impl AppState {
    pub fn new(pool: sqlx::SqlitePool, settings: Settings, recognizer: Arc<dyn FaceRecognizer>) -> Self {
        Self {
            photos: PhotoStore::new(&settings),
            settings: Arc::new(settings),
            pool,
            recognizer,
        }
    }
}

impl FromRef<AppState> for sqlx::SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Arc<Settings> {
    fn from_ref(state: &AppState) -> Self {
        state.settings.clone()
    }
}

impl FromRef<AppState> for PhotoStore {
    fn from_ref(state: &AppState) -> Self {
        state.photos.clone()
    }
}

impl FromRef<AppState> for Arc<dyn FaceRecognizer> {
    fn from_ref(state: &AppState) -> Self {
        state.recognizer.clone()
    }
}

/// The whole HTTP surface: the JSON API, the photo directories and `/healthz`.
pub fn app(state: AppState) -> Router {
    let settings = state.settings.clone();
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .nest("/api", routes::router(&settings))
        .nest_service(
            &format!("/{VERIFIED_PREFIX}"),
            ServeDir::new(&settings.student_images_dir),
        )
        .nest_service(
            &format!("/{PENDING_PREFIX}"),
            ServeDir::new(&settings.pending_images_dir),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
