use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::config::{PublicSettings, Settings};
use crate::AppState;

/// GET /settings. Access codes never leave the server.
async fn get_settings(State(settings): State<Arc<Settings>>) -> Json<PublicSettings> {
    Json(settings.public())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings))
}
