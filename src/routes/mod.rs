use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    Router,
};

use crate::config::Settings;
use crate::error::ApiError;
use crate::AppState;

pub mod attendance;
pub mod auth;
pub mod reports;
pub mod settings;
pub mod students;
pub mod teachers;

/// `axum::Json` whose rejections render as the usual `{"message"}` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `Multipart` with the same error body as the other extractors.
pub struct ApiMultipart(pub Multipart);

#[async_trait]
impl<S> FromRequest<S> for ApiMultipart
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Multipart::from_request(req, state).await?))
    }
}

/// Everything mounted under `/api`.
pub fn router(config: &Settings) -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(teachers::router())
        .merge(students::router(config.max_upload_bytes))
        .merge(attendance::router(config.max_upload_bytes))
        .merge(reports::router())
        .merge(settings::router())
}
