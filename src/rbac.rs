//! Access gates for the HOD and division-teacher surfaces.
//!
//! Neither gate keeps a session: the access code travels with every
//! privileged request and is checked again each time.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::config::Settings;
use crate::error::ApiError;
use crate::services::auth_service;

pub const HOD_CODE_HEADER: &str = "x-hod-code";
pub const DIVISION_CODE_HEADER: &str = "x-division-code";

/// Proof that the request carries the HOD access code.
#[derive(Debug, Clone, Copy)]
pub struct HodAccess;

/// The division unlocked by the request's division access code.
#[derive(Debug, Clone)]
pub struct DivisionAccess {
    pub division: String,
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Access code required.".into()))
}

#[async_trait]
impl<S> FromRequestParts<S> for HodAccess
where
    S: Send + Sync,
    Arc<Settings>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let settings = Arc::<Settings>::from_ref(state);
        auth_service::check_hod_code(&settings, header(parts, HOD_CODE_HEADER)?)?;
        Ok(HodAccess)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for DivisionAccess
where
    S: Send + Sync,
    Arc<Settings>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let settings = Arc::<Settings>::from_ref(state);
        let division = auth_service::division_for_code(&settings, header(parts, DIVISION_CODE_HEADER)?)?;
        Ok(DivisionAccess { division })
    }
}
