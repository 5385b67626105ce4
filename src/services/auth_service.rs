use bcrypt::{hash, verify};

use crate::config::Settings;
use crate::error::{ApiError, ApiResult};
use crate::models::AccountStatus;

pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";

/// Hashes on the blocking pool.
pub async fn hash_password(password: &str, cost: u32) -> ApiResult<String> {
    let password = password.to_owned();
    Ok(tokio::task::spawn_blocking(move || hash(password, cost)).await??)
}

async fn password_matches(password: &str, stored_hash: &str) -> ApiResult<bool> {
    let (password, stored_hash) = (password.to_owned(), stored_hash.to_owned());
    // A corrupt hash is treated as a mismatch rather than a server error.
    Ok(tokio::task::spawn_blocking(move || verify(password, &stored_hash).unwrap_or(false)).await?)
}

/// Decides a credentialed login.
///
/// The password is checked before the lifecycle status: only a caller who
/// knows the password learns that the account is still pending.
pub async fn check_login(
    stored_hash: &str,
    status: AccountStatus,
    password: &str,
    pending_message: &str,
) -> ApiResult<()> {
    if !password_matches(password, stored_hash).await? {
        return Err(invalid_credentials());
    }
    if status == AccountStatus::Pending {
        return Err(ApiError::Forbidden(pending_message.into()));
    }
    Ok(())
}

pub fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized(INVALID_CREDENTIALS.into())
}

pub fn check_hod_code(settings: &Settings, code: &str) -> ApiResult<()> {
    if codes_match(code.trim(), &settings.hod_access_code) {
        Ok(())
    } else {
        tracing::warn!("rejected HOD access code");
        Err(ApiError::Unauthorized("Invalid code.".into()))
    }
}

pub fn division_for_code(settings: &Settings, code: &str) -> ApiResult<String> {
    let code = code.trim();
    settings
        .division_codes
        .iter()
        .find(|(_, c)| codes_match(code, c))
        .map(|(d, _)| d.clone())
        .ok_or_else(|| {
            tracing::warn!("rejected division access code");
            ApiError::Unauthorized("Invalid code.".into())
        })
}

/// Compares without short-circuiting on the first differing byte.
fn codes_match(given: &str, expected: &str) -> bool {
    let (a, b) = (given.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
