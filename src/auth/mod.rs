//! Shared-secret and owner-token authentication.
//!
//! All secret comparisons are constant-time to mitigate timing attacks.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::Pot;
use crate::owner::OwnerCredentials;

/// Header carrying the roster admin token.
pub const ORGANIZER_TOKEN_HEADER: &str = "x-organizer-token";

/// Header carrying an owner token for `/pots/{id}` management routes.
pub const OWNER_TOKEN_HEADER: &str = "x-owner-token";

/// Header carrying the key that lets admins enable Stripe on new pots.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Roster admin layer. Open when no admin token is configured (dev mode).
pub async fn admin_token_layer(
    expected_token: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = expected_token else {
        return next.run(request).await;
    };

    let provided = provided_token(request.headers(), request.uri().query(), ORGANIZER_TOKEN_HEADER);

    match provided {
        Some(token) if constant_time_compare(&token, &expected) => next.run(request).await,
        Some(_) => AppError::Unauthorized("Invalid organizer token".to_string()).into_response(),
        None => AppError::Unauthorized("Missing organizer token".to_string()).into_response(),
    }
}

/// Require a valid owner token for `pot`, from the header or `?token=`.
pub fn require_owner(
    owner: &OwnerCredentials,
    pot: &Pot,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<(), AppError> {
    let token = provided_token(headers, query, OWNER_TOKEN_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Missing owner token".to_string()))?;

    owner
        .verify_owner_token(&token, &pot.id, &pot.owner_token_salt)
        .map_err(|e| {
            tracing::debug!(pot_id = %pot.id, reason = %e, "Owner token rejected");
            AppError::Unauthorized("Invalid owner token".to_string())
        })
}

/// True when the request carries the configured admin toggle key.
/// An empty configured key never matches.
pub fn has_admin_key(expected: &str, headers: &HeaderMap) -> bool {
    if expected.is_empty() {
        return false;
    }
    headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|provided| constant_time_compare(provided.trim(), expected))
}

/// Token from `header`, falling back to the `token` query parameter.
pub fn provided_token(headers: &HeaderMap, query: Option<&str>, header: &str) -> Option<String> {
    let from_header = headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    from_header.or_else(|| {
        url::form_urlencoded::parse(query?.as_bytes())
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    // Constant-time comparison
    a_bytes.ct_eq(b_bytes).into()
}
