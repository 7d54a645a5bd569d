//! REST API module.
//!
//! Handlers are grouped by area: checkout flows, subscriptions, the Stripe
//! webhook, owner utilities, rosters and system routes.

mod checkout;
mod pots;
mod rosters;
mod subscriptions;
mod system;
mod webhook;

pub use checkout::*;
pub use pots::*;
pub use rosters::*;
pub use subscriptions::*;
pub use system::*;
pub use webhook::*;

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::config::Config;

/// Placeholder Stripe substitutes with the session id in redirect URLs.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Base URL of this server as seen by the caller.
///
/// `PUBLIC_BASE_URL` wins; otherwise the `Host` header with the forwarded scheme.
pub fn public_base(config: &Config, headers: &HeaderMap) -> String {
    if let Some(base) = &config.public_base_url {
        return base.trim_end_matches('/').to_string();
    }

    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let scheme = header_str("x-forwarded-proto")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .unwrap_or("http");
    let host = header_str("x-forwarded-host")
        .or_else(|| header_str(header::HOST.as_str()))
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}

/// Link an organizer follows to manage a pot.
pub fn manage_url(config: &Config, headers: &HeaderMap, pot_id: &str, token: &str) -> String {
    let base = config
        .frontend_base_url
        .as_deref()
        .map(|b| b.trim_end_matches('/').to_string())
        .unwrap_or_else(|| public_base(config, headers));
    format!("{}/manage/{}?token={}", base, encode(pot_id), encode(token))
}

/// Append a raw query string, respecting any query already on `url`.
pub fn append_query(url: &str, query: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, sep, query)
}

/// Percent-encode a single query value.
pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// 302 to `next`, or to `/` when the target is not a valid header value.
pub fn redirect_found(next: &str) -> Response {
    let location = HeaderValue::from_str(next).unwrap_or_else(|_| HeaderValue::from_static("/"));
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
