//! Configuration module for the PicklePot backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::models::PlanCatalog;

/// Default fee for creating a pot, in cents ($10).
pub const DEFAULT_POT_CREATE_PRICE_CENTS: i64 = 1000;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable text
    pub log_json: bool,
    /// Stripe secret API key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret (`whsec_...`)
    pub stripe_webhook_secret: String,
    /// Stripe API base URL
    pub stripe_api_base: String,
    /// Fee charged for creating a pot, in cents
    pub pot_create_price_cents: i64,
    /// Subscription prices accepted for organizer checkout
    pub plans: PlanCatalog,
    /// HMAC key for owner tokens; `None` means a per-process random key
    pub owner_token_secret: Option<String>,
    /// Maximum owner token age in seconds (0 = tokens never expire)
    pub owner_token_ttl_secs: u64,
    /// Externally visible base URL of this service
    pub public_base_url: Option<String>,
    /// Base URL of the organizer frontend, used for manage links
    pub frontend_base_url: Option<String>,
    /// Only admins may enable Stripe payments on new pots
    pub require_admin_toggle: bool,
    /// Expected `X-Admin-Key` value for admin callers
    pub admin_toggle_key: String,
    /// Token guarding roster writes (unset = open)
    pub admin_token: Option<String>,
    /// Allowed CORS origins; empty means any
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(addr) => addr.parse()?,
            Err(_) => match env::var("PORT") {
                Ok(port) => format!("0.0.0.0:{}", port.trim()).parse()?,
                Err(_) => "0.0.0.0:8080".parse()?,
            },
        };

        let db_path = env::var("DB_PATH")
            .unwrap_or_else(|_| "./data/picklepot.sqlite".to_string())
            .into();

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let stripe_webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();

        let pot_create_price_cents = env::var("POT_CREATE_PRICE_CENTS")
            .or_else(|_| env::var("POT_CREATE_PRICE_CENT"))
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_POT_CREATE_PRICE_CENTS);

        let owner_token_secret = non_empty(env::var("OWNER_TOKEN_SECRET").ok())
            .or_else(|| non_empty(Some(stripe_webhook_secret.clone())));

        let cors_allow = env::var("CORS_ALLOW")
            .or_else(|_| env::var("CORS_ORIGINS"))
            .unwrap_or_else(|_| "*".to_string());

        Ok(Self {
            bind_addr,
            db_path,
            log_level,
            log_json,
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret,
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            pot_create_price_cents,
            plans: PlanCatalog::from_env(),
            owner_token_secret,
            owner_token_ttl_secs: parse_env("OWNER_TOKEN_TTL_SECS", 0),
            public_base_url: non_empty(env::var("PUBLIC_BASE_URL").ok()),
            frontend_base_url: non_empty(env::var("FRONTEND_BASE_URL").ok()),
            require_admin_toggle: parse_env_bool("REQUIRE_ADMIN_TOGGLE", false),
            admin_toggle_key: env::var("ADMIN_TOGGLE_KEY").unwrap_or_default(),
            admin_token: non_empty(env::var("ADMIN_TOKEN").ok()),
            cors_origins: parse_origins(&cors_allow),
        })
    }
}

impl Config {
    /// True when redirect and manage links fall back to the caller's
    /// `Host` / `X-Forwarded-Host` headers.
    pub fn links_use_request_host(&self) -> bool {
        self.public_base_url.is_none()
    }

    /// Deterministic configuration for tests; no environment access beyond the plan ids.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            db_path: PathBuf::from("test.sqlite"),
            log_level: "warn".to_string(),
            log_json: false,
            stripe_secret_key: "sk_test_123".to_string(),
            stripe_webhook_secret: "whsec_test".to_string(),
            stripe_api_base: "http://127.0.0.1:9".to_string(),
            pot_create_price_cents: DEFAULT_POT_CREATE_PRICE_CENTS,
            plans: PlanCatalog::from_env(),
            owner_token_secret: Some("owner-secret".to_string()),
            owner_token_ttl_secs: 0,
            public_base_url: None,
            frontend_base_url: None,
            require_admin_toggle: false,
            admin_toggle_key: String::new(),
            admin_token: None,
            cors_origins: Vec::new(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Accepts `1`, `true` and `yes` (case-insensitive) as true.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

/// Split a comma-separated origin list. `*` (or nothing) means any origin.
pub fn parse_origins(raw: &str) -> Vec<String> {
    if raw.trim() == "*" {
        return Vec::new();
    }
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
