//! PicklePot Backend
//!
//! Payment backend for pickleball tournament pots: Stripe checkout, webhook
//! fulfillment into SQLite, and owner credentials for pot management links.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod extractors;
mod models;
mod owner;
mod stripe;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use owner::OwnerCredentials;
use stripe::{PaymentGateway, StripeClient};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub payments: Arc<dyn PaymentGateway>,
    pub owner: Arc<OwnerCredentials>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(config.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!config.log_json).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("Starting PicklePot Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Pot creation price: {} cents", config.pot_create_price_cents);

    if config.stripe_secret_key.is_empty() {
        tracing::warn!("No Stripe secret key configured (STRIPE_SECRET_KEY). Checkout calls will fail!");
    }
    if config.stripe_webhook_secret.is_empty() {
        tracing::warn!("No webhook secret configured (STRIPE_WEBHOOK_SECRET). Webhooks will be rejected!");
    }
    if config.links_use_request_host() {
        tracing::warn!("No public base URL configured (PUBLIC_BASE_URL). Manage and cancel links are built from the request Host header; set it in production!");
    }
    if config.admin_token.is_none() {
        tracing::warn!("No roster admin token configured (ADMIN_TOKEN). Roster routes are open!");
    }

    let owner = match &config.owner_token_secret {
        Some(secret) => OwnerCredentials::new(secret.clone(), config.owner_token_ttl_secs),
        None => {
            tracing::warn!("No owner token secret configured (OWNER_TOKEN_SECRET). Tokens will not survive a restart!");
            OwnerCredentials::ephemeral(config.owner_token_ttl_secs)
        }
    };
    if owner.ttl_secs() == 0 {
        tracing::warn!("OWNER_TOKEN_TTL_SECS is 0: owner token timestamps are not enforced");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let payments: Arc<dyn PaymentGateway> = Arc::new(StripeClient::new(
        config.stripe_secret_key.clone(),
        config.stripe_api_base.clone(),
    ));

    // Create application state
    let state = AppState {
        repo,
        payments,
        owner: Arc::new(owner),
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone admin token for the roster layer
    let admin_token = state.config.admin_token.clone();

    // Roster administration
    let admin_routes = Router::new()
        .route("/rosters/{org_id}", get(api::get_org_roster).put(api::put_org_roster))
        .route("/pots/{id}/roster-binding", put(api::set_roster_binding))
        .route("/pots/{id}/roster-inline", put(api::set_inline_roster))
        .layer(middleware::from_fn(move |req, next| {
            auth::admin_token_layer(admin_token.clone(), req, next)
        }));

    let public_routes = Router::new()
        // System
        .route("/", get(api::root))
        .route("/favicon.ico", get(api::favicon))
        .route("/health", get(api::health_check))
        .route("/healthz", get(api::health_check))
        // Pot creation
        .route("/create-pot-session", post(api::create_pot_session))
        .route("/cancel-create", get(api::cancel_create))
        .route("/cancel-pot-session", post(api::cancel_pot_session))
        .route("/create-status", get(api::create_status))
        // Join
        .route("/create-checkout-session", post(api::create_checkout_session))
        .route("/cancel-join", get(api::cancel_join))
        // Subscriptions
        .route(
            "/create-organizer-subscription",
            post(api::create_organizer_subscription),
        )
        .route(
            "/activate-subscription-for-uid",
            post(api::activate_subscription_for_uid),
        )
        // Webhook
        .route("/webhook", post(api::stripe_webhook))
        .route("/stripe-webhook", post(api::stripe_webhook))
        // Pots and owner utilities
        .route("/pots/{id}", get(api::get_pot))
        .route("/pots/{id}/owner/login", post(api::owner_login))
        .route("/pots/{id}/owner/verify", get(api::owner_verify))
        .route("/pots/{id}/owner/rotate-token", post(api::rotate_owner_token))
        .route("/pots/{id}/owner/rotate-code", post(api::rotate_owner_code))
        .route("/pots/{id}/entries", get(api::list_entries))
        .route(
            "/pots/{id}/entries/{entry_id}/mark-paid",
            post(api::mark_entry_paid),
        )
        .route("/pots/{id}/roster-resolved", get(api::get_resolved_roster));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests;
