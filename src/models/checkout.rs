//! Request and query types for the checkout flows.

use serde::Deserialize;

use super::PotDraft;
use crate::errors::AppError;

/// Smallest charge Stripe accepts for a card payment in USD.
pub const MIN_AMOUNT_CENTS: i64 = 50;

/// Reject amounts under the Stripe minimum.
pub fn check_min_amount(amount_cents: i64) -> Result<(), AppError> {
    if amount_cents < MIN_AMOUNT_CENTS {
        return Err(AppError::Validation(
            "Minimum amount is 50 cents".to_string(),
        ));
    }
    Ok(())
}

/// Returns the trimmed value when present and non-blank.
pub fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Request body for `POST /create-pot-session`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePotSessionRequest {
    #[serde(default)]
    pub draft: Option<PotDraft>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
    /// Overrides the configured creation fee
    #[serde(default)]
    pub amount_cents: Option<i64>,
}

/// Request body for `POST /cancel-pot-session`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelPotSessionRequest {
    #[serde(default)]
    pub draft_id: Option<String>,
}

/// Request body for `POST /create-checkout-session`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinCheckoutRequest {
    #[serde(default)]
    pub pot_id: Option<String>,
    #[serde(default)]
    pub entry_id: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub player_email: Option<String>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

/// Query string of `GET /cancel-create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelCreateQuery {
    pub session_id: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Query string of `GET /cancel-join`.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelJoinQuery {
    pub session_id: String,
    #[serde(default)]
    pub pot_id: Option<String>,
    #[serde(default)]
    pub entry_id: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Query string of `GET /create-status`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStatusQuery {
    pub session_id: String,
}
