//! Pot and pot draft models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Lifecycle state of a pot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PotStatus {
    Draft,
    Active,
    Open,
}

impl PotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PotStatus::Draft => "draft",
            PotStatus::Active => "active",
            PotStatus::Open => "open",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PotStatus::Draft),
            "active" => Some(PotStatus::Active),
            "open" => Some(PotStatus::Open),
            _ => None,
        }
    }
}

/// Payment methods an organizer accepts for a pot.
///
/// Only `stripe` drives server behavior; every other method (cash, venmo,
/// zelle, ...) is kept exactly as the organizer sent it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethods {
    #[serde(default)]
    pub stripe: bool,
    #[serde(flatten)]
    pub others: BTreeMap<String, bool>,
}

impl PaymentMethods {
    pub fn enabled(&self, method: &str) -> bool {
        match method {
            "stripe" => self.stripe,
            other => self.others.get(other).copied().unwrap_or(false),
        }
    }
}

/// Organizer-supplied pot details, captured before the creation fee is paid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PotDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Amount each player pays to join, in cents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_in_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_players: Option<i64>,
    #[serde(default)]
    pub payment_methods: PaymentMethods,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl PotDraft {
    /// Check the draft at the request boundary.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Draft name is required".to_string()));
        }
        if matches!(self.buy_in_cents, Some(c) if c < 0) {
            return Err(AppError::Validation(
                "buy_in_cents must not be negative".to_string(),
            ));
        }
        if matches!(self.max_players, Some(n) if n <= 0) {
            return Err(AppError::Validation(
                "max_players must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A stored draft awaiting payment of the creation fee.
#[derive(Debug, Clone, Serialize)]
pub struct StoredDraft {
    pub id: String,
    pub status: PotStatus,
    #[serde(flatten)]
    pub details: PotDraft,
    pub created_at: String,
}

/// A tournament pot. Credential fields never leave the server.
#[derive(Debug, Clone)]
pub struct Pot {
    pub id: String,
    pub status: PotStatus,
    pub details: PotDraft,
    pub owner_code_hash: String,
    pub owner_token_salt: String,
    pub source: String,
    pub draft_id: Option<String>,
    pub stripe_session_id: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Public view of a pot.
#[derive(Debug, Clone, Serialize)]
pub struct PublicPot {
    pub id: String,
    pub status: PotStatus,
    #[serde(flatten)]
    pub details: PotDraft,
    pub created_at: String,
}

/// Request body for `POST /pots/{id}/owner/login`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwnerLoginRequest {
    #[serde(default)]
    pub owner_code: Option<String>,
}

impl From<&Pot> for PublicPot {
    fn from(pot: &Pot) -> Self {
        Self {
            id: pot.id.clone(),
            status: pot.status,
            details: pot.details.clone(),
            created_at: pot.created_at.clone(),
        }
    }
}
