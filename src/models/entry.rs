//! Player entry within a pot.

use serde::{Deserialize, Serialize};

/// A player's join record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub pot_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_payment_intent_id: Option<String>,
    pub created_at: String,
}

/// Payment details recorded when an entry becomes paid.
#[derive(Debug, Clone, Default)]
pub struct EntryPayment {
    pub paid_amount: Option<i64>,
    pub payment_method: String,
    pub stripe_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
}

/// Request body for the owner's manual mark-paid action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkPaidRequest {
    #[serde(default)]
    pub paid_amount: Option<i64>,
    #[serde(default)]
    pub payment_method: Option<String>,
}
