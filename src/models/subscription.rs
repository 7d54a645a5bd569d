//! Organizer subscription records and the plan catalog.

use std::env;

use serde::{Deserialize, Serialize};

use crate::stripe::StripeSubscription;

/// Subscription statuses that grant organizer features.
pub const ACTIVE_STATUSES: [&str; 3] = ["active", "trialing", "past_due"];

/// Returns true when a Stripe subscription status counts as active.
pub fn is_active_status(status: Option<&str>) -> bool {
    status.is_some_and(|s| ACTIVE_STATUSES.contains(&s))
}

/// Entitlements attached to a subscription price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanBits {
    pub plan: String,
    pub interval: String,
    pub pots_per_month: i64,
    pub max_users_per_event: i64,
}

impl PlanBits {
    fn individual(interval: &str) -> Self {
        Self {
            plan: "individual".to_string(),
            interval: interval.to_string(),
            pots_per_month: 2,
            max_users_per_event: 12,
        }
    }

    fn club(interval: &str) -> Self {
        Self {
            plan: "club".to_string(),
            interval: interval.to_string(),
            pots_per_month: 10,
            max_users_per_event: 64,
        }
    }
}

/// Subscription prices accepted at checkout, keyed by Stripe price id.
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    prices: Vec<(String, PlanBits)>,
}

impl PlanCatalog {
    pub fn new(prices: Vec<(String, PlanBits)>) -> Self {
        Self {
            prices: prices
                .into_iter()
                .filter(|(id, _)| !id.trim().is_empty())
                .collect(),
        }
    }

    /// Build the catalog from `STRIPE_PRICE_ID_*` variables, falling back to the live price ids.
    pub fn from_env() -> Self {
        let price = |key: &str, default: &str| env::var(key).unwrap_or_else(|_| default.to_string());
        Self::new(vec![
            (
                price("STRIPE_PRICE_ID_INDIVIDUAL_MONTHLY", "price_1Rwq6nFFPAbZxH9HkmDxBJ73"),
                PlanBits::individual("month"),
            ),
            (
                price("STRIPE_PRICE_ID_INDIVIDUAL_YEARLY", "price_1RwptxFFPAbZxH9HdPLdYIZR"),
                PlanBits::individual("year"),
            ),
            (
                price("STRIPE_PRICE_ID_CLUB_MONTHLY", "price_1Rwq1JFFPAbZxH9HmpYCSJYv"),
                PlanBits::club("month"),
            ),
            (
                price("STRIPE_PRICE_ID_CLUB_YEARLY", "price_1RwpyUFFPAbZxH9H2N1Ykd4U"),
                PlanBits::club("year"),
            ),
        ])
    }

    pub fn lookup(&self, price_id: &str) -> Option<&PlanBits> {
        self.prices
            .iter()
            .find(|(id, _)| id == price_id)
            .map(|(_, bits)| bits)
    }

    pub fn is_allowed(&self, price_id: &str) -> bool {
        self.lookup(price_id).is_some()
    }
}

/// Subscription state as stored per email and per uid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub status: Option<String>,
    pub current_period_end: Option<i64>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub interval: Option<String>,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub plan: Option<String>,
    pub pots_per_month: Option<i64>,
    pub max_users_per_event: Option<i64>,
    pub updated_at: String,
}

impl SubscriptionRecord {
    /// Flatten a Stripe subscription into the stored record.
    ///
    /// The interval prefers Stripe's recurring interval and falls back to the catalog.
    pub fn from_stripe(
        email: &str,
        fallback_customer: Option<&str>,
        sub: &StripeSubscription,
        plans: &PlanCatalog,
        now: &str,
    ) -> Self {
        let price = sub.first_price();
        let price_id = price.and_then(|p| p.id.clone());
        let bits = price_id.as_deref().and_then(|id| plans.lookup(id));

        Self {
            email: email.to_string(),
            uid: None,
            status: sub.status.clone(),
            current_period_end: sub.current_period_end,
            stripe_customer_id: sub
                .customer
                .clone()
                .or_else(|| fallback_customer.map(str::to_string)),
            stripe_subscription_id: Some(sub.id.clone()),
            interval: price
                .and_then(|p| p.recurring.as_ref())
                .and_then(|r| r.interval.clone())
                .or_else(|| bits.map(|b| b.interval.clone())),
            amount_cents: price.and_then(|p| p.unit_amount),
            currency: price.and_then(|p| p.currency.clone()),
            plan: bits.map(|b| b.plan.clone()),
            pots_per_month: bits.map(|b| b.pots_per_month),
            max_users_per_event: bits.map(|b| b.max_users_per_event),
            price_id,
            updated_at: now.to_string(),
        }
    }
}

/// Request body for `POST /create-organizer-subscription`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSubscriptionRequest {
    #[serde(default)]
    pub price_id: Option<String>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Request body for `POST /activate-subscription-for-uid`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivateSubscriptionRequest {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
