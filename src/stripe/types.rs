//! Stripe payload types: checkout parameters and webhook objects.

use std::collections::HashMap;

use serde::Deserialize;

/// Checkout session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    Payment,
    Subscription,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
            CheckoutMode::Subscription => "subscription",
        }
    }
}

/// The single line item of a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItem {
    /// A price configured in the Stripe dashboard.
    Price { price_id: String },
    /// An ad-hoc one-off charge.
    Adhoc {
        currency: String,
        unit_amount: i64,
        product_name: String,
    },
}

/// Parameters for `POST /v1/checkout/sessions`.
#[derive(Debug, Clone)]
pub struct CheckoutSessionParams {
    pub mode: CheckoutMode,
    pub line_item: LineItem,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub allow_promotion_codes: bool,
    pub metadata: Vec<(String, String)>,
}

impl CheckoutSessionParams {
    /// Encode as Stripe's bracketed form fields.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), self.mode.as_str().to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
        ];

        match &self.line_item {
            LineItem::Price { price_id } => {
                fields.push(("line_items[0][price]".to_string(), price_id.clone()));
            }
            LineItem::Adhoc {
                currency,
                unit_amount,
                product_name,
            } => {
                fields.push((
                    "line_items[0][price_data][currency]".to_string(),
                    currency.clone(),
                ));
                fields.push((
                    "line_items[0][price_data][unit_amount]".to_string(),
                    unit_amount.to_string(),
                ));
                fields.push((
                    "line_items[0][price_data][product_data][name]".to_string(),
                    product_name.clone(),
                ));
            }
        }

        if let Some(email) = &self.customer_email {
            fields.push(("customer_email".to_string(), email.clone()));
        }
        if self.allow_promotion_codes {
            fields.push(("allow_promotion_codes".to_string(), "true".to_string()));
        }
        for (key, value) in &self.metadata {
            fields.push((format!("metadata[{}]", key), value.clone()));
        }

        fields
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A created checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

/// `checkout.session.completed` object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl CheckoutSessionObject {
    /// Metadata value, treating empty strings as absent.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Payer email, lower-cased. Customer details win over the prefilled email.
    pub fn payer_email(&self) -> Option<String> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeRecurring {
    #[serde(default)]
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub recurring: Option<StripeRecurring>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    #[serde(default)]
    pub price: Option<StripePrice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeSubscriptionItems {
    #[serde(default)]
    pub data: Vec<StripeSubscriptionItem>,
}

/// Subscription object, either retrieved or embedded in `customer.subscription.*` events.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: Option<StripeSubscriptionItems>,
}

impl StripeSubscription {
    pub fn first_price(&self) -> Option<&StripePrice> {
        self.items
            .as_ref()
            .and_then(|items| items.data.first())
            .and_then(|item| item.price.as_ref())
    }
}

/// `invoice.*` object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}
