//! Stripe integration: the payment gateway seam, the HTTP client and webhook verification.

mod client;
mod signature;
mod types;

pub use client::StripeClient;
#[cfg(test)]
pub use signature::signature_header;
pub use signature::verify_webhook_signature;
pub use types::*;

use async_trait::async_trait;

use crate::errors::AppError;

/// Payment processor operations the handlers depend on.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, AppError>;

    async fn retrieve_subscription(&self, id: &str) -> Result<StripeSubscription, AppError>;

    async fn retrieve_customer(&self, id: &str) -> Result<StripeCustomer, AppError>;
}
