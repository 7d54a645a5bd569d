//! Stripe REST client over reqwest.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{CheckoutSession, CheckoutSessionParams, PaymentGateway, StripeCustomer, StripeSubscription};
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Stripe API client authenticated with the account's secret key.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    api_base: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&text)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(text);
            tracing::warn!(%status, "Stripe API returned an error");
            return Err(AppError::Payment(format!("Stripe API error: {}", message)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Payment(format!("Failed to parse Stripe response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, AppError> {
        let response = self
            .client
            .post(self.url("/v1/checkout/sessions"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params.form_fields())
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn retrieve_subscription(&self, id: &str) -> Result<StripeSubscription, AppError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/subscriptions/{}", id)))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn retrieve_customer(&self, id: &str) -> Result<StripeCustomer, AppError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/customers/{}", id)))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;

        Self::parse(response).await
    }
}
