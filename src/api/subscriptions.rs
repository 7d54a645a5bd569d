//! Organizer subscription endpoints.

use axum::extract::State;
use serde::Serialize;

use crate::errors::AppError;
use crate::extractors::Json;
use crate::models::{
    is_active_status, required, ActivateSubscriptionRequest, CreateSubscriptionRequest,
};
use crate::stripe::{CheckoutMode, CheckoutSessionParams, LineItem};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SubscriptionCheckoutResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ActivateSubscriptionResponse {
    pub ok: bool,
    pub attached_to_uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
}

/// POST /create-organizer-subscription - Start a subscription checkout for an allowed price.
pub async fn create_organizer_subscription(
    State(state): State<AppState>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<Json<SubscriptionCheckoutResponse>, AppError> {
    let (Some(price_id), Some(success_url), Some(cancel_url)) = (
        required(&request.price_id),
        required(&request.success_url),
        required(&request.cancel_url),
    ) else {
        return Err(AppError::Validation(
            "Missing price_id/success_url/cancel_url".to_string(),
        ));
    };

    if !state.config.plans.is_allowed(price_id) {
        return Err(AppError::Validation("Invalid price_id".to_string()));
    }

    let params = CheckoutSessionParams {
        mode: CheckoutMode::Subscription,
        line_item: LineItem::Price {
            price_id: price_id.to_string(),
        },
        success_url: success_url.to_string(),
        cancel_url: cancel_url.to_string(),
        customer_email: required(&request.email).map(str::to_string),
        allow_promotion_codes: true,
        metadata: Vec::new(),
    };

    let session = state.payments.create_checkout_session(&params).await?;
    tracing::info!(session_id = %session.id, price_id, "Subscription checkout started");

    Ok(Json(SubscriptionCheckoutResponse { url: session.url }))
}

/// POST /activate-subscription-for-uid - Attach an active email subscription to a user id.
pub async fn activate_subscription_for_uid(
    State(state): State<AppState>,
    Json(request): Json<ActivateSubscriptionRequest>,
) -> Result<Json<ActivateSubscriptionResponse>, AppError> {
    let (Some(uid), Some(email)) = (required(&request.uid), required(&request.email)) else {
        return Err(AppError::Validation("Missing uid/email".to_string()));
    };
    let email = email.to_lowercase();

    let record = state
        .repo
        .get_subscription_by_email(&email)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("No subscription found for that email".to_string())
        })?;

    if !is_active_status(record.status.as_deref()) {
        return Err(AppError::Validation(format!(
            "Subscription not active (status={})",
            record.status.as_deref().unwrap_or("none")
        )));
    }

    let attached = state.repo.upsert_subscription_by_uid(uid, &record).await?;
    tracing::info!(uid, "Subscription attached to user");

    Ok(Json(ActivateSubscriptionResponse {
        ok: true,
        attached_to_uid: uid.to_string(),
        plan: attached.plan,
    }))
}
