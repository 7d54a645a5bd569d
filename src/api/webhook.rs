//! Stripe webhook endpoint.
//!
//! Signature and payload problems are answered with 400 so Stripe shows the
//! delivery as failed. Once an event is verified, every processing error is
//! logged and acknowledged with 200 to stop redelivery.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::db::EntryPaidOutcome;
use crate::errors::AppError;
use crate::models::{EntryPayment, Pot, PotDraft, PotStatus, SubscriptionRecord};
use crate::stripe::{
    verify_webhook_signature, CheckoutSessionObject, StripeEvent, StripeInvoice,
    StripeSubscription,
};
use crate::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /webhook and /stripe-webhook
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let secret = &state.config.stripe_webhook_secret;
    if secret.is_empty() {
        tracing::error!("Webhook received but STRIPE_WEBHOOK_SECRET is not configured");
        return (StatusCode::BAD_REQUEST, "Invalid signature").into_response();
    }

    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return (StatusCode::BAD_REQUEST, "Invalid signature").into_response();
    };

    if let Err(e) = verify_webhook_signature(&body, signature, secret, Utc::now().timestamp()) {
        tracing::warn!("Webhook signature rejected: {}", e);
        return (StatusCode::BAD_REQUEST, "Invalid signature").into_response();
    }

    let event: StripeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Webhook payload rejected: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid payload").into_response();
        }
    };

    tracing::info!(event_id = ?event.id, event_type = %event.event_type, "Webhook received");

    if let Err(e) = dispatch(&state, &event).await {
        tracing::error!(event_id = ?event.id, event_type = %event.event_type, "Webhook handling failed: {}", e);
    }

    Json(json!({ "received": true })).into_response()
}

async fn dispatch(state: &AppState, event: &StripeEvent) -> Result<(), AppError> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSessionObject = serde_json::from_value(event.data.object.clone())?;
            checkout_completed(state, &session).await
        }
        "invoice.payment_succeeded" => {
            let invoice: StripeInvoice = serde_json::from_value(event.data.object.clone())?;
            let Some(sub_id) = invoice.subscription.as_deref() else {
                tracing::debug!("Invoice without subscription ignored");
                return Ok(());
            };
            let sub = state.payments.retrieve_subscription(sub_id).await?;
            sync_subscription(state, &sub, invoice.customer.as_deref()).await
        }
        "customer.subscription.updated"
        | "customer.subscription.deleted"
        | "customer.subscription.paused" => {
            let sub: StripeSubscription = serde_json::from_value(event.data.object.clone())?;
            sync_subscription(state, &sub, sub.customer.as_deref()).await
        }
        other => {
            tracing::debug!(event_type = other, "Webhook event ignored");
            Ok(())
        }
    }
}

async fn checkout_completed(
    state: &AppState,
    session: &CheckoutSessionObject,
) -> Result<(), AppError> {
    match session.mode.as_deref() {
        Some("subscription") => {
            let (Some(email), Some(sub_id)) = (session.payer_email(), session.subscription.as_deref())
            else {
                tracing::warn!(session_id = %session.id, "Subscription checkout without email or subscription");
                return Ok(());
            };
            let sub = state.payments.retrieve_subscription(sub_id).await?;
            let record = SubscriptionRecord::from_stripe(
                &email,
                session.customer.as_deref(),
                &sub,
                &state.config.plans,
                &Utc::now().to_rfc3339(),
            );
            state.repo.upsert_subscription_by_email(&record).await?;
            tracing::info!(subscription_id = %sub.id, status = ?record.status, "Subscription recorded");
            Ok(())
        }
        Some("payment") => {
            let is_create =
                session.meta("flow") == Some("create") || session.meta("type") == Some("create_pot");
            if is_create {
                return fulfill_pot_creation(state, session).await;
            }
            match (session.meta("pot_id"), session.meta("entry_id")) {
                (Some(pot_id), Some(entry_id)) => {
                    record_join_payment(state, session, pot_id, entry_id).await
                }
                _ => {
                    tracing::debug!(session_id = %session.id, "Payment checkout without pot metadata ignored");
                    Ok(())
                }
            }
        }
        other => {
            tracing::debug!(session_id = %session.id, mode = ?other, "Checkout mode ignored");
            Ok(())
        }
    }
}

/// Turn a paid draft into an active pot keyed by the checkout session id.
async fn fulfill_pot_creation(
    state: &AppState,
    session: &CheckoutSessionObject,
) -> Result<(), AppError> {
    let Some(draft_id) = session.meta("draft_id") else {
        tracing::warn!(session_id = %session.id, "Create checkout without draft_id");
        return Ok(());
    };

    if state.repo.get_pot(&session.id).await?.is_some() {
        tracing::info!(pot_id = %session.id, "Pot already created for session");
        return Ok(());
    }

    let details = match state.repo.get_draft(draft_id).await? {
        Some(draft) => draft.details,
        None => {
            tracing::warn!(draft_id, session_id = %session.id, "Draft missing; creating pot without details");
            PotDraft::default()
        }
    };

    let issued = state.owner.issue(&session.id)?;
    let now = Utc::now().to_rfc3339();
    let pot = Pot {
        id: session.id.clone(),
        status: PotStatus::Active,
        details,
        owner_code_hash: issued.code_hash,
        owner_token_salt: issued.salt,
        source: "checkout".to_string(),
        draft_id: Some(draft_id.to_string()),
        stripe_session_id: Some(session.id.clone()),
        amount_total: session.amount_total,
        currency: Some(session.currency.clone().unwrap_or_else(|| "usd".to_string())),
        created_at: now.clone(),
        updated_at: now,
    };

    if state
        .repo
        .fulfill_pot_creation(&pot, issued.code.as_str(), &issued.token)
        .await?
    {
        tracing::info!(pot_id = %pot.id, draft_id, "Pot created from paid draft");
    } else {
        tracing::info!(pot_id = %pot.id, "Pot creation raced with a replay; kept existing pot");
    }
    Ok(())
}

async fn record_join_payment(
    state: &AppState,
    session: &CheckoutSessionObject,
    pot_id: &str,
    entry_id: &str,
) -> Result<(), AppError> {
    if state.repo.get_pot(pot_id).await?.is_none() {
        tracing::warn!(pot_id, entry_id, "Join payment for unknown pot; recording anyway");
    }

    let payment = EntryPayment {
        paid_amount: session.amount_total,
        payment_method: "stripe".to_string(),
        stripe_session_id: Some(session.id.clone()),
        stripe_payment_intent_id: session.payment_intent.clone(),
    };

    match state.repo.mark_entry_paid(pot_id, entry_id, &payment).await? {
        EntryPaidOutcome::Recorded => {
            tracing::info!(pot_id, entry_id, "Entry marked paid");
        }
        EntryPaidOutcome::AlreadyRecorded => {
            tracing::info!(pot_id, entry_id, "Entry payment already recorded");
        }
    }

    state.repo.delete_join_session(&session.id).await
}

/// Store subscription state under the customer's email.
async fn sync_subscription(
    state: &AppState,
    sub: &StripeSubscription,
    customer_id: Option<&str>,
) -> Result<(), AppError> {
    let Some(customer_id) = customer_id else {
        tracing::debug!(subscription_id = %sub.id, "Subscription without customer ignored");
        return Ok(());
    };

    let email = match state.payments.retrieve_customer(customer_id).await {
        Ok(customer) => {
            tracing::debug!(customer_id = %customer.id, "Customer resolved");
            customer
                .email
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
        }
        Err(e) => {
            tracing::warn!(customer_id, "Customer lookup failed: {}", e);
            None
        }
    };

    let Some(email) = email else {
        tracing::debug!(subscription_id = %sub.id, "No customer email; subscription not stored");
        return Ok(());
    };

    let record = SubscriptionRecord::from_stripe(
        &email,
        Some(customer_id),
        sub,
        &state.config.plans,
        &Utc::now().to_rfc3339(),
    );
    state.repo.upsert_subscription_by_email(&record).await?;
    tracing::info!(subscription_id = %sub.id, status = ?record.status, "Subscription synced");
    Ok(())
}
