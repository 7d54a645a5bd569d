//! Checkout endpoints for pot creation (organizer) and joining (player).

use axum::{extract::State, http::HeaderMap, response::Response};
use serde::Serialize;

use super::{append_query, encode, manage_url, public_base, redirect_found, SESSION_ID_PLACEHOLDER};
use crate::auth::has_admin_key;
use crate::errors::AppError;
use crate::extractors::{Json, Query};
use crate::models::{
    check_min_amount, required, CancelCreateQuery, CancelJoinQuery, CancelPotSessionRequest,
    CreatePotSessionRequest, CreateStatusQuery, JoinCheckoutRequest,
};
use crate::stripe::{CheckoutMode, CheckoutSessionParams, LineItem};
use crate::AppState;

const CURRENCY: &str = "usd";

#[derive(Debug, Serialize)]
pub struct CreatePotSessionResponse {
    pub draft_id: String,
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct JoinCheckoutResponse {
    pub url: String,
    pub session_id: String,
    pub entry_id: String,
}

/// Creation status polled by the organizer after checkout.
#[derive(Debug, Serialize)]
pub struct CreateStatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pot_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manage_url: Option<String>,
}

impl CreateStatusResponse {
    fn pending() -> Self {
        Self {
            status: "pending",
            pot_id: None,
            owner_code: None,
            owner_token: None,
            manage_url: None,
        }
    }

    fn active(pot_id: String) -> Self {
        Self {
            status: "active",
            pot_id: Some(pot_id),
            ..Self::pending()
        }
    }
}

/// POST /create-pot-session - Store a draft and start the creation-fee checkout.
pub async fn create_pot_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreatePotSessionRequest>,
) -> Result<Json<CreatePotSessionResponse>, AppError> {
    let mut draft = request
        .draft
        .ok_or_else(|| AppError::Validation("Missing draft".to_string()))?;
    draft.validate()?;

    let (Some(success_url), Some(cancel_url)) =
        (required(&request.success_url), required(&request.cancel_url))
    else {
        return Err(AppError::Validation("Missing success/cancel URLs".to_string()));
    };

    let amount_cents = request
        .amount_cents
        .unwrap_or(state.config.pot_create_price_cents);
    check_min_amount(amount_cents)?;

    if state.config.require_admin_toggle
        && draft.payment_methods.stripe
        && !has_admin_key(&state.config.admin_toggle_key, &headers)
    {
        tracing::info!("Stripe payments disabled on draft: caller is not an admin");
        draft.payment_methods.stripe = false;
    }

    let stored = state.repo.create_draft(&draft).await?;

    let params = CheckoutSessionParams {
        mode: CheckoutMode::Payment,
        line_item: LineItem::Adhoc {
            currency: CURRENCY.to_string(),
            unit_amount: amount_cents,
            product_name: format!("Create Pot — {}", draft.name.trim()),
        },
        success_url: append_query(
            success_url,
            &format!("flow=create&session_id={}", SESSION_ID_PLACEHOLDER),
        ),
        cancel_url: format!(
            "{}/cancel-create?session_id={}&next={}",
            public_base(&state.config, &headers),
            SESSION_ID_PLACEHOLDER,
            encode(cancel_url)
        ),
        customer_email: None,
        allow_promotion_codes: false,
        metadata: vec![
            ("flow".to_string(), "create".to_string()),
            ("draft_id".to_string(), stored.id.clone()),
        ],
    };

    let session = match state.payments.create_checkout_session(&params).await {
        Ok(session) => session,
        Err(e) => {
            // No checkout exists, so the draft can never be fulfilled.
            if let Err(cleanup) = state.repo.delete_draft(&stored.id).await {
                tracing::warn!(draft_id = %stored.id, "Failed to remove orphaned draft: {}", cleanup);
            }
            return Err(e);
        }
    };

    state.repo.put_create_session(&session.id, &stored.id).await?;

    tracing::info!(draft_id = %stored.id, session_id = %session.id, "Pot creation checkout started");

    Ok(Json(CreatePotSessionResponse {
        draft_id: stored.id,
        url: session.url,
        session_id: session.id,
    }))
}

/// GET /cancel-create - Drop the draft of an abandoned creation checkout, then redirect.
pub async fn cancel_create(
    State(state): State<AppState>,
    Query(query): Query<CancelCreateQuery>,
) -> Response {
    if let Err(e) = discard_create_session(&state, &query.session_id).await {
        tracing::warn!(session_id = %query.session_id, "Cancel-create cleanup failed: {}", e);
    }
    redirect_found(required(&query.next).unwrap_or("/"))
}

async fn discard_create_session(state: &AppState, session_id: &str) -> Result<(), AppError> {
    let Some(mapping) = state.repo.get_create_session(session_id).await? else {
        return Ok(());
    };

    // A fulfilled checkout keeps its mapping until the credentials are claimed.
    if mapping.pot_id.is_some() || state.repo.get_pot(session_id).await?.is_some() {
        return Ok(());
    }

    if let Some(draft_id) = &mapping.draft_id {
        state.repo.delete_draft(draft_id).await?;
    }
    state.repo.delete_create_session(&mapping.session_id).await
}

/// POST /cancel-pot-session - Delete a draft directly.
pub async fn cancel_pot_session(
    State(state): State<AppState>,
    Json(request): Json<CancelPotSessionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let draft_id = required(&request.draft_id)
        .ok_or_else(|| AppError::Validation("Missing draft_id".to_string()))?;

    state.repo.delete_draft(draft_id).await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// GET /create-status - Report whether the webhook has created the pot.
///
/// The first call after fulfillment carries the owner credentials; later calls do not.
pub async fn create_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CreateStatusQuery>,
) -> Result<Json<CreateStatusResponse>, AppError> {
    let session_id = query.session_id.trim();

    if let Some(creds) = state.repo.claim_owner_credentials(session_id).await? {
        tracing::info!(pot_id = %creds.pot_id, "Owner credentials handed out");
        let manage = manage_url(&state.config, &headers, &creds.pot_id, &creds.owner_token);
        return Ok(Json(CreateStatusResponse {
            owner_code: Some(creds.owner_code),
            owner_token: Some(creds.owner_token),
            manage_url: Some(manage),
            ..CreateStatusResponse::active(creds.pot_id)
        }));
    }

    if let Some(pot) = state.repo.get_pot(session_id).await? {
        return Ok(Json(CreateStatusResponse::active(pot.id)));
    }

    if state.repo.get_create_session(session_id).await?.is_some() {
        return Ok(Json(CreateStatusResponse::pending()));
    }

    Err(AppError::NotFound(format!(
        "Checkout session {} not found",
        session_id
    )))
}

/// POST /create-checkout-session - Start a player's join checkout.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<JoinCheckoutRequest>,
) -> Result<Json<JoinCheckoutResponse>, AppError> {
    let pot_id = required(&request.pot_id)
        .ok_or_else(|| AppError::Validation("Missing pot_id".to_string()))?;
    let (Some(success_url), Some(cancel_url)) =
        (required(&request.success_url), required(&request.cancel_url))
    else {
        return Err(AppError::Validation("Missing success/cancel URLs".to_string()));
    };
    if let Some(amount) = request.amount_cents {
        check_min_amount(amount)?;
    }

    let pot = state
        .repo
        .get_pot(pot_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Pot {} not found", pot_id)))?;

    let amount_cents = request
        .amount_cents
        .or(pot.details.buy_in_cents)
        .unwrap_or(0);
    check_min_amount(amount_cents)?;

    let entry_id = required(&request.entry_id)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
    let player_name = required(&request.player_name).unwrap_or("Player");
    let player_email = required(&request.player_email).map(str::to_lowercase);

    let entry = state
        .repo
        .create_pending_entry(&pot.id, &entry_id, player_name, player_email.as_deref())
        .await?;
    if entry.paid {
        return Err(AppError::Validation(format!(
            "Entry {} is already paid",
            entry_id
        )));
    }

    let ids = format!("pot_id={}&entry_id={}", encode(&pot.id), encode(&entry_id));
    let params = CheckoutSessionParams {
        mode: CheckoutMode::Payment,
        line_item: LineItem::Adhoc {
            currency: CURRENCY.to_string(),
            unit_amount: amount_cents,
            product_name: format!("Pot Join — {}", player_name),
        },
        success_url: append_query(
            success_url,
            &format!("flow=join&session_id={}&{}", SESSION_ID_PLACEHOLDER, ids),
        ),
        cancel_url: format!(
            "{}/cancel-join?session_id={}&{}&next={}",
            public_base(&state.config, &headers),
            SESSION_ID_PLACEHOLDER,
            ids,
            encode(cancel_url)
        ),
        customer_email: player_email.clone(),
        allow_promotion_codes: false,
        metadata: vec![
            ("flow".to_string(), "join".to_string()),
            ("pot_id".to_string(), pot.id.clone()),
            ("entry_id".to_string(), entry_id.clone()),
            ("player_name".to_string(), player_name.to_string()),
            ("player_email".to_string(), player_email.unwrap_or_default()),
        ],
    };

    let session = state.payments.create_checkout_session(&params).await?;
    state
        .repo
        .put_join_session(&session.id, &pot.id, &entry_id)
        .await?;

    tracing::info!(pot_id = %pot.id, entry_id = %entry_id, session_id = %session.id, "Join checkout started");

    Ok(Json(JoinCheckoutResponse {
        url: session.url,
        session_id: session.id,
        entry_id,
    }))
}

/// GET /cancel-join - Remove the unpaid entry of an abandoned join checkout, then redirect.
pub async fn cancel_join(
    State(state): State<AppState>,
    Query(query): Query<CancelJoinQuery>,
) -> Response {
    if let Err(e) = discard_join_session(&state, &query).await {
        tracing::warn!(session_id = %query.session_id, "Cancel-join cleanup failed: {}", e);
    }
    redirect_found(required(&query.next).unwrap_or("/"))
}

async fn discard_join_session(state: &AppState, query: &CancelJoinQuery) -> Result<(), AppError> {
    let mut pot_id = required(&query.pot_id).map(str::to_string);
    let mut entry_id = required(&query.entry_id).map(str::to_string);

    if let Some(mapping) = state.repo.get_join_session(&query.session_id).await? {
        pot_id = pot_id.or(Some(mapping.pot_id));
        entry_id = entry_id.or(Some(mapping.entry_id));
        state.repo.delete_join_session(&mapping.session_id).await?;
    }

    if let (Some(pot_id), Some(entry_id)) = (pot_id, entry_id) {
        if state.repo.delete_entry_if_unpaid(&pot_id, &entry_id).await? {
            tracing::info!(pot_id = %pot_id, entry_id = %entry_id, "Removed abandoned entry");
        }
    }
    Ok(())
}
