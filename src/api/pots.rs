//! Pot view and owner utilities.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Uri},
};
use serde::Serialize;

use super::manage_url;
use crate::auth::require_owner;
use crate::errors::AppError;
use crate::extractors::{optional_json, Json};
use crate::models::{required, Entry, EntryPayment, MarkPaidRequest, OwnerLoginRequest, Pot, PublicPot};
use crate::owner::{generate_owner_code, generate_salt, hash_owner_code, verify_owner_code};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OwnerSessionResponse {
    pub pot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_code: Option<String>,
    pub owner_token: String,
    pub manage_url: String,
}

#[derive(Debug, Serialize)]
pub struct OwnerVerifyResponse {
    pub ok: bool,
    pub pot_id: String,
}

#[derive(Debug, Serialize)]
pub struct EntriesResponse {
    pub pot_id: String,
    pub entries: Vec<Entry>,
}

async fn load_pot(state: &AppState, id: &str) -> Result<Pot, AppError> {
    state
        .repo
        .get_pot(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Pot {} not found", id)))
}

/// Load the pot and require a valid owner token for it.
async fn load_owned_pot(
    state: &AppState,
    id: &str,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<Pot, AppError> {
    let pot = load_pot(state, id).await?;
    require_owner(&state.owner, &pot, headers, uri.query())?;
    Ok(pot)
}

/// GET /pots/:id - Public view of a pot.
pub async fn get_pot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicPot>, AppError> {
    let pot = load_pot(&state, &id).await?;
    Ok(Json(PublicPot::from(&pot)))
}

/// POST /pots/:id/owner/login - Exchange the owner code for a fresh token.
pub async fn owner_login(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<OwnerLoginRequest>,
) -> Result<Json<OwnerSessionResponse>, AppError> {
    let code = required(&request.owner_code)
        .ok_or_else(|| AppError::Validation("Missing owner_code".to_string()))?;

    let pot = load_pot(&state, &id).await?;
    if !verify_owner_code(code, &pot.owner_code_hash) {
        tracing::warn!(pot_id = %pot.id, "Owner login with wrong code");
        return Err(AppError::Unauthorized("Invalid owner code".to_string()));
    }

    let token = state.owner.make_owner_token(&pot.id, &pot.owner_token_salt)?;
    Ok(Json(OwnerSessionResponse {
        manage_url: manage_url(&state.config, &headers, &pot.id, &token),
        pot_id: pot.id,
        owner_code: None,
        owner_token: token,
    }))
}

/// GET /pots/:id/owner/verify
pub async fn owner_verify(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<OwnerVerifyResponse>, AppError> {
    let pot = load_owned_pot(&state, &id, &headers, &uri).await?;
    Ok(Json(OwnerVerifyResponse {
        ok: true,
        pot_id: pot.id,
    }))
}

/// POST /pots/:id/owner/rotate-token - Draw a new salt, revoking every earlier token.
pub async fn rotate_owner_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<OwnerSessionResponse>, AppError> {
    let pot = load_owned_pot(&state, &id, &headers, &uri).await?;

    let salt = generate_salt();
    state.repo.update_owner_salt(&pot.id, &salt).await?;
    let token = state.owner.make_owner_token(&pot.id, &salt)?;

    tracing::info!(pot_id = %pot.id, "Owner token rotated");

    Ok(Json(OwnerSessionResponse {
        manage_url: manage_url(&state.config, &headers, &pot.id, &token),
        pot_id: pot.id,
        owner_code: None,
        owner_token: token,
    }))
}

/// POST /pots/:id/owner/rotate-code - Replace the owner code and revoke all tokens.
pub async fn rotate_owner_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<OwnerSessionResponse>, AppError> {
    let pot = load_owned_pot(&state, &id, &headers, &uri).await?;

    let code = generate_owner_code();
    let salt = generate_salt();
    state
        .repo
        .update_owner_credentials(&pot.id, &hash_owner_code(&code), &salt)
        .await?;
    let token = state.owner.make_owner_token(&pot.id, &salt)?;

    tracing::info!(pot_id = %pot.id, "Owner code rotated");

    Ok(Json(OwnerSessionResponse {
        manage_url: manage_url(&state.config, &headers, &pot.id, &token),
        pot_id: pot.id,
        owner_code: Some(code.into_string()),
        owner_token: token,
    }))
}

/// GET /pots/:id/entries
pub async fn list_entries(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<EntriesResponse>, AppError> {
    let pot = load_owned_pot(&state, &id, &headers, &uri).await?;
    let entries = state.repo.list_entries(&pot.id).await?;
    Ok(Json(EntriesResponse {
        pot_id: pot.id,
        entries,
    }))
}

/// POST /pots/:id/entries/:entry_id/mark-paid - Record an offline payment.
pub async fn mark_entry_paid(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(String, String)>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Result<Json<Entry>, AppError> {
    let pot = load_owned_pot(&state, &id, &headers, &uri).await?;
    let request: MarkPaidRequest = optional_json(&body)?;

    let entry = state
        .repo
        .get_entry(&pot.id, &entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", entry_id)))?;

    if entry.paid {
        return Ok(Json(entry));
    }

    if matches!(request.paid_amount, Some(a) if a < 0) {
        return Err(AppError::Validation(
            "paid_amount must not be negative".to_string(),
        ));
    }

    let payment = EntryPayment {
        paid_amount: request.paid_amount.or(pot.details.buy_in_cents),
        payment_method: required(&request.payment_method)
            .unwrap_or("manual")
            .to_string(),
        stripe_session_id: None,
        stripe_payment_intent_id: None,
    };
    state
        .repo
        .mark_entry_paid(&pot.id, &entry_id, &payment)
        .await?;

    tracing::info!(pot_id = %pot.id, entry_id = %entry_id, method = %payment.payment_method, "Entry marked paid by owner");

    state
        .repo
        .get_entry(&pot.id, &entry_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", entry_id)))
}
