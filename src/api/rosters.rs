//! Roster endpoints: organization email lists and per-pot rosters.

use axum::extract::{Path, State};
use serde::Serialize;

use crate::errors::AppError;
use crate::extractors::Json;
use crate::models::{
    normalize_emails, required, ResolvedRoster, RosterBindingRequest, RosterEmailsRequest,
    RosterSource,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OrgRosterResponse {
    pub org_id: String,
    pub emails: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OrgRosterUpdated {
    pub ok: bool,
    pub org_id: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct RosterBindingResponse {
    pub ok: bool,
    pub pot_id: String,
    pub org_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InlineRosterUpdated {
    pub ok: bool,
    pub pot_id: String,
    pub count: usize,
}

/// GET /rosters/:org_id
pub async fn get_org_roster(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> Result<Json<OrgRosterResponse>, AppError> {
    let emails = state.repo.get_org_roster(&org_id).await?.unwrap_or_default();
    Ok(Json(OrgRosterResponse { org_id, emails }))
}

/// PUT /rosters/:org_id - Replace an organization's roster.
pub async fn put_org_roster(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Json(request): Json<RosterEmailsRequest>,
) -> Result<Json<OrgRosterUpdated>, AppError> {
    let emails = normalize_emails(&request.emails);
    state.repo.put_org_roster(&org_id, &emails).await?;

    tracing::info!(org_id = %org_id, count = emails.len(), "Org roster replaced");

    Ok(Json(OrgRosterUpdated {
        ok: true,
        org_id,
        count: emails.len(),
    }))
}

/// GET /pots/:id/roster-resolved - Public roster lookup: inline, then bound org, then none.
pub async fn get_resolved_roster(
    State(state): State<AppState>,
    Path(pot_id): Path<String>,
) -> Result<Json<ResolvedRoster>, AppError> {
    if let Some(emails) = state.repo.get_inline_roster(&pot_id).await? {
        return Ok(Json(ResolvedRoster {
            source: RosterSource::Inline,
            org_id: None,
            emails,
            pot_id,
        }));
    }

    if let Some(org_id) = state.repo.get_roster_binding(&pot_id).await? {
        let emails = state.repo.get_org_roster(&org_id).await?.unwrap_or_default();
        return Ok(Json(ResolvedRoster {
            source: RosterSource::Org,
            org_id: Some(org_id),
            emails,
            pot_id,
        }));
    }

    Ok(Json(ResolvedRoster {
        source: RosterSource::None,
        org_id: None,
        emails: Vec::new(),
        pot_id,
    }))
}

/// PUT /pots/:id/roster-binding - Bind a pot to an org roster, or unbind with no org_id.
pub async fn set_roster_binding(
    State(state): State<AppState>,
    Path(pot_id): Path<String>,
    Json(request): Json<RosterBindingRequest>,
) -> Result<Json<RosterBindingResponse>, AppError> {
    let org_id = required(&request.org_id).map(str::to_string);

    match &org_id {
        Some(org_id) => state.repo.put_roster_binding(&pot_id, org_id).await?,
        None => state.repo.delete_roster_binding(&pot_id).await?,
    }

    Ok(Json(RosterBindingResponse {
        ok: true,
        pot_id,
        org_id,
    }))
}

/// PUT /pots/:id/roster-inline - Set a pot's own roster; an empty list clears it.
pub async fn set_inline_roster(
    State(state): State<AppState>,
    Path(pot_id): Path<String>,
    Json(request): Json<RosterEmailsRequest>,
) -> Result<Json<InlineRosterUpdated>, AppError> {
    let emails = normalize_emails(&request.emails);

    if emails.is_empty() {
        state.repo.delete_inline_roster(&pot_id).await?;
    } else {
        state.repo.put_inline_roster(&pot_id, &emails).await?;
    }

    Ok(Json(InlineRosterUpdated {
        ok: true,
        pot_id,
        count: emails.len(),
    }))
}
