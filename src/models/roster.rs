//! Email rosters for organizations and pots.

use serde::{Deserialize, Serialize};

/// Where a pot's resolved roster came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterSource {
    Inline,
    Org,
    None,
}

/// Roster as seen by players joining a pot.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRoster {
    pub source: RosterSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    pub emails: Vec<String>,
    pub pot_id: String,
}

/// Request body carrying a list of emails.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterEmailsRequest {
    pub emails: Vec<String>,
}

/// Request body binding a pot to an organization roster.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterBindingRequest {
    #[serde(default)]
    pub org_id: Option<String>,
}

/// Trim, lower-case, drop blanks, de-duplicate and sort.
pub fn normalize_emails(emails: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = emails
        .iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}
