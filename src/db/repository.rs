//! Database repository for document reads and merge-writes.
//!
//! Multi-document steps of the webhook flow run in a single transaction.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    Entry, EntryPayment, Pot, PotDraft, PotStatus, StoredDraft, SubscriptionRecord,
};

/// Create-session mapping: which draft a pot checkout belongs to.
#[derive(Debug, Clone)]
pub struct CreateSessionRecord {
    pub session_id: String,
    pub draft_id: Option<String>,
    pub pot_id: Option<String>,
}

/// Join-session mapping: which entry a join checkout pays for.
#[derive(Debug, Clone)]
pub struct JoinSessionRecord {
    pub session_id: String,
    pub pot_id: String,
    pub entry_id: String,
}

/// One-time owner credentials parked for the organizer after fulfillment.
#[derive(Debug, Clone)]
pub struct PendingOwnerCredentials {
    pub pot_id: String,
    pub owner_code: String,
    pub owner_token: String,
}

/// Result of recording a payment against an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPaidOutcome {
    Recorded,
    /// The same checkout session already paid this entry.
    AlreadyRecorded,
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== DRAFT OPERATIONS ====================

    /// Store a new pot draft with a generated id.
    pub async fn create_draft(&self, details: &PotDraft) -> Result<StoredDraft, AppError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let now = now_rfc3339();
        let details_json = serde_json::to_string(details)?;

        sqlx::query(
            "INSERT INTO pot_drafts (id, status, details, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(PotStatus::Draft.as_str())
        .bind(&details_json)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(StoredDraft {
            id,
            status: PotStatus::Draft,
            details: details.clone(),
            created_at: now,
        })
    }

    pub async fn get_draft(&self, id: &str) -> Result<Option<StoredDraft>, AppError> {
        let row = sqlx::query("SELECT id, status, details, created_at FROM pot_drafts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(draft_from_row).transpose()
    }

    /// Returns whether a draft was removed.
    pub async fn delete_draft(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM pot_drafts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== CHECKOUT SESSION MAPPINGS ====================

    pub async fn put_create_session(&self, session_id: &str, draft_id: &str) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO create_sessions (session_id, draft_id, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(session_id) DO UPDATE SET draft_id = excluded.draft_id",
        )
        .bind(session_id)
        .bind(draft_id)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_create_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CreateSessionRecord>, AppError> {
        let row = sqlx::query(
            "SELECT session_id, draft_id, pot_id FROM create_sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<CreateSessionRecord, AppError> {
            Ok(CreateSessionRecord {
                session_id: row.try_get("session_id")?,
                draft_id: row.try_get("draft_id")?,
                pot_id: row.try_get("pot_id")?,
            })
        })
        .transpose()
    }

    pub async fn delete_create_session(&self, session_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM create_sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Hand out parked owner credentials exactly once.
    pub async fn claim_owner_credentials(
        &self,
        session_id: &str,
    ) -> Result<Option<PendingOwnerCredentials>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT pot_id, owner_code, owner_token FROM create_sessions \
             WHERE session_id = ? AND owner_code IS NOT NULL",
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let pot_id: Option<String> = row.try_get("pot_id")?;
        let owner_code: String = row.try_get("owner_code")?;
        let owner_token: Option<String> = row.try_get("owner_token")?;

        // Conditional on the code we read, so concurrent pollers cannot both win.
        let result = sqlx::query(
            "UPDATE create_sessions SET owner_code = NULL, owner_token = NULL \
             WHERE session_id = ? AND owner_code = ?",
        )
        .bind(session_id)
        .bind(&owner_code)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        match (pot_id, owner_token) {
            (Some(pot_id), Some(owner_token)) => Ok(Some(PendingOwnerCredentials {
                pot_id,
                owner_code,
                owner_token,
            })),
            _ => Ok(None),
        }
    }

    pub async fn put_join_session(
        &self,
        session_id: &str,
        pot_id: &str,
        entry_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO join_sessions (session_id, pot_id, entry_id, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(session_id) DO UPDATE SET pot_id = excluded.pot_id, entry_id = excluded.entry_id",
        )
        .bind(session_id)
        .bind(pot_id)
        .bind(entry_id)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_join_session(
        &self,
        session_id: &str,
    ) -> Result<Option<JoinSessionRecord>, AppError> {
        let row = sqlx::query(
            "SELECT session_id, pot_id, entry_id FROM join_sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<JoinSessionRecord, AppError> {
            Ok(JoinSessionRecord {
                session_id: row.try_get("session_id")?,
                pot_id: row.try_get("pot_id")?,
                entry_id: row.try_get("entry_id")?,
            })
        })
        .transpose()
    }

    pub async fn delete_join_session(&self, session_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM join_sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== POT OPERATIONS ====================

    /// Create the pot for a paid creation checkout.
    ///
    /// The pot id is the checkout session id, so a replayed webhook finds the
    /// existing row and changes nothing. On first insert the draft is removed
    /// and the plaintext owner credentials are parked on the session mapping.
    /// Returns whether the pot was created.
    pub async fn fulfill_pot_creation(
        &self,
        pot: &Pot,
        owner_code: &str,
        owner_token: &str,
    ) -> Result<bool, AppError> {
        let details_json = serde_json::to_string(&pot.details)?;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO pots (id, status, details, owner_code_hash, owner_token_salt, source, \
             draft_id, stripe_session_id, amount_total, currency, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) ON CONFLICT(id) DO NOTHING",
        )
        .bind(&pot.id)
        .bind(pot.status.as_str())
        .bind(&details_json)
        .bind(&pot.owner_code_hash)
        .bind(&pot.owner_token_salt)
        .bind(&pot.source)
        .bind(&pot.draft_id)
        .bind(&pot.stripe_session_id)
        .bind(pot.amount_total)
        .bind(&pot.currency)
        .bind(&pot.created_at)
        .bind(&pot.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            if let Some(draft_id) = &pot.draft_id {
                sqlx::query("DELETE FROM pot_drafts WHERE id = ?")
                    .bind(draft_id)
                    .execute(&mut *tx)
                    .await?;
            }

            if let Some(session_id) = &pot.stripe_session_id {
                sqlx::query(
                    "INSERT INTO create_sessions \
                     (session_id, draft_id, pot_id, owner_code, owner_token, created_at) \
                     VALUES (?, ?, ?, ?, ?, ?) \
                     ON CONFLICT(session_id) DO UPDATE SET pot_id = excluded.pot_id, \
                     owner_code = excluded.owner_code, owner_token = excluded.owner_token",
                )
                .bind(session_id)
                .bind(&pot.draft_id)
                .bind(&pot.id)
                .bind(owner_code)
                .bind(owner_token)
                .bind(&pot.created_at)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn get_pot(&self, id: &str) -> Result<Option<Pot>, AppError> {
        let row = sqlx::query(
            "SELECT id, status, details, owner_code_hash, owner_token_salt, source, draft_id, \
             stripe_session_id, amount_total, currency, created_at, updated_at FROM pots WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(pot_from_row).transpose()
    }

    /// Replace both the owner code hash and the token salt.
    pub async fn update_owner_credentials(
        &self,
        pot_id: &str,
        code_hash: &str,
        salt: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE pots SET owner_code_hash = ?, owner_token_salt = ?, updated_at = ? WHERE id = ?",
        )
        .bind(code_hash)
        .bind(salt)
        .bind(now_rfc3339())
        .bind(pot_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Pot {} not found", pot_id)));
        }
        Ok(())
    }

    pub async fn update_owner_salt(&self, pot_id: &str, salt: &str) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE pots SET owner_token_salt = ?, updated_at = ? WHERE id = ?")
                .bind(salt)
                .bind(now_rfc3339())
                .bind(pot_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Pot {} not found", pot_id)));
        }
        Ok(())
    }

    // ==================== ENTRY OPERATIONS ====================

    /// Insert an unpaid entry unless one already exists. Returns the stored entry.
    pub async fn create_pending_entry(
        &self,
        pot_id: &str,
        entry_id: &str,
        name: &str,
        email: Option<&str>,
    ) -> Result<Entry, AppError> {
        sqlx::query(
            "INSERT INTO entries (pot_id, id, name, email, paid, created_at) VALUES (?, ?, ?, ?, 0, ?) \
             ON CONFLICT(pot_id, id) DO NOTHING",
        )
        .bind(pot_id)
        .bind(entry_id)
        .bind(name)
        .bind(email)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get_entry(pot_id, entry_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Entry {} vanished after insert", entry_id)))
    }

    pub async fn get_entry(&self, pot_id: &str, entry_id: &str) -> Result<Option<Entry>, AppError> {
        let row = sqlx::query(
            "SELECT pot_id, id, name, email, paid, paid_amount, paid_at, payment_method, \
             stripe_session_id, stripe_payment_intent_id, created_at \
             FROM entries WHERE pot_id = ? AND id = ?",
        )
        .bind(pot_id)
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    pub async fn list_entries(&self, pot_id: &str) -> Result<Vec<Entry>, AppError> {
        let rows = sqlx::query(
            "SELECT pot_id, id, name, email, paid, paid_amount, paid_at, payment_method, \
             stripe_session_id, stripe_payment_intent_id, created_at \
             FROM entries WHERE pot_id = ? ORDER BY created_at, id",
        )
        .bind(pot_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Merge payment fields into an entry, creating it if needed.
    pub async fn mark_entry_paid(
        &self,
        pot_id: &str,
        entry_id: &str,
        payment: &EntryPayment,
    ) -> Result<EntryPaidOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            "SELECT paid, stripe_session_id FROM entries WHERE pot_id = ? AND id = ?",
        )
        .bind(pot_id)
        .bind(entry_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            let paid: i64 = row.try_get("paid")?;
            let session: Option<String> = row.try_get("stripe_session_id")?;
            if paid != 0 && payment.stripe_session_id.is_some() && session == payment.stripe_session_id
            {
                tx.commit().await?;
                return Ok(EntryPaidOutcome::AlreadyRecorded);
            }
        }

        let now = now_rfc3339();
        sqlx::query(
            "INSERT INTO entries (pot_id, id, name, paid, paid_amount, paid_at, payment_method, \
             stripe_session_id, stripe_payment_intent_id, created_at) \
             VALUES (?, ?, 'Player', 1, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(pot_id, id) DO UPDATE SET paid = 1, \
             paid_amount = excluded.paid_amount, paid_at = excluded.paid_at, \
             payment_method = excluded.payment_method, \
             stripe_session_id = COALESCE(excluded.stripe_session_id, entries.stripe_session_id), \
             stripe_payment_intent_id = COALESCE(excluded.stripe_payment_intent_id, entries.stripe_payment_intent_id)",
        )
        .bind(pot_id)
        .bind(entry_id)
        .bind(payment.paid_amount)
        .bind(&now)
        .bind(&payment.payment_method)
        .bind(&payment.stripe_session_id)
        .bind(&payment.stripe_payment_intent_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(EntryPaidOutcome::Recorded)
    }

    /// Remove an entry unless it has been paid. Returns whether a row was deleted.
    pub async fn delete_entry_if_unpaid(&self, pot_id: &str, entry_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM entries WHERE pot_id = ? AND id = ? AND paid = 0")
            .bind(pot_id)
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== SUBSCRIPTION OPERATIONS ====================

    pub async fn upsert_subscription_by_email(
        &self,
        record: &SubscriptionRecord,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO organizer_subs_emails (email, status, current_period_end, stripe_customer_id, \
             stripe_subscription_id, price_id, billing_interval, amount_cents, currency, plan, \
             pots_per_month, max_users_per_event, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(email) DO UPDATE SET status = excluded.status, \
             current_period_end = excluded.current_period_end, \
             stripe_customer_id = excluded.stripe_customer_id, \
             stripe_subscription_id = excluded.stripe_subscription_id, \
             price_id = excluded.price_id, billing_interval = excluded.billing_interval, \
             amount_cents = excluded.amount_cents, currency = excluded.currency, \
             plan = excluded.plan, pots_per_month = excluded.pots_per_month, \
             max_users_per_event = excluded.max_users_per_event, updated_at = excluded.updated_at",
        )
        .bind(&record.email)
        .bind(&record.status)
        .bind(record.current_period_end)
        .bind(&record.stripe_customer_id)
        .bind(&record.stripe_subscription_id)
        .bind(&record.price_id)
        .bind(&record.interval)
        .bind(record.amount_cents)
        .bind(&record.currency)
        .bind(&record.plan)
        .bind(record.pots_per_month)
        .bind(record.max_users_per_event)
        .bind(&record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_subscription_by_email(
        &self,
        email: &str,
    ) -> Result<Option<SubscriptionRecord>, AppError> {
        let row = sqlx::query("SELECT * FROM organizer_subs_emails WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(|r| subscription_from_row(r, None)).transpose()
    }

    /// Copy an email-keyed record onto a user id and return the stored copy.
    pub async fn upsert_subscription_by_uid(
        &self,
        uid: &str,
        record: &SubscriptionRecord,
    ) -> Result<SubscriptionRecord, AppError> {
        sqlx::query(
            "INSERT INTO organizer_subs (uid, email, status, current_period_end, stripe_customer_id, \
             stripe_subscription_id, price_id, billing_interval, amount_cents, currency, plan, \
             pots_per_month, max_users_per_event, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(uid) DO UPDATE SET email = excluded.email, status = excluded.status, \
             current_period_end = excluded.current_period_end, \
             stripe_customer_id = excluded.stripe_customer_id, \
             stripe_subscription_id = excluded.stripe_subscription_id, \
             price_id = excluded.price_id, billing_interval = excluded.billing_interval, \
             amount_cents = excluded.amount_cents, currency = excluded.currency, \
             plan = excluded.plan, pots_per_month = excluded.pots_per_month, \
             max_users_per_event = excluded.max_users_per_event, updated_at = excluded.updated_at",
        )
        .bind(uid)
        .bind(&record.email)
        .bind(&record.status)
        .bind(record.current_period_end)
        .bind(&record.stripe_customer_id)
        .bind(&record.stripe_subscription_id)
        .bind(&record.price_id)
        .bind(&record.interval)
        .bind(record.amount_cents)
        .bind(&record.currency)
        .bind(&record.plan)
        .bind(record.pots_per_month)
        .bind(record.max_users_per_event)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get_subscription_by_uid(uid)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Subscription for {} vanished", uid)))
    }

    pub async fn get_subscription_by_uid(
        &self,
        uid: &str,
    ) -> Result<Option<SubscriptionRecord>, AppError> {
        let row = sqlx::query("SELECT * FROM organizer_subs WHERE uid = ?")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(|r| subscription_from_row(r, Some(uid)))
            .transpose()
    }

    // ==================== ROSTER OPERATIONS ====================

    pub async fn get_org_roster(&self, org_id: &str) -> Result<Option<Vec<String>>, AppError> {
        self.get_emails("SELECT emails FROM org_rosters WHERE org_id = ?", org_id)
            .await
    }

    pub async fn put_org_roster(&self, org_id: &str, emails: &[String]) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO org_rosters (org_id, emails, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(org_id) DO UPDATE SET emails = excluded.emails, updated_at = excluded.updated_at",
        )
        .bind(org_id)
        .bind(serde_json::to_string(emails)?)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_inline_roster(&self, pot_id: &str) -> Result<Option<Vec<String>>, AppError> {
        self.get_emails("SELECT emails FROM pot_roster_inline WHERE pot_id = ?", pot_id)
            .await
    }

    pub async fn put_inline_roster(&self, pot_id: &str, emails: &[String]) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO pot_roster_inline (pot_id, emails, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(pot_id) DO UPDATE SET emails = excluded.emails, updated_at = excluded.updated_at",
        )
        .bind(pot_id)
        .bind(serde_json::to_string(emails)?)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_inline_roster(&self, pot_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM pot_roster_inline WHERE pot_id = ?")
            .bind(pot_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_roster_binding(&self, pot_id: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT org_id FROM pot_roster_binding WHERE pot_id = ?")
            .bind(pot_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.try_get::<String, _>("org_id")).transpose()?)
    }

    pub async fn put_roster_binding(&self, pot_id: &str, org_id: &str) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO pot_roster_binding (pot_id, org_id, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(pot_id) DO UPDATE SET org_id = excluded.org_id, updated_at = excluded.updated_at",
        )
        .bind(pot_id)
        .bind(org_id)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_roster_binding(&self, pot_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM pot_roster_binding WHERE pot_id = ?")
            .bind(pot_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_emails(&self, sql: &str, key: &str) -> Result<Option<Vec<String>>, AppError> {
        let row = sqlx::query(sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let emails: String = row.try_get("emails")?;
                parse_json_array(&emails).map(Some)
            }
            None => Ok(None),
        }
    }
}

// Helper functions for row conversion

fn parse_details(raw: &str) -> Result<PotDraft, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(format!("Corrupt pot details: {}", e)))
}

fn parse_status(raw: &str) -> Result<PotStatus, AppError> {
    PotStatus::from_str(raw).ok_or_else(|| AppError::Internal(format!("Unknown pot status {}", raw)))
}

fn draft_from_row(row: &SqliteRow) -> Result<StoredDraft, AppError> {
    let status: String = row.try_get("status")?;
    let details: String = row.try_get("details")?;
    Ok(StoredDraft {
        id: row.try_get("id")?,
        status: parse_status(&status)?,
        details: parse_details(&details)?,
        created_at: row.try_get("created_at")?,
    })
}

fn pot_from_row(row: &SqliteRow) -> Result<Pot, AppError> {
    let status: String = row.try_get("status")?;
    let details: String = row.try_get("details")?;
    Ok(Pot {
        id: row.try_get("id")?,
        status: parse_status(&status)?,
        details: parse_details(&details)?,
        owner_code_hash: row.try_get("owner_code_hash")?,
        owner_token_salt: row.try_get("owner_token_salt")?,
        source: row.try_get("source")?,
        draft_id: row.try_get("draft_id")?,
        stripe_session_id: row.try_get("stripe_session_id")?,
        amount_total: row.try_get("amount_total")?,
        currency: row.try_get("currency")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn entry_from_row(row: &SqliteRow) -> Result<Entry, AppError> {
    let paid: i64 = row.try_get("paid")?;
    Ok(Entry {
        id: row.try_get("id")?,
        pot_id: row.try_get("pot_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        paid: paid != 0,
        paid_amount: row.try_get("paid_amount")?,
        paid_at: row.try_get("paid_at")?,
        payment_method: row.try_get("payment_method")?,
        stripe_session_id: row.try_get("stripe_session_id")?,
        stripe_payment_intent_id: row.try_get("stripe_payment_intent_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn subscription_from_row(row: &SqliteRow, uid: Option<&str>) -> Result<SubscriptionRecord, AppError> {
    Ok(SubscriptionRecord {
        email: row.try_get("email")?,
        uid: uid.map(str::to_string),
        status: row.try_get("status")?,
        current_period_end: row.try_get("current_period_end")?,
        stripe_customer_id: row.try_get("stripe_customer_id")?,
        stripe_subscription_id: row.try_get("stripe_subscription_id")?,
        price_id: row.try_get("price_id")?,
        interval: row.try_get("billing_interval")?,
        amount_cents: row.try_get("amount_cents")?,
        currency: row.try_get("currency")?,
        plan: row.try_get("plan")?,
        pots_per_month: row.try_get("pots_per_month")?,
        max_users_per_event: row.try_get("max_users_per_event")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn parse_json_array(raw: &str) -> Result<Vec<String>, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(format!("Corrupt roster emails: {}", e)))
}
