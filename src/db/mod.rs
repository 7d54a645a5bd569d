//! Database module for SQLite persistence.
//!
//! Each table stands in for one document collection: drafts, pots, entries,
//! checkout-session mappings, subscription records and rosters.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Create tables if they don't exist.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pot_drafts (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            details TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pots (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            details TEXT NOT NULL,
            owner_code_hash TEXT NOT NULL,
            owner_token_salt TEXT NOT NULL,
            source TEXT NOT NULL,
            draft_id TEXT,
            stripe_session_id TEXT,
            amount_total INTEGER,
            currency TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            pot_id TEXT NOT NULL,
            id TEXT NOT NULL,
            name TEXT NOT NULL,
            email TEXT,
            paid INTEGER NOT NULL DEFAULT 0,
            paid_amount INTEGER,
            paid_at TEXT,
            payment_method TEXT,
            stripe_session_id TEXT,
            stripe_payment_intent_id TEXT,
            created_at TEXT NOT NULL,
            PRIMARY KEY (pot_id, id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS create_sessions (
            session_id TEXT PRIMARY KEY,
            draft_id TEXT,
            pot_id TEXT,
            owner_code TEXT,
            owner_token TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS join_sessions (
            session_id TEXT PRIMARY KEY,
            pot_id TEXT NOT NULL,
            entry_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    for table in ["organizer_subs_emails", "organizer_subs"] {
        let key = if table == "organizer_subs" {
            "uid TEXT PRIMARY KEY, email TEXT NOT NULL"
        } else {
            "email TEXT PRIMARY KEY"
        };
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                {key},
                status TEXT,
                current_period_end INTEGER,
                stripe_customer_id TEXT,
                stripe_subscription_id TEXT,
                price_id TEXT,
                billing_interval TEXT,
                amount_cents INTEGER,
                currency TEXT,
                plan TEXT,
                pots_per_month INTEGER,
                max_users_per_event INTEGER,
                updated_at TEXT NOT NULL
            );
            "#
        ))
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS org_rosters (
            org_id TEXT PRIMARY KEY,
            emails TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pot_roster_inline (
            pot_id TEXT PRIMARY KEY,
            emails TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pot_roster_binding (
            pot_id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_entries_pot ON entries(pot_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_join_sessions_entry ON join_sessions(pot_id, entry_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
