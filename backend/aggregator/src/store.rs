//! Local state — migrations and the small key-value caches this layer
//! persists: the wallet session and last-known-good profile snapshots.
//! Everything here is a pure cache, reconstructable from the wallet and the
//! chain on next load.

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

use crate::errors::Result;
use crate::model::Profile;
use crate::wallet::WalletSession;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    // Make sure the file is created if it doesn't exist yet.
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Wallet session
// ─────────────────────────────────────────────────────────

/// Read the active wallet session, if one has been stored.
pub async fn load_session(pool: &SqlitePool) -> Result<Option<WalletSession>> {
    let row = sqlx::query_as::<_, WalletSession>(
        "SELECT address, wallet_kind, network FROM wallet_session WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Replace the active wallet session.
pub async fn save_session(pool: &SqlitePool, session: &WalletSession) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO wallet_session (id, address, wallet_kind, network)
        VALUES (1, ?1, ?2, ?3)
        ON CONFLICT (id) DO UPDATE SET
            address = excluded.address,
            wallet_kind = excluded.wallet_kind,
            network = excluded.network,
            updated_at = strftime('%s','now')
        "#,
    )
    .bind(&session.address)
    .bind(&session.wallet_kind)
    .bind(&session.network)
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop the active wallet session (wallet disconnected).
pub async fn clear_session(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM wallet_session WHERE id = 1")
        .execute(pool)
        .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Profile snapshots
// ─────────────────────────────────────────────────────────

/// Persist the last-known-good profile for an address.
pub async fn save_profile_snapshot(pool: &SqlitePool, profile: &Profile) -> Result<()> {
    let payload = serde_json::to_string(profile)?;
    sqlx::query(
        r#"
        INSERT INTO profile_snapshots (address, profile_json)
        VALUES (?1, ?2)
        ON CONFLICT (address) DO UPDATE SET
            profile_json = excluded.profile_json,
            updated_at = strftime('%s','now')
        "#,
    )
    .bind(&profile.address)
    .bind(payload)
    .execute(pool)
    .await?;
    Ok(())
}

/// Read back the last-known-good profile for an address, if any.
pub async fn load_profile_snapshot(pool: &SqlitePool, address: &str) -> Result<Option<Profile>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT profile_json FROM profile_snapshots WHERE address = ?1 COLLATE NOCASE",
    )
    .bind(address)
    .fetch_optional(pool)
    .await?;
    match row {
        Some((payload,)) => Ok(serde_json::from_str(&payload).ok()),
        None => Ok(None),
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
