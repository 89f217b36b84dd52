use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info};
use uuid::Uuid;

use crate::db::DbPool;
use crate::types::SessionResponse;

const API_KEY_SETTING: &str = "api_key";

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Mint a run session bound to the supplied API key.
pub fn create_session(conn: &Connection, api_key: &str) -> Result<String> {
    let session_id = Uuid::new_v4().to_string();

    conn.execute(
        "INSERT INTO sessions (session_id, api_key, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![session_id, api_key, now_ms()],
    )
    .context("Failed to insert session")?;

    Ok(session_id)
}

/// Fetch a session, refusing rows older than the TTL even if the sweeper
/// hasn't removed them yet.
pub fn get_session(
    conn: &Connection,
    session_id: &str,
    ttl: Duration,
) -> Result<Option<SessionResponse>> {
    let session = conn
        .query_row(
            "SELECT session_id, api_key, created_at FROM sessions WHERE session_id = ?1",
            [session_id],
            |row| {
                Ok(SessionResponse {
                    session_id: row.get(0)?,
                    api_key: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()
        .context("Failed to query session")?;

    let cutoff = now_ms() - ttl.as_millis() as i64;
    Ok(session.filter(|s| s.created_at >= cutoff))
}

pub fn purge_expired_sessions(conn: &Connection, ttl: Duration) -> Result<usize> {
    let cutoff = now_ms() - ttl.as_millis() as i64;

    let rows = conn
        .execute(
            "DELETE FROM sessions WHERE created_at < ?1",
            rusqlite::params![cutoff],
        )
        .context("Failed to purge sessions")?;

    Ok(rows)
}

pub fn store_api_key(conn: &Connection, api_key: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![API_KEY_SETTING, api_key],
    )
    .context("Failed to store API key")?;

    Ok(())
}

pub fn stored_api_key(conn: &Connection) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM settings WHERE key = ?1",
        [API_KEY_SETTING],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to query API key")
}

/// Background task that deletes expired run sessions
pub async fn session_sweeper(pool: DbPool, ttl: Duration) -> Result<()> {
    info!("Starting session sweeper (TTL {}s)", ttl.as_secs());

    loop {
        tokio::time::sleep(ttl).await;

        let result = crate::db::execute_async(&pool, move |conn| {
            purge_expired_sessions(conn, ttl)
        })
        .await;

        match result {
            Ok(count) if count > 0 => {
                info!("Purged {} expired session(s)", count);
            }
            Err(e) => {
                error!("Session sweeper error: {}", e);
            }
            _ => {}
        }
    }
}
