use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::types::{HeartbeatRequest, PcRecord, RegisterRequest};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Provision a new PC and return its freshly minted auth token. The token is
/// never stored, only its hash.
pub fn provision_pc(
    conn: &Connection,
    pc_id: &str,
    owner: Option<&str>,
    location: Option<&str>,
    pc_type: Option<&str>,
) -> Result<String> {
    let token = Uuid::new_v4().to_string();
    let now = now_ms();

    conn.execute(
        "INSERT INTO pcs (pc_id, token_hash, owner, location, pc_type, status, provisioned_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'OFFLINE', ?6)",
        rusqlite::params![pc_id, hash_token(&token), owner, location, pc_type, now],
    )
    .context("Failed to insert PC")?;

    Ok(token)
}

pub fn pc_exists(conn: &Connection, pc_id: &str) -> Result<bool> {
    let row: Option<i64> = conn
        .query_row("SELECT 1 FROM pcs WHERE pc_id = ?1", [pc_id], |row| row.get(0))
        .optional()
        .context("Failed to query PC")?;
    Ok(row.is_some())
}

/// Check a presented auth token against the stored hash. Unknown PC ids
/// report false, indistinguishable from a bad token.
pub fn verify_token(conn: &Connection, pc_id: &str, token: &str) -> Result<bool> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT token_hash FROM pcs WHERE pc_id = ?1",
            [pc_id],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to query token hash")?;

    Ok(stored.map(|hash| hash == hash_token(token)).unwrap_or(false))
}

/// Record an agent registration: system facts, ONLINE status, timestamps.
pub fn record_registration(conn: &Connection, req: &RegisterRequest) -> Result<()> {
    let now = now_ms();
    let info = &req.system_info;

    let rows = conn
        .execute(
            "UPDATE pcs SET hostname = ?1, platform = ?2, arch = ?3, runtime_version = ?4,
                    status = 'ONLINE', registered_at = ?5, last_seen = ?5, shutdown_reason = NULL
             WHERE pc_id = ?6",
            rusqlite::params![
                info.hostname,
                info.platform,
                info.arch,
                info.runtime_version,
                now,
                req.pc_id
            ],
        )
        .context("Failed to record registration")?;

    if rows == 0 {
        anyhow::bail!("PC not found: {}", req.pc_id);
    }

    Ok(())
}

/// Apply a heartbeat: status, last-seen, and whatever metadata the message
/// carried. Heartbeats are idempotent status reports, so a late or duplicate
/// one just rewrites the same columns.
pub fn record_heartbeat(conn: &Connection, req: &HeartbeatRequest) -> Result<()> {
    let now = now_ms();

    let rows = conn
        .execute(
            "UPDATE pcs SET status = ?1, last_seen = ?2,
                    shutdown_reason = COALESCE(?3, shutdown_reason)
             WHERE pc_id = ?4",
            rusqlite::params![req.status.as_str(), now, req.shutdown_reason, req.pc_id],
        )
        .context("Failed to record heartbeat")?;

    if rows == 0 {
        anyhow::bail!("PC not found: {}", req.pc_id);
    }

    if let Some(info) = &req.system_info {
        conn.execute(
            "UPDATE pcs SET uptime_seconds = ?1, memory_usage = ?2, last_heartbeat_success = ?3
             WHERE pc_id = ?4",
            rusqlite::params![
                info.uptime_seconds,
                info.memory_usage,
                info.last_heartbeat_success,
                req.pc_id
            ],
        )
        .context("Failed to record heartbeat metrics")?;
    }

    Ok(())
}

/// List all PCs in provisioning order
pub fn list_pcs(conn: &Connection) -> Result<Vec<PcRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT pc_id, status, owner, location, pc_type, hostname, platform, arch,
                    runtime_version, provisioned_at, registered_at, last_seen,
                    uptime_seconds, memory_usage, last_heartbeat_success, shutdown_reason
             FROM pcs ORDER BY provisioned_at",
        )
        .context("Failed to prepare statement")?;

    let pcs = stmt
        .query_map([], |row| {
            Ok(PcRecord {
                pc_id: row.get(0)?,
                status: row.get(1)?,
                owner: row.get(2)?,
                location: row.get(3)?,
                pc_type: row.get(4)?,
                hostname: row.get(5)?,
                platform: row.get(6)?,
                arch: row.get(7)?,
                runtime_version: row.get(8)?,
                provisioned_at: row.get(9)?,
                registered_at: row.get(10)?,
                last_seen: row.get(11)?,
                uptime_seconds: row.get(12)?,
                memory_usage: row.get(13)?,
                last_heartbeat_success: row.get(14)?,
                shutdown_reason: row.get(15)?,
            })
        })
        .context("Failed to query PCs")?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to collect PCs")?;

    Ok(pcs)
}

pub fn delete_pc(conn: &Connection, pc_id: &str) -> Result<bool> {
    let rows = conn
        .execute("DELETE FROM pcs WHERE pc_id = ?1", [pc_id])
        .context("Failed to delete PC")?;
    Ok(rows > 0)
}

/// Flip ONLINE PCs whose last heartbeat is older than the threshold to
/// OFFLINE. Returns how many were flipped.
pub fn mark_stale_pcs(conn: &Connection, offline_after_ms: i64) -> Result<usize> {
    let threshold = now_ms() - offline_after_ms;

    let rows = conn
        .execute(
            "UPDATE pcs SET status = 'OFFLINE'
             WHERE status = 'ONLINE' AND (last_seen IS NULL OR last_seen < ?1)",
            rusqlite::params![threshold],
        )
        .context("Failed to mark stale PCs")?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HeartbeatSystemInfo, PcStatus, RegisterSystemInfo};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::run_migrations(&conn).unwrap();
        conn
    }

    fn register_request(pc_id: &str, token: &str) -> RegisterRequest {
        RegisterRequest {
            pc_id: pc_id.to_string(),
            auth_token: token.to_string(),
            system_info: RegisterSystemInfo {
                platform: "linux".to_string(),
                arch: "x86_64".to_string(),
                runtime_version: "0.1.0".to_string(),
                hostname: "host-1".to_string(),
            },
        }
    }

    fn heartbeat_request(pc_id: &str, status: PcStatus) -> HeartbeatRequest {
        HeartbeatRequest {
            pc_id: pc_id.to_string(),
            timestamp: now_ms(),
            status,
            system_info: Some(HeartbeatSystemInfo {
                platform: "linux".to_string(),
                arch: "x86_64".to_string(),
                runtime_version: "0.1.0".to_string(),
                uptime_seconds: 12,
                memory_usage: 4096,
                last_heartbeat_success: true,
            }),
            shutdown_reason: None,
        }
    }

    #[test]
    fn provision_then_verify_token() {
        let conn = test_conn();
        let token = provision_pc(&conn, "PC-1", Some("ops"), None, None).unwrap();

        assert!(verify_token(&conn, "PC-1", &token).unwrap());
        assert!(!verify_token(&conn, "PC-1", "wrong-token").unwrap());
        assert!(!verify_token(&conn, "PC-404", &token).unwrap());
    }

    #[test]
    fn provisioned_pc_starts_offline() {
        let conn = test_conn();
        provision_pc(&conn, "PC-1", None, None, None).unwrap();

        let pcs = list_pcs(&conn).unwrap();
        assert_eq!(pcs.len(), 1);
        assert_eq!(pcs[0].status, "OFFLINE");
        assert!(pcs[0].last_seen.is_none());
        assert!(pcs[0].hostname.is_none());
    }

    #[test]
    fn registration_sets_online_and_facts() {
        let conn = test_conn();
        let token = provision_pc(&conn, "PC-1", None, None, None).unwrap();
        record_registration(&conn, &register_request("PC-1", &token)).unwrap();

        let pcs = list_pcs(&conn).unwrap();
        assert_eq!(pcs[0].status, "ONLINE");
        assert_eq!(pcs[0].hostname.as_deref(), Some("host-1"));
        assert!(pcs[0].registered_at.is_some());
        assert!(pcs[0].last_seen.is_some());
    }

    #[test]
    fn registration_of_unknown_pc_fails() {
        let conn = test_conn();
        let err = record_registration(&conn, &register_request("PC-404", "tok")).unwrap_err();
        assert!(err.to_string().contains("PC-404"));
    }

    #[test]
    fn heartbeat_updates_metrics_and_status() {
        let conn = test_conn();
        let token = provision_pc(&conn, "PC-1", None, None, None).unwrap();
        record_registration(&conn, &register_request("PC-1", &token)).unwrap();

        record_heartbeat(&conn, &heartbeat_request("PC-1", PcStatus::Online)).unwrap();

        let pcs = list_pcs(&conn).unwrap();
        assert_eq!(pcs[0].status, "ONLINE");
        assert_eq!(pcs[0].uptime_seconds, Some(12));
        assert_eq!(pcs[0].memory_usage, Some(4096));
        assert_eq!(pcs[0].last_heartbeat_success, Some(true));
    }

    #[test]
    fn offline_heartbeat_records_shutdown_reason() {
        let conn = test_conn();
        let token = provision_pc(&conn, "PC-1", None, None, None).unwrap();
        record_registration(&conn, &register_request("PC-1", &token)).unwrap();

        let mut hb = heartbeat_request("PC-1", PcStatus::Offline);
        hb.system_info = None;
        hb.shutdown_reason = Some("SIGTERM".to_string());
        record_heartbeat(&conn, &hb).unwrap();

        let pcs = list_pcs(&conn).unwrap();
        assert_eq!(pcs[0].status, "OFFLINE");
        assert_eq!(pcs[0].shutdown_reason.as_deref(), Some("SIGTERM"));
    }

    #[test]
    fn heartbeat_without_registration_is_accepted() {
        let conn = test_conn();
        provision_pc(&conn, "PC-1", None, None, None).unwrap();

        record_heartbeat(&conn, &heartbeat_request("PC-1", PcStatus::Online)).unwrap();

        let pcs = list_pcs(&conn).unwrap();
        assert_eq!(pcs[0].status, "ONLINE");
        assert!(pcs[0].registered_at.is_none());
    }

    #[test]
    fn stale_online_pcs_are_flipped_offline() {
        let conn = test_conn();
        let token = provision_pc(&conn, "PC-1", None, None, None).unwrap();
        record_registration(&conn, &register_request("PC-1", &token)).unwrap();

        // Nothing is stale with a generous threshold
        assert_eq!(mark_stale_pcs(&conn, 60_000).unwrap(), 0);

        // A negative threshold puts the cutoff in the future
        assert_eq!(mark_stale_pcs(&conn, -1_000).unwrap(), 1);
        let pcs = list_pcs(&conn).unwrap();
        assert_eq!(pcs[0].status, "OFFLINE");

        // Already-offline PCs are not flipped again
        assert_eq!(mark_stale_pcs(&conn, -1_000).unwrap(), 0);
    }

    #[test]
    fn delete_pc_removes_row() {
        let conn = test_conn();
        provision_pc(&conn, "PC-1", None, None, None).unwrap();

        assert!(delete_pc(&conn, "PC-1").unwrap());
        assert!(!delete_pc(&conn, "PC-1").unwrap());
        assert!(list_pcs(&conn).unwrap().is_empty());
    }
}
