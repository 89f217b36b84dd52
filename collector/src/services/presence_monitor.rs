use anyhow::Result;
use std::time::Duration;
use tracing::{error, info};

use crate::db::DbPool;
use crate::services::pc_registry;

/// Background task that flips PCs to OFFLINE when their heartbeats stop
/// arriving. The agent reports every 3s, so a PC past the threshold has
/// missed several beats.
pub async fn presence_monitor(pool: DbPool, offline_after: Duration) -> Result<()> {
    info!(
        "Starting presence monitor (offline after {}s)",
        offline_after.as_secs()
    );

    let offline_after_ms = offline_after.as_millis() as i64;

    loop {
        tokio::time::sleep(offline_after).await;

        let result = crate::db::execute_async(&pool, move |conn| {
            pc_registry::mark_stale_pcs(conn, offline_after_ms)
        })
        .await;

        match result {
            Ok(count) if count > 0 => {
                info!("Marked {} PC(s) offline due to missing heartbeats", count);
            }
            Err(e) => {
                error!("Presence monitor error: {}", e);
            }
            _ => {}
        }
    }
}
