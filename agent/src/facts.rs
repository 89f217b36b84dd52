use std::time::Instant;
use sysinfo::{ProcessesToUpdate, System};

use crate::types::{HeartbeatSystemInfo, RegisterSystemInfo};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Facts reported once at registration.
pub fn register_info() -> RegisterSystemInfo {
    RegisterSystemInfo {
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        runtime_version: AGENT_VERSION.to_string(),
        hostname: hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string()),
    }
}

/// Facts attached to every heartbeat. All best-effort; a failed probe
/// reports zero rather than dropping the beat.
pub fn heartbeat_info(started: Instant, last_heartbeat_success: bool) -> HeartbeatSystemInfo {
    HeartbeatSystemInfo {
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        runtime_version: AGENT_VERSION.to_string(),
        uptime_seconds: started.elapsed().as_secs(),
        memory_usage: resident_memory_bytes(),
        last_heartbeat_success,
    }
}

/// Resident set size of this process in bytes (best effort)
fn resident_memory_bytes() -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid).map(|p| p.memory()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_info_is_populated() {
        let info = register_info();
        assert!(!info.platform.is_empty());
        assert!(!info.arch.is_empty());
        assert!(!info.runtime_version.is_empty());
        assert!(!info.hostname.is_empty());
    }

    #[test]
    fn heartbeat_info_carries_the_continuity_flag() {
        let started = Instant::now();
        assert!(heartbeat_info(started, true).last_heartbeat_success);
        assert!(!heartbeat_info(started, false).last_heartbeat_success);
    }

    #[test]
    fn own_process_memory_is_visible() {
        assert!(resident_memory_bytes() > 0);
    }
}
