use serde::{Deserialize, Serialize};

// ============================================================================
// Collector Wire Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PcStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub pc_id: String,
    pub auth_token: String,
    pub system_info: RegisterSystemInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSystemInfo {
    pub platform: String,
    pub arch: String,
    pub runtime_version: String,
    pub hostname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    pub pc_id: String,
    /// Epoch milliseconds at send time.
    pub timestamp: i64,
    pub status: PcStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_info: Option<HeartbeatSystemInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_reason: Option<String>,
}

/// Per-beat metadata. `last_heartbeat_success` reports the outcome of the
/// *previous* attempt, giving the collector a continuity signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatSystemInfo {
    pub platform: String,
    pub arch: String,
    pub runtime_version: String,
    pub uptime_seconds: u64,
    pub memory_usage: u64,
    pub last_heartbeat_success: bool,
}
