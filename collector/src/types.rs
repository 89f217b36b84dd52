use serde::{Deserialize, Serialize};

// ============================================================================
// Agent Wire Messages
// ============================================================================

/// Agent liveness status as it appears on the wire and in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PcStatus {
    Online,
    Offline,
}

impl PcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PcStatus::Online => "ONLINE",
            PcStatus::Offline => "OFFLINE",
        }
    }
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
    /// Agent-side clock, epoch milliseconds.
    pub timestamp: i64,
    pub status: PcStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_info: Option<HeartbeatSystemInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_reason: Option<String>,
}

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

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Fleet Management
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionPcRequest {
    pub pc_id: String,
    pub owner: Option<String>,
    pub location: Option<String>,
    pub pc_type: Option<String>,
}

/// The auth token is returned exactly once, at provisioning time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionPcResponse {
    pub pc_id: String,
    pub auth_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcRecord {
    pub pc_id: String,
    pub status: String,
    pub owner: Option<String>,
    pub location: Option<String>,
    pub pc_type: Option<String>,
    pub hostname: Option<String>,
    pub platform: Option<String>,
    pub arch: Option<String>,
    pub runtime_version: Option<String>,
    pub provisioned_at: i64,
    pub registered_at: Option<i64>,
    pub last_seen: Option<i64>,
    pub uptime_seconds: Option<u64>,
    pub memory_usage: Option<u64>,
    pub last_heartbeat_success: Option<bool>,
    pub shutdown_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPcsResponse {
    pub pcs: Vec<PcRecord>,
}

// ============================================================================
// Run Credentials
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCredentialsRequest {
    /// Falls back to the stored API key when omitted.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCredentialsResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub api_key: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub api_key: Option<String>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
