use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Collector Responses
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcRecord {
    pub pc_id: String,
    pub status: String,
    pub owner: Option<String>,
    pub location: Option<String>,
    pub pc_type: Option<String>,
    pub hostname: Option<String>,
    pub platform: Option<String>,
    pub last_seen: Option<i64>,
    pub last_heartbeat_success: Option<bool>,
    pub shutdown_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPcsResponse {
    pub pcs: Vec<PcRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionPcResponse {
    pub pc_id: String,
    pub auth_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCredentialsResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub api_key: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub api_key: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

#[derive(Clone)]
pub struct CollectorApi {
    base_url: String,
    client: Client,
}

impl CollectorApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(format!("fleetpulsectl/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub async fn provision_pc(
        &self,
        pc_id: &str,
        owner: Option<&str>,
        location: Option<&str>,
        pc_type: Option<&str>,
    ) -> Result<ProvisionPcResponse> {
        let url = format!("{}/api/pcs", self.base_url);
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "pcId": pc_id,
                "owner": owner,
                "location": location,
                "pcType": pc_type,
            }))
            .send()
            .await
            .context("Failed to send provision request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Provisioning failed ({}): {}", status, body);
        }

        resp.json::<ProvisionPcResponse>()
            .await
            .context("Failed to parse provision response")
    }

    pub async fn list_pcs(&self) -> Result<ListPcsResponse> {
        let url = format!("{}/api/pcs", self.base_url);
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to list PCs")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("List PCs failed ({}): {}", status, body);
        }

        resp.json::<ListPcsResponse>()
            .await
            .context("Failed to parse list response")
    }

    pub async fn remove_pc(&self, pc_id: &str) -> Result<()> {
        let url = format!("{}/api/pcs/{}", self.base_url, pc_id);
        debug!("DELETE {}", url);

        let resp = self
            .client
            .delete(&url)
            .send()
            .await
            .context("Failed to send delete request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Delete failed ({}): {}", status, body);
        }

        Ok(())
    }

    pub async fn set_api_key(&self, api_key: &str) -> Result<()> {
        let url = format!("{}/api/settings/api-key", self.base_url);
        debug!("PUT {}", url);

        let resp = self
            .client
            .put(&url)
            .json(&serde_json::json!({ "apiKey": api_key }))
            .send()
            .await
            .context("Failed to store API key")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Storing API key failed ({}): {}", status, body);
        }

        Ok(())
    }

    pub async fn get_api_key(&self) -> Result<ApiKeyResponse> {
        let url = format!("{}/api/settings/api-key", self.base_url);
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to read API key")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Reading API key failed ({}): {}", status, body);
        }

        resp.json::<ApiKeyResponse>()
            .await
            .context("Failed to parse API key response")
    }

    pub async fn run_credentials(&self, api_key: Option<&str>) -> Result<RunCredentialsResponse> {
        let url = format!("{}/api/run-credentials", self.base_url);
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "apiKey": api_key }))
            .send()
            .await
            .context("Failed to mint run session")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Minting run session failed ({}): {}", status, body);
        }

        resp.json::<RunCredentialsResponse>()
            .await
            .context("Failed to parse run session response")
    }

    pub async fn session(&self, session_id: &str) -> Result<SessionResponse> {
        let url = format!("{}/api/credentials/{}", self.base_url, session_id);
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch session")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Fetching session failed ({}): {}", status, body);
        }

        resp.json::<SessionResponse>()
            .await
            .context("Failed to parse session response")
    }
}
