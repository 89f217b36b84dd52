use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::types::{HeartbeatRequest, RegisterRequest};

/// Failures below the status-code level: the request never completed, or the
/// collector answered with something that is not JSON. A `Parse` on a
/// success status is an unknown outcome, never a confirmed success.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    #[error("response was not valid JSON (status {status}): {source}")]
    Parse {
        status: StatusCode,
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("collector rejected credentials (401)")]
    Auth,
    #[error("registration failed ({status}): {body}")]
    Status { status: StatusCode, body: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error("collector rejected credentials (401)")]
    Auth,
    #[error("heartbeat rejected ({status}): {body}")]
    Status { status: StatusCode, body: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Clone)]
pub struct CollectorClient {
    base_url: String,
    auth_token: String,
    client: Client,
}

impl CollectorClient {
    pub fn new(base_url: &str, pc_id: &str, auth_token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!(
                "fleetpulse-agent/{} ({})",
                env!("CARGO_PKG_VERSION"),
                pc_id
            ))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
            client,
        })
    }

    /// Single JSON POST primitive shared by registration, heartbeats, and
    /// the shutdown notice.
    async fn send_json<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<(StatusCode, serde_json::Value), TransportError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.auth_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Request(e)
                }
            })?;

        let status = resp.status();
        let body = resp.json::<serde_json::Value>().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Parse { status, source: e }
            }
        })?;

        Ok((status, body))
    }

    /// Register this agent with the collector. Sent exactly once per process;
    /// any failure is fatal to the caller.
    pub async fn register(&self, req: &RegisterRequest) -> Result<String, RegisterError> {
        match self.send_json("/api/register-agent", req).await {
            Ok((status, body)) => {
                if status.is_success() {
                    Ok(body
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("registered")
                        .to_string())
                } else if status == StatusCode::UNAUTHORIZED {
                    Err(RegisterError::Auth)
                } else {
                    Err(RegisterError::Status {
                        status,
                        body: body.to_string(),
                    })
                }
            }
            // The status line is authoritative even when the body is garbage
            Err(TransportError::Parse { status, source }) if status == StatusCode::UNAUTHORIZED => {
                debug!("401 with unparseable body: {}", source);
                Err(RegisterError::Auth)
            }
            Err(e) => Err(RegisterError::Transport(e)),
        }
    }

    /// Send one heartbeat, ONLINE or OFFLINE.
    pub async fn heartbeat(&self, req: &HeartbeatRequest) -> Result<(), HeartbeatError> {
        match self.send_json("/api/heartbeat", req).await {
            Ok((status, body)) => {
                if status.is_success() {
                    Ok(())
                } else if status == StatusCode::UNAUTHORIZED {
                    Err(HeartbeatError::Auth)
                } else {
                    Err(HeartbeatError::Status {
                        status,
                        body: body.to_string(),
                    })
                }
            }
            Err(TransportError::Parse { status, source }) if status == StatusCode::UNAUTHORIZED => {
                debug!("401 with unparseable body: {}", source);
                Err(HeartbeatError::Auth)
            }
            Err(e) => Err(HeartbeatError::Transport(e)),
        }
    }
}
