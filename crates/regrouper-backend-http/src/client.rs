//! `Backend` implementation over the management server REST API

use async_trait::async_trait;
use regrouper_backend_api::{Agent, AgentPage, Backend, BackendError, BackendResult, PageCursor};
use regrouper_util::{AgentId, GroupId};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};

use crate::retry::retry_send;
use crate::wire::{Envelope, FindRequest, FindResponse, MoveRequest};

/// Port the management server listens on when `server_name` is a bare host
pub const DEFAULT_PORT: u16 = 3129;

/// Transport retries per request before giving up
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const API_KEY_HEADER: &str = "X-ApiKey";
const FIND_PATH: &str = "/v1/agent/find";
const MOVE_PATH: &str = "/v1/agent/move";

/// Connection settings for [`HttpBackend`]
#[derive(Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub api_key: String,
    pub verify_ssl: bool,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl HttpBackendConfig {
    /// Build settings from a configured server name.
    ///
    /// A bare host becomes `https://<host>:3129`; anything containing a
    /// scheme is used as-is.
    pub fn new(server_name: &str, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url_for(server_name),
            api_key: api_key.into(),
            verify_ssl: true,
            timeout: Duration::from_secs(60),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl std::fmt::Debug for HttpBackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Normalize a configured server name into a base URL without trailing slash
pub fn base_url_for(server_name: &str) -> String {
    let server_name = server_name.trim();
    if server_name.contains("://") {
        server_name.trim_end_matches('/').to_string()
    } else {
        format!("https://{}:{}", server_name.trim_end_matches('/'), DEFAULT_PORT)
    }
}

/// HTTP client for the management server
pub struct HttpBackend {
    client: reqwest::Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> BackendResult<Self> {
        if !config.verify_ssl {
            tracing::warn!(
                base_url = %config.base_url,
                "TLS certificate verification is disabled"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// POST a JSON body and decode the response envelope
    async fn post<B, T>(&self, path: &str, body: &B) -> BackendResult<Option<T>>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);

        let response = retry_send(self.config.max_retries, path, || {
            self.client
                .post(&url)
                .header(API_KEY_HEADER, &self.config.api_key)
                .json(body)
                .send()
        })
        .await
        .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;
        trace!(path, %status, bytes = text.len(), "Backend response");

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        decode_envelope(path, &text)
    }
}

fn map_transport_error(error: reqwest::Error) -> BackendError {
    if error.is_decode() {
        BackendError::Protocol(error.to_string())
    } else {
        BackendError::Transport(error.to_string())
    }
}

/// Map a non-success HTTP status onto a backend error
fn status_error(status: StatusCode, body: &str) -> BackendError {
    let message = body.trim().chars().take(512).collect::<String>();
    match status.as_u16() {
        401 | 403 => BackendError::Auth(if message.is_empty() {
            status.to_string()
        } else {
            message
        }),
        404 => BackendError::NotFound(message),
        429 => BackendError::RateLimited,
        code @ 500..=599 => BackendError::Server {
            status: code,
            message,
        },
        code => BackendError::Rejected {
            status: code,
            message,
        },
    }
}

fn decode_envelope<T: DeserializeOwned>(path: &str, text: &str) -> BackendResult<Option<T>> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let envelope: Envelope<T> = serde_json::from_str(text)
        .map_err(|e| BackendError::Protocol(format!("{path}: invalid response body: {e}")))?;

    if let Some(message) = envelope.error_message() {
        return Err(BackendError::Protocol(format!("{path}: {message}")));
    }

    Ok(envelope.response)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_agents(&self, cursor: Option<&PageCursor>) -> BackendResult<AgentPage> {
        let request = FindRequest {
            checkpoint: cursor.map(PageCursor::as_str),
        };

        let Some(response) = self.post::<_, FindResponse>(FIND_PATH, &request).await? else {
            return Err(BackendError::Protocol(format!(
                "{FIND_PATH}: response has no body"
            )));
        };

        let agents: Vec<Agent> = response
            .agents
            .unwrap_or_default()
            .into_iter()
            .map(Agent::from)
            .collect();

        let next_cursor = response
            .checkpoint
            .filter(|c| !c.is_empty() && !agents.is_empty())
            .map(PageCursor::new);

        debug!(
            agents = agents.len(),
            more = next_cursor.is_some(),
            "Fetched agent page"
        );

        Ok(AgentPage {
            agents,
            next_cursor,
        })
    }

    async fn move_agents(&self, agents: &[AgentId], group: &GroupId) -> BackendResult<()> {
        if agents.is_empty() {
            return Ok(());
        }

        let request = MoveRequest {
            groupid: group.as_str(),
            agentid: agents.iter().map(AgentId::as_str).collect(),
        };

        self.post::<_, serde_json::Value>(MOVE_PATH, &request).await?;

        debug!(count = agents.len(), group = %group, "Moved agents");
        Ok(())
    }
}
