//! Statement executors.
//!
//! # Endpoint Format
//!
//! - POST `{base}/api/2.0/sql/statements` with
//!   `{"statement", "warehouse_id", "wait_timeout", "on_wait_timeout": "CONTINUE"}`
//!   → `{"statement_id", "status": {"state", "error": {"message"}}}`
//! - GET `{base}/api/2.0/sql/statements/{statement_id}` → same shape
//! - POST `{base}/api/2.0/sql/statements/{statement_id}/cancel` → empty body
//!
//! A statement still `PENDING` or `RUNNING` after the wait timeout is polled
//! until it reaches a terminal state. One that outlives the maximum wait is
//! cancelled before the timeout is reported.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use tagsync_config::{SecretsConfig, WarehouseConfig};

use crate::error::{Result, WriterError};
use crate::target::WarehouseTarget;

/// Longest a single statement may run before it is reported as timed out.
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

/// Server-side bounds of `wait_timeout`.
const MIN_WAIT_SECS: u64 = 5;
const MAX_WAIT_SECS: u64 = 50;

/// Client-side timeout on top of the server-side wait.
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 30;

/// Execution state reported by the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
    #[serde(other)]
    Unknown,
}

impl StatementState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

/// Result of one successfully executed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementOutcome {
    pub statement_id: String,
    pub state: StatementState,
}

/// Runs one SQL statement to completion.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute `statement`; an `Err` means it did not succeed.
    async fn execute(&self, statement: &str) -> Result<StatementOutcome>;
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    statement: &'a str,
    warehouse_id: &'a str,
    wait_timeout: String,
    on_wait_timeout: &'static str,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    statement_id: String,
    status: StatementStatus,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: StatementState,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    message: String,
}

/// Executor over the warehouse's SQL statement REST API.
pub struct WarehouseExecutor {
    client: Client,
    base_url: String,
    warehouse_id: String,
    token: String,
    wait_timeout_secs: u64,
    poll_interval: Duration,
    max_wait: Duration,
}

impl WarehouseExecutor {
    pub fn new(target: &WarehouseTarget, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(MAX_WAIT_SECS + REQUEST_TIMEOUT_MARGIN_SECS))
            .build()
            .map_err(|e| WriterError::connection(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            client,
            base_url: target.base_url(),
            warehouse_id: target.warehouse_id().to_string(),
            token: token.into(),
            wait_timeout_secs: MAX_WAIT_SECS,
            poll_interval: Duration::from_secs(1),
            max_wait: DEFAULT_MAX_WAIT,
        })
    }

    /// Resolve the target and token from configuration.
    pub fn from_config(config: &WarehouseConfig, secrets: &SecretsConfig) -> Result<Self> {
        let target = WarehouseTarget::resolve(config)?;
        let token = config.token(secrets)?;
        Ok(Self::new(&target, token)?
            .with_wait_timeout(config.timeout_secs)
            .with_poll_interval(Duration::from_millis(config.poll_interval_ms)))
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Server-side wait per request, clamped to what the API accepts.
    pub fn with_wait_timeout(mut self, secs: u64) -> Self {
        self.wait_timeout_secs = secs.clamp(MIN_WAIT_SECS, MAX_WAIT_SECS);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn warehouse_id(&self) -> &str {
        &self.warehouse_id
    }

    async fn submit(&self, statement: &str) -> Result<StatementResponse> {
        let url = format!("{}/api/2.0/sql/statements", self.base_url);
        let body = ExecuteRequest {
            statement,
            warehouse_id: &self.warehouse_id,
            wait_timeout: format!("{}s", self.wait_timeout_secs),
            on_wait_timeout: "CONTINUE",
        };
        let request = self.client.post(&url).bearer_auth(&self.token).json(&body);
        self.send(request).await
    }

    async fn status(&self, statement_id: &str) -> Result<StatementResponse> {
        let url = format!("{}/api/2.0/sql/statements/{}", self.base_url, statement_id);
        let request = self.client.get(&url).bearer_auth(&self.token);
        self.send(request).await
    }

    async fn cancel(&self, statement_id: &str) -> Result<()> {
        let url = format!(
            "{}/api/2.0/sql/statements/{}/cancel",
            self.base_url, statement_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| WriterError::connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WriterError::remote_server(status.as_u16(), body));
        }
        Ok(())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<StatementResponse> {
        let response = request
            .send()
            .await
            .map_err(|e| WriterError::connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WriterError::remote_server(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| WriterError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl StatementExecutor for WarehouseExecutor {
    async fn execute(&self, statement: &str) -> Result<StatementOutcome> {
        debug!("Executing {}", statement);
        let started = Instant::now();
        let mut response = self.submit(statement).await?;

        while !response.status.state.is_terminal() {
            if started.elapsed() >= self.max_wait {
                if let Err(e) = self.cancel(&response.statement_id).await {
                    warn!(
                        statement_id = %response.statement_id,
                        "Failed to cancel timed out statement: {}", e
                    );
                }
                return Err(WriterError::Timeout {
                    statement_id: response.statement_id,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            trace!(
                statement_id = %response.statement_id,
                state = ?response.status.state,
                "polling"
            );
            tokio::time::sleep(self.poll_interval).await;
            response = self.status(&response.statement_id).await?;
        }

        match response.status.state {
            StatementState::Succeeded => Ok(StatementOutcome {
                statement_id: response.statement_id,
                state: StatementState::Succeeded,
            }),
            state => {
                let message = response
                    .status
                    .error
                    .map(|e| e.message)
                    .unwrap_or_default();
                Err(WriterError::statement_failed(format!("{:?}", state), message))
            }
        }
    }
}

/// Records statements without executing them.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    statements: Mutex<Vec<String>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements received so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }
}

#[async_trait]
impl StatementExecutor for DryRunExecutor {
    async fn execute(&self, statement: &str) -> Result<StatementOutcome> {
        let mut statements = self.statements.lock();
        statements.push(statement.to_string());
        Ok(StatementOutcome {
            statement_id: format!("dry-run-{}", statements.len()),
            state: StatementState::Succeeded,
        })
    }
}
