//! Submission of runs to the load-generation engine.

use async_trait::async_trait;
use bench_common::{BenchError, BenchResult, RunResults};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::ClientSettings;
use crate::request::OutboundRequest;

/// Path of the run submission endpoint.
pub const SUBMIT_PATH: &str = "/api/test";

/// Shown alongside a policy rejection instead of the usual retry advice.
pub const POLICY_HINT: &str =
    "The engine refused the run for environment or policy reasons. Check network access and \
     proxy/firewall policy for the target services before retrying.";

/// Executes a run and returns its aggregated metrics.
#[async_trait]
pub trait RunEngine: Send + Sync {
    async fn submit(&self, request: OutboundRequest) -> BenchResult<RunResults>;
}

/// Engine reached over HTTP.
pub struct HttpEngine {
    client: Client,
    submit_url: String,
    policy_status: u16,
}

impl HttpEngine {
    pub fn new(settings: &ClientSettings) -> BenchResult<Self> {
        let client = Client::builder()
            .timeout(settings.run_timeout())
            .build()
            .map_err(|e| BenchError::Internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: Client, settings: &ClientSettings) -> Self {
        Self {
            client,
            submit_url: settings.endpoint(SUBMIT_PATH),
            policy_status: settings.policy_status,
        }
    }

    pub fn submit_url(&self) -> &str {
        &self.submit_url
    }
}

#[async_trait]
impl RunEngine for HttpEngine {
    #[instrument(
        skip(self, request),
        fields(
            url = %self.submit_url,
            services = request.config.services.len(),
            attachments = request.attachments.len()
        )
    )]
    async fn submit(&self, request: OutboundRequest) -> BenchResult<RunResults> {
        let form = request.into_form()?;

        let response = self
            .client
            .post(&self.submit_url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport_error)?;
        debug!(status, bytes = body.len(), "Engine responded");

        classify_response(status, &body, self.policy_status)
    }
}

fn transport_error(err: reqwest::Error) -> BenchError {
    BenchError::Transport {
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Turn an engine response into results or the matching error.
pub fn classify_response(status: u16, body: &[u8], policy_status: u16) -> BenchResult<RunResults> {
    if status == policy_status {
        warn!(status, "Run rejected by policy");
        return Err(BenchError::PolicyRejected {
            status,
            hint: POLICY_HINT.to_string(),
        });
    }

    if (200..300).contains(&status) {
        return serde_json::from_slice::<RunResults>(body).map_err(|e| BenchError::Transport {
            status: Some(status),
            message: format!("malformed response body: {}", e),
        });
    }

    Err(BenchError::Transport {
        status: Some(status),
        message: error_message(status, body),
    })
}

fn error_message(status: u16, body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.error;
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() && text.len() <= 200 {
        return text.to_string();
    }
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unexpected status")
        .to_string()
}
