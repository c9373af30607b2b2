//! Client settings and scenario file loading.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use bench_common::{
    Attachment, ConcurrencyLevels, RequestType, RunConfig, ServiceDefaults, ServiceModel,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Status the engine uses to signal an environment or policy block.
pub const DEFAULT_POLICY_STATUS: u16 = 451;

/// Where and how the client talks to the load-generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Base URL of the engine, e.g. `http://localhost:5000`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for a whole run submission (runs can take minutes)
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,

    /// Timeout for download requests
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// HTTP status that means the run was blocked by policy
    #[serde(default = "default_policy_status")]
    pub policy_status: u16,

    /// File holding the last-used configuration token
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_run_timeout_secs() -> u64 {
    1800
}

fn default_download_timeout_secs() -> u64 {
    60
}

fn default_policy_status() -> u16 {
    DEFAULT_POLICY_STATUS
}

fn default_state_file() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(env::temp_dir)
        .join("bench")
        .join("last_config.json")
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            run_timeout_secs: default_run_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            policy_status: default_policy_status(),
            state_file: default_state_file(),
        }
    }
}

impl ClientSettings {
    /// Load settings from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: ClientSettings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        Ok(settings)
    }

    /// Load from `path` if given, otherwise defaults, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        settings.apply_env()?;
        Ok(settings)
    }

    /// Apply `BENCH_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = env::var("BENCH_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(secs) = env::var("BENCH_TIMEOUT_SECS") {
            self.run_timeout_secs = secs
                .parse()
                .with_context(|| format!("BENCH_TIMEOUT_SECS is not a number: {}", secs))?;
        }
        if let Ok(status) = env::var("BENCH_POLICY_STATUS") {
            self.policy_status = status
                .parse()
                .with_context(|| format!("BENCH_POLICY_STATUS is not a status code: {}", status))?;
        }
        if let Ok(path) = env::var("BENCH_STATE_FILE") {
            self.state_file = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Join an API path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// A run described in YAML.
///
/// ```yaml
/// concurrent_users: [1, 5, 10]
/// requests_per_user: 20
/// services:
///   - name: search
///     url: http://localhost:9000/search
///     headers: { Content-Type: application/json }
///     request_body: { query: "rust" }
///   - name: ocr
///     url: http://localhost:9001/ocr
///     request_type: image
///     image_file: fixtures/receipt.png
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub concurrent_users: Vec<u32>,
    #[serde(default = "default_requests_per_user")]
    pub requests_per_user: u32,
    pub services: Vec<ScenarioService>,
}

fn default_requests_per_user() -> u32 {
    bench_common::run_config::DEFAULT_REQUESTS_PER_USER
}

/// One service entry of a scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioService {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub request_type: RequestType,
    #[serde(default)]
    pub headers: Option<Value>,
    #[serde(default)]
    pub request_body: Option<Value>,
    /// Image to attach, relative to the scenario file
    #[serde(default)]
    pub image_file: Option<PathBuf>,
}

impl ScenarioFile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        let scenario: ScenarioFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))?;
        Ok(scenario)
    }

    /// Build a RunConfig, reading image attachments relative to `base_dir`.
    pub fn into_run_config(self, base_dir: &Path) -> Result<RunConfig> {
        let concurrency_levels = ConcurrencyLevels::from_levels(self.concurrent_users)
            .context("Invalid concurrent_users in scenario")?;

        let mut services = Vec::with_capacity(self.services.len());
        for entry in self.services {
            let defaults = ServiceDefaults::default();
            let mut service = ServiceModel::new(ServiceDefaults {
                name: entry.name,
                url: entry.url,
                request_type: entry.request_type,
                headers: entry
                    .headers
                    .map(json_text)
                    .unwrap_or(defaults.headers),
                request_body: entry
                    .request_body
                    .map(json_text)
                    .unwrap_or(defaults.request_body),
            });

            if let Some(file) = entry.image_file {
                let path = base_dir.join(&file);
                service.image_payload = Some(read_attachment(&path)?);
            }
            services.push(service);
        }

        Ok(RunConfig {
            services,
            concurrency_levels,
            requests_per_user: self.requests_per_user,
        })
    }

    /// Load a scenario file and resolve it into a RunConfig.
    pub fn load_run_config(path: impl AsRef<Path>) -> Result<RunConfig> {
        let path = path.as_ref();
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_file(path)?.into_run_config(base_dir)
    }
}

/// JSON text for a scenario field. A YAML string is taken as already-typed JSON.
fn json_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Read a local file into an attachment.
pub fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload.bin".to_string());
    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    debug!(file = %path.display(), bytes = bytes.len(), %content_type, "Loaded attachment");
    Ok(Attachment::new(file_name, content_type, bytes))
}
