//! Persistence of the last-used run configuration.
//!
//! The configuration is stored as a single string token with an absolute
//! expiry. Attachments are never written: an image service restored from a
//! token comes back without its file and the user has to pick it again.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bench_common::{BenchError, BenchResult, RunConfig};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How long a saved configuration stays restorable.
pub const RETENTION_DAYS: i64 = 7;

/// Scope the token applies to: the whole application.
pub const TOKEN_SCOPE: &str = "/";

const TOKEN_VERSION: u32 = 1;

/// A single storage slot holding the serialized token. Last write wins.
pub trait TokenSlot: Send + Sync {
    fn read(&self) -> BenchResult<Option<String>>;
    fn write(&self, token: &str) -> BenchResult<()>;
    fn clear(&self) -> BenchResult<()>;
}

/// Token kept in a file on disk.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenSlot for FileSlot {
    fn read(&self) -> BenchResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(token) => Ok(Some(token)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, token: &str) -> BenchResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Replace atomically; readers never see a partial token.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, token)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> BenchResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Token kept in memory.
#[derive(Debug, Default)]
pub struct MemorySlot {
    token: Mutex<Option<String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-filled with `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn lock(&self) -> BenchResult<std::sync::MutexGuard<'_, Option<String>>> {
        self.token
            .lock()
            .map_err(|_| BenchError::Persistence("token slot lock poisoned".to_string()))
    }
}

impl TokenSlot for MemorySlot {
    fn read(&self) -> BenchResult<Option<String>> {
        Ok(self.lock()?.clone())
    }

    fn write(&self, token: &str) -> BenchResult<()> {
        *self.lock()? = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> BenchResult<()> {
        *self.lock()? = None;
        Ok(())
    }
}

/// On-disk envelope around the serialized configuration.
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    version: u32,
    scope: String,
    written_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    config: RunConfig,
}

/// Saves and restores the last RunConfig.
pub struct ConfigStore<S> {
    slot: S,
}

impl<S: TokenSlot> ConfigStore<S> {
    pub fn new(slot: S) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    /// Persist `config`, expiring [`RETENTION_DAYS`] from now.
    pub fn save(&self, config: &RunConfig) -> BenchResult<()> {
        self.save_at(config, Utc::now())
    }

    pub fn save_at(&self, config: &RunConfig, now: DateTime<Utc>) -> BenchResult<()> {
        let token = encode_token(config, now)?;
        self.slot.write(&token)?;
        debug!(
            services = config.services.len(),
            levels = %config.concurrency_levels,
            "Saved run configuration"
        );
        Ok(())
    }

    /// Restore the last configuration, if one is present and still valid.
    ///
    /// A token that can't be read is treated exactly like a missing one.
    pub fn load(&self) -> Option<RunConfig> {
        self.load_at(Utc::now())
    }

    pub fn load_at(&self, now: DateTime<Utc>) -> Option<RunConfig> {
        let token = match self.slot.read() {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Could not read stored configuration, ignoring it");
                return None;
            }
        };

        match decode_token(&token, now) {
            Ok(config) => {
                info!(
                    services = config.services.len(),
                    "Restored previous run configuration"
                );
                Some(config)
            }
            Err(e) => {
                warn!(error = %e, "Ignoring stored configuration");
                None
            }
        }
    }

    pub fn clear(&self) -> BenchResult<()> {
        self.slot.clear()
    }
}

fn encode_token(config: &RunConfig, now: DateTime<Utc>) -> BenchResult<String> {
    let stored = StoredToken {
        version: TOKEN_VERSION,
        scope: TOKEN_SCOPE.to_string(),
        written_at: now,
        expires_at: now + Duration::days(RETENTION_DAYS),
        config: config.clone(),
    };
    serde_json::to_string(&stored)
        .map_err(|e| BenchError::Persistence(format!("failed to encode token: {}", e)))
}

fn decode_token(token: &str, now: DateTime<Utc>) -> BenchResult<RunConfig> {
    let stored: StoredToken = serde_json::from_str(token)
        .map_err(|e| BenchError::Persistence(format!("malformed token: {}", e)))?;

    if stored.version != TOKEN_VERSION {
        return Err(BenchError::Persistence(format!(
            "unsupported token version {}",
            stored.version
        )));
    }
    if stored.scope != TOKEN_SCOPE {
        return Err(BenchError::Persistence(format!(
            "token scoped to '{}'",
            stored.scope
        )));
    }
    if now >= stored.expires_at {
        return Err(BenchError::Persistence(format!(
            "token expired at {}",
            stored.expires_at.to_rfc3339()
        )));
    }

    Ok(stored.config)
}
