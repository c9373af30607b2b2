//! Error types for the bench client.

use std::fmt;

use thiserror::Error;

use crate::run_config::Violation;

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;

/// Which user-entered JSON field failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonField {
    Headers,
    RequestBody,
}

impl JsonField {
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonField::Headers => "headers",
            JsonField::RequestBody => "request_body",
        }
    }
}

impl fmt::Display for JsonField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary error type for configuring and running load tests.
#[derive(Debug, Clone, Error)]
pub enum BenchError {
    // === Local errors, raised before any network call ===
    #[error("Service #{} has malformed JSON in '{}': {}", .service_index + 1, .field, .message)]
    MalformedJson {
        service_index: usize,
        field: JsonField,
        message: String,
    },

    #[error("Configuration is incomplete: {}", join_violations(.0))]
    Validation(Vec<Violation>),

    // === Run-phase errors ===
    #[error("{}", transport_message(.status, .message))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Run rejected by policy (HTTP {status}): {hint}")]
    PolicyRejected { status: u16, hint: String },

    // === Persistence and local IO ===
    #[error("Stored configuration unreadable: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn transport_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Run failed with HTTP {}: {}", code, message),
        None => format!("Run failed: {}", message),
    }
}

impl BenchError {
    /// Whether the error was detected locally, without contacting the engine.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            BenchError::MalformedJson { .. } | BenchError::Validation(_)
        )
    }

    /// HTTP status attached to the failure, if the engine answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            BenchError::Transport { status, .. } => *status,
            BenchError::PolicyRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for showing to the person driving the run.
    pub fn user_message(&self) -> String {
        match self {
            BenchError::Validation(violations) => {
                let mut lines = vec!["Please fix the following before starting:".to_string()];
                lines.extend(violations.iter().map(|v| format!("  - {}", v)));
                lines.join("\n")
            }
            BenchError::PolicyRejected { status, hint } => {
                format!("The run was blocked (HTTP {}). {}", status, hint)
            }
            other => other.to_string(),
        }
    }

    pub(crate) fn malformed(service_index: usize, field: JsonField, message: impl Into<String>) -> Self {
        BenchError::MalformedJson {
            service_index,
            field,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for BenchError {
    fn from(err: std::io::Error) -> Self {
        BenchError::Io(err.to_string())
    }
}
