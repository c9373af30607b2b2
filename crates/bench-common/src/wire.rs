//! Payloads exchanged with the load-generation engine.

use serde::{Deserialize, Serialize};

use crate::service::ServiceWire;

/// The `config` part of a run submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequestWire {
    pub services: Vec<ServiceWire>,
    pub concurrent_users: Vec<u32>,
    pub requests_per_user: u32,
}

/// Aggregated metrics returned for a finished run.
///
/// `qps[i]` and `response_times[i]` belong to `concurrent_users[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    #[serde(default)]
    pub concurrent_users: Vec<u32>,
    #[serde(default)]
    pub services: Vec<ServiceResults>,
}

/// Per-service metric series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceResults {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub qps: Vec<f64>,
    /// Mean response time in seconds.
    #[serde(default)]
    pub response_times: Vec<f64>,
}

impl ServiceResults {
    /// Name to show for the service at `index`; unnamed entries get a placeholder.
    pub fn label(&self, index: usize) -> String {
        if self.name.trim().is_empty() {
            format!("Service {}", index + 1)
        } else {
            self.name.clone()
        }
    }
}

impl RunResults {
    /// Services whose series don't line up with `concurrent_users`.
    pub fn misaligned_services(&self) -> Vec<&str> {
        let expected = self.concurrent_users.len();
        self.services
            .iter()
            .filter(|s| s.qps.len() != expected || s.response_times.len() != expected)
            .map(|s| s.name.as_str())
            .collect()
    }
}
