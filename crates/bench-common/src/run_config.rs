//! Run configuration: services, concurrency levels and request count.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::concurrency::{ConcurrencyLevels, ConcurrencyRejection};
use crate::service::{ServiceModel, ServiceSummary};

/// Requests each virtual user sends when nothing else is configured.
pub const DEFAULT_REQUESTS_PER_USER: u32 = 10;

/// A problem that blocks submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    NoServices,
    MissingName { index: usize },
    MissingUrl { index: usize },
    NoConcurrencyLevels,
    InvalidRequestsPerUser,
}

impl Violation {
    /// Index of the service the violation refers to, if any.
    pub fn service_index(&self) -> Option<usize> {
        match self {
            Violation::MissingName { index } | Violation::MissingUrl { index } => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NoServices => write!(f, "add at least one service"),
            Violation::MissingName { index } => write!(f, "service {} has no name", index + 1),
            Violation::MissingUrl { index } => write!(f, "service {} has no URL", index + 1),
            Violation::NoConcurrencyLevels => write!(f, "select at least one concurrency level"),
            Violation::InvalidRequestsPerUser => {
                write!(f, "requests per user must be a positive integer")
            }
        }
    }
}

/// Everything needed to launch one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub services: Vec<ServiceModel>,
    #[serde(default, rename = "concurrent_users")]
    pub concurrency_levels: ConcurrencyLevels,
    #[serde(default = "default_requests_per_user")]
    pub requests_per_user: u32,
}

fn default_requests_per_user() -> u32 {
    DEFAULT_REQUESTS_PER_USER
}

impl Default for RunConfig {
    /// One blank service, no levels selected.
    fn default() -> Self {
        Self {
            services: vec![ServiceModel::default()],
            concurrency_levels: ConcurrencyLevels::new(),
            requests_per_user: DEFAULT_REQUESTS_PER_USER,
        }
    }
}

impl RunConfig {
    /// An empty configuration with no services.
    pub fn empty() -> Self {
        Self {
            services: Vec::new(),
            ..Self::default()
        }
    }

    /// Append a service and return its index.
    pub fn add_service(&mut self, initial: Option<ServiceModel>) -> usize {
        self.services.push(initial.unwrap_or_default());
        self.services.len() - 1
    }

    /// Remove the service at `index`; out of range is a no-op.
    pub fn remove_service(&mut self, index: usize) -> Option<ServiceModel> {
        if index < self.services.len() {
            Some(self.services.remove(index))
        } else {
            None
        }
    }

    pub fn service_mut(&mut self, index: usize) -> Option<&mut ServiceModel> {
        self.services.get_mut(index)
    }

    pub fn set_concurrency_levels<I>(&mut self, levels: I) -> Result<(), ConcurrencyRejection>
    where
        I: IntoIterator<Item = u32>,
    {
        self.concurrency_levels.set(levels)
    }

    pub fn add_custom_concurrency(&mut self, value: i64) -> Result<u32, ConcurrencyRejection> {
        self.concurrency_levels.add_custom(value)
    }

    pub fn add_custom_concurrency_text(&mut self, text: &str) -> Result<u32, ConcurrencyRejection> {
        self.concurrency_levels.add_custom_text(text)
    }

    /// Check the configuration without changing it.
    ///
    /// Every violation is reported, in service order, so all of them can be
    /// fixed at once.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        if self.services.is_empty() {
            violations.push(Violation::NoServices);
        }
        for (index, service) in self.services.iter().enumerate() {
            if service.name.trim().is_empty() {
                violations.push(Violation::MissingName { index });
            }
            if service.url.trim().is_empty() {
                violations.push(Violation::MissingUrl { index });
            }
        }
        if self.concurrency_levels.is_empty() {
            violations.push(Violation::NoConcurrencyLevels);
        }
        if self.requests_per_user == 0 {
            violations.push(Violation::InvalidRequestsPerUser);
        }

        violations
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    pub fn service_summaries(&self) -> Vec<ServiceSummary> {
        self.services
            .iter()
            .enumerate()
            .map(|(index, service)| service.summary(index))
            .collect()
    }

    /// Total requests the engine will send for one service at `level`.
    pub fn total_requests(&self, level: u32) -> u64 {
        level as u64 * self.requests_per_user as u64
    }
}
