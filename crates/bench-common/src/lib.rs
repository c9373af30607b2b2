//! Common types shared by the bench client: the run configuration model,
//! its wire shapes, the results payload and the error taxonomy.

pub mod concurrency;
pub mod error;
pub mod run_config;
pub mod service;
pub mod wire;

pub use concurrency::{ConcurrencyLevels, ConcurrencyRejection, MAX_CONCURRENCY};
pub use error::{BenchError, BenchResult, JsonField};
pub use run_config::{RunConfig, Violation};
pub use service::{
    Attachment, RequestType, ServiceDefaults, ServiceField, ServiceModel, ServiceSummary,
    ServiceWire,
};
pub use wire::{RunRequestWire, RunResults, ServiceResults};
