//! Client controller for multi-service load test runs.
//!
//! This crate provides tools to:
//! - Persist and restore the last-used run configuration
//! - Serialize a configuration into a multipart run request
//! - Drive a run through validation, submission and result handling
//! - Turn results into plot and table series for display

pub mod config;
pub mod controller;
pub mod download;
pub mod engine;
pub mod presenter;
pub mod report;
pub mod request;
pub mod store;

pub use config::{ClientSettings, ScenarioFile};
pub use controller::{AttemptId, AttemptOutcome, Completion, PreparedAttempt, RunController, RunState};
pub use download::{DownloadOutcome, Downloader};
pub use engine::{HttpEngine, RunEngine};
pub use presenter::{Plot, PlotKind, Presentation, ResultsPresenter, Series, TableRow};
pub use report::ResultsReport;
pub use request::{AttachmentPart, OutboundRequest, RequestBuilder};
pub use store::{ConfigStore, FileSlot, MemorySlot, TokenSlot};
