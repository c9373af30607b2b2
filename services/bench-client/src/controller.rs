//! Run state machine.
//!
//! A launch goes through `begin` (validate, serialize, persist), `dispatch`
//! (hand the request to the engine) and `complete` (apply the outcome). The
//! future returned by `dispatch` does not borrow the controller, so a new
//! launch can start while an older one is still in flight. Every launch gets
//! a fresh [`AttemptId`] and `complete` drops outcomes whose id is no longer
//! current.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bench_common::{BenchError, BenchResult, RunConfig, RunResults};
use tracing::{debug, info, warn};

use crate::engine::RunEngine;
use crate::presenter::{Presentation, ResultsPresenter};
use crate::request::{OutboundRequest, RequestBuilder};
use crate::store::{ConfigStore, TokenSlot};

/// Identifies one launch. Later launches have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the current attempt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    Submitting,
    AwaitingResult,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RunState::Submitting | RunState::AwaitingResult)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

/// A validated, serialized launch ready to be dispatched.
#[derive(Debug)]
pub struct PreparedAttempt {
    pub attempt: AttemptId,
    pub request: OutboundRequest,
}

/// What the engine returned for one attempt.
#[derive(Debug)]
pub struct AttemptOutcome {
    pub attempt: AttemptId,
    pub result: BenchResult<RunResults>,
}

/// Result of feeding an outcome to [`RunController::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Succeeded,
    Failed,
    /// The outcome belonged to a superseded attempt and was dropped.
    Stale,
}

/// Drives launches against a [`RunEngine`].
pub struct RunController<E, S> {
    engine: Arc<E>,
    store: ConfigStore<S>,
    presenter: ResultsPresenter,
    state: RunState,
    next_attempt: u64,
    current: Option<AttemptId>,
    last_error: Option<BenchError>,
}

impl<E, S> RunController<E, S>
where
    E: RunEngine + 'static,
    S: TokenSlot,
{
    pub fn new(engine: E, store: ConfigStore<S>) -> Self {
        Self::with_shared_engine(Arc::new(engine), store)
    }

    pub fn with_shared_engine(engine: Arc<E>, store: ConfigStore<S>) -> Self {
        Self {
            engine,
            store,
            presenter: ResultsPresenter::new(),
            state: RunState::Idle,
            next_attempt: 0,
            current: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.current
    }

    /// Whether a new launch should be offered to the user.
    pub fn can_submit(&self) -> bool {
        !self.state.is_in_flight()
    }

    pub fn last_error(&self) -> Option<&BenchError> {
        self.last_error.as_ref()
    }

    /// Results of the most recent successful attempt.
    pub fn presentation(&self) -> Option<&Presentation> {
        self.presenter.current()
    }

    pub fn presenter(&self) -> &ResultsPresenter {
        &self.presenter
    }

    pub fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    /// Restore the configuration saved by an earlier launch.
    pub fn restore(&self) -> Option<RunConfig> {
        self.store.load()
    }

    /// Start a new attempt: validate, persist and serialize `config`.
    ///
    /// Any attempt still in flight is superseded. On failure the controller
    /// is left in [`RunState::Failed`] and nothing has been sent.
    pub fn begin(&mut self, config: &RunConfig) -> BenchResult<PreparedAttempt> {
        self.next_attempt += 1;
        let attempt = AttemptId(self.next_attempt);

        if let Some(previous) = self.current {
            if self.state.is_in_flight() {
                info!(%previous, %attempt, "Superseding in-flight run");
            }
        }
        self.current = Some(attempt);
        self.last_error = None;
        self.state = RunState::Validating;

        let violations = config.validate();
        if !violations.is_empty() {
            debug!(%attempt, count = violations.len(), "Configuration rejected");
            return Err(self.fail(BenchError::Validation(violations)));
        }

        // Persisted ahead of serialization; configs with malformed JSON are kept too.
        if let Err(e) = self.store.save(config) {
            warn!(error = %e, "Failed to persist run configuration");
        }

        let request = match RequestBuilder::build(config) {
            Ok(request) => request,
            Err(e) => return Err(self.fail(e)),
        };

        self.state = RunState::Submitting;
        info!(
            %attempt,
            services = config.services.len(),
            levels = %config.concurrency_levels,
            requests_per_user = config.requests_per_user,
            "Submitting run"
        );

        Ok(PreparedAttempt { attempt, request })
    }

    /// Hand a prepared attempt to the engine.
    ///
    /// The returned future owns everything it needs; await it and pass the
    /// outcome to [`complete`](Self::complete).
    pub fn dispatch(
        &mut self,
        prepared: PreparedAttempt,
    ) -> impl Future<Output = AttemptOutcome> + Send + 'static {
        if self.current == Some(prepared.attempt) && self.state == RunState::Submitting {
            self.state = RunState::AwaitingResult;
        }

        let engine = Arc::clone(&self.engine);
        let PreparedAttempt { attempt, request } = prepared;
        async move {
            let result = engine.submit(request).await;
            AttemptOutcome { attempt, result }
        }
    }

    /// Apply an engine outcome, unless it belongs to a superseded attempt.
    pub fn complete(&mut self, outcome: AttemptOutcome) -> Completion {
        if self.current != Some(outcome.attempt) || self.state != RunState::AwaitingResult {
            debug!(
                attempt = %outcome.attempt,
                current = ?self.current,
                "Discarding stale run response"
            );
            return Completion::Stale;
        }

        match outcome.result {
            Ok(results) => {
                let view = self.presenter.present(&results);
                info!(
                    attempt = %outcome.attempt,
                    services = view.throughput.series.len(),
                    "Run completed"
                );
                self.state = RunState::Succeeded;
                Completion::Succeeded
            }
            Err(e) => {
                warn!(attempt = %outcome.attempt, error = %e, "Run failed");
                self.fail(e);
                Completion::Failed
            }
        }
    }

    /// Run one attempt end to end.
    pub async fn launch(&mut self, config: &RunConfig) -> BenchResult<&Presentation> {
        let prepared = self.begin(config)?;
        let outcome = self.dispatch(prepared).await;

        match self.complete(outcome) {
            Completion::Succeeded => self
                .presenter
                .current()
                .ok_or_else(|| BenchError::Internal("results missing after success".to_string())),
            Completion::Failed => Err(self
                .last_error
                .clone()
                .unwrap_or_else(|| BenchError::Internal("run failed without an error".to_string()))),
            Completion::Stale => Err(BenchError::Internal(
                "run was superseded by a newer launch".to_string(),
            )),
        }
    }

    /// Short human-readable status.
    pub fn status_line(&self) -> String {
        match self.state {
            RunState::Idle => "Ready".to_string(),
            RunState::Validating => "Checking configuration...".to_string(),
            RunState::Submitting => "Submitting run...".to_string(),
            RunState::AwaitingResult => "Running test...".to_string(),
            RunState::Succeeded => "Test complete!".to_string(),
            RunState::Failed => match &self.last_error {
                Some(e) => format!("Test failed: {}", e),
                None => "Test failed".to_string(),
            },
        }
    }

    /// Progress indicator, 0 to 100.
    pub fn progress_percent(&self) -> u8 {
        match self.state {
            RunState::Idle | RunState::Validating | RunState::Failed => 0,
            RunState::Submitting | RunState::AwaitingResult => 50,
            RunState::Succeeded => 100,
        }
    }

    fn fail(&mut self, error: BenchError) -> BenchError {
        self.state = RunState::Failed;
        self.last_error = Some(error.clone());
        error
    }
}
