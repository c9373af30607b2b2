//! State machine tests for RunController using in-process engines.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bench_client::{
    Completion, ConfigStore, MemorySlot, OutboundRequest, RunController, RunEngine, RunState,
};
use bench_common::{
    Attachment, BenchError, BenchResult, RunConfig, RunResults, ServiceField, ServiceModel,
    ServiceResults, Violation,
};

// ============================================================================
// Test engines
// ============================================================================

/// Answers every request with one series per service, counting calls.
#[derive(Default)]
struct EchoEngine {
    calls: AtomicUsize,
}

#[async_trait]
impl RunEngine for EchoEngine {
    async fn submit(&self, request: OutboundRequest) -> BenchResult<RunResults> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let levels = request.config.concurrent_users.clone();
        Ok(RunResults {
            services: request
                .config
                .services
                .iter()
                .map(|s| ServiceResults {
                    name: s.name.clone(),
                    qps: levels.iter().map(|&l| l as f64 * 10.0).collect(),
                    response_times: levels.iter().map(|_| 0.25).collect(),
                })
                .collect(),
            concurrent_users: levels,
        })
    }
}

/// Always fails with the given error.
struct FailingEngine(BenchError);

#[async_trait]
impl RunEngine for FailingEngine {
    async fn submit(&self, _request: OutboundRequest) -> BenchResult<RunResults> {
        Err(self.0.clone())
    }
}

fn valid_config(name: &str) -> RunConfig {
    let mut config = RunConfig::empty();
    config.add_service(Some(ServiceModel::json(name, "http://localhost:9000/")));
    config.set_concurrency_levels([1, 5, 10]).unwrap();
    config.requests_per_user = 5;
    config
}

fn echo_controller() -> (Arc<EchoEngine>, RunController<EchoEngine, MemorySlot>) {
    let engine = Arc::new(EchoEngine::default());
    let controller =
        RunController::with_shared_engine(engine.clone(), ConfigStore::new(MemorySlot::new()));
    (engine, controller)
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_launch_succeeds_and_presents() {
    let (engine, mut controller) = echo_controller();
    assert_eq!(controller.state(), RunState::Idle);
    assert!(controller.can_submit());

    let view = controller.launch(&valid_config("search")).await.unwrap();
    assert_eq!(view.throughput.series.len(), 1);
    assert_eq!(
        view.throughput.series[0].points,
        vec![Some(10.0), Some(50.0), Some(100.0)]
    );

    assert_eq!(controller.state(), RunState::Succeeded);
    assert_eq!(controller.progress_percent(), 100);
    assert_eq!(controller.status_line(), "Test complete!");
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_state_transitions_step_by_step() {
    let (_engine, mut controller) = echo_controller();

    let prepared = controller.begin(&valid_config("a")).unwrap();
    assert_eq!(controller.state(), RunState::Submitting);
    assert!(!controller.can_submit());

    let pending = controller.dispatch(prepared);
    assert_eq!(controller.state(), RunState::AwaitingResult);
    assert_eq!(controller.progress_percent(), 50);
    assert!(!controller.can_submit());

    let outcome = pending.await;
    assert_eq!(controller.complete(outcome), Completion::Succeeded);
    assert!(controller.can_submit());
}

#[tokio::test]
async fn test_launch_persists_configuration() {
    let (_engine, mut controller) = echo_controller();
    let config = valid_config("persisted");
    controller.launch(&config).await.unwrap();

    let restored = controller.restore().unwrap();
    assert_eq!(restored.services[0].name, "persisted");
    assert_eq!(restored.concurrency_levels.to_vec(), vec![1, 5, 10]);
}

// ============================================================================
// Local failures
// ============================================================================

#[tokio::test]
async fn test_validation_failure_reports_all_and_skips_network() {
    let (engine, mut controller) = echo_controller();
    let mut config = valid_config("x");
    config.add_service(None);
    config.concurrency_levels = Default::default();

    let err = controller.launch(&config).await.unwrap_err();
    match err {
        BenchError::Validation(violations) => assert_eq!(
            violations,
            vec![
                Violation::MissingName { index: 1 },
                Violation::MissingUrl { index: 1 },
                Violation::NoConcurrencyLevels,
            ]
        ),
        other => panic!("expected validation error, got {:?}", other),
    }

    assert_eq!(controller.state(), RunState::Failed);
    assert!(controller.can_submit());
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert!(controller.restore().is_none(), "invalid config must not be persisted");
}

#[tokio::test]
async fn test_malformed_json_fails_before_network() {
    let (engine, mut controller) = echo_controller();
    let mut config = valid_config("x");
    config
        .service_mut(0)
        .unwrap()
        .set_field(ServiceField::RequestBody("{broken".to_string()));

    let err = controller.begin(&config).unwrap_err();
    assert!(err.is_local());
    assert!(matches!(err, BenchError::MalformedJson { service_index: 0, .. }));
    assert_eq!(controller.state(), RunState::Failed);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_json_config_restores_as_typed() {
    let (_engine, mut controller) = echo_controller();
    let mut config = valid_config("draft");
    config
        .service_mut(0)
        .unwrap()
        .set_field(ServiceField::Headers("{\"Accept\": ".to_string()));
    assert!(config.validate().is_empty());

    let err = controller.begin(&config).unwrap_err();
    assert!(matches!(err, BenchError::MalformedJson { .. }));

    let restored = controller.restore().expect("attempted config should be saved");
    assert_eq!(restored.services[0].name, "draft");
    assert_eq!(restored.services[0].headers, "{\"Accept\": ");
}

// ============================================================================
// Remote failures
// ============================================================================

#[tokio::test]
async fn test_transport_failure_keeps_config_for_retry() {
    let mut controller = RunController::new(
        FailingEngine(BenchError::Transport {
            status: Some(500),
            message: "boom".to_string(),
        }),
        ConfigStore::new(MemorySlot::new()),
    );
    let config = valid_config("retry-me");

    let err = controller.launch(&config).await.unwrap_err();
    assert_eq!(err.status_code(), Some(500));
    assert_eq!(controller.state(), RunState::Failed);
    assert!(controller.can_submit());
    assert_eq!(controller.progress_percent(), 0);
    assert!(controller.status_line().starts_with("Test failed"));

    // persisted on attempt, not on success
    assert_eq!(controller.restore().unwrap().services[0].name, "retry-me");
}

#[tokio::test]
async fn test_policy_rejection_is_surfaced_as_such() {
    let mut controller = RunController::new(
        FailingEngine(BenchError::PolicyRejected {
            status: 451,
            hint: "check policy".to_string(),
        }),
        ConfigStore::new(MemorySlot::new()),
    );

    let err = controller.launch(&valid_config("a")).await.unwrap_err();
    assert!(matches!(err, BenchError::PolicyRejected { status: 451, .. }));
    assert!(matches!(
        controller.last_error(),
        Some(BenchError::PolicyRejected { .. })
    ));
}

// ============================================================================
// Superseded attempts
// ============================================================================

#[tokio::test]
async fn test_late_response_from_superseded_attempt_is_discarded() {
    let (_engine, mut controller) = echo_controller();

    let first = controller.begin(&valid_config("first")).unwrap();
    let first_attempt = first.attempt;
    let first_pending = controller.dispatch(first);

    let second = controller.begin(&valid_config("second")).unwrap();
    assert!(second.attempt > first_attempt);
    let second_pending = controller.dispatch(second);

    // The newer run answers first.
    let second_outcome = second_pending.await;
    assert_eq!(controller.complete(second_outcome), Completion::Succeeded);

    // The older run's response turns up afterwards.
    let first_outcome = first_pending.await;
    assert_eq!(controller.complete(first_outcome), Completion::Stale);

    let view = controller.presentation().unwrap();
    assert_eq!(view.throughput.series[0].label, "second");
    assert_eq!(controller.state(), RunState::Succeeded);
}

#[tokio::test]
async fn test_stale_response_does_not_end_current_wait() {
    let (_engine, mut controller) = echo_controller();

    let first = controller.begin(&valid_config("first")).unwrap();
    let first_pending = controller.dispatch(first);
    let second = controller.begin(&valid_config("second")).unwrap();
    let second_pending = controller.dispatch(second);

    assert_eq!(controller.complete(first_pending.await), Completion::Stale);
    assert_eq!(controller.state(), RunState::AwaitingResult);
    assert!(controller.presentation().is_none());

    assert_eq!(controller.complete(second_pending.await), Completion::Succeeded);
}

#[tokio::test]
async fn test_outcome_applied_once() {
    let (_engine, mut controller) = echo_controller();
    let prepared = controller.begin(&valid_config("a")).unwrap();
    let attempt = prepared.attempt;
    let outcome = controller.dispatch(prepared).await;
    assert_eq!(controller.complete(outcome), Completion::Succeeded);

    let duplicate = bench_client::AttemptOutcome {
        attempt,
        result: Ok(RunResults::default()),
    };
    assert_eq!(controller.complete(duplicate), Completion::Stale);
    assert_eq!(controller.presenter().throughput_slot().released(), 0);
}

#[tokio::test]
async fn test_new_results_release_previous_plots() {
    let (_engine, mut controller) = echo_controller();
    controller.launch(&valid_config("a")).await.unwrap();
    controller.launch(&valid_config("b")).await.unwrap();

    assert_eq!(controller.presenter().throughput_slot().released(), 1);
    assert_eq!(controller.presentation().unwrap().generation, 2);
}

#[tokio::test]
async fn test_image_attachment_reaches_engine() {
    struct InspectingEngine;

    #[async_trait]
    impl RunEngine for InspectingEngine {
        async fn submit(&self, request: OutboundRequest) -> BenchResult<RunResults> {
            assert_eq!(request.attachments.len(), 1);
            assert_eq!(request.attachments[0].name, "image_0");
            assert_eq!(request.config.services[0].image_path.as_deref(), Some("image_0"));
            Ok(RunResults::default())
        }
    }

    let mut config = valid_config("ocr");
    config.services[0] = ServiceModel::image("ocr", "http://localhost:9001/ocr").with(
        ServiceField::Attachment(Some(Attachment::new("r.png", "image/png", vec![1u8]))),
    );

    let mut controller = RunController::new(InspectingEngine, ConfigStore::new(MemorySlot::new()));
    controller.launch(&config).await.unwrap();

    let restored = controller.restore().unwrap();
    assert!(restored.services[0].image_payload.is_none());
}
