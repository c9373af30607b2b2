//! On-disk persistence of the last-used configuration.

use bench_client::{ConfigStore, FileSlot, ScenarioFile, TokenSlot};
use bench_common::{Attachment, RequestType, RunConfig, ServiceField, ServiceModel};
use chrono::{Duration, Utc};

fn sample_config() -> RunConfig {
    let mut config = RunConfig::empty();
    config.add_service(Some(
        ServiceModel::json("search", "http://localhost:9000/search")
            .with(ServiceField::RequestBody("{\"query\": \"rust\"}".to_string())),
    ));
    config.add_service(Some(ServiceModel::image("ocr", "http://localhost:9001/ocr").with(
        ServiceField::Attachment(Some(Attachment::new("scan.jpg", "image/jpeg", vec![7u8; 64]))),
    )));
    config.set_concurrency_levels([1, 10, 100]).unwrap();
    config.requests_per_user = 3;
    config
}

#[test]
fn test_file_slot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(FileSlot::new(dir.path().join("state/last_config.json")));

    store.save(&sample_config()).unwrap();
    let restored = store.load().unwrap();

    assert_eq!(restored.services.len(), 2);
    assert_eq!(restored.services[0].request_body, "{\"query\": \"rust\"}");
    assert_eq!(restored.services[1].request_type, RequestType::Image);
    assert!(restored.services[1].image_payload.is_none());
    assert_eq!(restored.concurrency_levels.to_vec(), vec![1, 10, 100]);
    assert_eq!(restored.requests_per_user, 3);
}

#[test]
fn test_file_slot_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("last_config.json");
    let store = ConfigStore::new(FileSlot::new(&path));

    store.save(&sample_config()).unwrap();
    store.save(&RunConfig::default()).unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["last_config.json".to_string()]);
}

#[test]
fn test_file_slot_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(FileSlot::new(dir.path().join("token.json")));
    let written = Utc::now() - Duration::days(8);

    store.save_at(&sample_config(), written).unwrap();

    assert!(store.load_at(written + Duration::days(6)).is_some());
    assert!(store.load().is_none());
}

#[test]
fn test_corrupt_file_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let slot = FileSlot::new(dir.path().join("token.json"));
    slot.write("not json at all").unwrap();

    let store = ConfigStore::new(slot);
    assert!(store.load().is_none());
}

#[test]
fn test_clear_missing_file_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(FileSlot::new(dir.path().join("never-written.json")));

    store.clear().unwrap();
    assert!(store.load().is_none());
}

#[test]
fn test_bundled_scenarios_are_valid() {
    let scenarios = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");

    let search = ScenarioFile::load_run_config(scenarios.join("compare_search.yaml")).unwrap();
    assert!(search.validate().is_empty());
    assert_eq!(search.concurrency_levels.to_vec(), vec![1, 5, 10, 20]);

    let mixed = ScenarioFile::load_run_config(scenarios.join("ocr_vs_search.yaml")).unwrap();
    assert!(mixed.validate().is_empty());
    assert_eq!(mixed.services[1].request_type, RequestType::Image);
    assert!(mixed.services[1].image_payload.is_none());
}
