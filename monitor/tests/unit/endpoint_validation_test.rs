//! Unit Test: エンドポイント登録リクエストの検証

use endpoint_monitor::common::error::{MonitorError, MonitorResult};
use endpoint_monitor::history::HistoryRing;
use endpoint_monitor::registry::EndpointRegistry;
use endpoint_monitor::types::{Endpoint, EndpointSpec, ProbeMethod};

/// 履歴リングを用意してから公開する通常の登録経路
fn register(
    registry: &EndpointRegistry,
    history: &HistoryRing,
    spec: EndpointSpec,
) -> MonitorResult<Endpoint> {
    registry.register_with(spec, |endpoint| history.track(endpoint.id))
}

fn register_fresh(spec: EndpointSpec) -> MonitorResult<Endpoint> {
    register(&EndpointRegistry::new(), &HistoryRing::new(10), spec)
}

fn assert_validation_error(spec: EndpointSpec) {
    let registry = EndpointRegistry::new();
    let history = HistoryRing::new(10);
    match register(&registry, &history, spec) {
        Err(MonitorError::Validation(reason)) => assert!(!reason.is_empty()),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(registry.count(), 0);
}

#[test]
fn test_json_defaults_to_get_200() {
    let spec: EndpointSpec =
        serde_json::from_str(r#"{"name":"Inventory service","url":"http://inventory:8080"}"#)
            .unwrap();
    let endpoint = register_fresh(spec).unwrap();
    assert_eq!(endpoint.method, ProbeMethod::Get);
    assert_eq!(endpoint.expected_status, 200);
}

#[test]
fn test_registered_endpoint_has_history_ring() {
    let registry = EndpointRegistry::new();
    let history = HistoryRing::new(10);
    let endpoint = register(
        &registry,
        &history,
        EndpointSpec::new("Tracked endpoint", "http://localhost:8080"),
    )
    .unwrap();

    assert!(history.is_tracked(endpoint.id));
    assert!(registry.contains(endpoint.id));
}

#[test]
fn test_name_length_is_counted_in_characters() {
    // 10文字（マルチバイト）
    let spec = EndpointSpec::new("監視対象のエンドポイ", "http://localhost:8080");
    assert!(register_fresh(spec).is_ok());

    assert_validation_error(EndpointSpec::new("監視対象のエンドポ", "http://localhost:8080"));
}

#[test]
fn test_rejects_bad_urls() {
    for url in ["", "   ", "localhost:8080", "/relative/path", "mailto:ops@example.com"] {
        assert_validation_error(EndpointSpec::new("Broken endpoint", url));
    }
}

#[test]
fn test_rejects_unsupported_methods() {
    for method in ["PUT", "DELETE", "HEAD", "post", ""] {
        let mut spec = EndpointSpec::new("Broken endpoint", "http://localhost");
        spec.method = method.to_string();
        assert_validation_error(spec);
    }
}

#[test]
fn test_expected_status_bounds() {
    for status in [100, 204, 599] {
        let spec = EndpointSpec::new("Bounded endpoint", "http://localhost")
            .with_expected_status(status);
        let endpoint = register_fresh(spec).unwrap();
        assert_eq!(endpoint.expected_status as i32, status);
    }
    for status in [-1, 0, 99, 600, 70_000] {
        assert_validation_error(
            EndpointSpec::new("Bounded endpoint", "http://localhost").with_expected_status(status),
        );
    }
}

#[test]
fn test_ids_are_unique() {
    let registry = EndpointRegistry::new();
    let history = HistoryRing::new(10);
    let a = register(
        &registry,
        &history,
        EndpointSpec::new("Duplicate name", "http://localhost"),
    )
    .unwrap();
    let b = register(
        &registry,
        &history,
        EndpointSpec::new("Duplicate name", "http://localhost"),
    )
    .unwrap();
    // 同名でも別IDで登録される
    assert_ne!(a.id, b.id);
    assert_eq!(registry.count(), 2);
}
