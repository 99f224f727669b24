//! Integration Test: 実HTTPプローブ
//!
//! wiremock の監視対象に対して、モニターを実ポートで起動して検証する。

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::monitor::{fast_config, spawn_test_monitor, TestMonitor};

async fn register(monitor: &TestMonitor, payload: Value) -> Value {
    let response = reqwest::Client::new()
        .post(monitor.url("/api/endpoints"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn check(monitor: &TestMonitor, id: &str) -> Value {
    let response = reqwest::Client::new()
        .post(monitor.url(&format!("/api/endpoints/{id}/check")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    response.json().await.unwrap()
}

async fn get(monitor: &TestMonitor, path: &str) -> Value {
    reqwest::get(monitor.url(path))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_healthy_endpoint() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&target)
        .await;

    let monitor = spawn_test_monitor(fast_config()).await;
    let endpoint = register(
        &monitor,
        json!({ "name": "Production API", "url": format!("{}/health", target.uri()) }),
    )
    .await;
    let id = endpoint["id"].as_str().unwrap();

    let result = check(&monitor, id).await;
    assert_eq!(result["success"], true);
    assert_eq!(result["observed_status"], 200);

    let endpoint = get(&monitor, &format!("/api/endpoints/{id}")).await;
    assert_eq!(endpoint["is_healthy"], true);
    assert_eq!(endpoint["last_status"], 200);
    assert!(endpoint["last_check"].is_string());

    monitor.stop().await;
}

#[tokio::test]
async fn test_unexpected_status_is_unhealthy() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&target)
        .await;

    let monitor = spawn_test_monitor(fast_config()).await;
    let endpoint = register(
        &monitor,
        json!({ "name": "Degraded service", "url": target.uri() }),
    )
    .await;
    let id = endpoint["id"].as_str().unwrap();

    let result = check(&monitor, id).await;
    assert_eq!(result["success"], false);
    assert_eq!(result["observed_status"], 503);

    let endpoint = get(&monitor, &format!("/api/endpoints/{id}")).await;
    assert_eq!(endpoint["is_healthy"], false);
    assert_eq!(endpoint["last_status"], 503);

    monitor.stop().await;
}

#[tokio::test]
async fn test_custom_expected_status_and_post_method() {
    let target = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&target)
        .await;

    let monitor = spawn_test_monitor(fast_config()).await;
    let endpoint = register(
        &monitor,
        json!({
            "name": "Webhook receiver",
            "url": format!("{}/ping", target.uri()),
            "method": "POST",
            "expected_status": 204
        }),
    )
    .await;

    let result = check(&monitor, endpoint["id"].as_str().unwrap()).await;
    assert_eq!(result["success"], true);
    assert_eq!(result["observed_status"], 204);

    monitor.stop().await;
    target.verify().await;
}

#[tokio::test]
async fn test_timeout_records_no_status() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&target)
        .await;

    // fast_config のプローブタイムアウトは1秒
    let monitor = spawn_test_monitor(fast_config()).await;
    let endpoint = register(
        &monitor,
        json!({ "name": "Slow dependency", "url": target.uri() }),
    )
    .await;
    let id = endpoint["id"].as_str().unwrap();

    let result = check(&monitor, id).await;
    assert_eq!(result["success"], false);
    assert_eq!(result["error"], "timeout");
    assert!(result["observed_status"].is_null());
    assert!(result["latency_ms"].as_u64().unwrap() >= 1000);

    let endpoint = get(&monitor, &format!("/api/endpoints/{id}")).await;
    assert_eq!(endpoint["is_healthy"], false);
    assert!(endpoint["last_status"].is_null());
    assert!(endpoint["last_check"].is_string());

    monitor.stop().await;
}

#[tokio::test]
async fn test_recovery_after_failure() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&target)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&target)
        .await;

    let monitor = spawn_test_monitor(fast_config()).await;
    let endpoint = register(
        &monitor,
        json!({ "name": "Flaky service", "url": target.uri() }),
    )
    .await;
    let id = endpoint["id"].as_str().unwrap();

    assert_eq!(check(&monitor, id).await["success"], false);
    assert_eq!(check(&monitor, id).await["success"], true);

    let endpoint = get(&monitor, &format!("/api/endpoints/{id}")).await;
    assert_eq!(endpoint["is_healthy"], true);

    let history = get(&monitor, &format!("/api/endpoints/{id}/history")).await;
    let statuses: Vec<u64> = history["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["observed_status"].as_u64().unwrap())
        .collect();
    assert_eq!(statuses, vec![500, 200]);

    monitor.stop().await;
}

#[tokio::test]
async fn test_connection_refused_is_recorded() {
    // 直前まで使っていたポートは閉じている
    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let monitor = spawn_test_monitor(fast_config()).await;
    let endpoint = register(
        &monitor,
        json!({ "name": "Decommissioned host", "url": format!("http://{closed}/health") }),
    )
    .await;

    let result = check(&monitor, endpoint["id"].as_str().unwrap()).await;
    assert_eq!(result["success"], false);
    assert_eq!(result["error"], "connect");
    assert!(result["observed_status"].is_null());

    monitor.stop().await;
}

#[tokio::test]
async fn test_periodic_ticks_fill_history_up_to_capacity() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&target)
        .await;

    let mut config = fast_config();
    config.tick_interval = Duration::from_millis(100);
    config.history_capacity = 10;
    let monitor = spawn_test_monitor(config).await;
    let endpoint = register(
        &monitor,
        json!({ "name": "Periodic target", "url": target.uri() }),
    )
    .await;
    let id = endpoint["id"].as_str().unwrap();

    // 約20ティック分待つ
    tokio::time::sleep(Duration::from_millis(2_000)).await;

    let history = get(&monitor, &format!("/api/endpoints/{id}/history")).await;
    let results = history["results"].as_array().unwrap();
    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| r["success"] == true));

    let timestamps: Vec<DateTime<Utc>> = results
        .iter()
        .map(|r| r["timestamp"].as_str().unwrap().parse().unwrap())
        .collect();
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));

    let endpoint = get(&monitor, &format!("/api/endpoints/{id}")).await;
    assert_eq!(endpoint["is_healthy"], true);

    let health = get(&monitor, "/api/health").await;
    assert!(health["stats"]["ticks"].as_u64().unwrap() >= 10);

    monitor.stop().await;
}
