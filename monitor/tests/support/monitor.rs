use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use endpoint_monitor::bootstrap::{self, InitContext};
use endpoint_monitor::config::MonitorConfig;
use endpoint_monitor::health::{Prober, SchedulerHandle};
use endpoint_monitor::types::{Endpoint, ProbeResult};
use endpoint_monitor::{api, AppState};

use super::http::{spawn_router, TestServer};

/// テスト用の設定（定期ティックは実質無効、タイムアウトは短め）
pub fn fast_config() -> MonitorConfig {
    MonitorConfig {
        tick_interval: Duration::from_secs(3600),
        worker_count: 4,
        probe_timeout: Duration::from_secs(1),
        history_capacity: 10,
        retry_attempts: 0,
        retry_backoff: Duration::from_millis(50),
        shutdown_grace: Duration::from_secs(2),
        trigger_wait_timeout: Duration::from_secs(5),
        cors_origin: "http://localhost:8000".to_string(),
    }
}

/// 固定ステータスを返すプローバー
pub struct StaticProber {
    status: AtomicU16,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticProber {
    pub fn new(status: u16, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            status: AtomicU16::new(status),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for StaticProber {
    async fn probe(&self, endpoint: &Endpoint, _timeout: Duration) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        ProbeResult::response(
            endpoint.id,
            self.status.load(Ordering::SeqCst),
            endpoint.expected_status,
            self.delay,
        )
    }
}

/// ルーターと起動済みスケジューラ
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub scheduler: SchedulerHandle,
}

/// 任意のプローバーでアプリを構築する
pub fn build_app(config: &MonitorConfig, prober: Arc<dyn Prober>) -> TestApp {
    let InitContext { state, scheduler } =
        bootstrap::initialize_with_prober(config, prober).unwrap();
    TestApp {
        app: api::create_app(state.clone()),
        state,
        scheduler,
    }
}

/// 実HTTPプローバーで実ポートに起動したモニター
pub struct TestMonitor {
    pub server: TestServer,
    pub state: AppState,
    pub scheduler: SchedulerHandle,
}

impl TestMonitor {
    pub fn url(&self, path: &str) -> String {
        self.server.url(path)
    }

    /// サーバーとスケジューラを停止する
    pub async fn stop(self) {
        self.server.stop().await;
        self.scheduler.shutdown().await.unwrap();
    }
}

/// 実HTTPプローバーでモニターを起動する
pub async fn spawn_test_monitor(config: MonitorConfig) -> TestMonitor {
    let InitContext { state, scheduler } = bootstrap::initialize(&config).unwrap();
    let server = spawn_router(api::create_app(state.clone())).await;
    TestMonitor {
        server,
        state,
        scheduler,
    }
}
