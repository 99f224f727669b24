//! サーバー初期化ロジック
//!
//! レジストリ・履歴・プローバー・スケジューラを組み立て、
//! スケジューラを起動した状態の `AppState` を返す。

use crate::common::error::MonitorResult;
use crate::config::MonitorConfig;
use crate::health::{HealthQueryService, HttpProber, ProbeScheduler, Prober, SchedulerHandle};
use crate::history::HistoryRing;
use crate::registry::EndpointRegistry;
use crate::AppState;
use std::sync::Arc;
use tracing::info;

/// サーバー初期化結果
///
/// `scheduler` はプロセス終了時に `shutdown()` する必要がある。
pub struct InitContext {
    /// アプリケーション状態
    pub state: AppState,
    /// 起動済みスケジューラ
    pub scheduler: SchedulerHandle,
}

/// HTTPプローバーでサーバー初期化を実行する
pub fn initialize(config: &MonitorConfig) -> MonitorResult<InitContext> {
    let prober = HttpProber::new()?;
    initialize_with_prober(config, Arc::new(prober))
}

/// 任意のプローバーでサーバー初期化を実行する
pub fn initialize_with_prober(
    config: &MonitorConfig,
    prober: Arc<dyn Prober>,
) -> MonitorResult<InitContext> {
    config.validate()?;
    let cors_origin = config.cors_header()?;
    info!("Endpoint Monitor v{}", env!("CARGO_PKG_VERSION"));

    let registry = EndpointRegistry::new();
    let history = HistoryRing::new(config.history_capacity);
    let scheduler = ProbeScheduler::new(
        registry.clone(),
        history.clone(),
        prober,
        config.scheduler_config(),
    );
    let handle = scheduler.start()?;

    info!(
        history_capacity = config.history_capacity,
        retry_attempts = config.retry_attempts,
        "Monitor components initialized"
    );

    Ok(InitContext {
        state: AppState {
            service: HealthQueryService::new(registry, history, scheduler),
            cors_origin,
        },
        scheduler: handle,
    })
}
