//! REST APIハンドラー
//!
//! `/api/endpoints` 配下の管理APIと、モニター自身の死活確認。

pub mod endpoints;
pub mod error;

use crate::health::scheduler::SchedulerStats;
use crate::AppState;
use axum::{
    extract::State,
    http::{header, Method},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

/// モニター自身の状態
#[derive(Debug, Serialize)]
pub struct MonitorHealth {
    /// 常に "ok"
    pub status: &'static str,
    /// 登録エンドポイント数
    pub endpoints: usize,
    /// スケジューラが停止済みか
    pub scheduler_stopped: bool,
    /// スケジューラ統計
    pub stats: SchedulerStats,
}

/// GET /api/health - モニター自身の死活確認
async fn monitor_health(State(state): State<AppState>) -> Json<MonitorHealth> {
    let scheduler = state.service.scheduler();
    Json(MonitorHealth {
        status: "ok",
        endpoints: state.service.current_status().len(),
        scheduler_stopped: scheduler.shutdown_token().is_cancelled(),
        stats: scheduler.stats(),
    })
}

/// APIルーターを構築
///
/// 全リクエストをステータスと処理時間付きで `info` に、
/// サーバーエラーを `error` に記録する。CORSは設定されたオリジンのみ許可する。
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.cors_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/health", get(monitor_health))
        .route(
            "/api/endpoints",
            post(endpoints::create_endpoint).get(endpoints::list_endpoints),
        )
        .route(
            "/api/endpoints/:id",
            get(endpoints::get_endpoint).delete(endpoints::delete_endpoint),
        )
        .route("/api/endpoints/:id/check", post(endpoints::check_endpoint))
        .route("/api/endpoints/:id/history", get(endpoints::get_history))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                )
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
        .with_state(state)
}
