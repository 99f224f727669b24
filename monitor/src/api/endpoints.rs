//! エンドポイント管理API
//!
//! 登録・一覧・詳細・削除・即時チェック・履歴取得。
//! レスポンスはすべてJSON。

use crate::api::error::AppError;
use crate::common::error::MonitorError;
use crate::types::endpoint::{Endpoint, EndpointSpec};
use crate::types::probe::ProbeResult;
use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// エンドポイント一覧レスポンス
#[derive(Debug, Serialize)]
pub struct ListEndpointsResponse {
    /// エンドポイント一覧（登録順）
    pub endpoints: Vec<Endpoint>,
    /// 総数
    pub total: usize,
}

/// 履歴取得クエリ
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// 取得件数（省略時は履歴容量）
    #[serde(default)]
    pub limit: Option<usize>,
}

/// 履歴レスポンス
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// エンドポイントID
    pub endpoint_id: Uuid,
    /// プローブ結果（古い順）
    pub results: Vec<ProbeResult>,
}

/// パスのIDを取り出す（形式エラーは検証エラーとして400）
fn endpoint_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, MonitorError> {
    path.map(|Path(id)| id).map_err(|e| MonitorError::Validation(e.body_text()))
}

// --- Handlers ---

/// POST /api/endpoints - エンドポイント登録
pub async fn create_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<EndpointSpec>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    // ボディの形式エラーも検証エラーとして400で返す
    let Json(spec) = payload.map_err(|e| MonitorError::Validation(e.body_text()))?;
    let endpoint = state.service.register_endpoint(spec)?;
    Ok((StatusCode::CREATED, Json(endpoint)))
}

/// GET /api/endpoints - エンドポイント一覧
pub async fn list_endpoints(State(state): State<AppState>) -> impl IntoResponse {
    let endpoints = state.service.current_status();
    let total = endpoints.len();
    Json(ListEndpointsResponse { endpoints, total })
}

/// GET /api/endpoints/:id - エンドポイント詳細
pub async fn get_endpoint(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Endpoint>, AppError> {
    let id = endpoint_id(path)?;
    Ok(Json(state.service.get_endpoint(id)?))
}

/// DELETE /api/endpoints/:id - エンドポイント削除
pub async fn delete_endpoint(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = endpoint_id(path)?;
    state.service.delete_endpoint(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/endpoints/:id/check - 即時ヘルスチェック
pub async fn check_endpoint(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ProbeResult>, AppError> {
    let id = endpoint_id(path)?;
    Ok(Json(state.service.trigger_check(id).await?))
}

/// GET /api/endpoints/:id/history - プローブ履歴
pub async fn get_history(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, AppError> {
    let id = endpoint_id(path)?;
    let Query(query) = query.map_err(|e| MonitorError::Validation(e.body_text()))?;
    let results = state.service.history(id, query.limit)?;
    Ok(Json(HistoryResponse {
        endpoint_id: id,
        results,
    }))
}
