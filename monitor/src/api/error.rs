//! APIエラーレスポンス型
//!
//! axum用の共通エラーハンドリング

use crate::common::error::MonitorError;
use axum::{response::IntoResponse, Json};
use serde::Serialize;

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// エラーメッセージ
    pub error: String,
    /// エラーコード
    pub code: String,
}

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub MonitorError);

impl From<MonitorError> for AppError {
    fn from(err: MonitorError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // 内部エラーの詳細はログにのみ出す
        if self.0.is_fatal() {
            tracing::error!(error = %self.0, "Request failed with internal error");
        }

        let payload = ErrorResponse {
            error: self.0.external_message(),
            code: self.0.error_code().to_string(),
        };
        (self.0.status_code(), Json(payload)).into_response()
    }
}
