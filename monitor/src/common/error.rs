//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! 呼び出し側に見えるエラーは `Validation` / `EndpointNotFound` / `Busy` の3種と、
//! 不変条件違反を表す `Internal` のみ。プローブ失敗はエラーではなく
//! `ProbeResult { success: false, .. }` として記録される。

use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

/// モニター共通エラー型
#[derive(Debug, Error)]
pub enum MonitorError {
    /// エンドポイント定義が不正（呼び出し側の責任、内部でリトライしない）
    #[error("Validation error: {0}")]
    Validation(String),

    /// 未登録のエンドポイントID
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(Uuid),

    /// 同一エンドポイントのプローブが既にキュー済み・実行中
    #[error("Endpoint {0} is busy: a probe is already queued or in flight")]
    Busy(Uuid),

    /// 起動時の設定エラー
    #[error("Configuration error: {0}")]
    Config(String),

    /// Registry / History Ring の不変条件違反（スケジューラにとって致命的）
    #[error("Internal error: {0}")]
    Internal(String),
}

/// モニター共通Result型
pub type MonitorResult<T> = Result<T, MonitorError>;

impl MonitorError {
    /// Returns a safe error message for external clients.
    ///
    /// Internal details stay in the `Display` output, which is only logged.
    pub fn external_message(&self) -> String {
        match self {
            Self::Validation(reason) => reason.clone(),
            Self::EndpointNotFound(_) => "Endpoint not found".to_string(),
            Self::Busy(_) => "A probe for this endpoint is already in progress".to_string(),
            Self::Config(_) => "Configuration error".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 機械可読なエラーコード
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::EndpointNotFound(_) => "NOT_FOUND",
            Self::Busy(_) => "BUSY",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::EndpointNotFound(_) => StatusCode::NOT_FOUND,
            Self::Busy(_) => StatusCode::CONFLICT,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// スケジューリングループを停止させるべきエラーか
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
