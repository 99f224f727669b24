//! Endpoint Monitor
//!
//! 登録されたHTTPエンドポイントを定期的にプローブし、
//! 現在の健全性と直近の履歴を提供するモニター

#![warn(missing_docs)]

/// 共通型定義（エラー型）
pub mod common;

/// 型定義
pub mod types;

/// エンドポイント登録管理
pub mod registry;

/// プローブ履歴
pub mod history;

/// ヘルスチェック監視（プローバー・スケジューラ・照会）
pub mod health;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// ロギング初期化ユーティリティ
pub mod logging;

/// CLIインターフェース
pub mod cli;

/// REST APIハンドラー
pub mod api;

/// サーバー初期化
pub mod bootstrap;

/// axumサーバー起動
pub mod server;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// ヘルス照会サービス
    pub service: health::HealthQueryService,
    /// CORSで許可するオリジン
    pub cors_origin: axum::http::HeaderValue,
}
