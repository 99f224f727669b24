//! プローブ結果型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 応答が得られなかったプローブの失敗種別
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    /// タイムアウト
    Timeout,
    /// 名前解決失敗
    Dns,
    /// 接続拒否・到達不能
    Connect,
    /// TLSハンドシェイク・証明書エラー
    Tls,
    /// その他のリクエストエラー
    Request,
}

impl ProbeErrorKind {
    /// ProbeErrorKindを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Request => "request",
        }
    }
}

impl std::fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 1回のプローブ結果（生成後は不変）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeResult {
    /// 対象エンドポイントID
    pub endpoint_id: Uuid,
    /// 完了時刻
    pub timestamp: DateTime<Utc>,
    /// 観測したHTTPステータス（応答なしならNone）
    pub observed_status: Option<u16>,
    /// 応答が得られなかった場合の失敗種別
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeErrorKind>,
    /// 期待ステータスと一致したか
    pub success: bool,
    /// リクエスト開始から応答またはタイムアウトまでの時間（ミリ秒）
    pub latency_ms: u64,
}

impl ProbeResult {
    /// HTTP応答が得られたプローブ結果
    pub fn response(
        endpoint_id: Uuid,
        observed_status: u16,
        expected_status: u16,
        latency: Duration,
    ) -> Self {
        Self {
            endpoint_id,
            timestamp: Utc::now(),
            observed_status: Some(observed_status),
            error: None,
            success: observed_status == expected_status,
            latency_ms: latency.as_millis() as u64,
        }
    }

    /// 応答が得られなかったプローブ結果
    pub fn failure(endpoint_id: Uuid, kind: ProbeErrorKind, latency: Duration) -> Self {
        Self {
            endpoint_id,
            timestamp: Utc::now(),
            observed_status: None,
            error: Some(kind),
            success: false,
            latency_ms: latency.as_millis() as u64,
        }
    }

    /// リトライ対象の失敗（応答なし）か
    ///
    /// ステータス不一致は応答が得られているためリトライしない。
    pub fn is_transport_failure(&self) -> bool {
        self.error.is_some()
    }
}
