//! エンドポイント型定義
//!
//! 監視対象エンドポイントと、その登録リクエスト（`EndpointSpec`）

use crate::common::error::{MonitorError, MonitorResult};
use crate::types::probe::ProbeResult;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// 表示名の最小文字数
pub const NAME_MIN_CHARS: usize = 10;
/// 表示名の最大文字数
pub const NAME_MAX_CHARS: usize = 100;
/// 期待ステータスの許容範囲
pub const STATUS_RANGE: std::ops::RangeInclusive<i32> = 100..=599;

fn default_method() -> String {
    ProbeMethod::Get.as_str().to_string()
}

fn default_expected_status() -> i32 {
    200
}

/// プローブに使用するHTTPメソッド
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
    /// GETリクエスト
    #[default]
    Get,
    /// POSTリクエスト（空ボディ）
    Post,
}

impl ProbeMethod {
    /// ProbeMethodを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// ProbeMethod のパースエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProbeMethodError(pub String);

impl std::fmt::Display for ParseProbeMethodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "method must be GET or POST, got '{}'", self.0)
    }
}

impl std::error::Error for ParseProbeMethodError {}

impl FromStr for ProbeMethod {
    type Err = ParseProbeMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            _ => Err(ParseProbeMethodError(s.to_string())),
        }
    }
}

impl std::fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// エンドポイント登録リクエスト
///
/// 値域チェック前の生の入力。`validate()` を通過したものだけが
/// `Endpoint` になる。
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSpec {
    /// 表示名（10〜100文字）
    pub name: String,
    /// 監視対象URL
    pub url: String,
    /// HTTPメソッド（GET / POST）
    #[serde(default = "default_method")]
    pub method: String,
    /// 正常とみなすHTTPステータス（100〜599）
    #[serde(default = "default_expected_status")]
    pub expected_status: i32,
}

impl EndpointSpec {
    /// GET / 200 を既定値とする登録リクエストを作成
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: default_method(),
            expected_status: default_expected_status(),
        }
    }

    /// HTTPメソッドを設定
    pub fn with_method(mut self, method: ProbeMethod) -> Self {
        self.method = method.as_str().to_string();
        self
    }

    /// 期待ステータスを設定
    pub fn with_expected_status(mut self, status: i32) -> Self {
        self.expected_status = status;
        self
    }

    /// 全フィールドの値域を検証する
    pub fn validate(&self) -> MonitorResult<(ProbeMethod, u16)> {
        let name_chars = self.name.chars().count();
        if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&name_chars) {
            return Err(MonitorError::Validation(format!(
                "name must be between {} and {} characters (got {})",
                NAME_MIN_CHARS, NAME_MAX_CHARS, name_chars
            )));
        }

        if self.url.trim().is_empty() {
            return Err(MonitorError::Validation("url is required".to_string()));
        }
        let url = Url::parse(&self.url)
            .map_err(|e| MonitorError::Validation(format!("invalid url '{}': {}", self.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(MonitorError::Validation(format!(
                "url must be an absolute http(s) URL: '{}'",
                self.url
            )));
        }

        let method = self
            .method
            .parse::<ProbeMethod>()
            .map_err(|e| MonitorError::Validation(e.to_string()))?;

        if !STATUS_RANGE.contains(&self.expected_status) {
            return Err(MonitorError::Validation(format!(
                "expected_status must be between {} and {} (got {})",
                STATUS_RANGE.start(),
                STATUS_RANGE.end(),
                self.expected_status
            )));
        }

        Ok((method, self.expected_status as u16))
    }

    /// 検証済みの新規エンドポイントに変換（IDを採番）
    pub fn into_endpoint(self) -> MonitorResult<Endpoint> {
        let (method, expected_status) = self.validate()?;
        Ok(Endpoint {
            id: Uuid::new_v4(),
            name: self.name,
            url: self.url,
            method,
            expected_status,
            last_check: None,
            last_status: None,
            is_healthy: false,
            registered_at: Utc::now(),
        })
    }
}

/// エンドポイント
///
/// 監視対象の1つのHTTPエンドポイント。`last_*` / `is_healthy` は
/// スケジューラのコミット経路からのみ更新される。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    /// 一意識別子（登録時に採番、不変）
    pub id: Uuid,
    /// 表示名
    pub name: String,
    /// 監視対象URL
    pub url: String,
    /// HTTPメソッド
    pub method: ProbeMethod,
    /// 正常とみなすHTTPステータス
    pub expected_status: u16,
    /// 最終プローブ時刻（未プローブならNone）
    pub last_check: Option<DateTime<Utc>>,
    /// 最終観測ステータス（応答なしならNone）
    pub last_status: Option<u16>,
    /// 最新プローブで `last_status == expected_status` だったか
    pub is_healthy: bool,
    /// 登録日時
    pub registered_at: DateTime<Utc>,
}

impl Endpoint {
    /// プローブ結果を反映する
    ///
    /// `last_check` / `last_status` / `is_healthy` は常に同じ結果から導出する。
    pub fn apply_result(&mut self, result: &ProbeResult) {
        self.last_check = Some(result.timestamp);
        self.last_status = result.observed_status;
        self.is_healthy = self.last_status == Some(self.expected_status);
    }
}
