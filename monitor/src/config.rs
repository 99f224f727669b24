//! Configuration management via environment variables
//!
//! Provides helper functions for reading environment variables with fallback
//! to deprecated variable names with warning logs, and the monitor's
//! runtime configuration built on top of them.

use crate::common::error::{MonitorError, MonitorResult};
use crate::health::prober::DEFAULT_PROBE_TIMEOUT_SECS;
use crate::health::scheduler::{
    default_trigger_wait, SchedulerConfig, DEFAULT_TICK_INTERVAL_SECS, DEFAULT_WORKER_COUNT,
};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use axum::http::HeaderValue;
use std::str::FromStr;
use std::time::Duration;

/// Get an environment variable with fallback to a deprecated name
///
/// If the new variable name is set, returns its value.
/// If only the old (deprecated) variable name is set, returns its value
/// and logs a deprecation warning.
///
/// # Arguments
/// * `new_name` - The new environment variable name (preferred)
/// * `old_name` - The deprecated environment variable name (fallback)
///
/// # Returns
/// * `Some(value)` - The environment variable value
/// * `None` - Neither variable is set
///
/// # Example
/// ```
/// use endpoint_monitor::config::get_env_with_fallback;
///
/// let interval = get_env_with_fallback("MONITOR_TICK_INTERVAL_SECS", "HEALTH_CHECK_INTERVAL");
/// ```
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback, parsing to a specific type
///
/// Unlike a silent default, a value that is set but does not parse is
/// reported as a configuration error naming the variable.
///
/// # Arguments
/// * `new_name` - The new environment variable name (preferred)
/// * `old_name` - The deprecated environment variable name (fallback)
/// * `default` - The value to use if neither is set
pub fn get_env_with_fallback_parse<T>(new_name: &str, old_name: &str, default: T) -> MonitorResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_env_value(new_name, get_env_with_fallback(new_name, old_name), default)
}

/// Get an environment variable that has no deprecated alias
pub fn get_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Get an environment variable without a deprecated alias, parsing to a specific type
pub fn get_env_parse<T>(name: &str, default: T) -> MonitorResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_env_value(name, get_env(name), default)
}

fn parse_env_value<T>(name: &str, raw: Option<String>, default: T) -> MonitorResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse::<T>().map_err(|e: T::Err| {
            MonitorError::Config(format!("invalid value '{}' for {}: {}", raw, name, e))
        }),
        None => Ok(default),
    }
}

/// CORSで許可する既定のオリジン
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:8000";

/// 監視設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// ティック間隔
    pub tick_interval: Duration,
    /// ワーカー数
    pub worker_count: usize,
    /// 1回のプローブのタイムアウト
    pub probe_timeout: Duration,
    /// エンドポイントあたりの履歴件数
    pub history_capacity: usize,
    /// 通信失敗時の追加試行回数
    pub retry_attempts: u32,
    /// 再試行までの待機時間
    pub retry_backoff: Duration,
    /// シャットダウン猶予
    pub shutdown_grace: Duration,
    /// オンデマンド要求の待機上限
    pub trigger_wait_timeout: Duration,
    /// CORSで許可するオリジン
    pub cors_origin: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        Self {
            tick_interval: scheduler.tick_interval,
            worker_count: scheduler.worker_count,
            probe_timeout: scheduler.probe_timeout,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            retry_attempts: scheduler.retry_attempts,
            retry_backoff: scheduler.retry_backoff,
            shutdown_grace: scheduler.shutdown_grace,
            trigger_wait_timeout: scheduler.trigger_wait_timeout,
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
        }
    }
}

impl MonitorConfig {
    /// 環境変数から設定を読み込み、検証する
    ///
    /// - `MONITOR_TICK_INTERVAL_SECS`（旧: `HEALTH_CHECK_INTERVAL`）
    /// - `MONITOR_WORKERS`
    /// - `MONITOR_PROBE_TIMEOUT_SECS`
    /// - `MONITOR_HISTORY_CAPACITY`
    /// - `MONITOR_RETRY_ATTEMPTS` / `MONITOR_RETRY_BACKOFF_MS`
    /// - `MONITOR_SHUTDOWN_GRACE_SECS`
    /// - `MONITOR_TRIGGER_WAIT_SECS`（未設定時はタイムアウト×(試行回数＋1)＋5秒）
    /// - `MONITOR_CORS_ORIGIN`
    pub fn from_env() -> MonitorResult<Self> {
        let tick_secs = get_env_with_fallback_parse(
            "MONITOR_TICK_INTERVAL_SECS",
            "HEALTH_CHECK_INTERVAL",
            DEFAULT_TICK_INTERVAL_SECS,
        )?;
        let worker_count = get_env_parse("MONITOR_WORKERS", DEFAULT_WORKER_COUNT)?;
        let timeout_secs = get_env_parse("MONITOR_PROBE_TIMEOUT_SECS", DEFAULT_PROBE_TIMEOUT_SECS)?;
        let history_capacity = get_env_parse("MONITOR_HISTORY_CAPACITY", DEFAULT_HISTORY_CAPACITY)?;
        let retry_attempts = get_env_parse("MONITOR_RETRY_ATTEMPTS", 0u32)?;
        let backoff_ms = get_env_parse("MONITOR_RETRY_BACKOFF_MS", 500u64)?;
        let grace_secs = get_env_parse("MONITOR_SHUTDOWN_GRACE_SECS", 10u64)?;

        let probe_timeout = Duration::from_secs(timeout_secs);
        let trigger_wait_timeout = match get_env_parse::<u64>("MONITOR_TRIGGER_WAIT_SECS", 0)? {
            0 => default_trigger_wait(probe_timeout, retry_attempts),
            secs => Duration::from_secs(secs),
        };

        let config = Self {
            tick_interval: Duration::from_secs(tick_secs),
            worker_count,
            probe_timeout,
            history_capacity,
            retry_attempts,
            retry_backoff: Duration::from_millis(backoff_ms),
            shutdown_grace: Duration::from_secs(grace_secs),
            trigger_wait_timeout,
            cors_origin: get_env("MONITOR_CORS_ORIGIN")
                .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// 値域を検証
    pub fn validate(&self) -> MonitorResult<()> {
        if self.worker_count == 0 {
            return Err(MonitorError::Config(
                "MONITOR_WORKERS must be at least 1".into(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(MonitorError::Config(
                "MONITOR_HISTORY_CAPACITY must be at least 1".into(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(MonitorError::Config(
                "MONITOR_TICK_INTERVAL_SECS must be greater than 0".into(),
            ));
        }
        if self.probe_timeout.is_zero() {
            return Err(MonitorError::Config(
                "MONITOR_PROBE_TIMEOUT_SECS must be greater than 0".into(),
            ));
        }
        self.cors_header()?;
        Ok(())
    }

    /// CORSの許可オリジンをヘッダー値として取得
    pub fn cors_header(&self) -> MonitorResult<HeaderValue> {
        HeaderValue::from_str(self.cors_origin.trim()).map_err(|e| {
            MonitorError::Config(format!(
                "invalid MONITOR_CORS_ORIGIN '{}': {}",
                self.cors_origin, e
            ))
        })
    }

    /// スケジューラ設定へ変換
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: self.tick_interval,
            worker_count: self.worker_count,
            probe_timeout: self.probe_timeout,
            retry_attempts: self.retry_attempts,
            retry_backoff: self.retry_backoff,
            trigger_wait_timeout: self.trigger_wait_timeout,
            shutdown_grace: self.shutdown_grace,
        }
    }
}
