//! ロギング初期化
//!
//! `MONITOR_LOG_LEVEL`（未設定時は `RUST_LOG`、どちらもなければ `info`）で
//! フィルタを決める。`MONITOR_LOG_DIR` が設定されていれば日次ローテーションの
//! ファイル出力を追加する。

use crate::common::error::{MonitorError, MonitorResult};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// ログファイル名のプレフィックス
const LOG_FILE_PREFIX: &str = "endpoint-monitor.log";

/// フィルタ文字列を決定
fn filter_directive() -> String {
    std::env::var("MONITOR_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string())
}

/// ログ出力先ディレクトリ
pub fn log_dir() -> Option<PathBuf> {
    std::env::var_os("MONITOR_LOG_DIR")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
}

/// グローバルサブスクライバを設定
///
/// ファイル出力を有効にした場合、返されたガードが破棄されるまで
/// バッファがフラッシュされ続ける。
pub fn init() -> MonitorResult<Option<WorkerGuard>> {
    let directive = filter_directive();
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| MonitorError::Config(format!("invalid log filter '{directive}': {e}")))?;

    let (file_layer, guard) = match log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .try_init()
        .map_err(|e| MonitorError::Config(format!("failed to initialize logging: {e}")))?;

    Ok(guard)
}
