//! serve サブコマンド
//!
//! 監視サーバーを起動します。

use clap::Args;

/// serve サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Listen port
    #[arg(short, long, default_value = "8000", env = "MONITOR_PORT")]
    pub port: u16,

    /// Bind address
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "MONITOR_HOST")]
    pub host: String,
}
