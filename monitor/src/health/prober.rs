//! プローバー
//!
//! 1つのエンドポイントに対して1回だけHTTPリクエストを発行し、結果を返す。
//! タイムアウト・ネットワークエラーはすべて `ProbeResult { success: false }`
//! に正規化され、呼び出し側に伝播しない。リトライはスケジューラの責務。

use crate::common::error::{MonitorError, MonitorResult};
use crate::types::endpoint::{Endpoint, ProbeMethod};
use crate::types::probe::{ProbeErrorKind, ProbeResult};
use async_trait::async_trait;
use reqwest::{redirect, Client};
use std::time::{Duration, Instant};
use tracing::debug;

/// デフォルトのプローブタイムアウト（秒）
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// プローブの実行手段
///
/// スケジューラはこのトレイト越しにプローブを発行するため、
/// ネットワークI/Oなしでスケジューリング規律を検証できる。
#[async_trait]
pub trait Prober: Send + Sync {
    /// エンドポイントを1回プローブする（失敗もデータとして返す）
    async fn probe(&self, endpoint: &Endpoint, timeout: Duration) -> ProbeResult;
}

/// reqwestによるHTTPプローバー
#[derive(Clone, Debug)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    /// 新しいHTTPプローバーを作成
    ///
    /// リダイレクトは追従しない（観測したステータスをそのまま記録する）。
    pub fn new() -> MonitorResult<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .pool_idle_timeout(Duration::from_secs(60))
            .user_agent(concat!("endpoint-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MonitorError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// 既存のHTTPクライアントを共有して作成
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, endpoint: &Endpoint, timeout: Duration) -> ProbeResult {
        let request = match endpoint.method {
            ProbeMethod::Get => self.client.get(&endpoint.url),
            ProbeMethod::Post => self.client.post(&endpoint.url),
        };

        let start = Instant::now();
        let outcome = tokio::time::timeout(timeout, fetch_status(request, endpoint)).await;
        let latency = start.elapsed();

        match outcome {
            Ok(Ok(status)) => {
                debug!(
                    endpoint_id = %endpoint.id,
                    status,
                    latency_ms = latency.as_millis() as u64,
                    "Probe received response"
                );
                ProbeResult::response(endpoint.id, status, endpoint.expected_status, latency)
            }
            Ok(Err(e)) => {
                let kind = classify_error(&e);
                debug!(
                    endpoint_id = %endpoint.id,
                    error = %e,
                    kind = %kind,
                    "Probe request failed"
                );
                ProbeResult::failure(endpoint.id, kind, latency)
            }
            Err(_) => {
                debug!(
                    endpoint_id = %endpoint.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Probe timed out"
                );
                ProbeResult::failure(endpoint.id, ProbeErrorKind::Timeout, latency)
            }
        }
    }
}

/// リクエストを送り、本文を読み切ってからステータスを返す
///
/// レイテンシは応答の終わりまでを計る。ヘッダー受信後の本文エラーは
/// ステータスが得られているため失敗扱いにしない。
async fn fetch_status(
    request: reqwest::RequestBuilder,
    endpoint: &Endpoint,
) -> Result<u16, reqwest::Error> {
    let mut response = request.send().await?;
    let status = response.status().as_u16();
    loop {
        match response.chunk().await {
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                debug!(
                    endpoint_id = %endpoint.id,
                    status,
                    error = %e,
                    "Probe response body ended with error"
                );
                break;
            }
        }
    }
    Ok(status)
}

/// エラーチェーン全体を小文字の1行にまとめる
fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text.to_ascii_lowercase()
}

/// reqwestのエラーを失敗種別に分類
fn classify_error(err: &reqwest::Error) -> ProbeErrorKind {
    if err.is_timeout() {
        return ProbeErrorKind::Timeout;
    }

    let chain = error_chain_text(err);
    classify_chain(&chain, err.is_connect())
}

fn classify_chain(chain: &str, is_connect: bool) -> ProbeErrorKind {
    const DNS_MARKERS: [&str; 4] = [
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "no such host",
    ];
    const TLS_MARKERS: [&str; 4] = ["certificate", "tls", "ssl", "handshake"];

    if DNS_MARKERS.iter().any(|m| chain.contains(m)) {
        ProbeErrorKind::Dns
    } else if TLS_MARKERS.iter().any(|m| chain.contains(m)) {
        ProbeErrorKind::Tls
    } else if is_connect {
        ProbeErrorKind::Connect
    } else {
        ProbeErrorKind::Request
    }
}
