//! エンドポイントレジストリ
//!
//! 監視対象エンドポイントをメモリ内で管理する。
//! シャード分割されたマップでキー単位にロックするため、無関係な
//! エンドポイント同士が単一のグローバルロックで直列化されることはない。

use crate::common::error::{MonitorError, MonitorResult};
use crate::types::endpoint::{Endpoint, EndpointSpec};
use crate::types::probe::ProbeResult;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// 登録順を保持するためのエントリ
#[derive(Debug)]
struct RegistryEntry {
    /// 登録順序（単調増加）
    seq: u64,
    endpoint: Endpoint,
}

#[derive(Debug, Default)]
struct RegistryInner {
    endpoints: DashMap<Uuid, RegistryEntry>,
    next_seq: AtomicU64,
}

/// エンドポイントレジストリ
///
/// 読み出しは常に所有権付きのスナップショットを返す。
/// `last_*` / `is_healthy` の更新は `record_result*` 経由でのみ行われ、
/// エントリのロック下で一括して書き換えられる。
#[derive(Clone, Debug, Default)]
pub struct EndpointRegistry {
    inner: Arc<RegistryInner>,
}

impl EndpointRegistry {
    /// 空のレジストリを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 履歴を用意せずにエンドポイントを登録（テスト用）
    ///
    /// 通常の登録は `HealthQueryService::register_endpoint` を経由し、
    /// 公開前に履歴リングを用意する。
    #[cfg(test)]
    pub(crate) fn register(&self, spec: EndpointSpec) -> MonitorResult<Endpoint> {
        self.register_with(spec, |_| {})
    }

    /// エンドポイントを登録し、公開直前に `before_publish` を呼ぶ
    ///
    /// 付随ストア（履歴）の初期化を、スケジューラから見える前に済ませるために使う。
    pub fn register_with<F>(&self, spec: EndpointSpec, before_publish: F) -> MonitorResult<Endpoint>
    where
        F: FnOnce(&Endpoint),
    {
        let endpoint = spec.into_endpoint()?;
        before_publish(&endpoint);
        self.insert(endpoint.clone())?;

        info!(
            endpoint_id = %endpoint.id,
            endpoint_name = %endpoint.name,
            url = %endpoint.url,
            method = %endpoint.method,
            expected_status = endpoint.expected_status,
            "Endpoint registered"
        );
        Ok(endpoint)
    }

    /// 検証済みエンドポイントを追加
    fn insert(&self, endpoint: Endpoint) -> MonitorResult<()> {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        match self.inner.endpoints.entry(endpoint.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(MonitorError::Internal(format!(
                "endpoint id {} registered twice",
                endpoint.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(RegistryEntry { seq, endpoint });
                Ok(())
            }
        }
    }

    /// エンドポイントを取得
    pub fn get(&self, id: Uuid) -> Option<Endpoint> {
        self.inner
            .endpoints
            .get(&id)
            .map(|entry| entry.endpoint.clone())
    }

    /// 登録済みか確認
    pub fn contains(&self, id: Uuid) -> bool {
        self.inner.endpoints.contains_key(&id)
    }

    /// すべてのエンドポイントを登録順で取得
    pub fn list(&self) -> Vec<Endpoint> {
        let mut entries: Vec<(u64, Endpoint)> = self
            .inner
            .endpoints
            .iter()
            .map(|entry| (entry.seq, entry.endpoint.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, endpoint)| endpoint).collect()
    }

    /// 登録数
    pub fn count(&self) -> usize {
        self.inner.endpoints.len()
    }

    /// エンドポイントを削除
    ///
    /// 同じIDのコミットが進行中であれば、その完了を待ってから削除する。
    pub fn remove(&self, id: Uuid) -> MonitorResult<Endpoint> {
        let (_, entry) = self
            .inner
            .endpoints
            .remove(&id)
            .ok_or(MonitorError::EndpointNotFound(id))?;

        info!(
            endpoint_id = %id,
            endpoint_name = %entry.endpoint.name,
            "Endpoint removed"
        );
        Ok(entry.endpoint)
    }

    /// プローブ結果を反映
    pub fn record_result(&self, id: Uuid, result: &ProbeResult) -> MonitorResult<Endpoint> {
        self.record_result_with(id, result, |_| Ok(()))
    }

    /// プローブ結果を反映し、エントリのロックを保持したまま `on_recorded` を呼ぶ
    ///
    /// 履歴への追記をこのコールバック内で行うことで、同じIDの削除と
    /// 「反映＋追記」が互いに割り込まない。
    pub fn record_result_with<F>(
        &self,
        id: Uuid,
        result: &ProbeResult,
        on_recorded: F,
    ) -> MonitorResult<Endpoint>
    where
        F: FnOnce(&Endpoint) -> MonitorResult<()>,
    {
        let mut entry = self
            .inner
            .endpoints
            .get_mut(&id)
            .ok_or(MonitorError::EndpointNotFound(id))?;

        if entry.endpoint.id != id {
            return Err(MonitorError::Internal(format!(
                "registry key {} holds endpoint {}",
                id, entry.endpoint.id
            )));
        }
        if result.endpoint_id != id {
            return Err(MonitorError::Internal(format!(
                "probe result for {} routed to endpoint {}",
                result.endpoint_id, id
            )));
        }

        let was_healthy = entry.endpoint.is_healthy;
        entry.endpoint.apply_result(result);
        on_recorded(&entry.endpoint)?;

        if was_healthy != entry.endpoint.is_healthy {
            info!(
                endpoint_id = %id,
                endpoint_name = %entry.endpoint.name,
                healthy = entry.endpoint.is_healthy,
                last_status = ?entry.endpoint.last_status,
                "Endpoint health changed"
            );
        } else {
            debug!(
                endpoint_id = %id,
                healthy = entry.endpoint.is_healthy,
                "Recorded probe result"
            );
        }

        Ok(entry.endpoint.clone())
    }
}
