//! ヘルス照会サービス
//!
//! レジストリ・履歴・スケジューラを束ね、呼び出し側（APIなど）に
//! 登録・削除・状態取得・履歴取得・即時チェックを提供する。

use crate::common::error::{MonitorError, MonitorResult};
use crate::health::scheduler::ProbeScheduler;
use crate::history::HistoryRing;
use crate::registry::EndpointRegistry;
use crate::types::endpoint::{Endpoint, EndpointSpec};
use crate::types::probe::ProbeResult;
use tracing::info;
use uuid::Uuid;

/// ヘルス照会サービス
#[derive(Clone)]
pub struct HealthQueryService {
    registry: EndpointRegistry,
    history: HistoryRing,
    scheduler: ProbeScheduler,
}

impl HealthQueryService {
    /// 新しいサービスを作成
    pub fn new(registry: EndpointRegistry, history: HistoryRing, scheduler: ProbeScheduler) -> Self {
        Self {
            registry,
            history,
            scheduler,
        }
    }

    /// スケジューラ
    pub fn scheduler(&self) -> &ProbeScheduler {
        &self.scheduler
    }

    /// 全エンドポイントの現在状態（登録順）
    pub fn current_status(&self) -> Vec<Endpoint> {
        self.registry.list()
    }

    /// エンドポイントを取得
    pub fn get_endpoint(&self, id: Uuid) -> MonitorResult<Endpoint> {
        self.registry
            .get(id)
            .ok_or(MonitorError::EndpointNotFound(id))
    }

    /// 直近の履歴を古い順で取得
    ///
    /// `limit` 省略時は履歴容量、指定時も容量で頭打ちにする。
    pub fn history(&self, id: Uuid, limit: Option<usize>) -> MonitorResult<Vec<ProbeResult>> {
        if !self.registry.contains(id) {
            return Err(MonitorError::EndpointNotFound(id));
        }
        let capacity = self.history.capacity();
        let limit = limit.unwrap_or(capacity).min(capacity);
        Ok(self.history.recent(id, limit))
    }

    /// 即時チェック（待機中・実行中のプローブがあれば合流）
    pub async fn trigger_check(&self, id: Uuid) -> MonitorResult<ProbeResult> {
        self.scheduler.trigger(id).await
    }

    /// エンドポイントを登録
    ///
    /// 履歴リングはスケジューラから見える前に用意される。
    pub fn register_endpoint(&self, spec: EndpointSpec) -> MonitorResult<Endpoint> {
        let history = &self.history;
        self.registry
            .register_with(spec, |endpoint| history.track(endpoint.id))
    }

    /// エンドポイントを削除
    ///
    /// 実行中のコミットはレジストリ側で完了を待ってから削除され、
    /// その後に履歴を破棄する。
    pub fn delete_endpoint(&self, id: Uuid) -> MonitorResult<()> {
        let removed = self.registry.remove(id)?;
        self.history.purge(id);
        info!(
            endpoint_id = %id,
            endpoint_name = %removed.name,
            "Endpoint history purged"
        );
        Ok(())
    }
}
