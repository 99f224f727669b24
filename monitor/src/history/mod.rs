//! プローブ履歴リング
//!
//! エンドポイントごとに直近N件（既定10件）のプローブ結果を保持する。
//! 容量に達した場合は最も古い結果から破棄する（FIFO）。

use crate::common::error::{MonitorError, MonitorResult};
use crate::types::probe::ProbeResult;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// デフォルトの履歴容量
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// エンドポイント単位の有界履歴
///
/// リングは `track()` でのみ作成される。`append()` は未知のIDに対して
/// リングを作らないため、削除済みエンドポイントの履歴が復活することはない。
#[derive(Clone, Debug)]
pub struct HistoryRing {
    rings: Arc<DashMap<Uuid, VecDeque<ProbeResult>>>,
    capacity: usize,
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryRing {
    /// 指定容量の履歴ストアを作成（0は1に切り上げる）
    pub fn new(capacity: usize) -> Self {
        Self {
            rings: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// エンドポイントあたりの容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 空のリングを用意する（既存のリングはそのまま）
    pub fn track(&self, endpoint_id: Uuid) {
        self.rings
            .entry(endpoint_id)
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
    }

    /// 結果を追記する
    ///
    /// 未知のIDは削除との競合とみなし、警告ログのみで `Ok(false)` を返す。
    pub fn append(&self, endpoint_id: Uuid, result: ProbeResult) -> MonitorResult<bool> {
        let Some(mut ring) = self.rings.get_mut(&endpoint_id) else {
            warn!(
                endpoint_id = %endpoint_id,
                "Dropping probe result for untracked endpoint (deleted concurrently?)"
            );
            return Ok(false);
        };

        while ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(result);

        if ring.len() > self.capacity {
            return Err(MonitorError::Internal(format!(
                "history ring for {} holds {} results (capacity {})",
                endpoint_id,
                ring.len(),
                self.capacity
            )));
        }
        Ok(true)
    }

    /// 直近 `n` 件を古い順で取得（未知のIDは空）
    pub fn recent(&self, endpoint_id: Uuid, n: usize) -> Vec<ProbeResult> {
        let Some(ring) = self.rings.get(&endpoint_id) else {
            return Vec::new();
        };
        let skip = ring.len().saturating_sub(n);
        ring.iter().skip(skip).cloned().collect()
    }

    /// 保持件数（未知のIDは0）
    pub fn len(&self, endpoint_id: Uuid) -> usize {
        self.rings.get(&endpoint_id).map(|r| r.len()).unwrap_or(0)
    }

    /// リングが存在するか
    pub fn is_tracked(&self, endpoint_id: Uuid) -> bool {
        self.rings.contains_key(&endpoint_id)
    }

    /// 履歴を削除（冪等）
    pub fn purge(&self, endpoint_id: Uuid) {
        self.rings.remove(&endpoint_id);
    }
}
