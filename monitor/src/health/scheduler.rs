//! プローブスケジューラ
//!
//! 定期ティックとオンデマンド要求の両方からプローブタスクを発行し、
//! 固定サイズのワーカープールで実行する。
//!
//! - エンドポイントごとに同時に実行されるプローブは高々1つ
//! - オンデマンドレーンは定期レーンより常に先に処理される
//! - 実行中・待機中のプローブへのオンデマンド要求は同じ結果に合流する

use crate::common::error::{MonitorError, MonitorResult};
use crate::health::prober::{Prober, DEFAULT_PROBE_TIMEOUT_SECS};
use crate::history::HistoryRing;
use crate::registry::EndpointRegistry;
use crate::types::endpoint::Endpoint;
use crate::types::probe::ProbeResult;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// デフォルトのティック間隔（秒）
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;

/// デフォルトのワーカー数
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// オンデマンド要求の待機時間にプローブタイムアウトへ上乗せする余裕（秒）
pub const TRIGGER_WAIT_MARGIN_SECS: u64 = 5;

/// スケジューラ設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// ティック間隔
    pub tick_interval: Duration,
    /// ワーカー数
    pub worker_count: usize,
    /// 1回のプローブのタイムアウト
    pub probe_timeout: Duration,
    /// 通信失敗時の追加試行回数
    pub retry_attempts: u32,
    /// 再試行までの待機時間
    pub retry_backoff: Duration,
    /// オンデマンド要求が結果を待つ上限
    pub trigger_wait_timeout: Duration,
    /// シャットダウン時にワーカーの完了を待つ上限
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let probe_timeout = Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS);
        Self {
            tick_interval: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS),
            worker_count: DEFAULT_WORKER_COUNT,
            probe_timeout,
            retry_attempts: 0,
            retry_backoff: Duration::from_millis(500),
            trigger_wait_timeout: default_trigger_wait(probe_timeout, 0),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// オンデマンド要求の既定の待機上限
///
/// 試行回数分のタイムアウトに、全ワーカーが応答待ちで塞がっている間の
/// キュー待ち（タイムアウト1回分）と余裕を足したもの。
pub fn default_trigger_wait(probe_timeout: Duration, retry_attempts: u32) -> Duration {
    probe_timeout * (retry_attempts + 2) + Duration::from_secs(TRIGGER_WAIT_MARGIN_SECS)
}

/// エンドポイント単位のプローブスロット状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// タスクなし
    Idle,
    /// キュー待ち
    Queued,
    /// プローブ実行中
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lane {
    OnDemand,
    Periodic,
}

/// キュー待ち・実行中のタスク
///
/// `done` への購読はスロットのロック下で行い、完了側はスロットを
/// 取り除いてから送信するため、合流した呼び出し元が結果を取りこぼすことはない。
/// `None` はエンドポイントが削除されたことを表す。
struct Slot {
    state: SlotState,
    lane: Lane,
    done: broadcast::Sender<Option<ProbeResult>>,
}

impl Slot {
    fn queued(lane: Lane) -> Self {
        let (done, _) = broadcast::channel(1);
        Self {
            state: SlotState::Queued,
            lane,
            done,
        }
    }
}

#[derive(Default)]
struct Lanes {
    on_demand: VecDeque<Uuid>,
    periodic: VecDeque<Uuid>,
}

/// 2レーンのタスクキュー
#[derive(Default)]
struct TaskQueue {
    lanes: Mutex<Lanes>,
    notify: Notify,
}

impl TaskQueue {
    fn push(&self, lane: Lane, id: Uuid) {
        {
            let mut lanes = self.lanes.lock();
            match lane {
                Lane::OnDemand => lanes.on_demand.push_back(id),
                Lane::Periodic => lanes.periodic.push_back(id),
            }
        }
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Uuid> {
        let mut lanes = self.lanes.lock();
        lanes
            .on_demand
            .pop_front()
            .or_else(|| lanes.periodic.pop_front())
    }

    /// 定期レーンで待機中のタスクをオンデマンドレーンへ移す
    fn promote(&self, id: Uuid) -> bool {
        let mut lanes = self.lanes.lock();
        match lanes.periodic.iter().position(|queued| *queued == id) {
            Some(pos) => {
                lanes.periodic.remove(pos);
                lanes.on_demand.push_back(id);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        let lanes = self.lanes.lock();
        lanes.on_demand.len() + lanes.periodic.len()
    }
}

/// 1回のティックの結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// 新たにキューへ積んだ数
    pub enqueued: usize,
    /// 待機中・実行中のためスキップした数
    pub skipped: usize,
}

/// スケジューラの累積統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// 実行したティック数
    pub ticks: u64,
    /// キューへ積んだタスク数（定期＋オンデマンド）
    pub enqueued: u64,
    /// ティックでスキップしたエンドポイント数
    pub skipped: u64,
    /// 成功として記録した結果数
    pub recorded: u64,
    /// 失敗として記録した結果数
    pub failed: u64,
    /// 削除済みエンドポイント宛てで破棄した結果数
    pub dropped: u64,
}

#[derive(Default)]
struct StatsCounters {
    ticks: AtomicU64,
    enqueued: AtomicU64,
    skipped: AtomicU64,
    recorded: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            recorded: self.recorded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

struct SchedulerInner {
    registry: EndpointRegistry,
    history: HistoryRing,
    prober: Arc<dyn Prober>,
    config: SchedulerConfig,
    slots: DashMap<Uuid, Slot>,
    queue: TaskQueue,
    stats: StatsCounters,
    shutdown: CancellationToken,
    fatal_tx: mpsc::UnboundedSender<MonitorError>,
    fatal_rx: Mutex<Option<mpsc::UnboundedReceiver<MonitorError>>>,
}

/// プローブスケジューラ
#[derive(Clone)]
pub struct ProbeScheduler {
    inner: Arc<SchedulerInner>,
}

impl ProbeScheduler {
    /// 新しいスケジューラを作成（`start()` するまでプローブは実行されない）
    pub fn new(
        registry: EndpointRegistry,
        history: HistoryRing,
        prober: Arc<dyn Prober>,
        config: SchedulerConfig,
    ) -> Self {
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(SchedulerInner {
                registry,
                history,
                prober,
                config,
                slots: DashMap::new(),
                queue: TaskQueue::default(),
                stats: StatsCounters::default(),
                shutdown: CancellationToken::new(),
                fatal_tx,
                fatal_rx: Mutex::new(Some(fatal_rx)),
            }),
        }
    }

    /// スケジューラ設定
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// 停止を通知するトークン（致命的エラー時にもキャンセルされる）
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// ワーカーとティックループを起動
    ///
    /// 最初のティックは起動直後に実行される。
    pub fn start(&self) -> MonitorResult<SchedulerHandle> {
        let fatal_rx = self
            .inner
            .fatal_rx
            .lock()
            .take()
            .ok_or_else(|| MonitorError::Internal("probe scheduler already started".into()))?;

        let workers = (0..self.inner.config.worker_count)
            .map(|worker_id| {
                let scheduler = self.clone();
                tokio::spawn(async move { scheduler.worker_loop(worker_id).await })
            })
            .collect();

        let scheduler = self.clone();
        let loop_handle = tokio::spawn(async move { scheduler.tick_loop(fatal_rx).await });

        info!(
            interval_secs = self.inner.config.tick_interval.as_secs(),
            workers = self.inner.config.worker_count,
            probe_timeout_ms = self.inner.config.probe_timeout.as_millis() as u64,
            "Probe scheduler started"
        );

        Ok(SchedulerHandle {
            scheduler: self.clone(),
            loop_handle,
            workers,
        })
    }

    async fn tick_loop(
        &self,
        mut fatal_rx: mpsc::UnboundedReceiver<MonitorError>,
    ) -> MonitorResult<()> {
        let mut timer = interval(self.inner.config.tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                Some(err) = fatal_rx.recv() => {
                    error!(error = %err, "Probe scheduler stopped by fatal error");
                    self.inner.shutdown.cancel();
                    return Err(err);
                }
                _ = self.inner.shutdown.cancelled() => {
                    info!("Probe scheduler tick loop stopped");
                    return Ok(());
                }
                _ = timer.tick() => {
                    let report = self.run_tick();
                    debug!(
                        enqueued = report.enqueued,
                        skipped = report.skipped,
                        queued = self.inner.queue.len(),
                        "Scheduler tick"
                    );
                }
            }
        }
    }

    /// 1回分のティックを実行
    ///
    /// レジストリのスナップショットを取り、スロットが空いている
    /// エンドポイントにだけ定期タスクを積む。
    pub fn run_tick(&self) -> TickReport {
        let mut report = TickReport::default();
        if self.inner.shutdown.is_cancelled() {
            return report;
        }

        for endpoint in self.inner.registry.list() {
            match self.inner.slots.entry(endpoint.id) {
                Entry::Occupied(_) => report.skipped += 1,
                Entry::Vacant(vacant) => {
                    vacant.insert(Slot::queued(Lane::Periodic));
                    self.inner.queue.push(Lane::Periodic, endpoint.id);
                    report.enqueued += 1;
                }
            }
        }

        let stats = &self.inner.stats;
        stats.ticks.fetch_add(1, Ordering::Relaxed);
        stats
            .enqueued
            .fetch_add(report.enqueued as u64, Ordering::Relaxed);
        stats
            .skipped
            .fetch_add(report.skipped as u64, Ordering::Relaxed);
        report
    }

    /// オンデマンドでプローブし、その結果を返す
    ///
    /// 待機中・実行中のプローブがあればそれに合流する。
    pub async fn trigger(&self, id: Uuid) -> MonitorResult<ProbeResult> {
        let rx = self.enqueue_on_demand(id, false)?;
        self.await_result(id, rx).await
    }

    /// 新しいプローブだけを受け付ける（スロットが空いていなければ `Busy`）
    pub async fn try_trigger(&self, id: Uuid) -> MonitorResult<ProbeResult> {
        let rx = self.enqueue_on_demand(id, true)?;
        self.await_result(id, rx).await
    }

    fn enqueue_on_demand(
        &self,
        id: Uuid,
        fresh_only: bool,
    ) -> MonitorResult<broadcast::Receiver<Option<ProbeResult>>> {
        if self.inner.shutdown.is_cancelled() {
            return Err(MonitorError::Busy(id));
        }
        if !self.inner.registry.contains(id) {
            return Err(MonitorError::EndpointNotFound(id));
        }

        match self.inner.slots.entry(id) {
            Entry::Vacant(vacant) => {
                let slot = Slot::queued(Lane::OnDemand);
                let rx = slot.done.subscribe();
                vacant.insert(slot);
                self.inner.queue.push(Lane::OnDemand, id);
                self.inner.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                debug!(endpoint_id = %id, "On-demand probe queued");
                Ok(rx)
            }
            Entry::Occupied(mut occupied) => {
                if fresh_only {
                    return Err(MonitorError::Busy(id));
                }
                let slot = occupied.get_mut();
                if slot.state == SlotState::Queued && slot.lane == Lane::Periodic {
                    slot.lane = Lane::OnDemand;
                    if self.inner.queue.promote(id) {
                        debug!(endpoint_id = %id, "Promoted queued periodic probe");
                    }
                } else {
                    debug!(endpoint_id = %id, state = ?slot.state, "Joining pending probe");
                }
                Ok(slot.done.subscribe())
            }
        }
    }

    async fn await_result(
        &self,
        id: Uuid,
        mut rx: broadcast::Receiver<Option<ProbeResult>>,
    ) -> MonitorResult<ProbeResult> {
        match tokio::time::timeout(self.inner.config.trigger_wait_timeout, rx.recv()).await {
            Ok(Ok(Some(result))) => Ok(result),
            Ok(Ok(None)) => Err(MonitorError::EndpointNotFound(id)),
            Ok(Err(_)) => Err(MonitorError::Busy(id)),
            Err(_) => {
                debug!(
                    endpoint_id = %id,
                    wait_ms = self.inner.config.trigger_wait_timeout.as_millis() as u64,
                    "Gave up waiting for probe result"
                );
                Err(MonitorError::Busy(id))
            }
        }
    }

    /// スロット状態（タスクがなければ `Idle`）
    pub fn slot_state(&self, id: Uuid) -> SlotState {
        self.inner
            .slots
            .get(&id)
            .map(|slot| slot.state)
            .unwrap_or(SlotState::Idle)
    }

    /// 累積統計
    pub fn stats(&self) -> SchedulerStats {
        self.inner.stats.snapshot()
    }

    async fn worker_loop(&self, worker_id: usize) {
        debug!(worker_id, "Probe worker started");
        loop {
            if let Some(id) = self.inner.queue.pop() {
                if let Err(err) = self.run_task(id).await {
                    let _ = self.inner.fatal_tx.send(err);
                    break;
                }
                continue;
            }
            // 停止後もキューが空になるまでは処理を続ける
            if self.inner.shutdown.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = self.inner.queue.notify.notified() => {}
                _ = self.inner.shutdown.cancelled() => {}
            }
        }
        debug!(worker_id, "Probe worker stopped");
    }

    async fn run_task(&self, id: Uuid) -> MonitorResult<()> {
        let Some(endpoint) = self.inner.registry.get(id) else {
            self.inner.stats.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(endpoint_id = %id, "Skipping probe for deleted endpoint");
            self.finish(id, None);
            return Ok(());
        };

        if let Some(mut slot) = self.inner.slots.get_mut(&id) {
            slot.state = SlotState::InFlight;
        }

        let result = self.probe_with_retry(&endpoint).await;
        match self.commit(&endpoint, &result) {
            Ok(true) => {
                self.finish(id, Some(result));
                Ok(())
            }
            Ok(false) => {
                self.finish(id, None);
                Ok(())
            }
            Err(err) => {
                // 合流中の呼び出し元にはチャネルのクローズとして伝わる
                self.inner.slots.remove(&id);
                Err(err)
            }
        }
    }

    async fn probe_with_retry(&self, endpoint: &Endpoint) -> ProbeResult {
        let config = &self.inner.config;
        let mut attempt = 0;
        loop {
            let result = self
                .inner
                .prober
                .probe(endpoint, config.probe_timeout)
                .await;
            if !result.is_transport_failure() || attempt >= config.retry_attempts {
                return result;
            }
            attempt += 1;
            debug!(
                endpoint_id = %endpoint.id,
                attempt,
                error = ?result.error,
                "Retrying probe after transport failure"
            );
            tokio::time::sleep(config.retry_backoff).await;
        }
    }

    /// 結果をレジストリと履歴へ反映（`false` は削除済みで破棄）
    fn commit(&self, endpoint: &Endpoint, result: &ProbeResult) -> MonitorResult<bool> {
        let history = &self.inner.history;
        let committed = self
            .inner
            .registry
            .record_result_with(endpoint.id, result, |_| {
                history.append(endpoint.id, result.clone()).map(|_| ())
            });

        let stats = &self.inner.stats;
        match committed {
            Ok(_) if result.success => {
                stats.recorded.fetch_add(1, Ordering::Relaxed);
                debug!(
                    endpoint_id = %endpoint.id,
                    endpoint_name = %endpoint.name,
                    status = ?result.observed_status,
                    latency_ms = result.latency_ms,
                    "Endpoint probe succeeded"
                );
                Ok(true)
            }
            Ok(_) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    endpoint_id = %endpoint.id,
                    endpoint_name = %endpoint.name,
                    url = %endpoint.url,
                    expected_status = endpoint.expected_status,
                    status = ?result.observed_status,
                    error = ?result.error,
                    latency_ms = result.latency_ms,
                    "Endpoint probe failed"
                );
                Ok(true)
            }
            Err(MonitorError::EndpointNotFound(_)) => {
                stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    endpoint_id = %endpoint.id,
                    "Dropping probe result for endpoint deleted during probe"
                );
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// スロットを解放してから合流中の呼び出し元へ結果を配る
    fn finish(&self, id: Uuid, result: Option<ProbeResult>) {
        if let Some((_, slot)) = self.inner.slots.remove(&id) {
            let _ = slot.done.send(result);
        }
    }
}

/// 起動済みスケジューラのハンドル
pub struct SchedulerHandle {
    scheduler: ProbeScheduler,
    loop_handle: JoinHandle<MonitorResult<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// 対象のスケジューラ
    pub fn scheduler(&self) -> &ProbeScheduler {
        &self.scheduler
    }

    /// 停止してワーカーの完了を待つ
    ///
    /// キュー待ち・実行中のタスクは猶予期間内であれば最後まで処理される。
    /// 猶予を超えたワーカーは中断される。致命的エラーで停止していた場合は
    /// そのエラーを返す。
    pub async fn shutdown(self) -> MonitorResult<()> {
        let inner = &self.scheduler.inner;
        inner.shutdown.cancel();
        info!(
            pending = inner.queue.len(),
            grace_secs = inner.config.shutdown_grace.as_secs(),
            "Shutting down probe scheduler"
        );

        let loop_result = match self.loop_handle.await {
            Ok(result) => result,
            Err(e) => Err(MonitorError::Internal(format!(
                "scheduler loop task failed: {e}"
            ))),
        };

        let mut workers = self.workers;
        let drained = tokio::time::timeout(inner.config.shutdown_grace, async {
            for worker in workers.iter_mut() {
                let _ = worker.await;
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                pending = inner.queue.len(),
                "Shutdown grace period elapsed, aborting probe workers"
            );
            for worker in &workers {
                worker.abort();
            }
            // 残ったスロットを破棄して合流中の呼び出し元を解放する
            inner.slots.clear();
        }

        info!("Probe scheduler stopped");
        loop_result
    }
}
