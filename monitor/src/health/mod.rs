//! ヘルスチェックモニター
//!
//! プル型ヘルスチェックでエンドポイントの稼働状況を監視する。
//! プローブの発行（`prober`）とスケジューリング（`scheduler`）を分離し、
//! 照会系は `query` にまとめる。

pub mod prober;
pub mod query;
pub mod scheduler;

pub use prober::{HttpProber, Prober};
pub use query::HealthQueryService;
pub use scheduler::{ProbeScheduler, SchedulerConfig, SchedulerHandle, SlotState};
