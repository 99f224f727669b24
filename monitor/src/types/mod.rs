//! 型定義

/// エンドポイント型定義
pub mod endpoint;

/// プローブ結果型定義
pub mod probe;

pub use endpoint::{Endpoint, EndpointSpec, ProbeMethod};
pub use probe::{ProbeErrorKind, ProbeResult};
