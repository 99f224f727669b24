//! エンドポイント登録管理
//!
//! エンドポイントの状態をメモリ内で管理する

pub mod endpoints;

pub use endpoints::EndpointRegistry;
