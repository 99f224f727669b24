//! テスト共通ユーティリティ

#![allow(dead_code)]

pub mod http;
pub mod monitor;
