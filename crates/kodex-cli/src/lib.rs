//! KodeX CLI 도구 모음.
//!
//! - 캔들 조회 (단일/배치)
//! - 시세/호가 조회
//! - 업스트림 호스트 상태 점검

pub mod commands;

pub use commands::MarketData;
