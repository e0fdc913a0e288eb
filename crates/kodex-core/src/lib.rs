//! # KodeX Core
//!
//! 마켓 데이터 릴레이의 핵심 타입과 공통 인프라를 제공합니다.
//!
//! - 타임프레임 및 정규화된 캔들 / 시세 / 호가 타입
//! - 설정 로딩 및 검증
//! - 로깅 인프라
//! - 선택적 구성요소의 시작 시점 등록 (capability)

pub mod capability;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use capability::{CapabilityRegistry, CapabilityStatus};
pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;
