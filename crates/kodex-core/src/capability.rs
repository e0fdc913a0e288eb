//! 선택적 구성요소의 시작 시점 등록.
//!
//! 구성요소마다 초기화 결과를 한 번만 기록/로그하고, 이후에는 호출마다
//! 에러를 삼키는 대신 등록 결과를 조회합니다.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

/// 구성요소 하나의 초기화 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityStatus {
    pub name: String,
    pub enabled: bool,
    /// 비활성화 사유 (실패 시)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// 구성요소 등록부.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    entries: Vec<CapabilityStatus>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기화 결과를 등록하고 성공 시 값을 돌려줍니다.
    ///
    /// 같은 이름으로 다시 등록하면 이전 결과를 덮어씁니다.
    pub fn register<T, E: fmt::Display>(
        &mut self,
        name: &str,
        result: Result<T, E>,
    ) -> Option<T> {
        let (status, value) = match result {
            Ok(value) => {
                info!(capability = name, "capability enabled");
                (
                    CapabilityStatus {
                        name: name.to_string(),
                        enabled: true,
                        reason: None,
                    },
                    Some(value),
                )
            }
            Err(e) => {
                warn!(capability = name, error = %e, "capability disabled");
                (
                    CapabilityStatus {
                        name: name.to_string(),
                        enabled: false,
                        reason: Some(e.to_string()),
                    },
                    None,
                )
            }
        };

        self.entries.retain(|s| s.name != name);
        self.entries.push(status);
        value
    }

    /// 구성요소 활성화 여부.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).is_some_and(|s| s.enabled)
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityStatus> {
        self.entries.iter().find(|s| s.name == name)
    }

    /// 등록 순서대로 전체 결과.
    pub fn statuses(&self) -> &[CapabilityStatus] {
        &self.entries
    }
}
