//! 설정 관련 에러 타입.

use thiserror::Error;

/// 설정이 잘못되었거나 로드할 수 없을 때 발생하는 에러.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// 업스트림 호스트 목록이 비어 있음
    #[error("host pool must contain at least one host")]
    EmptyHostPool,

    /// 호스트 URL 형식 오류
    #[error("invalid host '{0}': expected an http:// or https:// base URL")]
    InvalidHost(String),

    /// 개별 설정 값 오류
    #[error("invalid setting `{field}`: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    /// 설정 소스 로드 실패
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl ConfigurationError {
    /// `InvalidSetting` 생성 헬퍼.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConfigurationError::invalid("total_deadline_ms", "must be > 0");
        assert_eq!(
            err.to_string(),
            "invalid setting `total_deadline_ms`: must be > 0"
        );
        assert_eq!(
            ConfigurationError::EmptyHostPool.to_string(),
            "host pool must contain at least one host"
        );
    }
}
