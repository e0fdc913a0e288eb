//! 마켓 데이터 수집 에러 타입.

use std::fmt;

use kodex_core::ConfigurationError;
use serde::Serialize;
use thiserror::Error;

/// 호스트 1회 시도 실패의 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptErrorKind {
    /// HTTP 429 - 백오프 후 다음 호스트
    RateLimited,
    /// HTTP 451 - 지역 차단, 즉시 다음 호스트
    RegionBlocked,
    /// 그 외 200이 아닌 상태 코드
    HttpStatus(u16),
    /// 시도 타임아웃
    Timeout,
    /// 연결/DNS 등 네트워크 실패
    Network,
    /// 응답 형식이 예상과 다름
    Protocol,
    /// 시도하기 전에 전체 제한 시간이 소진됨
    DeadlineExceeded,
}

impl AttemptErrorKind {
    /// 200이 아닌 HTTP 상태 코드 분류.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => AttemptErrorKind::RateLimited,
            451 => AttemptErrorKind::RegionBlocked,
            other => AttemptErrorKind::HttpStatus(other),
        }
    }

    /// 다음 호스트로 넘어가기 전에 백오프가 필요한지.
    pub fn needs_backoff(&self) -> bool {
        matches!(self, AttemptErrorKind::RateLimited)
    }
}

impl fmt::Display for AttemptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptErrorKind::RateLimited => f.write_str("rate_limited"),
            AttemptErrorKind::RegionBlocked => f.write_str("region_blocked"),
            AttemptErrorKind::HttpStatus(code) => write!(f, "http_{}", code),
            AttemptErrorKind::Timeout => f.write_str("timeout"),
            AttemptErrorKind::Network => f.write_str("network"),
            AttemptErrorKind::Protocol => f.write_str("protocol"),
            AttemptErrorKind::DeadlineExceeded => f.write_str("deadline_exceeded"),
        }
    }
}

/// 특정 호스트에서의 실패 한 건.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} from {host}: {message}")]
pub struct AttemptError {
    pub host: String,
    pub kind: AttemptErrorKind,
    pub message: String,
}

impl AttemptError {
    pub fn new(
        host: impl Into<String>,
        kind: AttemptErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            kind,
            message: message.into(),
        }
    }
}

/// 응답 본문이 예상 스키마와 다를 때.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ProtocolError(pub String);

impl ProtocolError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError(format!("invalid JSON: {}", err))
    }
}

/// HTTP 전송 계층 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),
}

impl TransportError {
    pub fn kind(&self) -> AttemptErrorKind {
        match self {
            TransportError::Timeout(_) => AttemptErrorKind::Timeout,
            TransportError::Network(_) => AttemptErrorKind::Network,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// 논리적 요청 1건의 최종 실패.
///
/// 시도별 실패는 내부에서 분류/로테이션되며, 예산이 소진된 뒤에만 이 타입으로
/// 호출자에게 전달됩니다.
#[derive(Debug, Error)]
pub enum FetchError {
    /// 잘못된 심볼/간격/limit. 네트워크 호출 전에 검출됨.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// 모든 호스트 실패 또는 제한 시간 초과.
    #[error(
        "upstream unavailable after {attempts_made} attempt(s): last {last_error_kind} from {}: {message}",
        .last_host.as_deref().unwrap_or("-")
    )]
    UpstreamUnavailable {
        last_host: Option<String>,
        last_error_kind: AttemptErrorKind,
        attempts_made: usize,
        message: String,
    },

    /// 시도한 모든 호스트가 형식이 맞지 않는 응답을 반환.
    #[error("upstream protocol error from {host} after {attempts_made} attempt(s): {detail}")]
    UpstreamProtocolError {
        host: String,
        detail: String,
        attempts_made: usize,
    },

    /// 클라이언트 구성 실패.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl FetchError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        FetchError::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// 마지막 시도 실패 분류 (업스트림 에러일 때).
    pub fn last_error_kind(&self) -> Option<AttemptErrorKind> {
        match self {
            FetchError::UpstreamUnavailable {
                last_error_kind, ..
            } => Some(*last_error_kind),
            FetchError::UpstreamProtocolError { .. } => Some(AttemptErrorKind::Protocol),
            _ => None,
        }
    }

    /// 시도한 호스트 수.
    pub fn attempts_made(&self) -> usize {
        match self {
            FetchError::UpstreamUnavailable { attempts_made, .. }
            | FetchError::UpstreamProtocolError { attempts_made, .. } => *attempts_made,
            _ => 0,
        }
    }

    /// 호출자가 나중에 다시 시도해 볼 만한 에러인지.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::UpstreamUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(AttemptErrorKind::from_status(429), AttemptErrorKind::RateLimited);
        assert_eq!(AttemptErrorKind::from_status(451), AttemptErrorKind::RegionBlocked);
        assert_eq!(AttemptErrorKind::from_status(503), AttemptErrorKind::HttpStatus(503));
        assert!(AttemptErrorKind::RateLimited.needs_backoff());
        assert!(!AttemptErrorKind::RegionBlocked.needs_backoff());
        assert!(!AttemptErrorKind::HttpStatus(418).needs_backoff());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(AttemptErrorKind::HttpStatus(502).to_string(), "http_502");
        assert_eq!(AttemptErrorKind::RegionBlocked.to_string(), "region_blocked");
    }

    #[test]
    fn test_fetch_error_display_and_accessors() {
        let err = FetchError::UpstreamUnavailable {
            last_host: Some("https://api1.binance.com".to_string()),
            last_error_kind: AttemptErrorKind::RegionBlocked,
            attempts_made: 3,
            message: "HTTP 451".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "upstream unavailable after 3 attempt(s): last region_blocked from https://api1.binance.com: HTTP 451"
        );
        assert_eq!(err.last_error_kind(), Some(AttemptErrorKind::RegionBlocked));
        assert_eq!(err.attempts_made(), 3);
        assert!(err.is_transient());

        let invalid = FetchError::invalid("limit must be >= 1");
        assert_eq!(invalid.last_error_kind(), None);
        assert!(!invalid.is_transient());
    }
}
