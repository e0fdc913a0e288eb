//! tracing 기반 로깅 초기화.
//!
//! - **pretty**: 개발용 멀티라인 형식
//! - **json**: 로그 수집기용 JSON 형식
//! - **compact**: 한 줄 형식

use std::io;

use tracing::Subscriber;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter,
};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!("Unknown log format: {}", other)),
        }
    }
}

/// 로깅 초기화 옵션.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 필터 지시문. `RUST_LOG`가 설정되어 있으면 그쪽이 우선합니다.
    pub level: String,
    pub format: LogFormat,
    /// 파일명/줄 번호 포함 여부
    pub with_file: bool,
    /// 대상(모듈 경로) 포함 여부
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_file: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }
}

impl From<&LoggingConfig> for LogConfig {
    /// 알 수 없는 형식 문자열은 pretty로 대체합니다.
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: config.format.parse().unwrap_or_default(),
            ..Default::default()
        }
    }
}

type StderrWriter = fn() -> io::Stderr;

// stdout은 명령 출력용이므로 로그는 stderr로 보낸다
fn fmt_layer<S>(
    config: &LogConfig,
) -> fmt::Layer<S, fmt::format::DefaultFields, fmt::format::Format, StderrWriter>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(io::stderr as StderrWriter)
        .with_file(config.with_file)
        .with_line_number(config.with_file)
        .with_target(config.with_target)
}

/// 전역 subscriber를 설치합니다.
///
/// 이미 설치되어 있으면 에러를 반환합니다.
///
/// ```no_run
/// use kodex_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("kodex_exchange=debug").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    // 형식별 레이어 중 하나만 Some이 된다.
    let pretty = (config.format == LogFormat::Pretty).then(|| fmt_layer(&config).pretty());
    let json = (config.format == LogFormat::Json).then(|| fmt_layer(&config).json());
    let compact = (config.format == LogFormat::Compact).then(|| fmt_layer(&config).compact());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty)
        .with(json)
        .with(compact)
        .try_init()?;

    tracing::debug!(format = ?config.format, level = %config.level, "Logging initialized");
    Ok(())
}
