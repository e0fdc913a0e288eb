//! 설정 관리.
//!
//! 기본값 → (선택) TOML 파일 → `KODEX__` 접두사 환경 변수 순으로 병합합니다.
//!
//! ```text
//! KODEX__LOGGING__LEVEL=debug
//! KODEX__MARKET_DATA__HOSTS=https://api.binance.com,https://data-api.binance.vision
//! KODEX__MARKET_DATA__TOTAL_DEADLINE_MS=5000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::types::Timeframe;

/// 환경 변수 접두사.
pub const ENV_PREFIX: &str = "KODEX";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 마켓 데이터 수집 설정
    pub market_data: MarketDataConfig,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨 필터 (예: "info", "kodex_exchange=debug")
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 업스트림 마켓 데이터 수집 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketDataConfig {
    /// 업스트림 REST 기본 URL 목록 (순서대로 로테이션)
    pub hosts: Vec<String>,
    /// 호스트 1회 시도당 타임아웃 (밀리초)
    pub per_attempt_timeout_ms: u64,
    /// 논리적 요청 1건의 전체 제한 시간 (밀리초)
    pub total_deadline_ms: u64,
    /// 최대 재시도 횟수 (첫 시도 제외, 호스트 수로 상한)
    pub max_retries: u32,
    /// 429 응답 시 첫 백오프 (밀리초)
    pub backoff_base_ms: u64,
    /// 백오프 상한 (밀리초)
    pub backoff_max_ms: u64,
    /// 백오프 배수
    pub backoff_multiplier: f64,
    /// 캔들 응답 캐시 TTL (밀리초)
    pub cache_ttl_ms: u64,
    /// 캐시 최대 항목 수 (없으면 무제한)
    pub cache_capacity: Option<usize>,
    /// 허용 타임프레임
    pub supported_intervals: Vec<Timeframe>,
    /// limit 미지정 시 기본 캔들 수
    pub default_limit: u32,
    /// 요청당 최대 캔들 수
    pub max_limit: u32,
    /// User-Agent 헤더
    pub user_agent: String,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            hosts: vec![
                "https://api.binance.com".to_string(),
                "https://api1.binance.com".to_string(),
                "https://api2.binance.com".to_string(),
                "https://api3.binance.com".to_string(),
                "https://data-api.binance.vision".to_string(),
            ],
            per_attempt_timeout_ms: 2_500,
            total_deadline_ms: 8_000,
            max_retries: 4,
            backoff_base_ms: 500,
            backoff_max_ms: 4_000,
            backoff_multiplier: 2.0,
            cache_ttl_ms: 10_000,
            cache_capacity: None,
            supported_intervals: Timeframe::DEFAULT_SUPPORTED.to_vec(),
            default_limit: 200,
            max_limit: 1000,
            user_agent: "KodeX-Live/2.1".to_string(),
        }
    }
}

impl MarketDataConfig {
    pub fn per_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.per_attempt_timeout_ms)
    }

    pub fn total_deadline(&self) -> Duration {
        Duration::from_millis(self.total_deadline_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// 설정 값 검증.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.hosts.is_empty() {
            return Err(ConfigurationError::EmptyHostPool);
        }
        if let Some(bad) = self
            .hosts
            .iter()
            .find(|h| !(h.starts_with("http://") || h.starts_with("https://")))
        {
            return Err(ConfigurationError::InvalidHost(bad.clone()));
        }
        if self.per_attempt_timeout_ms == 0 {
            return Err(ConfigurationError::invalid(
                "per_attempt_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.total_deadline_ms == 0 {
            return Err(ConfigurationError::invalid(
                "total_deadline_ms",
                "must be greater than zero",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid(
                "backoff_multiplier",
                format!("must be >= 1.0, got {}", self.backoff_multiplier),
            ));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(ConfigurationError::invalid(
                "backoff_base_ms",
                "must not exceed backoff_max_ms",
            ));
        }
        if self.max_limit == 0 {
            return Err(ConfigurationError::invalid(
                "max_limit",
                "must be greater than zero",
            ));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(ConfigurationError::invalid(
                "default_limit",
                format!("must be within 1..={}", self.max_limit),
            ));
        }
        if self.supported_intervals.is_empty() {
            return Err(ConfigurationError::invalid(
                "supported_intervals",
                "at least one interval is required",
            ));
        }
        if self.cache_capacity == Some(0) {
            return Err(ConfigurationError::invalid(
                "cache_capacity",
                "use no value for an unbounded cache instead of 0",
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// 설정 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        Self::load_optional(Some(path.as_ref()))
    }

    /// 설정 파일 없이 (또는 선택적으로) 로드합니다.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("market_data.hosts")
                    .with_list_parse_key("market_data.supported_intervals"),
            )
            .build()?;

        let app: AppConfig = settings.try_deserialize()?;
        app.market_data.validate()?;
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = MarketDataConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hosts.len(), 5);
        assert_eq!(config.total_deadline(), Duration::from_secs(8));
        assert_eq!(config.per_attempt_timeout(), Duration::from_millis(2500));
        assert_eq!(config.max_limit, 1000);
    }

    #[test]
    fn test_validate_rejects_empty_hosts() {
        let config = MarketDataConfig {
            hosts: vec![],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::EmptyHostPool)
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_host = MarketDataConfig {
            hosts: vec!["api.binance.com".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            bad_host.validate(),
            Err(ConfigurationError::InvalidHost(_))
        ));

        let bad_multiplier = MarketDataConfig {
            backoff_multiplier: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            bad_multiplier.validate(),
            Err(ConfigurationError::InvalidSetting {
                field: "backoff_multiplier",
                ..
            })
        ));

        let bad_limit = MarketDataConfig {
            default_limit: 2000,
            ..Default::default()
        };
        assert!(matches!(
            bad_limit.validate(),
            Err(ConfigurationError::InvalidSetting {
                field: "default_limit",
                ..
            })
        ));
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
        let config = AppConfig::load(path).unwrap();

        let defaults = MarketDataConfig::default();
        assert_eq!(config.market_data.hosts, defaults.hosts);
        assert_eq!(config.market_data.supported_intervals, defaults.supported_intervals);
        assert_eq!(config.market_data.user_agent, defaults.user_agent);
        assert_eq!(config.market_data.cache_ttl(), defaults.cache_ttl());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("kodex-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("relay.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[logging]
level = "debug"
format = "json"

[market_data]
hosts = ["https://a.example", "https://b.example"]
total_deadline_ms = 3000
supported_intervals = ["1m", "1h"]
"#
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.market_data.hosts.len(), 2);
        assert_eq!(config.market_data.total_deadline_ms, 3000);
        assert_eq!(
            config.market_data.supported_intervals,
            vec![Timeframe::M1, Timeframe::H1]
        );
        // 파일에 없는 값은 기본값 유지
        assert_eq!(config.market_data.max_limit, 1000);

        std::fs::remove_dir_all(&dir).ok();
    }
}
