//! 캔들 조회 요청과 입력 검증.

use kodex_core::{MarketDataConfig, Timeframe};
use serde::{Deserialize, Serialize};

use crate::{connector::binance, error::FetchError};

/// 심볼 최대 길이.
const MAX_SYMBOL_LEN: usize = 20;

/// 호가창 조회 limit 범위.
pub const DEPTH_LIMIT_RANGE: std::ops::RangeInclusive<u32> = 5..=5000;

/// 캐시 가능한 업스트림 작업.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Klines,
}

impl Operation {
    /// REST 경로.
    pub fn path(&self) -> &'static str {
        match self {
            Operation::Klines => binance::KLINES_PATH,
        }
    }
}

/// 호출자가 보낸 그대로의(검증 전) 캔들 조회 파라미터.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KlineQuery {
    pub symbol: String,
    pub interval: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub start_time: Option<i64>,
}

impl KlineQuery {
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            limit: None,
            start_time: None,
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_start_time(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }
}

/// 검증된 캔들 조회 요청. 캐시 키로도 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FetchRequest {
    pub operation: Operation,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub limit: u32,
    pub start_time: Option<i64>,
}

impl FetchRequest {
    /// 업스트림 쿼리 파라미터.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", self.symbol.clone()),
            ("interval", self.timeframe.as_interval().to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(start) = self.start_time {
            params.push(("startTime", start.to_string()));
        }
        params
    }
}

/// 요청 검증 규칙.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLimits {
    pub supported: Vec<Timeframe>,
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            supported: Timeframe::DEFAULT_SUPPORTED.to_vec(),
            default_limit: 200,
            max_limit: 1000,
        }
    }
}

impl From<&MarketDataConfig> for RequestLimits {
    fn from(config: &MarketDataConfig) -> Self {
        Self {
            supported: config.supported_intervals.clone(),
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        }
    }
}

impl RequestLimits {
    /// 검증 후 캐시 키가 될 요청을 만듭니다.
    ///
    /// limit이 없으면 기본값, `max_limit`을 넘으면 `max_limit`으로 잘립니다.
    pub fn validate(&self, query: &KlineQuery) -> Result<FetchRequest, FetchError> {
        let symbol = normalize_symbol(&query.symbol)?;
        let timeframe = self.timeframe(&query.interval)?;

        let limit = match query.limit {
            None => self.default_limit.min(self.max_limit),
            Some(l) if l < 1 => {
                return Err(FetchError::invalid(format!("limit must be >= 1, got {}", l)))
            }
            Some(l) => u32::try_from(l).unwrap_or(u32::MAX).min(self.max_limit),
        };

        if let Some(start) = query.start_time {
            if start < 0 {
                return Err(FetchError::invalid(format!(
                    "start_time must be non-negative epoch milliseconds, got {}",
                    start
                )));
            }
        }

        Ok(FetchRequest {
            operation: Operation::Klines,
            symbol,
            timeframe,
            limit,
            start_time: query.start_time,
        })
    }

    /// 지원 간격인지 확인하며 파싱합니다.
    ///
    /// 입력 그대로 먼저 찾고, 없으면 소문자로 다시 찾습니다. `"1M"`은 월봉이
    /// 지원 목록에 있을 때만 월봉이며 그 외에는 `"1m"`으로 취급됩니다.
    pub fn timeframe(&self, interval: &str) -> Result<Timeframe, FetchError> {
        let interval = interval.trim();
        let supported = |candidate: &str| {
            Timeframe::from_interval(candidate).filter(|tf| self.supported.contains(tf))
        };

        supported(interval)
            .or_else(|| supported(&interval.to_ascii_lowercase()))
            .ok_or_else(|| FetchError::invalid(format!("unsupported interval '{}'", interval)))
    }
}

/// 심볼 정규화: 공백 제거, 대문자, 영숫자만 허용.
pub fn normalize_symbol(raw: &str) -> Result<String, FetchError> {
    let symbol = raw.trim().to_ascii_uppercase();

    if symbol.is_empty() {
        return Err(FetchError::invalid("symbol is empty"));
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(FetchError::invalid(format!(
            "symbol '{}' is longer than {} characters",
            symbol, MAX_SYMBOL_LEN
        )));
    }
    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(FetchError::invalid(format!(
            "symbol '{}' must be alphanumeric",
            symbol
        )));
    }
    Ok(symbol)
}

/// 쉼표로 구분된 심볼 목록 파싱. 빈 항목은 버립니다.
pub fn parse_symbol_list(raw: &str) -> Result<Vec<String>, FetchError> {
    let symbols = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(normalize_symbol)
        .collect::<Result<Vec<_>, _>>()?;

    if symbols.is_empty() {
        return Err(FetchError::invalid("symbols list is empty"));
    }
    Ok(symbols)
}

/// 호가창 limit 검증.
pub fn validate_depth_limit(limit: u32) -> Result<u32, FetchError> {
    if DEPTH_LIMIT_RANGE.contains(&limit) {
        Ok(limit)
    } else {
        Err(FetchError::invalid(format!(
            "depth limit must be between {} and {}, got {}",
            DEPTH_LIMIT_RANGE.start(),
            DEPTH_LIMIT_RANGE.end(),
            limit
        )))
    }
}
