//! 캔들 조회 간격(타임프레임) 정의.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 캔들스틱 타임프레임.
///
/// 직렬화 형식은 거래소 간격 문자열(`"1m"`, `"4h"`, `"1d"` 등)입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Timeframe {
    /// 1분봉
    M1,
    /// 3분봉
    M3,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 2시간봉
    H2,
    /// 4시간봉
    H4,
    /// 6시간봉
    H6,
    /// 8시간봉
    H8,
    /// 12시간봉
    H12,
    /// 일봉
    D1,
    /// 3일봉
    D3,
    /// 주봉
    W1,
    /// 월봉
    MN1,
}

impl Timeframe {
    /// 기본 지원 간격 (1분 ~ 1일).
    pub const DEFAULT_SUPPORTED: [Timeframe; 12] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H8,
        Timeframe::H12,
        Timeframe::D1,
    ];

    /// 거래소 간격 문자열로 변환합니다.
    pub fn as_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H8 => "8h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::D3 => "3d",
            Timeframe::W1 => "1w",
            Timeframe::MN1 => "1M",
        }
    }

    /// 거래소 간격 문자열에서 파싱합니다.
    ///
    /// `"1M"`(월봉)과 `"1m"`(분봉)을 구분해야 하므로 대소문자를 유지합니다.
    pub fn from_interval(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Timeframe::M1),
            "3m" => Some(Timeframe::M3),
            "5m" => Some(Timeframe::M5),
            "15m" => Some(Timeframe::M15),
            "30m" => Some(Timeframe::M30),
            "1h" => Some(Timeframe::H1),
            "2h" => Some(Timeframe::H2),
            "4h" => Some(Timeframe::H4),
            "6h" => Some(Timeframe::H6),
            "8h" => Some(Timeframe::H8),
            "12h" => Some(Timeframe::H12),
            "1d" => Some(Timeframe::D1),
            "3d" => Some(Timeframe::D3),
            "1w" => Some(Timeframe::W1),
            "1M" => Some(Timeframe::MN1),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_interval())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_interval(s.trim()).ok_or_else(|| format!("unknown interval '{}'", s.trim()))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for &'static str {
    fn from(tf: Timeframe) -> Self {
        tf.as_interval()
    }
}
