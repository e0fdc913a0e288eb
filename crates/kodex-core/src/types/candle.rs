//! 정규화된 캔들(OHLCV) 타입.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 캔들 불변식 위반.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleError {
    /// NaN 또는 무한대 값
    #[error("field `{field}` is not finite ({value})")]
    NonFinite { field: &'static str, value: f64 },

    /// open_time >= close_time
    #[error("open_time {open_time} is not before close_time {close_time}")]
    TimeOrder { open_time: i64, close_time: i64 },
}

/// 거래소 원시 필드 순서와 무관한 고정 필드 OHLCV 레코드.
///
/// 시간은 epoch 밀리초입니다. 생성 시 `open_time < close_time`이고
/// 모든 가격/거래량이 유한한 값임이 보장됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCandle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
}

impl NormalizedCandle {
    /// 불변식을 검증하며 캔들을 생성합니다.
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Result<Self, CandleError> {
        let candle = Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time,
        };
        candle.validate()?;
        Ok(candle)
    }

    /// 불변식 검증.
    pub fn validate(&self) -> Result<(), CandleError> {
        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ] {
            if !value.is_finite() {
                return Err(CandleError::NonFinite { field, value });
            }
        }

        if self.open_time >= self.close_time {
            return Err(CandleError::TimeOrder {
                open_time: self.open_time,
                close_time: self.close_time,
            });
        }

        Ok(())
    }

    /// 시작 시각 (UTC).
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.open_time)
    }

    /// 종료 시각 (UTC).
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.close_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_candle() {
        let candle = NormalizedCandle::new(
            1_700_000_000_000,
            100.0,
            105.0,
            99.0,
            103.0,
            50.5,
            1_700_000_059_999,
        )
        .unwrap();

        assert_eq!(candle.close, 103.0);
        assert_eq!(
            candle.opened_at().unwrap().to_rfc3339(),
            "2023-11-14T22:13:20+00:00"
        );
    }

    #[test]
    fn test_rejects_inverted_times() {
        let err = NormalizedCandle::new(2000, 1.0, 1.0, 1.0, 1.0, 1.0, 2000).unwrap_err();
        assert_eq!(
            err,
            CandleError::TimeOrder {
                open_time: 2000,
                close_time: 2000
            }
        );
    }

    #[test]
    fn test_rejects_non_finite() {
        let err = NormalizedCandle::new(0, 1.0, f64::INFINITY, 1.0, 1.0, 1.0, 10).unwrap_err();
        assert!(matches!(err, CandleError::NonFinite { field: "high", .. }));

        let err = NormalizedCandle::new(0, 1.0, 1.0, 1.0, 1.0, f64::NAN, 10).unwrap_err();
        assert!(matches!(err, CandleError::NonFinite { field: "volume", .. }));
    }

    proptest::proptest! {
        #[test]
        fn prop_time_order_decides_validity(
            open_time in 0i64..4_000_000_000_000,
            span in -120_000i64..120_000,
            price in 0.0f64..1e9,
        ) {
            let result = NormalizedCandle::new(
                open_time, price, price, price, price, price, open_time + span,
            );
            proptest::prop_assert_eq!(result.is_ok(), span > 0);
        }
    }
}
