//! Binance 호환 REST 응답 디코딩.
//!
//! 모든 호스트가 같은 스키마를 제공한다고 가정합니다. 디코딩 실패는
//! [`ProtocolError`]로 보고되며 클라이언트는 이를 해당 호스트의 실패로
//! 분류하고 다음 호스트로 넘어갑니다.

use kodex_core::{AvgPrice, BookTicker, DepthSnapshot, NormalizedCandle, PriceLevel, TickerPrice};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ProtocolError;

pub const KLINES_PATH: &str = "/api/v3/klines";
pub const TICKER_PRICE_PATH: &str = "/api/v3/ticker/price";
pub const DEPTH_PATH: &str = "/api/v3/depth";
pub const BOOK_TICKER_PATH: &str = "/api/v3/ticker/bookTicker";
pub const AVG_PRICE_PATH: &str = "/api/v3/avgPrice";
pub const SERVER_TIME_PATH: &str = "/api/v3/time";
pub const PING_PATH: &str = "/api/v3/ping";

/// 캔들 레코드 최소 필드 수.
const KLINE_MIN_ARITY: usize = 7;

// ============================================================================
// Binance 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct BinanceError {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct BinanceTickerPrice {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceDepth {
    last_update_id: i64,
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceBookTicker {
    symbol: String,
    bid_price: String,
    bid_qty: String,
    ask_price: String,
    ask_qty: String,
}

#[derive(Debug, Deserialize)]
struct BinanceAvgPrice {
    mins: u32,
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceServerTime {
    server_time: i64,
}

// ============================================================================
// 디코딩
// ============================================================================

/// 캔들 응답을 정규화합니다.
///
/// 레코드 하나라도 잘못되면 응답 전체를 거부합니다. 결과는 `open_time`
/// 오름차순이며 `limit`개를 넘지 않습니다. `anchored_start`이면(시작 시각
/// 지정) 앞쪽을, 아니면 가장 최근 쪽을 남깁니다.
pub fn parse_klines(
    body: &str,
    limit: usize,
    anchored_start: bool,
) -> Result<Vec<NormalizedCandle>, ProtocolError> {
    let value = parse_json(body)?;
    let records = value.as_array().ok_or_else(|| {
        ProtocolError::new(format!("expected kline array, got {}", type_name(&value)))
    })?;

    let mut candles = records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            parse_kline_record(record)
                .map_err(|e| ProtocolError(format!("record {}: {}", idx, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    candles.sort_by_key(|c| c.open_time);

    if candles.len() > limit {
        if anchored_start {
            candles.truncate(limit);
        } else {
            candles.drain(..candles.len() - limit);
        }
    }

    Ok(candles)
}

fn parse_kline_record(record: &Value) -> Result<NormalizedCandle, ProtocolError> {
    let fields = record
        .as_array()
        .ok_or_else(|| ProtocolError::new(format!("expected array, got {}", type_name(record))))?;

    if fields.len() < KLINE_MIN_ARITY {
        return Err(ProtocolError::new(format!(
            "expected at least {} fields, got {}",
            KLINE_MIN_ARITY,
            fields.len()
        )));
    }

    NormalizedCandle::new(
        value_i64(&fields[0], "open_time")?,
        value_f64(&fields[1], "open")?,
        value_f64(&fields[2], "high")?,
        value_f64(&fields[3], "low")?,
        value_f64(&fields[4], "close")?,
        value_f64(&fields[5], "volume")?,
        value_i64(&fields[6], "close_time")?,
    )
    .map_err(|e| ProtocolError::new(e.to_string()))
}

pub fn parse_ticker_price(body: &str) -> Result<TickerPrice, ProtocolError> {
    let raw: BinanceTickerPrice = decode(body)?;
    Ok(TickerPrice {
        price: parse_finite(&raw.price, "price")?,
        symbol: raw.symbol,
    })
}

pub fn parse_depth(body: &str, symbol: &str) -> Result<DepthSnapshot, ProtocolError> {
    let raw: BinanceDepth = decode(body)?;
    Ok(DepthSnapshot {
        symbol: symbol.to_string(),
        last_update_id: raw.last_update_id,
        bids: parse_levels(&raw.bids, "bids")?,
        asks: parse_levels(&raw.asks, "asks")?,
    })
}

pub fn parse_book_ticker(body: &str) -> Result<BookTicker, ProtocolError> {
    let raw: BinanceBookTicker = decode(body)?;
    Ok(BookTicker {
        bid_price: parse_finite(&raw.bid_price, "bidPrice")?,
        bid_qty: parse_finite(&raw.bid_qty, "bidQty")?,
        ask_price: parse_finite(&raw.ask_price, "askPrice")?,
        ask_qty: parse_finite(&raw.ask_qty, "askQty")?,
        symbol: raw.symbol,
    })
}

pub fn parse_avg_price(body: &str, symbol: &str) -> Result<AvgPrice, ProtocolError> {
    let raw: BinanceAvgPrice = decode(body)?;
    Ok(AvgPrice {
        symbol: symbol.to_string(),
        mins: raw.mins,
        price: parse_finite(&raw.price, "price")?,
    })
}

/// 서버 시각 (epoch 밀리초).
pub fn parse_server_time(body: &str) -> Result<i64, ProtocolError> {
    let raw: BinanceServerTime = decode(body)?;
    Ok(raw.server_time)
}

/// ping 응답은 빈 JSON 객체.
pub fn parse_ping(body: &str) -> Result<(), ProtocolError> {
    let value = parse_json(body)?;
    if value.is_object() {
        Ok(())
    } else {
        Err(ProtocolError::new(format!(
            "expected empty object, got {}",
            type_name(&value)
        )))
    }
}

// ============================================================================
// 헬퍼
// ============================================================================

/// JSON 파싱 후 200 응답에 실린 Binance 에러 객체를 걸러냅니다.
fn parse_json(body: &str) -> Result<Value, ProtocolError> {
    let value: Value = serde_json::from_str(body)?;

    if value.get("code").is_some() && value.get("msg").is_some() {
        if let Ok(error) = serde_json::from_value::<BinanceError>(value.clone()) {
            return Err(ProtocolError::new(format!(
                "binance error {}: {}",
                error.code, error.msg
            )));
        }
    }
    Ok(value)
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, ProtocolError> {
    let value = parse_json(body)?;
    serde_json::from_value(value)
        .map_err(|e| ProtocolError::new(format!("unexpected shape: {}", e)))
}

fn parse_levels(levels: &[(String, String)], side: &str) -> Result<Vec<PriceLevel>, ProtocolError> {
    levels
        .iter()
        .map(|(price, quantity)| {
            Ok(PriceLevel {
                price: parse_finite(price, side)?,
                quantity: parse_finite(quantity, side)?,
            })
        })
        .collect()
}

fn parse_finite(raw: &str, field: &str) -> Result<f64, ProtocolError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ProtocolError::new(format!("field `{}` is not numeric: {:?}", field, raw)))?;
    if !value.is_finite() {
        return Err(ProtocolError::new(format!(
            "field `{}` is not finite: {:?}",
            field, raw
        )));
    }
    Ok(value)
}

/// 숫자 또는 숫자 문자열을 f64로. 유한성은 캔들 생성 시 검증됩니다.
fn value_f64(value: &Value, field: &str) -> Result<f64, ProtocolError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ProtocolError::new(format!("field `{}` is out of range", field))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| ProtocolError::new(format!("field `{}` is not numeric: {:?}", field, s))),
        other => Err(ProtocolError::new(format!(
            "field `{}` has unexpected type {}",
            field,
            type_name(other)
        ))),
    }
}

fn value_i64(value: &Value, field: &str) -> Result<i64, ProtocolError> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| {
            ProtocolError::new(format!("field `{}` is not an integer: {}", field, n))
        }),
        Value::String(s) => s.trim().parse().map_err(|_| {
            ProtocolError::new(format!("field `{}` is not an integer: {:?}", field, s))
        }),
        other => Err(ProtocolError::new(format!(
            "field `{}` has unexpected type {}",
            field,
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[[1700000000000,"100.0","105.0","99.0","103.0","50.5",1700000059999,"0",10,"0","0","0"]]"#;

    #[test]
    fn test_sample_record_normalized() {
        let candles = parse_klines(SAMPLE, 200, false).unwrap();
        assert_eq!(
            candles,
            vec![NormalizedCandle {
                open_time: 1_700_000_000_000,
                open: 100.0,
                high: 105.0,
                low: 99.0,
                close: 103.0,
                volume: 50.5,
                close_time: 1_700_000_059_999,
            }]
        );
    }

    #[test]
    fn test_numeric_fields_accepted() {
        let body = r#"[[1000, 1.5, 2, 1, 1.75, 10, 1999]]"#;
        let candles = parse_klines(body, 10, false).unwrap();
        assert_eq!(candles[0].high, 2.0);
        assert_eq!(candles[0].close_time, 1999);
    }

    #[test]
    fn test_empty_array_accepted() {
        assert!(parse_klines("[]", 10, false).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_rejected() {
        let cases = [
            (r#"[[1000,"abc","2","1","1","1",1999]]"#, "not numeric"),
            (r#"[[1000,"1","2","1","1","1"]]"#, "at least 7"),
            (r#"[[1000,"1","2","1","1","NaN",1999]]"#, "not finite"),
            (r#"[[2000,"1","2","1","1","1",1000]]"#, "not before"),
            (r#"[[1000,"1","2","1","1",null,1999]]"#, "unexpected type"),
            (r#"{"data":[]}"#, "expected kline array"),
            (r#"[1,2,3]"#, "expected array"),
            ("<html>blocked</html>", "invalid JSON"),
        ];

        for (body, expected) in cases {
            let err = parse_klines(body, 10, false).unwrap_err();
            assert!(
                err.0.contains(expected),
                "body {} -> {} (expected '{}')",
                body,
                err,
                expected
            );
        }
    }

    #[test]
    fn test_one_bad_record_rejects_whole_response() {
        let body = r#"[[1000,"1","2","1","1","1",1999],[2000,"1","2","1","x","1",2999]]"#;
        let err = parse_klines(body, 10, false).unwrap_err();
        assert!(err.0.starts_with("record 1"));
    }

    #[test]
    fn test_binance_error_object_is_protocol_error() {
        let err = parse_klines(r#"{"code":-1121,"msg":"Invalid symbol."}"#, 10, false).unwrap_err();
        assert_eq!(err.0, "binance error -1121: Invalid symbol.");

        let err = parse_ticker_price(r#"{"code":-1003,"msg":"Too many requests"}"#).unwrap_err();
        assert!(err.0.contains("-1003"));
    }

    #[test]
    fn test_sorted_and_truncated() {
        let body = r#"[
            [3000,"3","3","3","3","1",3999],
            [1000,"1","1","1","1","1",1999],
            [2000,"2","2","2","2","1",2999]
        ]"#;

        let latest = parse_klines(body, 2, false).unwrap();
        assert_eq!(
            latest.iter().map(|c| c.open_time).collect::<Vec<_>>(),
            vec![2000, 3000]
        );

        let anchored = parse_klines(body, 2, true).unwrap();
        assert_eq!(
            anchored.iter().map(|c| c.open_time).collect::<Vec<_>>(),
            vec![1000, 2000]
        );
    }

    #[test]
    fn test_ticker_and_book_ticker() {
        let ticker = parse_ticker_price(r#"{"symbol":"BTCUSDT","price":"43250.10"}"#).unwrap();
        assert_eq!(ticker.symbol, "BTCUSDT");
        assert_eq!(ticker.price, 43250.10);

        let book = parse_book_ticker(
            r#"{"symbol":"ETHUSDT","bidPrice":"2300.1","bidQty":"1.5","askPrice":"2300.2","askQty":"0.7"}"#,
        )
        .unwrap();
        assert_eq!(book.ask_qty, 0.7);
        assert!(book.ask_price > book.bid_price);
    }

    #[test]
    fn test_depth() {
        let depth = parse_depth(
            r#"{"lastUpdateId":1027024,"bids":[["4.00000000","431.00000000"]],"asks":[["4.00000200","12.00000000"]]}"#,
            "BNBBTC",
        )
        .unwrap();

        assert_eq!(depth.last_update_id, 1027024);
        assert_eq!(depth.bids[0].quantity, 431.0);
        assert_eq!(depth.asks.len(), 1);
        assert!(depth.spread().unwrap() > 0.0);

        let bad_level = r#"{"lastUpdateId":1,"bids":[["x","1"]],"asks":[]}"#;
        assert!(parse_depth(bad_level, "BNBBTC").is_err());
    }

    #[test]
    fn test_avg_price_time_and_ping() {
        let avg = parse_avg_price(
            r#"{"mins":5,"price":"9.35751834","closeTime":1694061154503}"#,
            "BTCUSDT",
        )
        .unwrap();
        assert_eq!(avg.mins, 5);
        assert_eq!(avg.symbol, "BTCUSDT");

        assert_eq!(parse_server_time(r#"{"serverTime":1499827319559}"#).unwrap(), 1499827319559);
        assert!(parse_ping("{}").is_ok());
        assert!(parse_ping("[]").is_err());
    }
}
