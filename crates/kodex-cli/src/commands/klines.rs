//! 캔들 조회 명령 (단일 / 배치).

use anyhow::Result;
use kodex_exchange::{KlineQuery, MarketDataClient, SymbolKlines};
use serde_json::{json, Value};
use tracing::info;

/// 캔들 조회 설정.
#[derive(Debug, Clone)]
pub struct KlinesConfig {
    pub symbol: String,
    pub interval: String,
    pub limit: Option<i64>,
    pub start_time: Option<i64>,
    /// 시도 기록 포함 여부
    pub trace: bool,
}

/// 단일 심볼 캔들 조회.
pub async fn fetch_klines(client: &MarketDataClient, config: KlinesConfig) -> Result<Value> {
    let query = KlineQuery {
        symbol: config.symbol,
        interval: config.interval,
        limit: config.limit,
        start_time: config.start_time,
    };

    let fetched = client.fetch_traced(&query).await?;
    info!(
        count = fetched.data.len(),
        from_cache = fetched.trace.from_cache,
        served_by = fetched.trace.served_by().unwrap_or("-"),
        "캔들 조회 완료"
    );

    if config.trace {
        Ok(serde_json::to_value(&fetched)?)
    } else {
        Ok(serde_json::to_value(&fetched.data)?)
    }
}

/// 여러 심볼 캔들 조회 (쉼표 구분).
pub async fn fetch_batch(
    client: &MarketDataClient,
    symbols: &str,
    interval: &str,
    limit: Option<i64>,
    start_time: Option<i64>,
) -> Result<Value> {
    let results = client
        .fetch_many(symbols, interval, limit, start_time)
        .await?;
    render_batch(results)
}

/// 심볼별 결과를 입력 순서대로 배열로 변환. 실패한 심볼은 에러 문자열로 표시합니다.
pub fn render_batch(results: Vec<SymbolKlines>) -> Result<Value> {
    let mut out = Vec::with_capacity(results.len());
    let mut failed = 0usize;

    for SymbolKlines { symbol, result } in results {
        let entry = match result {
            Ok(candles) => json!({ "symbol": symbol, "candles": candles }),
            Err(e) => {
                failed += 1;
                json!({ "symbol": symbol, "error": e.to_string() })
            }
        };
        out.push(entry);
    }

    info!(symbols = out.len(), failed, "배치 조회 완료");
    Ok(Value::Array(out))
}
