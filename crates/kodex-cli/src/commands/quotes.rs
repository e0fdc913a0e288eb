//! 시세/호가 조회 명령.

use anyhow::Result;
use kodex_exchange::MarketDataClient;
use serde_json::{json, Value};

pub async fn ticker(client: &MarketDataClient, symbol: &str) -> Result<Value> {
    Ok(serde_json::to_value(client.ticker_price(symbol).await?)?)
}

/// 호가창. 최우선 호가 기준 중간가와 스프레드를 함께 출력합니다.
pub async fn depth(client: &MarketDataClient, symbol: &str, limit: u32) -> Result<Value> {
    let depth = client.depth(symbol, limit).await?;
    let mid_price = depth.mid_price();
    let spread = depth.spread();

    let mut value = serde_json::to_value(depth)?;
    if let Value::Object(map) = &mut value {
        map.insert("mid_price".to_string(), json!(mid_price));
        map.insert("spread".to_string(), json!(spread));
    }
    Ok(value)
}

pub async fn book_ticker(client: &MarketDataClient, symbol: &str) -> Result<Value> {
    Ok(serde_json::to_value(client.book_ticker(symbol).await?)?)
}

pub async fn avg_price(client: &MarketDataClient, symbol: &str) -> Result<Value> {
    Ok(serde_json::to_value(client.avg_price(symbol).await?)?)
}
