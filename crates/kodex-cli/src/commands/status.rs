//! 업스트림 상태 점검 명령.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::MarketData;

/// 서버 시각과 로컬 시각 차이.
pub async fn server_time(market: &MarketData) -> Result<Value> {
    let server_ms = market.client()?.server_time().await?;
    let local_ms = Utc::now().timestamp_millis();

    Ok(json!({
        "server_time": server_ms,
        "server_time_utc": DateTime::from_timestamp_millis(server_ms).map(|t| t.to_rfc3339()),
        "skew_ms": server_ms - local_ms,
    }))
}

/// 응답하는 호스트 하나를 찾습니다.
pub async fn ping(market: &MarketData) -> Result<Value> {
    let host = market.client()?.ping().await?;
    Ok(json!({ "alive": true, "host": host }))
}

/// 설정된 호스트, 현재 커서 위치, 구성요소 등록 결과.
pub fn hosts(market: &MarketData) -> Value {
    let current = market
        .client()
        .ok()
        .map(|c| c.pool().current().to_string());

    json!({
        "hosts": market.hosts(),
        "current": current,
        "capabilities": market.registry().statuses(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{testing, MARKET_DATA};
    use kodex_core::MarketDataConfig;

    #[tokio::test]
    async fn test_ping_and_time() {
        let market = MarketData::with_client(testing::client(vec![
            ("/api/v3/ping", 200, "{}"),
            ("/api/v3/time", 200, r#"{"serverTime":1499827319559}"#),
        ]));

        let ping = ping(&market).await.unwrap();
        assert_eq!(ping["host"], "https://a.example");

        let time = server_time(&market).await.unwrap();
        assert_eq!(time["server_time"], 1499827319559i64);
        assert_eq!(time["server_time_utc"], "2017-07-12T02:41:59.559+00:00");
    }

    #[test]
    fn test_hosts_reports_disabled_capability() {
        let config = MarketDataConfig {
            hosts: vec!["ftp://nope".to_string()],
            ..Default::default()
        };
        let market = MarketData::init(&config);
        let value = hosts(&market);

        assert_eq!(value["hosts"][0], "ftp://nope");
        assert!(value["current"].is_null());
        assert_eq!(value["capabilities"][0]["name"], MARKET_DATA);
        assert_eq!(value["capabilities"][0]["enabled"], false);
    }
}
