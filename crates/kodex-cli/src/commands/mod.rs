//! CLI 명령어 구현 모듈.
//!
//! 각 명령은 결과를 `serde_json::Value`로 돌려주고 출력은 main에서 담당합니다.

pub mod klines;
pub mod quotes;
pub mod status;

use anyhow::{anyhow, Result};
use kodex_core::{CapabilityRegistry, MarketDataConfig};
use kodex_exchange::MarketDataClient;

/// 마켓 데이터 구성요소 이름.
pub const MARKET_DATA: &str = "market_data";

/// 시작 시점에 한 번 초기화된 마켓 데이터 클라이언트와 등록 결과.
#[derive(Debug)]
pub struct MarketData {
    registry: CapabilityRegistry,
    client: Option<MarketDataClient>,
    hosts: Vec<String>,
}

impl MarketData {
    /// 설정에서 클라이언트를 만들고 결과를 등록합니다. 실패해도 패닉하지 않습니다.
    pub fn init(config: &MarketDataConfig) -> Self {
        let mut registry = CapabilityRegistry::new();
        let client = registry.register(MARKET_DATA, MarketDataClient::from_config(config));
        Self {
            registry,
            client,
            hosts: config.hosts.clone(),
        }
    }

    /// 이미 구성된 클라이언트 사용.
    pub fn with_client(client: MarketDataClient) -> Self {
        let hosts = client.pool().all().to_vec();
        let mut registry = CapabilityRegistry::new();
        let client = registry.register(MARKET_DATA, Ok::<_, std::convert::Infallible>(client));
        Self {
            registry,
            client,
            hosts,
        }
    }

    /// 클라이언트. 초기화에 실패했다면 등록된 사유와 함께 에러.
    pub fn client(&self) -> Result<&MarketDataClient> {
        self.client.as_ref().ok_or_else(|| {
            let reason = self
                .registry
                .get(MARKET_DATA)
                .and_then(|s| s.reason.clone())
                .unwrap_or_else(|| "not initialized".to_string());
            anyhow!("market data is unavailable: {}", reason)
        })
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// 설정된 호스트 목록.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_failure_is_registered() {
        let config = MarketDataConfig {
            hosts: vec![],
            ..Default::default()
        };
        let market = MarketData::init(&config);

        assert!(!market.registry().is_enabled(MARKET_DATA));
        let err = market.client().unwrap_err();
        assert!(err.to_string().contains("market data is unavailable"));
    }

    #[test]
    fn test_init_success() {
        let market = MarketData::init(&MarketDataConfig::default());
        assert!(market.registry().is_enabled(MARKET_DATA));
        assert!(market.client().is_ok());
        assert_eq!(market.hosts().len(), 5);
    }
}
