//! 시세/호가 스냅샷 타입.

use serde::{Deserialize, Serialize};

/// 심볼의 최근 체결가.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: f64,
}

/// 호가 한 단계.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

/// 호가창 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub symbol: String,
    pub last_update_id: i64,
    /// 매수 호가 (높은 가격 순)
    pub bids: Vec<PriceLevel>,
    /// 매도 호가 (낮은 가격 순)
    pub asks: Vec<PriceLevel>,
}

impl DepthSnapshot {
    /// 최우선 매수/매도 호가의 중간 가격.
    pub fn mid_price(&self) -> Option<f64> {
        let bid = self.bids.first()?;
        let ask = self.asks.first()?;
        Some((bid.price + ask.price) / 2.0)
    }

    /// 최우선 호가 스프레드.
    pub fn spread(&self) -> Option<f64> {
        Some(self.asks.first()?.price - self.bids.first()?.price)
    }
}

/// 최우선 호가 (book ticker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookTicker {
    pub symbol: String,
    pub bid_price: f64,
    pub bid_qty: f64,
    pub ask_price: f64,
    pub ask_qty: f64,
}

/// 최근 N분 평균가.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvgPrice {
    pub symbol: String,
    pub mins: u32,
    pub price: f64,
}
