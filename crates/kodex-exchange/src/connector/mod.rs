//! 업스트림 거래소 응답 디코더.

pub mod binance;
