//! 마켓 데이터 도메인 타입.

pub mod candle;
pub mod market;
pub mod timeframe;

pub use candle::{CandleError, NormalizedCandle};
pub use market::{AvgPrice, BookTicker, DepthSnapshot, PriceLevel, TickerPrice};
pub use timeframe::Timeframe;
