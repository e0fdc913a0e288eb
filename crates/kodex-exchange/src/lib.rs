//! # KodeX Exchange
//!
//! 여러 Binance 호환 호스트에 걸친 마켓 데이터 조회 계층.
//!
//! - [`HostPool`]: 공유 커서를 가진 순환 호스트 목록
//! - [`FetchPolicy`]: 시도 타임아웃, 전체 제한 시간, 429 백오프
//! - [`MarketDataClient`]: 검증 → 캐시 → 호스트 로테이션 → 정규화
//! - [`ResponseCache`]: 성공 응답용 TTL 캐시
//!
//! 개별 호스트 실패는 내부에서 처리되며, 예산이 소진된 뒤에만
//! [`FetchError`]가 호출자에게 전달됩니다.

pub mod cache;
pub mod client;
pub mod connector;
pub mod error;
pub mod host_pool;
pub mod policy;
pub mod request;
pub mod transport;

pub use cache::ResponseCache;
pub use client::{
    AttemptOutcome, AttemptRecord, FetchTrace, Fetched, MarketDataClient, SymbolKlines,
};
pub use error::{AttemptError, AttemptErrorKind, FetchError, ProtocolError, TransportError};
pub use host_pool::HostPool;
pub use policy::{Backoff, FetchPolicy};
pub use request::{FetchRequest, KlineQuery, Operation, RequestLimits};
pub use transport::{HttpResponse, ReqwestTransport, Transport};
