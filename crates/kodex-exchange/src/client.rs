//! 다중 호스트 마켓 데이터 클라이언트.
//!
//! 모든 엔드포인트는 같은 실행 경로([`MarketDataClient::execute`])를 거칩니다.
//!
//! 1. 요청 시작 시점의 호스트 방문 순서 스냅샷
//! 2. 시도마다 `min(per_attempt_timeout, 남은 시간)` 타임아웃
//! 3. 실패 분류 후 다음 호스트 (429는 백오프 후)
//! 4. 시도마다 공유 커서를 한 칸 이동
//!
//! 캔들 조회만 TTL 캐시를 사용합니다.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use kodex_core::{
    AvgPrice, BookTicker, DepthSnapshot, MarketDataConfig, NormalizedCandle, TickerPrice,
};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::{
    cache::ResponseCache,
    connector::binance,
    error::{AttemptError, AttemptErrorKind, FetchError, ProtocolError},
    host_pool::HostPool,
    policy::FetchPolicy,
    request::{
        normalize_symbol, parse_symbol_list, validate_depth_limit, FetchRequest, KlineQuery,
        RequestLimits,
    },
    transport::{ReqwestTransport, Transport},
};

/// 기본 캐시 TTL.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);

/// 에러 메시지에 포함할 응답 본문 최대 길이.
const BODY_SNIPPET_LEN: usize = 200;

// ============================================================================
// 진단 정보
// ============================================================================

/// 시도 1회의 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "kind")]
pub enum AttemptOutcome {
    Success,
    Failed(AttemptErrorKind),
}

/// 시도 1회 기록.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub host: String,
    pub outcome: AttemptOutcome,
    /// 이 시도 뒤 실제로 대기한 시간 (429일 때만)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff: Option<Duration>,
}

/// 논리적 요청 1건의 실행 기록.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchTrace {
    pub attempts: Vec<AttemptRecord>,
    pub from_cache: bool,
    pub elapsed: Duration,
}

impl FetchTrace {
    /// 방문한 호스트 순서.
    pub fn hosts(&self) -> Vec<&str> {
        self.attempts.iter().map(|a| a.host.as_str()).collect()
    }

    /// 성공한 호스트.
    pub fn served_by(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| a.outcome == AttemptOutcome::Success)
            .map(|a| a.host.as_str())
    }

    /// 백오프 대기 총합.
    pub fn total_backoff(&self) -> Duration {
        self.attempts.iter().filter_map(|a| a.backoff).sum()
    }
}

/// 데이터와 실행 기록.
#[derive(Debug, Clone, Serialize)]
pub struct Fetched<T> {
    pub data: T,
    pub trace: FetchTrace,
}

/// 심볼별 배치 결과.
#[derive(Debug)]
pub struct SymbolKlines {
    pub symbol: String,
    pub result: Result<Vec<NormalizedCandle>, FetchError>,
}

// ============================================================================
// 클라이언트
// ============================================================================

/// 호스트 로테이션, 제한 시간, 캐시를 갖춘 마켓 데이터 클라이언트.
///
/// # 예시
///
/// ```rust,ignore
/// let client = MarketDataClient::from_config(&config.market_data)?;
/// let candles = client.get_klines("BTCUSDT", "1m", Some(100)).await?;
/// ```
pub struct MarketDataClient {
    pool: Arc<HostPool>,
    policy: FetchPolicy,
    limits: RequestLimits,
    transport: Arc<dyn Transport>,
    cache: ResponseCache<FetchRequest, Arc<Vec<NormalizedCandle>>>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for MarketDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataClient")
            .field("hosts", &self.pool.all())
            .field("policy", &self.policy)
            .field("limits", &self.limits)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl MarketDataClient {
    /// 기본 검증 규칙과 10초 캐시로 생성합니다.
    pub fn new(pool: Arc<HostPool>, policy: FetchPolicy, transport: Arc<dyn Transport>) -> Self {
        Self {
            pool,
            policy,
            limits: RequestLimits::default(),
            transport,
            cache: ResponseCache::new(),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// 설정에서 reqwest 전송을 사용하는 클라이언트를 생성합니다.
    pub fn from_config(config: &MarketDataConfig) -> Result<Self, FetchError> {
        config.validate()?;

        let pool = HostPool::new(config.hosts.iter().cloned())?;
        let policy = FetchPolicy::from_config(config)?;
        let transport = ReqwestTransport::new(&config.user_agent).map_err(|e| {
            FetchError::Configuration(kodex_core::ConfigurationError::invalid(
                "user_agent",
                e.to_string(),
            ))
        })?;

        let mut client = Self::new(Arc::new(pool), policy, Arc::new(transport))
            .with_limits(RequestLimits::from(config))
            .with_cache_ttl(config.cache_ttl());
        if let Some(capacity) = config.cache_capacity {
            client = client.with_cache_capacity(capacity);
        }

        info!(
            hosts = config.hosts.len(),
            max_attempts = client.policy.max_attempts,
            deadline_ms = config.total_deadline_ms,
            "마켓 데이터 클라이언트 생성"
        );
        Ok(client)
    }

    pub fn with_limits(mut self, limits: RequestLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// 캐시 최대 항목 수 설정. 기존 캐시 내용은 버려집니다.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = ResponseCache::with_capacity_limit(capacity);
        self
    }

    pub fn pool(&self) -> &Arc<HostPool> {
        &self.pool
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    pub fn limits(&self) -> &RequestLimits {
        &self.limits
    }

    // ------------------------------------------------------------------------
    // 캔들
    // ------------------------------------------------------------------------

    /// 캔들 조회.
    pub async fn fetch(&self, query: &KlineQuery) -> Result<Vec<NormalizedCandle>, FetchError> {
        self.fetch_traced(query).await.map(|f| f.data)
    }

    /// 캔들 조회 (실행 기록 포함).
    #[instrument(skip(self, query), fields(symbol = %query.symbol, interval = %query.interval))]
    pub async fn fetch_traced(
        &self,
        query: &KlineQuery,
    ) -> Result<Fetched<Vec<NormalizedCandle>>, FetchError> {
        let request = self.limits.validate(query)?;
        self.fetch_request(&request).await
    }

    /// 이미 검증된 요청으로 캔들 조회.
    pub async fn fetch_request(
        &self,
        request: &FetchRequest,
    ) -> Result<Fetched<Vec<NormalizedCandle>>, FetchError> {
        if let Some(cached) = self.cache.get(request) {
            debug!(
                symbol = %request.symbol,
                interval = %request.timeframe,
                limit = request.limit,
                "cache hit"
            );
            return Ok(Fetched {
                data: cached.as_ref().clone(),
                trace: FetchTrace {
                    from_cache: true,
                    ..Default::default()
                },
            });
        }

        let limit = request.limit as usize;
        let anchored = request.start_time.is_some();
        let (candles, trace) = self
            .execute(request.operation.path(), &request.query_params(), |body| {
                binance::parse_klines(body, limit, anchored)
            })
            .await?;

        let candles = Arc::new(candles);
        self.cache
            .put(request.clone(), Arc::clone(&candles), self.cache_ttl);

        Ok(Fetched {
            data: candles.as_ref().clone(),
            trace,
        })
    }

    /// 심볼/간격/limit으로 최근 캔들 조회.
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: Option<i64>,
    ) -> Result<Vec<NormalizedCandle>, FetchError> {
        let query = KlineQuery {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            limit,
            start_time: None,
        };
        self.fetch(&query).await
    }

    /// 쉼표로 구분된 여러 심볼의 캔들을 동시에 조회합니다.
    ///
    /// 입력 검증은 네트워크 호출 전에 모두 끝나며, 심볼별 결과는 입력 순서를
    /// 유지합니다.
    #[instrument(skip(self))]
    pub async fn fetch_many(
        &self,
        symbols: &str,
        interval: &str,
        limit: Option<i64>,
        start_time: Option<i64>,
    ) -> Result<Vec<SymbolKlines>, FetchError> {
        let symbols = parse_symbol_list(symbols)?;

        let requests = symbols
            .iter()
            .map(|symbol| {
                self.limits.validate(&KlineQuery {
                    symbol: symbol.clone(),
                    interval: interval.to_string(),
                    limit,
                    start_time,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // 배치 단위로 만료 항목 정리
        let purged = self.cache.purge_expired();
        if purged > 0 {
            debug!(purged, "expired cache entries purged");
        }

        let results = join_all(requests.iter().map(|r| self.fetch_request(r))).await;

        Ok(requests
            .into_iter()
            .zip(results)
            .map(|(request, result)| SymbolKlines {
                symbol: request.symbol,
                result: result.map(|f| f.data),
            })
            .collect())
    }

    // ------------------------------------------------------------------------
    // 기타 엔드포인트 (캐시 없음)
    // ------------------------------------------------------------------------

    /// 최근 체결가.
    #[instrument(skip(self))]
    pub async fn ticker_price(&self, symbol: &str) -> Result<TickerPrice, FetchError> {
        let symbol = normalize_symbol(symbol)?;
        let (ticker, _) = self
            .execute(
                binance::TICKER_PRICE_PATH,
                &[("symbol", symbol)],
                binance::parse_ticker_price,
            )
            .await?;
        Ok(ticker)
    }

    /// 호가창 스냅샷 (limit 5~5000).
    #[instrument(skip(self))]
    pub async fn depth(&self, symbol: &str, limit: u32) -> Result<DepthSnapshot, FetchError> {
        let symbol = normalize_symbol(symbol)?;
        let limit = validate_depth_limit(limit)?;
        let (depth, _) = self
            .execute(
                binance::DEPTH_PATH,
                &[("symbol", symbol.clone()), ("limit", limit.to_string())],
                |body| binance::parse_depth(body, &symbol),
            )
            .await?;
        Ok(depth)
    }

    /// 최우선 호가.
    #[instrument(skip(self))]
    pub async fn book_ticker(&self, symbol: &str) -> Result<BookTicker, FetchError> {
        let symbol = normalize_symbol(symbol)?;
        let (book, _) = self
            .execute(
                binance::BOOK_TICKER_PATH,
                &[("symbol", symbol)],
                binance::parse_book_ticker,
            )
            .await?;
        Ok(book)
    }

    /// 평균가.
    #[instrument(skip(self))]
    pub async fn avg_price(&self, symbol: &str) -> Result<AvgPrice, FetchError> {
        let symbol = normalize_symbol(symbol)?;
        let (avg, _) = self
            .execute(
                binance::AVG_PRICE_PATH,
                &[("symbol", symbol.clone())],
                |body| binance::parse_avg_price(body, &symbol),
            )
            .await?;
        Ok(avg)
    }

    /// 업스트림 서버 시각 (epoch 밀리초).
    #[instrument(skip(self))]
    pub async fn server_time(&self) -> Result<i64, FetchError> {
        let (time, _) = self
            .execute(binance::SERVER_TIME_PATH, &[], binance::parse_server_time)
            .await?;
        Ok(time)
    }

    /// 응답한 첫 호스트를 반환합니다.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<String, FetchError> {
        let (_, trace) = self
            .execute(binance::PING_PATH, &[], binance::parse_ping)
            .await?;
        // 성공 시 마지막 시도가 항상 성공 기록
        Ok(trace
            .served_by()
            .map(str::to_string)
            .unwrap_or_else(|| self.pool.current().to_string()))
    }

    // ------------------------------------------------------------------------
    // 실행 경로
    // ------------------------------------------------------------------------

    /// 로테이션/제한 시간/백오프를 적용해 GET 1건을 실행합니다.
    async fn execute<T, D>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
        decode: D,
    ) -> Result<(T, FetchTrace), FetchError>
    where
        D: Fn(&str) -> Result<T, ProtocolError>,
    {
        let started = Instant::now();
        let deadline = started + self.policy.total_deadline;
        let hosts = self.pool.rotation_from_cursor();
        let max_attempts = self.policy.attempts_for_pool(hosts.len());

        let mut trace = FetchTrace::default();
        let mut last_error: Option<AttemptError> = None;
        let mut protocol_only = true;

        for (attempt, host) in hosts.into_iter().take(max_attempts).enumerate() {
            let now = Instant::now();
            if now >= deadline {
                warn!(path, attempts = attempt, "deadline exceeded, giving up");
                break;
            }

            let timeout = self.policy.attempt_timeout(deadline - now);
            let url = format!("{}{}", host, path);
            debug!(host, attempt, timeout_ms = timeout.as_millis() as u64, "attempt");

            let outcome =
                tokio::time::timeout(timeout, self.transport.get(&url, params, timeout)).await;
            self.pool.rotate();

            let error = match outcome {
                Err(_) => AttemptError::new(
                    host,
                    AttemptErrorKind::Timeout,
                    format!("no response within {}ms", timeout.as_millis()),
                ),
                Ok(Err(e)) => AttemptError::new(host, e.kind(), e.to_string()),
                Ok(Ok(response)) if response.is_ok() => match decode(&response.body) {
                    Ok(value) => {
                        trace.attempts.push(AttemptRecord {
                            host: host.to_string(),
                            outcome: AttemptOutcome::Success,
                            backoff: None,
                        });
                        trace.elapsed = started.elapsed();
                        debug!(
                            host,
                            attempt,
                            elapsed_ms = trace.elapsed.as_millis() as u64,
                            "success"
                        );
                        return Ok((value, trace));
                    }
                    Err(e) => AttemptError::new(host, AttemptErrorKind::Protocol, e.0),
                },
                Ok(Ok(response)) => AttemptError::new(
                    host,
                    AttemptErrorKind::from_status(response.status),
                    format!("HTTP {}: {}", response.status, snippet(&response.body)),
                ),
            };

            warn!(
                host,
                attempt,
                kind = %error.kind,
                error = %error.message,
                "attempt failed"
            );

            let mut backoff = None;
            let has_next = attempt + 1 < max_attempts;
            if error.kind.needs_backoff() && has_next {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match self.policy.backoff_within(attempt as u32, remaining) {
                    Some(delay) => {
                        debug!(
                            host,
                            backoff_ms = delay.as_millis() as u64,
                            "rate limited, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        backoff = Some(delay);
                    }
                    None => debug!(host, "backoff would overrun deadline, skipping"),
                }
            }

            if error.kind != AttemptErrorKind::Protocol {
                protocol_only = false;
            }
            trace.attempts.push(AttemptRecord {
                host: host.to_string(),
                outcome: AttemptOutcome::Failed(error.kind),
                backoff,
            });
            last_error = Some(error);
        }

        let attempts_made = trace.attempts.len();
        let err = match last_error {
            None => FetchError::UpstreamUnavailable {
                last_host: None,
                last_error_kind: AttemptErrorKind::DeadlineExceeded,
                attempts_made,
                message: "deadline elapsed before any attempt".to_string(),
            },
            Some(last) if protocol_only => FetchError::UpstreamProtocolError {
                host: last.host,
                detail: last.message,
                attempts_made,
            },
            Some(last) => FetchError::UpstreamUnavailable {
                last_host: Some(last.host),
                last_error_kind: last.kind,
                attempts_made,
                message: last.message,
            },
        };

        warn!(
            path,
            attempts_made,
            elapsed_ms = started.elapsed().as_millis() as u64,
            error = %err,
            "all hosts failed"
        );
        Err(err)
    }
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(BODY_SNIPPET_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
