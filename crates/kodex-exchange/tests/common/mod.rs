//! 클라이언트 시나리오 테스트 공용 픽스처.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use kodex_exchange::{
    Backoff, FetchPolicy, HostPool, HttpResponse, MarketDataClient, Transport, TransportError,
};

pub const HOST_A: &str = "http://host-a.test";
pub const HOST_B: &str = "http://host-b.test";
pub const HOST_C: &str = "http://host-c.test";

/// 호출 1회에 대한 호스트 1개의 응답 동작.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Hang,
    Delay(Duration, u16, String),
    Network,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Status(200, body.into())
    }

    pub fn status(code: u16) -> Self {
        Reply::Status(code, String::new())
    }
}

/// 호스트 접두사로 구분하는 메모리 전송.
///
/// 호스트마다 응답 큐를 순서대로 재생하며, 마지막 응답은 계속 반복됩니다.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, host: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(host.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// 호출 순서대로 기록된 접속 호스트.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_reply(&self, url: &str) -> (String, Reply) {
        let mut replies = self.replies.lock().unwrap();
        let (host, queue) = replies
            .iter_mut()
            .find(|(host, _)| url.starts_with(host.as_str()))
            .unwrap_or_else(|| panic!("no script for {}", url));

        let reply = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        };
        (host.clone(), reply)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(
        &self,
        url: &str,
        _params: &[(&'static str, String)],
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let (host, reply) = self.next_reply(url);
        self.calls.lock().unwrap().push(host);

        match reply {
            Reply::Status(status, body) => Ok(HttpResponse::new(status, body)),
            Reply::Delay(delay, status, body) => {
                tokio::time::sleep(delay).await;
                Ok(HttpResponse::new(status, body))
            }
            Reply::Hang => futures::future::pending().await,
            Reply::Network => Err(TransportError::Network("connection refused".to_string())),
        }
    }
}

/// `start`부터 1분봉 `n`개를 담은 캔들 응답 본문.
pub fn kline_body(start: i64, n: usize) -> String {
    let records: Vec<String> = (0..n as i64)
        .map(|i| {
            let open_time = start + i * 60_000;
            format!(
                r#"[{},"100.0","105.0","99.0","103.0","50.5",{},"0",10,"0","0","0"]"#,
                open_time,
                open_time + 59_999
            )
        })
        .collect();
    format!("[{}]", records.join(","))
}

pub fn policy(per_attempt: Duration, deadline: Duration, max_attempts: usize) -> FetchPolicy {
    FetchPolicy::new(
        per_attempt,
        deadline,
        max_attempts,
        Backoff::new(Duration::from_millis(500), 2.0, Duration::from_secs(4)).unwrap(),
    )
    .unwrap()
}

pub fn client_with(
    hosts: &[&str],
    policy: FetchPolicy,
    transport: Arc<ScriptedTransport>,
) -> MarketDataClient {
    let pool = HostPool::new(hosts.iter().copied()).unwrap();
    MarketDataClient::new(Arc::new(pool), policy, transport)
}
