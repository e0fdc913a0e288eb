//! HTTP 전송 추상화.
//!
//! 클라이언트는 상태 코드와 본문만 필요하므로 전송 계층을 트레이트로 분리해
//! 소켓 없이 테스트할 수 있게 합니다.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use crate::error::TransportError;

/// 상태 코드와 본문만 담은 응답.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// GET 요청 전송.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `url`에 쿼리 파라미터를 붙여 GET을 보냅니다.
    ///
    /// 200이 아닌 상태 코드도 `Ok`로 반환해야 합니다. `Err`는 응답을 받지
    /// 못한 경우(타임아웃, 연결 실패)에만 사용합니다.
    async fn get(
        &self,
        url: &str,
        params: &[(&'static str, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// reqwest 기반 전송.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// `User-Agent` 헤더를 설정한 클라이언트 생성.
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::ACCEPT,
                    header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .build()
            .map_err(|e| TransportError::Network(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self { client })
    }

    /// 미리 구성한 클라이언트 사용.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        params: &[(&'static str, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        debug!(url, ?params, timeout_ms = timeout.as_millis() as u64, "GET");

        let response = self
            .client
            .get(url)
            .query(params)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}
