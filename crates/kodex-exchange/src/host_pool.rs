//! 동일 API를 제공하는 호스트들의 순환 목록.
//!
//! 커서는 프로세스 전체에서 공유되며 시도가 끝날 때마다 한 칸씩 이동합니다.
//! 동시 요청이 커서를 경쟁적으로 움직여도 각 요청은 시작 시점의 스냅샷 순서로
//! 모든 호스트를 방문합니다.

use std::sync::atomic::{AtomicUsize, Ordering};

use kodex_core::ConfigurationError;

/// 순환 호스트 풀.
#[derive(Debug)]
pub struct HostPool {
    hosts: Vec<String>,
    cursor: AtomicUsize,
}

impl HostPool {
    /// 호스트 목록으로 풀을 생성합니다.
    ///
    /// 앞뒤 공백과 끝의 `/`는 제거됩니다. 목록이 비어 있거나 `http(s)://`로
    /// 시작하지 않는 항목이 있으면 실패합니다.
    pub fn new<I, S>(hosts: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| normalize_host(h.into()))
            .collect::<Result<Vec<_>, _>>()?;

        if hosts.is_empty() {
            return Err(ConfigurationError::EmptyHostPool);
        }

        Ok(Self {
            hosts,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// 생성 시 빈 풀을 거부하므로 항상 `false`.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// 현재 커서 위치.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// 커서가 가리키는 호스트.
    pub fn current(&self) -> &str {
        &self.hosts[self.cursor() % self.hosts.len()]
    }

    /// 커서를 한 칸 이동 (마지막 다음은 처음).
    pub fn rotate(&self) {
        let len = self.hosts.len();
        // 클로저가 항상 Some을 반환하므로 실패하지 않음
        let _ = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len));
    }

    /// 설정된 순서의 전체 호스트.
    pub fn all(&self) -> &[String] {
        &self.hosts
    }

    /// 현재 커서부터 시작하는 방문 순서 스냅샷.
    pub fn rotation_from_cursor(&self) -> Vec<&str> {
        let start = self.cursor();
        let len = self.hosts.len();
        (0..len)
            .map(|offset| self.hosts[(start + offset) % len].as_str())
            .collect()
    }
}

fn normalize_host(raw: String) -> Result<String, ConfigurationError> {
    let host = raw.trim().trim_end_matches('/');
    let authority = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"));
    match authority {
        Some(rest) if !rest.is_empty() => Ok(host.to_string()),
        _ => Err(ConfigurationError::InvalidHost(raw)),
    }
}
