//! 성공 응답용 메모리 TTL 캐시.
//!
//! 만료된 항목은 조회 시점에 제거되며(lazy eviction), 필요하면
//! [`ResponseCache::purge_expired`]로 한 번에 정리할 수 있습니다.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use tokio::time::Instant;

/// 만료 시각을 가진 캐시 항목.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            // 지나치게 큰 TTL은 사실상 무기한
            expires_at: now.checked_add(ttl).unwrap_or(now + Duration::from_secs(u32::MAX as u64)),
        }
    }

    fn is_valid(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// 키-값 TTL 캐시.
///
/// 동시 접근은 `RwLock`으로 보호되며 잠금은 await 지점을 넘지 않습니다.
#[derive(Debug)]
pub struct ResponseCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    capacity: Option<usize>,
}

impl<K, V> Default for ResponseCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ResponseCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// 용량 제한 없는 캐시.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: None,
        }
    }

    /// 최대 항목 수를 제한한 캐시. 가득 차면 가장 먼저 만료될 항목을 밀어냅니다.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity)),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// 만료되지 않은 값 조회. 만료된 항목은 이 시점에 제거됩니다.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.read();
            match entries.get(key) {
                Some(entry) if entry.is_valid(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // 다른 작업이 그 사이 새 값을 넣었을 수 있으므로 다시 확인
        let mut entries = self.write();
        if entries.get(key).is_some_and(|e| !e.is_valid(now)) {
            entries.remove(key);
        }
        None
    }

    /// 값 저장. 같은 키의 기존 항목은 교체됩니다.
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let mut entries = self.write();

        if let Some(capacity) = self.capacity {
            if !entries.contains_key(&key) && entries.len() >= capacity {
                let now = Instant::now();
                entries.retain(|_, e| e.is_valid(now));

                if entries.len() >= capacity {
                    let oldest = entries
                        .iter()
                        .min_by_key(|(_, e)| e.expires_at)
                        .map(|(k, _)| k.clone());
                    if let Some(oldest) = oldest {
                        entries.remove(&oldest);
                    }
                }
            }
        }

        entries.insert(key, CacheEntry::new(value, ttl));
    }

    /// 만료된 항목을 모두 제거하고 제거 수를 반환합니다.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, e| e.is_valid(now));
        before - entries.len()
    }

    /// 저장된 항목 수 (아직 정리되지 않은 만료 항목 포함).
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // 캐시 값은 항상 완전한 상태로만 저장되므로 poison 상태도 그대로 사용
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
