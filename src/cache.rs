// 限时缓存, 由中转层持有, 登录握手本身从不访问
use log::debug;
use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    sync::{PoisonError, RwLock},
    time::{Duration, Instant}
};

struct CacheEntry<V> {
    value: V,
    stored_at: Instant
}

pub struct ResponseCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, CacheEntry<V>>>
}

impl<K, V> ResponseCache<K, V>
where
    K: Eq + Hash + Debug,
    V: Clone
{
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 未过期则返回副本, 过期的条目顺手移除
    pub fn get(&self, key: &K) -> Option<V> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    debug!("从缓存中获取数据，键：{:?}", key);
                    return Some(entry.value.clone())
                }
                Some(_) => {}
                None => return None
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // 拿到写锁前可能已被其他请求刷新
        if entries.get(key).is_some_and(|entry| entry.stored_at.elapsed() >= self.ttl) {
            entries.remove(key);
            debug!("缓存过期，已移除，键：{:?}", key);
        }
        None
    }

    pub fn set(&self, key: K, value: V) {
        debug!("数据已存入缓存，键：{:?}，有效期：{}秒", key, self.ttl.as_secs());
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, CacheEntry { value, stored_at: Instant::now() });
    }

    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
