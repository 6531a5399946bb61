//! 会话内缓存：代币目录、地址查找表与 ATA 地址。

pub mod alt;
pub mod ata;

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

pub use alt::AltCache;
pub use ata::cached_associated_token_address;

/// 缓存后端抽象：统一 `get` / `insert` / `remove` 接口。
#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    type Key: Eq + Hash + Clone + Send + Sync + 'static;
    type Value: Send + Sync + 'static;

    async fn get(&self, key: &Self::Key) -> Option<Arc<Self::Value>>;

    async fn insert(&self, key: Self::Key, value: Arc<Self::Value>);

    async fn remove(&self, key: &Self::Key);
}

/// 带 per-key 锁的缓存：同一个 key 的并发回源只会执行一次。
pub struct Cache<B>
where
    B: CacheBackend,
{
    backend: B,
    locks: DashMap<B::Key, Arc<tokio::sync::Mutex<()>>>,
}

impl<B> Cache<B>
where
    B: CacheBackend,
{
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            locks: DashMap::new(),
        }
    }

    pub async fn get(&self, key: &B::Key) -> Option<Arc<B::Value>> {
        self.backend.get(key).await
    }

    pub async fn insert(&self, key: B::Key, value: Arc<B::Value>) {
        self.backend.insert(key, value).await;
    }

    pub async fn remove(&self, key: &B::Key) {
        self.backend.remove(key).await;
    }

    pub async fn load_or_fetch<F, Fut, E>(&self, key: B::Key, fetcher: F) -> Result<Arc<B::Value>, E>
    where
        F: FnOnce(B::Key) -> Fut + Send,
        Fut: Future<Output = Result<B::Value, E>> + Send,
    {
        if let Some(hit) = self.backend.get(&key).await {
            return Ok(hit);
        }

        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(hit) = self.backend.get(&key).await {
            return Ok(hit);
        }

        let value = Arc::new(fetcher(key.clone()).await?);
        self.backend.insert(key, value.clone()).await;
        Ok(value)
    }
}

/// DashMap 内存后端，`ttl` 为空时条目永不过期。
pub struct InMemoryBackend<K, V> {
    entries: DashMap<K, Entry<V>>,
    ttl: Option<Duration>,
}

impl<K, V> InMemoryBackend<K, V>
where
    K: Eq + Hash,
{
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }
}

impl<K, V> Default for InMemoryBackend<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new(None)
    }
}

struct Entry<V> {
    value: Arc<V>,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}

#[async_trait]
impl<K, V> CacheBackend for InMemoryBackend<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    type Key = K;
    type Value = V;

    async fn get(&self, key: &K) -> Option<Arc<V>> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    async fn insert(&self, key: K, value: Arc<V>) {
        let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key, Entry { value, expires_at });
    }

    async fn remove(&self, key: &K) {
        self.entries.remove(key);
    }
}
