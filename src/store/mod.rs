use std::time::Duration;

pub mod memory;
pub mod redis;

pub use memory::MemoryKv;
pub use redis::RedisKv;

use crate::config::Config;

/// The backing store contract: an associative store with per-key expiry.
///
/// `compare_and_swap` exists so the read path can rewrite a record without
/// clobbering a concurrent rewrite of the same key.
pub trait KvStore {
    /// Get a raw value by key. Expired keys read as absent.
    async fn get(&mut self, key: &str) -> crate::ApiResult<Option<String>>;

    /// Set a value with an expiry.
    async fn set_ex(&mut self, key: &str, value: &str, expiry: Duration) -> crate::ApiResult<()>;

    /// Replace the value only if it still equals `current`, refreshing the
    /// expiry in the same step. Returns false if the stored value changed or
    /// the key vanished.
    async fn compare_and_swap(
        &mut self,
        key: &str,
        current: &str,
        next: &str,
        expiry: Duration,
    ) -> crate::ApiResult<bool>;

    /// Delete a key.
    async fn delete(&mut self, key: &str) -> crate::ApiResult<()>;
}

#[derive(Clone)]
pub enum AnyKv {
    Redis(RedisKv),
    Memory(MemoryKv),
}

impl AnyKv {
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        Ok(AnyKv::Redis(RedisKv::connect(&config.redis.url).await?))
    }
}

impl KvStore for AnyKv {
    async fn get(&mut self, key: &str) -> crate::ApiResult<Option<String>> {
        match self {
            AnyKv::Redis(redis) => redis.get(key).await,
            AnyKv::Memory(memory) => memory.get(key).await,
        }
    }

    async fn set_ex(&mut self, key: &str, value: &str, expiry: Duration) -> crate::ApiResult<()> {
        match self {
            AnyKv::Redis(redis) => redis.set_ex(key, value, expiry).await,
            AnyKv::Memory(memory) => memory.set_ex(key, value, expiry).await,
        }
    }

    async fn compare_and_swap(
        &mut self,
        key: &str,
        current: &str,
        next: &str,
        expiry: Duration,
    ) -> crate::ApiResult<bool> {
        match self {
            AnyKv::Redis(redis) => redis.compare_and_swap(key, current, next, expiry).await,
            AnyKv::Memory(memory) => memory.compare_and_swap(key, current, next, expiry).await,
        }
    }

    async fn delete(&mut self, key: &str) -> crate::ApiResult<()> {
        match self {
            AnyKv::Redis(redis) => redis.delete(key).await,
            AnyKv::Memory(memory) => memory.delete(key).await,
        }
    }
}

impl From<RedisKv> for AnyKv {
    fn from(value: RedisKv) -> Self {
        AnyKv::Redis(value)
    }
}

impl From<MemoryKv> for AnyKv {
    fn from(value: MemoryKv) -> Self {
        AnyKv::Memory(value)
    }
}
