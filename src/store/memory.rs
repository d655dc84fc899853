use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::KvStore;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

/// In-memory store for tests and local development. Data is lost on restart.
#[derive(Clone, Default)]
pub struct MemoryKv {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    async fn get(&mut self, key: &str) -> crate::ApiResult<Option<String>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                drop(entries);
                self.entries.write().await.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&mut self, key: &str, value: &str, expiry: Duration) -> crate::ApiResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + expiry,
            },
        );
        Ok(())
    }

    async fn compare_and_swap(
        &mut self,
        key: &str,
        current: &str,
        next: &str,
        expiry: Duration,
    ) -> crate::ApiResult<bool> {
        let mut entries = self.entries.write().await;
        let unchanged = matches!(
            entries.get(key),
            Some(entry) if entry.is_live() && entry.value == current
        );
        if unchanged {
            entries.insert(
                key.to_string(),
                Entry {
                    value: next.to_string(),
                    expires_at: Instant::now() + expiry,
                },
            );
        }
        Ok(unchanged)
    }

    async fn delete(&mut self, key: &str) -> crate::ApiResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
