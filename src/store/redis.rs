use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use super::KvStore;

/// Replace the value only if it is unchanged, refreshing the expiry in the
/// same atomic step.
const CAS_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
  return 1
end
return 0
"#;

#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    /// Connect to a Redis-compatible server by URL.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

impl KvStore for RedisKv {
    async fn get(&mut self, key: &str) -> crate::ApiResult<Option<String>> {
        Ok(self.conn.get::<_, Option<String>>(key).await?)
    }

    async fn set_ex(&mut self, key: &str, value: &str, expiry: Duration) -> crate::ApiResult<()> {
        self.conn
            .set_ex::<_, _, ()>(key, value, expiry_secs(expiry))
            .await?;
        Ok(())
    }

    async fn compare_and_swap(
        &mut self,
        key: &str,
        current: &str,
        next: &str,
        expiry: Duration,
    ) -> crate::ApiResult<bool> {
        let swapped = Script::new(CAS_SCRIPT)
            .key(key)
            .arg(current)
            .arg(next)
            .arg(expiry_secs(expiry))
            .invoke_async::<_, i64>(&mut self.conn)
            .await?;
        Ok(swapped == 1)
    }

    async fn delete(&mut self, key: &str) -> crate::ApiResult<()> {
        self.conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

// SET EX rejects 0, so a sub-second expiry rounds up rather than down.
fn expiry_secs(expiry: Duration) -> usize {
    (expiry.as_secs() as usize).max(1)
}
