// ============================
// crates/backend-lib/src/fast_store/redis.rs
// ============================
//! Redis-backed fast store.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::Script;

use super::{FastStore, FastStoreError, FastStoreResult};

/// INCR and arm the expiry on the first hit of a window
static INCR_WITH_EXPIRY: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
        local count = redis.call('INCR', KEYS[1])
        if count == 1 then
            redis.call('PEXPIRE', KEYS[1], ARGV[1])
        end
        return count
        ",
    )
});

/// SADD and set the key expiry when the member is new
static SADD_WITH_EXPIRY: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
        local added = redis.call('SADD', KEYS[1], ARGV[1])
        if added == 1 then
            redis.call('PEXPIRE', KEYS[1], ARGV[2])
        end
        return added
        ",
    )
});

#[derive(Clone)]
pub struct RedisFastStore {
    conn: ConnectionManager,
}

fn map_err(err: redis::RedisError) -> FastStoreError {
    FastStoreError::Unavailable(err.to_string())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl RedisFastStore {
    pub async fn connect(url: &str) -> FastStoreResult<Self> {
        let client = redis::Client::open(url).map_err(map_err)?;
        let conn = ConnectionManager::new(client).await.map_err(map_err)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl FastStore for RedisFastStore {
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> FastStoreResult<i64> {
        let mut conn = self.conn.clone();
        INCR_WITH_EXPIRY
            .key(key)
            .arg(millis(window))
            .invoke_async(&mut conn)
            .await
            .map_err(map_err)
    }

    async fn set_add_with_expiry(
        &self,
        key: &str,
        member: &str,
        ttl: Duration,
    ) -> FastStoreResult<bool> {
        let mut conn = self.conn.clone();
        let added: i64 = SADD_WITH_EXPIRY
            .key(key)
            .arg(member)
            .arg(millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(added == 1)
    }

    async fn set_remove(&self, key: &str, member: &str) -> FastStoreResult<()> {
        let mut conn = self.conn.clone();
        let _removed: i64 = redis::cmd("SREM")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> FastStoreResult<()> {
        let mut conn = self.conn.clone();
        let _applied: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn ping(&self) -> FastStoreResult<()> {
        let mut conn = self.conn.clone();
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}
