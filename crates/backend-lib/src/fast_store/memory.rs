// ============================
// crates/backend-lib/src/fast_store/memory.rs
// ============================
//! In-process fast store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{FastStore, FastStoreError, FastStoreResult};
use crate::clock::{Clock, SystemClock};

#[derive(Debug)]
struct Counter {
    value: i64,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemberSet {
    members: HashSet<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl MemberSet {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// `FastStore` backed by `DashMap`; each key's entry lock makes the
/// read-modify-write steps atomic. Expiry follows the injected clock.
#[derive(Clone)]
pub struct MemoryFastStore {
    counters: Arc<DashMap<String, Counter>>,
    sets: Arc<DashMap<String, MemberSet>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryFastStore {
    fn default() -> Self {
        Self::new()
    }
}

fn ttl(duration: Duration) -> FastStoreResult<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|e| FastStoreError::Unavailable(format!("expiry out of range: {e}")))
}

impl MemoryFastStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: Arc::new(DashMap::new()),
            sets: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Drop every expired key
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.counters.retain(|_, counter| counter.expires_at > now);
        self.sets.retain(|_, set| !set.is_expired(now));
    }

    pub fn key_count(&self) -> usize {
        self.counters.len() + self.sets.len()
    }
}

#[async_trait]
impl FastStore for MemoryFastStore {
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> FastStoreResult<i64> {
        let window = ttl(window)?;
        let now = self.clock.now();

        let mut counter = self.counters.entry(key.to_string()).or_insert_with(|| Counter {
            value: 0,
            expires_at: now + window,
        });
        if counter.expires_at <= now {
            counter.value = 0;
            counter.expires_at = now + window;
        }
        counter.value += 1;
        Ok(counter.value)
    }

    async fn set_add_with_expiry(
        &self,
        key: &str,
        member: &str,
        ttl_after: Duration,
    ) -> FastStoreResult<bool> {
        let ttl_after = ttl(ttl_after)?;
        let now = self.clock.now();

        let mut set = self.sets.entry(key.to_string()).or_default();
        if set.is_expired(now) {
            *set = MemberSet::default();
        }
        let added = set.members.insert(member.to_string());
        if added {
            set.expires_at = Some(now + ttl_after);
        }
        Ok(added)
    }

    async fn set_remove(&self, key: &str, member: &str) -> FastStoreResult<()> {
        if let Some(mut set) = self.sets.get_mut(key) {
            set.members.remove(member);
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_after: Duration) -> FastStoreResult<()> {
        let at = self.clock.now() + ttl(ttl_after)?;
        if let Some(mut counter) = self.counters.get_mut(key) {
            counter.expires_at = at;
        }
        if let Some(mut set) = self.sets.get_mut(key) {
            set.expires_at = Some(at);
        }
        Ok(())
    }

    async fn ping(&self) -> FastStoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn store() -> (MemoryFastStore, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 9, 27, 12, 0, 0).unwrap());
        (MemoryFastStore::with_clock(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn counter_window_is_fixed_from_first_increment() {
        let (store, clock) = store();
        let window = Duration::from_secs(60);

        assert_eq!(store.incr_with_expiry("k", window).await.unwrap(), 1);
        clock.advance(chrono::Duration::seconds(50));
        assert_eq!(store.incr_with_expiry("k", window).await.unwrap(), 2);

        // Later increments did not push the expiry out
        clock.advance(chrono::Duration::seconds(10));
        assert_eq!(store.incr_with_expiry("k", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn counters_are_per_key() {
        let (store, _) = store();
        let window = Duration::from_secs(60);
        store.incr_with_expiry("a", window).await.unwrap();
        store.incr_with_expiry("a", window).await.unwrap();
        assert_eq!(store.incr_with_expiry("b", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let (store, _) = store();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.incr_with_expiry("hot", Duration::from_secs(60)).await.unwrap()
            }));
        }
        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn set_add_reports_membership_and_expires() {
        let (store, clock) = store();
        let ttl = Duration::from_secs(25 * 3600);

        assert!(store.set_add_with_expiry("day", "7", ttl).await.unwrap());
        assert!(!store.set_add_with_expiry("day", "7", ttl).await.unwrap());

        store.set_remove("day", "7").await.unwrap();
        assert!(store.set_add_with_expiry("day", "7", ttl).await.unwrap());

        clock.advance(chrono::Duration::hours(26));
        assert!(store.set_add_with_expiry("day", "7", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn expire_moves_the_deadline() {
        let (store, clock) = store();
        store.incr_with_expiry("c", Duration::from_secs(60)).await.unwrap();
        store.expire("c", Duration::from_secs(600)).await.unwrap();

        clock.advance(chrono::Duration::seconds(120));
        assert_eq!(store.incr_with_expiry("c", Duration::from_secs(60)).await.unwrap(), 2);

        // Missing keys are not created
        store.expire("nothing", Duration::from_secs(1)).await.unwrap();
        assert_eq!(store.key_count(), 1);
    }

    #[tokio::test]
    async fn purge_drops_expired_keys() {
        let (store, clock) = store();
        store.incr_with_expiry("c", Duration::from_secs(1)).await.unwrap();
        store
            .set_add_with_expiry("s", "m", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(store.key_count(), 2);

        clock.advance(chrono::Duration::seconds(2));
        store.purge_expired();
        assert_eq!(store.key_count(), 0);
    }
}
