// ============================
// crates/backend-lib/src/jobs.rs
// ============================
//! Background maintenance tasks.
//!
//! - **subscription_sweep**: every `sweep_interval`, flip lapsed paid
//!   subscriptions to inactive.
//! - **fast_store_purge** (optional): drop expired keys from an in-process
//!   fast store, which has no server-side eviction.
//!
//! A failed run is logged and retried on the next tick. Jobs talk to request
//! handlers only through the stores.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::error::AppError;
use crate::fast_store::MemoryFastStore;
use crate::profile::ProfileService;

pub struct SubscriptionSweeper {
    profiles: ProfileService,
    interval: Duration,
    purge: Option<MemoryFastStore>,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl SubscriptionSweeper {
    pub fn new(profiles: ProfileService, interval: Duration) -> Self {
        Self {
            profiles,
            interval,
            purge: None,
            handles: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Also purge expired keys of `store` on every tick
    pub fn with_fast_store_purge(mut self, store: MemoryFastStore) -> Self {
        self.purge = Some(store);
        self
    }

    /// One sweep; returns how many subscriptions were deactivated
    pub async fn run_once(&self) -> Result<u64, AppError> {
        Self::sweep(&self.profiles).await
    }

    async fn sweep(profiles: &ProfileService) -> Result<u64, AppError> {
        let rows = profiles.deactivate_expired().await?;
        if rows > 0 {
            tracing::info!(job = "subscription_sweep", rows, "expired subscriptions deactivated");
        } else {
            tracing::debug!(job = "subscription_sweep", "no expired subscriptions");
        }
        Ok(rows)
    }

    /// Spawn the periodic tasks. The first run happens one interval from now.
    pub async fn start(&self) {
        let mut handles = self.handles.lock().await;

        let profiles = self.profiles.clone();
        handles.push(Self::spawn_job("subscription_sweep", self.interval, move || {
            let profiles = profiles.clone();
            async move { Self::sweep(&profiles).await.map(|_| ()) }
        }));

        if let Some(store) = &self.purge {
            let store = store.clone();
            handles.push(Self::spawn_job("fast_store_purge", self.interval, move || {
                let store = store.clone();
                async move {
                    store.purge_expired();
                    Ok(())
                }
            }));
        }

        tracing::info!(interval_secs = self.interval.as_secs(), "background jobs started");
    }

    pub async fn stop(&self) {
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            handle.abort();
        }
        tracing::info!("background jobs stopped");
    }

    fn spawn_job<F, Fut>(name: &'static str, every: Duration, task: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), AppError>> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = task().await {
                    tracing::error!(job = name, error = %e, "background job failed");
                }
            }
        })
    }
}
