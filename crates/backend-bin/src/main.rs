// ============================
// crates/backend-bin/src/main.rs
// ============================
//! Tokio / Axum entry-point for the account service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use account_backend::{
    clock::{Clock, SystemClock},
    config::{LogSettings, Settings},
    create_router,
    fast_store::{FastStore, MemoryFastStore},
    jobs::SubscriptionSweeper,
    storage::MemoryStore,
    AppState, Stores,
};
use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "account-server", version, about = "Account and session service")]
struct Cli {
    /// Path to a TOML config file (default: ./config.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.bind_addr`
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn init_tracing(log: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[cfg(feature = "redis")]
async fn connect_fast_store(url: &str) -> anyhow::Result<Arc<dyn FastStore>> {
    let store = account_backend::fast_store::RedisFastStore::connect(url).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn connect_fast_store(_url: &str) -> anyhow::Result<Arc<dyn FastStore>> {
    anyhow::bail!("storage.fast_store_url is set but this build lacks the `redis` feature")
}

#[cfg(feature = "postgres")]
async fn connect_durable_store(url: &str, fast: Arc<dyn FastStore>) -> anyhow::Result<Stores> {
    let store = account_backend::storage::PgStore::connect(url).await?;
    store.migrate().await?;
    Ok(Stores::new(Arc::new(store), fast))
}

#[cfg(not(feature = "postgres"))]
async fn connect_durable_store(_url: &str, _fast: Arc<dyn FastStore>) -> anyhow::Result<Stores> {
    anyhow::bail!("storage.database_url is set but this build lacks the `postgres` feature")
}

/// Build the stores and ping the fast store once. Returns the in-process
/// fast store when one is used so its expired keys can be purged.
async fn build_stores(
    settings: &Settings,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<(Stores, Option<MemoryFastStore>)> {
    let (fast, local_fast) = match &settings.storage.fast_store_url {
        Some(url) => (connect_fast_store(url).await?, None),
        None => {
            tracing::warn!("no fast_store_url configured, using in-process fast store");
            let store = MemoryFastStore::with_clock(clock.clone());
            let shared: Arc<dyn FastStore> = Arc::new(store.clone());
            (shared, Some(store))
        },
    };
    fast.ping().await.context("fast store did not answer the startup ping")?;

    let stores = match &settings.storage.database_url {
        Some(url) => connect_durable_store(url, fast).await?,
        None => {
            tracing::warn!("no database_url configured, using in-memory durable store");
            Stores::new(Arc::new(MemoryStore::with_clock(clock)), fast)
        },
    };
    Ok((stores, local_fast))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => tracing::error!(error = %e, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(bind) = cli.bind {
        settings.server.bind_addr = bind;
    }

    init_tracing(&settings.log);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (stores, local_fast) = build_stores(&settings, clock.clone()).await?;

    let bind_addr = settings.server.bind_addr;
    let sweep_interval = settings.sweep_interval();
    let state = Arc::new(AppState::new(settings, stores, clock)?);

    let mut sweeper = SubscriptionSweeper::new(state.profiles.clone(), sweep_interval);
    if let Some(store) = local_fast {
        sweeper = sweeper.with_fast_store_purge(store);
    }
    sweeper.start().await;

    let app = create_router(state);
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.stop().await;
    Ok(())
}
