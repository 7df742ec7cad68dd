use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use citytailor_api::api::{create_router, AppState};
use citytailor_api::config::Config;
use citytailor_api::db::{create_pool, create_redis_client, PgStore, PopularitySignal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!().run(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    // The popularity signal is advisory; run without it if redis is down
    let (signal, _signal_handle) = match create_redis_client(&config.redis_url) {
        Ok(client) => {
            let (signal, handle) = PopularitySignal::new(client);
            (signal, Some(handle))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, popularity signal disabled");
            (PopularitySignal::disabled(), None)
        }
    };

    let state = AppState::new(
        store.clone(),
        store,
        signal,
        config.profile_lookback_days,
        Duration::from_millis(config.scorer_timeout_ms),
    );

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "CityTailor recommendation service listening");
    axum::serve(listener, app).await?;

    Ok(())
}
