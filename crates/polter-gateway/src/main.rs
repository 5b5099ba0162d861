mod routes;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result as AnyResult};
use polter_platform::{
    PgSettlementStore, RedisPayoutDispatcher, ServiceConfig, connect_database, ensure_schema,
};
use tracing::info;

use crate::routes::AppState;

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "polter_gateway=info,polter_settlement=info,polter_platform=info".to_string()
        }))
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8080")?;
    let pool = connect_database(&config.database_url).await?;
    ensure_schema(&pool)
        .await
        .context("failed to prepare settlement schema")?;
    let dispatcher = RedisPayoutDispatcher::connect(&config.redis_url)?;

    let state = AppState::new(
        Arc::new(PgSettlementStore::new(pool)),
        Arc::new(dispatcher),
        config.default_rate_per_task,
        config.provider_timeout,
    );
    let router = routes::router(state);

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
