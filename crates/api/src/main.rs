use std::sync::Arc;

use anyhow::Context;

use agora_api::app::{build_app, services::AppServices};
use agora_auth::TokenService;
use agora_infra::{AppConfig, ForumStore, InMemoryStore, PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agora_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(?config, "configuration loaded");

    let store: Arc<dyn ForumStore> = match &config.database {
        Some(db) => {
            let pg = PostgresStore::connect(&db.url, db.max_connections)
                .await
                .context("failed to connect to Postgres")?;
            pg.migrate().await.context("failed to apply schema")?;
            Arc::new(pg)
        }
        None => Arc::new(InMemoryStore::new()),
    };

    let ttl = config.token_ttl().context("invalid configuration")?;
    let tokens = TokenService::new(config.jwt_secret.as_bytes(), ttl);
    let app = build_app(AppServices::new(store, tokens));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
