//! Reverie Engine - personalization service entrypoint
//!
//! Owns the engine lifecycle: build the hierarchical bandit at startup,
//! expose a health endpoint while running, flush and close the bandit when
//! the server exits. The recommendation API itself is served by the gateway
//! collaborator, which drives this crate as a library.

use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Context as _;
use reverie_core::{load_dotenv, BanditConfig, ConfigLoader, DatabaseConfig, DatabasePool, ServiceConfig};
use reverie_engine::{HierarchicalBandit, PostgresModelStore};
use std::sync::Arc;
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .json()
        .init();

    let service_config = ServiceConfig::from_env().context("loading service config")?;
    service_config.validate().context("validating service config")?;
    let db_config = DatabaseConfig::from_env().context("loading database config")?;
    db_config.validate().context("validating database config")?;
    let bandit_config = BanditConfig::from_env().context("loading bandit config")?;
    bandit_config.validate().context("validating bandit config")?;

    let db = DatabasePool::new(&db_config)
        .await
        .context("connecting to database")?;

    let store = Arc::new(PostgresModelStore::new(db.pool().clone()));
    let bandit = Arc::new(HierarchicalBandit::new(store, bandit_config).await);

    info!(
        "Starting Reverie engine on {}:{}",
        service_config.host, service_config.port
    );

    let db_for_health = db.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db_for_health.clone()))
            .route("/health", web::get().to(health_check))
    })
    .bind((service_config.host.as_str(), service_config.port))?
    .run()
    .await?;

    // Server is down; persist everything the cache still holds.
    bandit.close().await;
    info!("Reverie engine stopped");

    Ok(())
}

async fn health_check(db: web::Data<DatabasePool>) -> HttpResponse {
    let db_healthy = db.is_healthy().await;
    let status = if db_healthy { "healthy" } else { "degraded" };
    HttpResponse::Ok().json(serde_json::json!({
        "status": status,
        "service": "reverie-engine",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
    }))
}
