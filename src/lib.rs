pub(crate) mod api;
pub(crate) mod collaborators;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod store;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Context;

use crate::collaborators::Collaborators;
use crate::core::config::{Settings, StoreBackend};
use crate::core::{state::AppState, telemetry};
use crate::store::{ExamStore, MemoryStore, PgStore};

async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn ExamStore>> {
    match settings.sessions().store_backend {
        StoreBackend::Postgres => {
            let pool = db::init_pool(settings).await.context("connecting to postgres")?;
            db::run_migrations(&pool).await.context("running migrations")?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; sessions are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn bootstrap() -> anyhow::Result<AppState> {
    dotenvy::dotenv().ok();

    let settings = Settings::load().context("loading settings")?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let store = open_store(&settings).await?;
    let collaborators = Collaborators::from_settings(&settings)?;
    Ok(AppState::new(settings, store, collaborators))
}

pub async fn run() -> anyhow::Result<()> {
    let state = bootstrap().await?;

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr())
        .await
        .with_context(|| format!("binding {}", state.settings().server_addr()))?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Exam sessions API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    tracing::info!("Exam sessions API stopped");
    Ok(())
}

pub async fn run_worker() -> anyhow::Result<()> {
    let state = bootstrap().await?;
    tasks::scheduler::run(state).await
}
