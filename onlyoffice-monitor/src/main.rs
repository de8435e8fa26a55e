/**
 * ONLYOFFICE MONITOR - Point d'entrée du service de supervision
 *
 * RÔLE : Bootstrap complet : .env, logs, configuration, clients externes,
 * agrégateur Monitor, Scheduler périodique et serveur HTTP.
 *
 * ARCHITECTURE : Scheduler (tick toutes les CHECK_INTERVAL secondes) et
 * serveur Axum partagent un seul Arc<Monitor> ; arrêt propre sur Ctrl+C.
 */

mod alerts;
mod clients;
mod config;
mod error;
mod http;
mod metrics;
mod models;
mod monitor;
mod probes;
mod scheduler;
mod state;
#[cfg(test)]
mod testing;

use crate::clients::{DockerClient, ElasticClient, MySqlDatabase};
use crate::config::Settings;
use crate::http::AppState;
use crate::metrics::MetricRegistry;
use crate::monitor::Monitor;
use crate::scheduler::Scheduler;

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("onlyoffice_monitor=info,sqlx=warn")),
        )
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;

    // clients des systèmes surveillés
    let runtime = Arc::new(DockerClient::new(&settings.runtime).context("docker client")?);
    let database = Arc::new(MySqlDatabase::new(&settings.database));
    let search = Arc::new(ElasticClient::new(&settings.search).context("elasticsearch client")?);
    let metrics = Arc::new(MetricRegistry::new().context("metric registry")?);

    let monitor = Arc::new(Monitor::new(
        settings.monitor.clone(),
        runtime,
        database,
        search,
        metrics,
    ));

    info!(
        containers = settings.monitor.monitored_container_names.len(),
        crm_monitoring = settings.monitor.crm_monitoring_enabled,
        interval_secs = settings.monitor.check_interval_seconds,
        docker = %settings.runtime.endpoint,
        "OnlyOffice monitor starting"
    );

    // boucle périodique
    let shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(
        monitor.clone(),
        settings.monitor.check_interval(),
        shutdown.clone(),
    )
    .spawn();

    // HTTP
    let app = http::build_router(AppState { monitor });
    let listener = TcpListener::bind(&settings.bind)
        .await
        .with_context(|| format!("cannot bind {}", settings.bind))?;
    info!("listening on http://{}", settings.bind);

    let token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
                _ = token.cancelled() => {}
            }
        })
        .await
        .context("http server")?;

    shutdown.cancel();
    scheduler.await.context("scheduler task")?;
    Ok(())
}
