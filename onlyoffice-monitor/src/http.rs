/**
 * API HTTP DU MONITOR - Surface REST + exposition Prometheus
 *
 * RÔLE :
 * Exposer l'état calculé par le Scheduler et quelques opérations à la
 * demande (conteneurs, statistiques CRM, logs), plus le webhook Alertmanager.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, état unique AppState (Arc<Monitor>)
 * - /health ne touche aucune dépendance : toujours 200
 * - /health/detailed lit le StateStore, sans lancer de probe
 * - /health/docker et /api/containers forcent une ContainerProbe
 * - Middleware de comptage : monitor_requests_total{method, endpoint}
 * - Erreurs : MonitorError -> {"error": msg} avec le bon code HTTP
 */

use crate::alerts::parse_alerts;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::metrics::CONTENT_TYPE;
use crate::models::{now_rfc3339, CrmStats, ProbeResult};
use crate::monitor::Monitor;
use crate::probes::{CONTAINERS, DATABASE, SEARCH};
use crate::state::ContainerSnapshot;
use axum::body::Bytes;
use axum::extract::{MatchedPath, Path, Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
}

#[derive(Serialize)]
struct DetailedHealth {
    timestamp: String,
    /// enregistrements de la dernière ContainerProbe, vide si elle a échoué
    containers: Arc<ContainerSnapshot>,
    /// verdict (et erreur éventuelle) de la dernière ContainerProbe
    container_probe: Option<Arc<ProbeResult>>,
    mysql: Option<Arc<ProbeResult>>,
    elasticsearch: Option<Arc<ProbeResult>>,
    config: MonitorConfig,
}

#[derive(Serialize)]
struct LogsView {
    container: String,
    logs: Vec<String>,
    timestamp: String,
}

async fn count_requests(State(app): State<AppState>, req: Request, next: Next) -> Response {
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    app.monitor.metrics().record_request(req.method().as_str(), &endpoint);
    next.run(req).await
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(health_detailed))
        .route("/health/docker", get(containers))
        .route("/metrics", get(metrics))
        .route("/metrics/crm", get(crm_metrics))
        .route("/webhook/alerts", post(alerts_webhook))
        .route("/api/containers", get(containers))
        .route("/api/logs/{container_name}", get(container_logs))
        .route_layer(middleware::from_fn_with_state(app_state.clone(), count_requests))
        .with_state(app_state)
}

// GET /health (liveness, aucune dépendance contactée)
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "timestamp": now_rfc3339() }))
}

// GET /health/detailed (dernier état connu, null pour une probe jamais exécutée)
async fn health_detailed(State(app): State<AppState>) -> Json<DetailedHealth> {
    let store = app.monitor.store();
    Json(DetailedHealth {
        timestamp: now_rfc3339(),
        containers: store.containers(),
        container_probe: store.get(CONTAINERS),
        mysql: store.get(DATABASE),
        elasticsearch: store.get(SEARCH),
        config: app.monitor.config().clone(),
    })
}

// GET /health/docker, /api/containers
async fn containers(State(app): State<AppState>) -> Result<Json<Arc<ContainerSnapshot>>, MonitorError> {
    Ok(Json(app.monitor.refresh_containers().await?))
}

// GET /metrics (format texte Prometheus)
async fn metrics(State(app): State<AppState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], app.monitor.metrics().render())
}

// GET /metrics/crm
async fn crm_metrics(State(app): State<AppState>) -> Result<Json<CrmStats>, MonitorError> {
    Ok(Json(app.monitor.crm_stats().await?))
}

// POST /webhook/alerts (payload Alertmanager)
async fn alerts_webhook(body: Bytes) -> Result<Json<serde_json::Value>, MonitorError> {
    let alerts = parse_alerts(&body).inspect_err(|e| warn!("Alert handling error: {e}"))?;
    info!("Received {} alerts", alerts.len());
    for alert in &alerts {
        info!(
            alert = %alert.alert_name,
            status = %alert.status,
            "Alert: {} - Status: {}",
            alert.alert_name,
            alert.status
        );
    }
    Ok(Json(serde_json::json!({ "status": "received" })))
}

// GET /api/logs/{container_name}
async fn container_logs(
    State(app): State<AppState>,
    Path(container_name): Path<String>,
) -> Result<Json<LogsView>, MonitorError> {
    let logs = app.monitor.container_logs(&container_name).await?;
    Ok(Json(LogsView {
        container: container_name,
        logs,
        timestamp: now_rfc3339(),
    }))
}
