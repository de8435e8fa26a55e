use super::{SearchCluster, SEARCH};
use crate::metrics::MetricRegistry;
use crate::models::{ProbeResult, ProbeStatus};
use std::sync::Arc;
use tracing::error;

/// Score numérique du statut de cluster : green 100, yellow 50, le reste 0
pub fn health_score(status: &str) -> i64 {
    match status {
        "green" => 100,
        "yellow" => 50,
        _ => 0,
    }
}

fn probe_status(status: &str) -> ProbeStatus {
    match status {
        "green" => ProbeStatus::Healthy,
        "yellow" => ProbeStatus::Degraded,
        "red" => ProbeStatus::Unhealthy,
        _ => ProbeStatus::Unknown,
    }
}

pub struct SearchHealthProbe {
    cluster: Arc<dyn SearchCluster>,
    metrics: Arc<MetricRegistry>,
}

impl SearchHealthProbe {
    pub fn new(cluster: Arc<dyn SearchCluster>, metrics: Arc<MetricRegistry>) -> Self {
        Self { cluster, metrics }
    }

    pub async fn run(&self) -> ProbeResult {
        match self.cluster.cluster_health().await {
            Ok(health) => {
                let score = health_score(&health.status);
                self.metrics.set_search_health(score);
                ProbeResult::new(SEARCH)
                    .with_status(probe_status(&health.status))
                    .field("status", health.status.as_str())
                    .field("score", score)
                    .field("nodes", health.number_of_nodes)
                    .field("active_shards", health.active_shards)
            }
            Err(e) => {
                error!("Elasticsearch health check failed: {e}");
                self.metrics.set_search_health(0);
                ProbeResult::new(SEARCH).failure(ProbeStatus::Unhealthy, e)
            }
        }
    }
}
