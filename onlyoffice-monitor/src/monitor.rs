/**
 * MONITOR - Agrégateur construit au démarrage
 *
 * RÔLE :
 * Regroupe les probes, le StateStore et le MetricRegistry dans un seul objet
 * partagé (Arc) entre le Scheduler et la couche HTTP.
 *
 * FONCTIONNEMENT :
 * - run_tick : les trois probes en parallèle, chacune sur sa tâche et
 *   bornée par probe_timeout ; un panic ou un dépassement devient un
 *   résultat Unknown sans bloquer les autres
 * - refresh_containers / crm_stats / container_logs : opérations à la demande
 *   des routes HTTP, mêmes règles de publication que le tick
 */

use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::metrics::MetricRegistry;
use crate::models::{CrmStats, ProbeResult, ProbeStatus};
use crate::probes::{
    ContainerProbe, ContainerRuntime, Database, DatabaseProbe, SearchCluster, SearchHealthProbe,
    CONTAINERS, DATABASE, SEARCH,
};
use crate::state::{ContainerSnapshot, StateStore};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;
use tokio::time::timeout;
use tracing::{error, info};

/// Nombre de lignes renvoyées par /api/logs
pub const LOG_TAIL_LINES: usize = 100;

pub struct Monitor {
    config: MonitorConfig,
    store: StateStore,
    metrics: Arc<MetricRegistry>,
    runtime: Arc<dyn ContainerRuntime>,
    database: Arc<dyn Database>,
    container_probe: Arc<ContainerProbe>,
    database_probe: Arc<DatabaseProbe>,
    search_probe: Arc<SearchHealthProbe>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        runtime: Arc<dyn ContainerRuntime>,
        database: Arc<dyn Database>,
        search: Arc<dyn SearchCluster>,
        metrics: Arc<MetricRegistry>,
    ) -> Self {
        let container_probe = Arc::new(ContainerProbe::new(runtime.clone(), &config, metrics.clone()));
        let database_probe = Arc::new(DatabaseProbe::new(
            database.clone(),
            metrics.clone(),
            config.crm_monitoring_enabled,
        ));
        let search_probe = Arc::new(SearchHealthProbe::new(search, metrics.clone()));
        Self {
            config,
            store: StateStore::new(),
            metrics,
            runtime,
            database,
            container_probe,
            database_probe,
            search_probe,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn metrics(&self) -> &MetricRegistry {
        &self.metrics
    }

    /// Borne de chaque probe : 80 % de l'intervalle, pour qu'un tick se
    /// termine toujours avant le suivant.
    pub fn probe_timeout(&self) -> Duration {
        self.config.check_interval().mul_f64(0.8)
    }

    /// Un tick complet : exactement un ProbeResult publié par probe, même si
    /// une dépendance ne répond jamais.
    pub async fn run_tick(&self) {
        let started = Instant::now();
        let limit = self.probe_timeout();
        info!("Running scheduled health checks...");

        let containers = tokio::spawn({
            let probe = self.container_probe.clone();
            async move {
                timeout(limit, probe.run())
                    .await
                    .unwrap_or_else(|_| (timed_out(CONTAINERS, limit), None))
            }
        });
        let database = tokio::spawn({
            let probe = self.database_probe.clone();
            async move {
                timeout(limit, probe.run())
                    .await
                    .unwrap_or_else(|_| timed_out(DATABASE, limit))
            }
        });
        let search = tokio::spawn({
            let probe = self.search_probe.clone();
            async move {
                timeout(limit, probe.run())
                    .await
                    .unwrap_or_else(|_| timed_out(SEARCH, limit))
            }
        });
        let (containers, database, search) = tokio::join!(containers, database, search);

        let (result, records) = containers.unwrap_or_else(|e| (aborted(CONTAINERS, e), None));
        // pas d'enregistrements périmés après un échec du runtime
        self.store.publish_containers(records.unwrap_or_default());
        self.store.publish(result);
        self.store.publish(database.unwrap_or_else(|e| aborted(DATABASE, e)));
        self.store.publish(search.unwrap_or_else(|e| aborted(SEARCH, e)));

        let degraded = self
            .store
            .results()
            .values()
            .filter(|r| r.status != ProbeStatus::Healthy)
            .count();
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            not_healthy = degraded,
            "health checks complete"
        );
    }

    /// ContainerProbe forcée (GET /health/docker, /api/containers)
    pub async fn refresh_containers(&self) -> MonitorResult<Arc<ContainerSnapshot>> {
        match self.bounded(CONTAINERS, self.container_probe.probe()).await {
            Ok(records) => {
                self.store.publish(self.container_probe.summarize(&records));
                Ok(self.store.publish_containers(records))
            }
            Err(e) => {
                error!("Error checking container health: {e}");
                self.store.publish_containers(Vec::new());
                self.store
                    .publish(ProbeResult::new(CONTAINERS).failure(ProbeStatus::Unhealthy, &e));
                Err(e)
            }
        }
    }

    /// Statistiques CRM sur 7 jours, calculées sur une connexion dédiée
    pub async fn crm_stats(&self) -> MonitorResult<CrmStats> {
        let query = async {
            let mut session = self.database.connect().await?;
            let counts = session.crm_weekly_counts().await;
            session.close().await;
            counts.map(CrmStats::from)
        };
        let stats = self.bounded(DATABASE, query).await;
        if let Err(e) = &stats {
            error!("CRM metrics error: {e}");
        }
        stats
    }

    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = MonitorResult<T>>,
    ) -> MonitorResult<T> {
        let limit = self.probe_timeout();
        timeout(limit, fut)
            .await
            .unwrap_or_else(|_| Err(no_answer(what, limit)))
    }

    pub async fn container_logs(&self, name: &str) -> MonitorResult<Vec<String>> {
        self.runtime.tail_logs(name, LOG_TAIL_LINES).await
    }
}

fn no_answer(what: &str, limit: Duration) -> MonitorError {
    MonitorError::Connectivity(format!("{what} did not answer within {:.1}s", limit.as_secs_f64()))
}

fn timed_out(probe: &str, limit: Duration) -> ProbeResult {
    let e = no_answer(probe, limit);
    error!(probe, "{e}");
    ProbeResult::new(probe).failure(ProbeStatus::Unknown, e)
}

fn aborted(probe: &str, e: JoinError) -> ProbeResult {
    error!(probe, "probe task aborted: {e}");
    ProbeResult::new(probe).failure(ProbeStatus::Unknown, e)
}
