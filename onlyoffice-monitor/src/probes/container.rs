use super::{ContainerInspect, ContainerRuntime, CONTAINERS};
use crate::config::MonitorConfig;
use crate::error::MonitorResult;
use crate::metrics::MetricRegistry;
use crate::models::{ContainerHealth, ContainerRecord, ProbeResult, ProbeStatus};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error};

/// Verdict sain/malsain d'un conteneur.
///
/// Un conteneur arrêté est toujours malsain. En marche, un healthcheck
/// explicite fait foi (seul `healthy` passe) ; sans healthcheck, tourner suffit.
pub fn derive_healthy(running: bool, health: ContainerHealth) -> bool {
    running && matches!(health, ContainerHealth::Healthy | ContainerHealth::NoHealthcheck)
}

fn to_record(inspect: ContainerInspect) -> ContainerRecord {
    let health = ContainerHealth::from_reported(inspect.health_status.as_deref());
    ContainerRecord {
        healthy: derive_healthy(inspect.running, health),
        name: inspect.name,
        status: inspect.state,
        running: inspect.running,
        health,
        started_at: inspect.started_at,
        restart_count: inspect.restart_count,
    }
}

pub struct ContainerProbe {
    runtime: Arc<dyn ContainerRuntime>,
    monitored: BTreeSet<String>,
    metrics: Arc<MetricRegistry>,
}

impl ContainerProbe {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: &MonitorConfig, metrics: Arc<MetricRegistry>) -> Self {
        Self {
            runtime,
            monitored: config.monitored_container_names.clone(),
            metrics,
        }
    }

    /// Liste + inspection des conteneurs surveillés.
    ///
    /// Une erreur du runtime fait échouer toute la probe : pas de résultat
    /// partiel, et les gauges ne sont touchées qu'une fois la liste complète.
    pub async fn probe(&self) -> MonitorResult<Vec<ContainerRecord>> {
        let summaries = self.runtime.list_containers().await?;

        let mut records = Vec::new();
        for summary in summaries.iter().filter(|c| self.monitored.contains(&c.name)) {
            let inspect = self.runtime.inspect_container(&summary.id).await?;
            records.push(to_record(inspect));
        }

        for name in &self.monitored {
            match records.iter().find(|r| &r.name == name) {
                Some(r) => self.metrics.set_container(name, r.running, r.healthy),
                // absent du runtime : ni en marche ni sain à cet instant
                None => self.metrics.set_container(name, false, false),
            }
        }
        debug!(found = records.len(), monitored = self.monitored.len(), "container probe done");
        Ok(records)
    }

    /// Verdict global : Healthy si tous les conteneurs surveillés sont sains,
    /// Degraded si au moins un l'est, Unhealthy sinon.
    pub fn summarize(&self, records: &[ContainerRecord]) -> ProbeResult {
        let running = records.iter().filter(|r| r.running).count();
        let healthy = records.iter().filter(|r| r.healthy).count();
        let status = if healthy == self.monitored.len() {
            ProbeStatus::Healthy
        } else if healthy > 0 {
            ProbeStatus::Degraded
        } else {
            ProbeStatus::Unhealthy
        };
        ProbeResult::new(CONTAINERS)
            .with_status(status)
            .field("monitored", self.monitored.len())
            .field("found", records.len())
            .field("running", running)
            .field("healthy", healthy)
    }

    /// Probe + conversion en ProbeResult ; les enregistrements sont renvoyés
    /// à part pour le snapshot conteneurs.
    pub async fn run(&self) -> (ProbeResult, Option<Vec<ContainerRecord>>) {
        match self.probe().await {
            Ok(records) => (self.summarize(&records), Some(records)),
            Err(e) => {
                error!("Error checking container health: {e}");
                (ProbeResult::new(CONTAINERS).failure(ProbeStatus::Unhealthy, &e), None)
            }
        }
    }
}
