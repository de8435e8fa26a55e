/**
 * PROBES - Interrogation des dépendances externes de la stack OnlyOffice
 *
 * RÔLE :
 * Chaque probe contacte un seul système externe et renvoie un ProbeResult
 * normalisé. Les erreurs typées (MonitorError) ne sortent jamais d'une probe
 * lancée par le scheduler : elles deviennent un statut Unhealthy + log.
 *
 * FONCTIONNEMENT :
 * - ContainerProbe : runtime Docker (état + healthcheck par conteneur)
 * - DatabaseProbe : MySQL (connectivité, connexions actives) + sous-check CRM
 * - CrmLinkingProbe : compteurs auto-link CRM et heuristique de doublons
 * - SearchHealthProbe : santé du cluster Elasticsearch
 *
 * Les systèmes externes sont vus à travers les traits ci-dessous ; les
 * implémentations réelles vivent dans crate::clients.
 */

pub mod container;
pub mod crm;
pub mod database;
pub mod search;

pub use container::ContainerProbe;
pub use database::DatabaseProbe;
pub use search::SearchHealthProbe;

use crate::error::MonitorResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Noms sous lesquels les résultats sont publiés dans le StateStore
pub const CONTAINERS: &str = "containers";
pub const DATABASE: &str = "mysql";
pub const SEARCH: &str = "elasticsearch";

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInspect {
    pub name: String,
    /// running, exited, paused, restarting...
    pub state: String,
    pub running: bool,
    /// None si aucun healthcheck n'est configuré
    pub health_status: Option<String>,
    pub started_at: Option<OffsetDateTime>,
    pub restart_count: u64,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Tous les conteneurs, arrêtés compris
    async fn list_containers(&self) -> MonitorResult<Vec<ContainerSummary>>;
    async fn inspect_container(&self, id: &str) -> MonitorResult<ContainerInspect>;
    /// Dernières lignes de log, horodatées ; NotFound si le conteneur n'existe pas
    async fn tail_logs(&self, name: &str, lines: usize) -> MonitorResult<Vec<String>>;
}

/// Un message de mail_mail vu par le check CRM
#[derive(Debug, Clone, PartialEq)]
pub struct MailRow {
    pub id: i64,
    pub subject: String,
    pub sender: String,
    pub received_at: PrimitiveDateTime,
    /// conversation rattachée à une entité CRM
    pub linked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrmCounts {
    pub total: i64,
    pub linked: i64,
    pub recent: i64,
}

/// Connexion à durée de vie limitée : la lâcher (drop) libère la connexion,
/// quel que soit le chemin de sortie.
#[async_trait]
pub trait DbSession: Send {
    async fn ping(&mut self) -> MonitorResult<()>;
    async fn active_connections(&mut self) -> MonitorResult<i64>;
    async fn mail_since(&mut self, window: Duration) -> MonitorResult<Vec<MailRow>>;
    /// total 7 jours, liés 7 jours, reçus sur 24h
    async fn crm_weekly_counts(&mut self) -> MonitorResult<CrmCounts>;
    async fn close(self: Box<Self>);
}

#[async_trait]
pub trait Database: Send + Sync {
    async fn connect(&self) -> MonitorResult<Box<dyn DbSession>>;
}

/// Réponse de `GET /_cluster/health` (champs utilisés uniquement)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClusterHealth {
    pub status: String,
    pub number_of_nodes: u64,
    pub active_shards: u64,
}

#[async_trait]
pub trait SearchCluster: Send + Sync {
    async fn cluster_health(&self) -> MonitorResult<ClusterHealth>;
}
