use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Horodatage RFC3339 utilisé dans toutes les réponses JSON
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

/// Valeur scalaire d'un champ de ProbeResult
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self { FieldValue::Bool(v) }
}
impl From<i64> for FieldValue {
    fn from(v: i64) -> Self { FieldValue::Int(v) }
}
impl From<u64> for FieldValue {
    fn from(v: u64) -> Self { FieldValue::Int(i64::try_from(v).unwrap_or(i64::MAX)) }
}
impl From<usize> for FieldValue {
    fn from(v: usize) -> Self { FieldValue::Int(i64::try_from(v).unwrap_or(i64::MAX)) }
}
impl From<f64> for FieldValue {
    fn from(v: f64) -> Self { FieldValue::Float(v) }
}
impl From<&str> for FieldValue {
    fn from(v: &str) -> Self { FieldValue::Text(v.to_string()) }
}
impl From<String> for FieldValue {
    fn from(v: String) -> Self { FieldValue::Text(v) }
}

/// Résultat normalisé d'une probe pour un tick.
///
/// Construit une fois puis remplacé en bloc dans le StateStore, jamais muté
/// après publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub probe_name: String,
    pub status: ProbeStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub observed_at: OffsetDateTime,
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Erreurs de sous-checks (ex: "crm") qui n'invalident pas le verdict principal
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_errors: BTreeMap<String, String>,
}

impl ProbeResult {
    pub fn new(probe_name: &str) -> Self {
        Self {
            probe_name: probe_name.to_string(),
            status: ProbeStatus::Unknown,
            observed_at: OffsetDateTime::now_utc(),
            fields: BTreeMap::new(),
            error: None,
            sub_errors: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: ProbeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn healthy(self) -> Self {
        self.with_status(ProbeStatus::Healthy)
    }

    pub fn field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn failure(mut self, status: ProbeStatus, error: impl ToString) -> Self {
        self.status = status;
        self.error = Some(error.to_string());
        self
    }

    pub fn sub_error(mut self, check: &str, error: impl ToString) -> Self {
        self.sub_errors.insert(check.to_string(), error.to_string());
        self
    }
}

/// État de healthcheck tel que rapporté par le runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerHealth {
    Healthy,
    Unhealthy,
    NoHealthcheck,
    Unknown,
}

impl ContainerHealth {
    /// `None` = aucun healthcheck configuré sur le conteneur
    pub fn from_reported(status: Option<&str>) -> Self {
        match status {
            None => ContainerHealth::NoHealthcheck,
            Some("healthy") => ContainerHealth::Healthy,
            Some("unhealthy") => ContainerHealth::Unhealthy,
            Some(_) => ContainerHealth::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub name: String,
    /// état brut du runtime (running, exited, restarting...)
    pub status: String,
    pub running: bool,
    pub health: ContainerHealth,
    /// verdict dérivé, cf. probes::container::derive_healthy
    pub healthy: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    pub restart_count: u64,
}

/// Alerte reçue sur le webhook, loggée puis oubliée
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub alert_name: String,
    pub status: String,
    pub labels: BTreeMap<String, String>,
}

/// Statistiques CRM calculées à la demande (GET /metrics/crm)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrmStats {
    pub total_emails_week: i64,
    pub linked_emails_week: i64,
    pub recent_emails_24h: i64,
    pub linking_rate: f64,
}
