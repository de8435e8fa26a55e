use crate::error::ConfigError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

/// Conteneurs surveillés (liste fixe de la stack OnlyOffice)
pub const MONITORED_CONTAINERS: [&str; 6] = [
    "onlyoffice-community-server",
    "onlyoffice-mysql-server",
    "onlyoffice-document-server",
    "onlyoffice-mail-server",
    "onlyoffice-elasticsearch",
    "onlyoffice-control-panel",
];

/// Configuration exposée par /health/detailed (aucun secret ici)
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MonitorConfig {
    #[serde(rename = "check_interval")]
    pub check_interval_seconds: u64,
    #[serde(rename = "crm_monitoring")]
    pub crm_monitoring_enabled: bool,
    #[serde(rename = "containers_to_monitor")]
    pub monitored_container_names: BTreeSet<String>,
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: 30,
            crm_monitoring_enabled: true,
            monitored_container_names: MONITORED_CONTAINERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConf {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct SearchConf {
    /// host:port, sans schéma
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct RuntimeConf {
    /// URL http de l'API Docker Engine
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub monitor: MonitorConfig,
    pub database: DatabaseConf,
    pub search: SearchConf,
    pub runtime: RuntimeConf,
    pub bind: String,
}

impl Settings {
    /// Charge la configuration depuis l'environnement du process
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Variante testable : `lookup` remplace std::env::var
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let check_interval_seconds: u64 = parse_var(&lookup, "CHECK_INTERVAL", 30)?;
        if check_interval_seconds == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        let crm_monitoring_enabled = text("CRM_AUTO_LINK_MONITORING", "true").eq_ignore_ascii_case("true");

        Ok(Self {
            monitor: MonitorConfig {
                check_interval_seconds,
                crm_monitoring_enabled,
                ..MonitorConfig::default()
            },
            database: DatabaseConf {
                host: text("MYSQL_HOST", "onlyoffice-mysql-server"),
                user: text("MYSQL_USER", "root"),
                password: text("MYSQL_PASSWORD", "my-secret-pw"),
                database: text("MYSQL_DATABASE", "onlyoffice"),
                port: parse_var(&lookup, "MYSQL_PORT", 3306)?,
            },
            search: SearchConf {
                host: text("ELASTICSEARCH_HOST", "onlyoffice-elasticsearch:9200"),
            },
            runtime: RuntimeConf {
                endpoint: docker_endpoint(lookup("DOCKER_HOST").as_deref()),
            },
            bind: text("MONITOR_BIND", "0.0.0.0:8080"),
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}

/// DOCKER_HOST=tcp://host:2375 -> http://host:2375 (socket unix non supporté)
fn docker_endpoint(docker_host: Option<&str>) -> String {
    match docker_host {
        Some(h) if h.starts_with("tcp://") => format!("http://{}", &h["tcp://".len()..]),
        Some(h) if h.starts_with("http://") || h.starts_with("https://") => h.to_string(),
        _ => "http://localhost:2375".to_string(),
    }
}
