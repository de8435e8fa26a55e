//! Registre Prometheus du monitor.
//!
//! Les gauges sont écrasées à chaque mise à jour (vérité instantanée), les
//! compteurs n'avancent que par `inc_by` : jamais de delta négatif, jamais
//! d'accès à la représentation interne d'une métrique.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

pub use prometheus::TEXT_FORMAT as CONTENT_TYPE;

pub struct MetricRegistry {
    registry: Registry,
    requests: IntCounterVec,
    container_status: IntGaugeVec,
    health_status: IntGaugeVec,
    mysql_connections: IntGauge,
    search_health: IntGauge,
    crm_emails: IntCounter,
    crm_errors: IntCounter,
    crm_service_up: IntGauge,
    duplication_events: IntCounter,
}

impl MetricRegistry {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("monitor_requests_total", "Total requests"),
            &["method", "endpoint"],
        )?;
        let container_status = IntGaugeVec::new(
            Opts::new("container_status", "Container status"),
            &["container"],
        )?;
        let health_status = IntGaugeVec::new(
            Opts::new("onlyoffice_health_status", "Health status of services"),
            &["service"],
        )?;
        let mysql_connections = IntGauge::new("mysql_connections_active", "Active MySQL connections")?;
        let search_health =
            IntGauge::new("elasticsearch_health_score", "Elasticsearch health score (0-100)")?;
        let crm_emails = IntCounter::new(
            "crm_autolink_emails_total",
            "Total emails processed for CRM auto-linking",
        )?;
        let crm_errors = IntCounter::new("crm_autolink_errors_total", "Total CRM auto-linking errors")?;
        let crm_service_up = IntGauge::new("crm_autolink_service_up", "CRM auto-linking service status")?;
        let duplication_events = IntCounter::new(
            "email_duplication_events_total",
            "Total email duplication events detected",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(container_status.clone()))?;
        registry.register(Box::new(health_status.clone()))?;
        registry.register(Box::new(mysql_connections.clone()))?;
        registry.register(Box::new(search_health.clone()))?;
        registry.register(Box::new(crm_emails.clone()))?;
        registry.register(Box::new(crm_errors.clone()))?;
        registry.register(Box::new(crm_service_up.clone()))?;
        registry.register(Box::new(duplication_events.clone()))?;

        Ok(Self {
            registry,
            requests,
            container_status,
            health_status,
            mysql_connections,
            search_health,
            crm_emails,
            crm_errors,
            crm_service_up,
            duplication_events,
        })
    }

    pub fn record_request(&self, method: &str, endpoint: &str) {
        self.requests.with_label_values(&[method, endpoint]).inc();
    }

    pub fn set_container(&self, name: &str, running: bool, healthy: bool) {
        self.container_status.with_label_values(&[name]).set(running as i64);
        self.health_status.with_label_values(&[name]).set(healthy as i64);
    }

    pub fn set_mysql_connections(&self, count: i64) {
        self.mysql_connections.set(count);
    }

    pub fn set_search_health(&self, score: i64) {
        self.search_health.set(score);
    }

    pub fn add_crm_emails(&self, delta: u64) {
        self.crm_emails.inc_by(delta);
    }

    pub fn add_duplication_events(&self, delta: u64) {
        self.duplication_events.inc_by(delta);
    }

    pub fn crm_failed(&self) {
        self.crm_errors.inc();
        self.crm_service_up.set(0);
    }

    pub fn crm_up(&self) {
        self.crm_service_up.set(1);
    }

    /// Rendu texte (format d'exposition Prometheus) de tout le registre
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::error!("metrics encoding failed: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
impl MetricRegistry {
    pub fn container_gauges(&self, name: &str) -> (i64, i64) {
        (
            self.container_status.with_label_values(&[name]).get(),
            self.health_status.with_label_values(&[name]).get(),
        )
    }

    pub fn search_health(&self) -> i64 {
        self.search_health.get()
    }

    pub fn mysql_connections(&self) -> i64 {
        self.mysql_connections.get()
    }

    pub fn crm_counters(&self) -> (u64, u64, u64, i64) {
        (
            self.crm_emails.get(),
            self.duplication_events.get(),
            self.crm_errors.get(),
            self.crm_service_up.get(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauges_are_overwritten() {
        let m = MetricRegistry::new().unwrap();
        m.set_container("onlyoffice-mail-server", true, true);
        m.set_container("onlyoffice-mail-server", false, false);
        assert_eq!(m.container_gauges("onlyoffice-mail-server"), (0, 0));

        m.set_search_health(100);
        m.set_search_health(50);
        assert_eq!(m.search_health(), 50);
    }

    #[test]
    fn test_counters_add_delta() {
        let m = MetricRegistry::new().unwrap();
        m.add_crm_emails(3);
        m.add_crm_emails(0);
        m.add_crm_emails(2);
        m.add_duplication_events(1);
        m.crm_failed();
        assert_eq!(m.crm_counters(), (5, 1, 1, 0));
        m.crm_up();
        assert_eq!(m.crm_counters().3, 1);
    }

    #[test]
    fn test_render_exposition() {
        let m = MetricRegistry::new().unwrap();
        m.set_container("onlyoffice-control-panel", true, false);
        m.record_request("GET", "/metrics");
        let text = m.render();
        assert!(text.contains("container_status{container=\"onlyoffice-control-panel\"} 1"));
        assert!(text.contains("onlyoffice_health_status{service=\"onlyoffice-control-panel\"} 0"));
        assert!(text.contains("monitor_requests_total{endpoint=\"/metrics\",method=\"GET\"} 1"));
        assert!(text.contains("# TYPE crm_autolink_emails_total counter"));
        assert!(CONTENT_TYPE.starts_with("text/plain"));
    }
}
