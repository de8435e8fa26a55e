use super::crm::{CrmLinkingProbe, CrmReport};
use super::{Database, DbSession, DATABASE};
use crate::error::MonitorResult;
use crate::metrics::MetricRegistry;
use crate::models::{ProbeResult, ProbeStatus};
use std::sync::Arc;
use tracing::error;

pub struct DatabaseProbe {
    database: Arc<dyn Database>,
    metrics: Arc<MetricRegistry>,
    /// None quand CRM_AUTO_LINK_MONITORING est désactivé
    crm: Option<CrmLinkingProbe>,
}

impl DatabaseProbe {
    pub fn new(database: Arc<dyn Database>, metrics: Arc<MetricRegistry>, crm_enabled: bool) -> Self {
        let crm = crm_enabled.then(|| CrmLinkingProbe::new(metrics.clone()));
        Self { database, metrics, crm }
    }

    async fn connectivity(&self, session: &mut dyn DbSession) -> MonitorResult<i64> {
        session.ping().await?;
        let connections = session.active_connections().await?;
        self.metrics.set_mysql_connections(connections);
        Ok(connections)
    }

    pub async fn run(&self) -> ProbeResult {
        // la session est libérée en sortie de fonction, erreur comprise
        let mut session = match self.database.connect().await {
            Ok(s) => s,
            Err(e) => {
                error!("MySQL health check failed: {e}");
                return ProbeResult::new(DATABASE).failure(ProbeStatus::Unhealthy, e);
            }
        };

        let connections = match self.connectivity(session.as_mut()).await {
            Ok(c) => c,
            Err(e) => {
                error!("MySQL health check failed: {e}");
                return ProbeResult::new(DATABASE).failure(ProbeStatus::Unhealthy, e);
            }
        };

        let mut result = ProbeResult::new(DATABASE).healthy().field("connections", connections);
        if let Some(crm) = &self.crm {
            result = match crm.check(session.as_mut()).await {
                Ok(report) => with_crm_fields(result, &report),
                Err(e) => result.sub_error("crm", e),
            };
        }

        session.close().await;
        result
    }
}

fn with_crm_fields(result: ProbeResult, report: &CrmReport) -> ProbeResult {
    result
        .field("crm_recent_emails", report.recent_emails)
        .field("crm_linked_emails", report.linked_emails)
        .field("crm_new_emails", report.new_emails)
        .field("crm_duplicate_groups", report.duplicate_groups.len())
}
