//! Sous-check CRM auto-link, exécuté par DatabaseProbe sur sa connexion.

use super::{CrmCounts, DbSession, MailRow};
use crate::error::MonitorResult;
use crate::metrics::MetricRegistry;
use crate::models::CrmStats;
use crate::state::{new_state, Shared};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use time::Date;
use tracing::{debug, error, info, warn};

/// Fenêtre glissante observée à chaque tick
pub const CRM_WINDOW: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub subject: String,
    pub sender: String,
    pub day: Date,
    pub count: usize,
}

/// Regroupe les messages par (sujet, expéditeur, jour calendaire) et garde les
/// groupes de plus d'un message.
///
/// Heuristique approximative, pas une égalité stricte : deux conversations
/// légitimes distinctes avec le même sujet et le même expéditeur dans la même
/// journée (ex: notifications automatiques "Daily report") sont signalées
/// comme doublons (faux positif accepté). À l'inverse un vrai doublon reçu
/// de part et d'autre de minuit, ou dont le sujet a été réécrit, n'est pas
/// détecté (faux négatif accepté).
pub fn find_duplicate_groups(messages: &[MailRow]) -> Vec<DuplicateGroup> {
    let mut groups: BTreeMap<(&str, &str, Date), usize> = BTreeMap::new();
    for m in messages {
        *groups
            .entry((m.subject.as_str(), m.sender.as_str(), m.received_at.date()))
            .or_default() += 1;
    }
    groups
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((subject, sender, day), count)| DuplicateGroup {
            subject: subject.to_string(),
            sender: sender.to_string(),
            day,
            count,
        })
        .collect()
}

/// linked / total × 100, 0 quand il n'y a aucun message
pub fn linking_rate(linked: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    linked as f64 / total as f64 * 100.0
}

impl From<CrmCounts> for CrmStats {
    fn from(c: CrmCounts) -> Self {
        CrmStats {
            total_emails_week: c.total,
            linked_emails_week: c.linked,
            recent_emails_24h: c.recent,
            linking_rate: linking_rate(c.linked, c.total),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrmReport {
    pub recent_emails: usize,
    pub linked_emails: usize,
    /// messages jamais comptés lors d'un tick précédent
    pub new_emails: u64,
    pub duplicate_groups: Vec<DuplicateGroup>,
}

pub struct CrmLinkingProbe {
    metrics: Arc<MetricRegistry>,
    /// plus grand id de message déjà ajouté au compteur d'emails
    high_water_mark: Shared<Option<i64>>,
}

impl CrmLinkingProbe {
    pub fn new(metrics: Arc<MetricRegistry>) -> Self {
        Self { metrics, high_water_mark: new_state(None) }
    }

    /// Compte les ids au-dessus du high-water mark puis l'avance.
    ///
    /// Le premier tick compte toute la fenêtre ; ensuite seuls les nouveaux
    /// messages font avancer le compteur, quelle que soit la fréquence des ticks.
    fn take_new(&self, messages: &[MailRow]) -> u64 {
        let mut mark = self.high_water_mark.lock();
        let previous: Option<i64> = *mark;
        let fresh = messages
            .iter()
            .filter(|m| previous.map_or(true, |hwm| m.id > hwm))
            .count() as u64;
        let newest = messages.iter().map(|m| m.id).max();
        *mark = previous.max(newest);
        fresh
    }

    pub async fn check(&self, session: &mut dyn DbSession) -> MonitorResult<CrmReport> {
        match session.mail_since(CRM_WINDOW).await {
            Ok(messages) => {
                let duplicate_groups = find_duplicate_groups(&messages);
                let report = CrmReport {
                    recent_emails: messages.len(),
                    linked_emails: messages.iter().filter(|m| m.linked).count(),
                    new_emails: self.take_new(&messages),
                    duplicate_groups,
                };

                self.metrics.add_crm_emails(report.new_emails);
                if !report.duplicate_groups.is_empty() {
                    self.metrics.add_duplication_events(report.duplicate_groups.len() as u64);
                    warn!("Detected {} potential email duplications", report.duplicate_groups.len());
                    for g in &report.duplicate_groups {
                        debug!(subject = %g.subject, sender = %g.sender, day = %g.day, count = g.count, "duplicate candidate");
                    }
                }
                self.metrics.crm_up();

                info!(
                    "CRM Status: {} recent emails, {} linked, {} duplicates",
                    report.recent_emails,
                    report.linked_emails,
                    report.duplicate_groups.len()
                );
                Ok(report)
            }
            Err(e) => {
                error!("CRM auto-link check failed: {e}");
                self.metrics.crm_failed();
                Err(e)
            }
        }
    }
}
