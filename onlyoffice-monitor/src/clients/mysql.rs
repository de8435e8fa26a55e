//! Accès MySQL : une connexion dédiée par appel, jamais de pool.
//!
//! La session est rendue au serveur par `close`, ou à défaut par le drop de
//! la connexion sqlx si l'appelant sort en erreur.

use crate::config::DatabaseConf;
use crate::error::{MonitorError, MonitorResult};
use crate::probes::{CrmCounts, Database, DbSession, MailRow};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use std::time::Duration;
use time::PrimitiveDateTime;
use tracing::debug;

const ACTIVE_CONNECTIONS: &str = "SHOW GLOBAL STATUS LIKE 'Threads_connected'";

const MAIL_SINCE: &str = "\
    SELECT CAST(mm.id AS SIGNED), mm.subject, mm.from_text, mm.date_received, \
           CAST(EXISTS(SELECT 1 FROM mail_chain_x_crm_entity x WHERE x.id_chain = mm.chain_id) AS SIGNED) \
    FROM mail_mail mm \
    WHERE mm.date_received >= NOW() - INTERVAL ? SECOND";

const CRM_WEEKLY: &str = "\
    SELECT COUNT(*), \
           CAST(COALESCE(SUM(EXISTS(SELECT 1 FROM mail_chain_x_crm_entity x WHERE x.id_chain = mm.chain_id)), 0) AS SIGNED), \
           CAST(COALESCE(SUM(mm.date_received >= NOW() - INTERVAL 24 HOUR), 0) AS SIGNED) \
    FROM mail_mail mm \
    WHERE mm.date_received >= NOW() - INTERVAL 7 DAY";

pub struct MySqlDatabase {
    options: MySqlConnectOptions,
}

impl MySqlDatabase {
    pub fn new(conf: &DatabaseConf) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&conf.host)
            .port(conf.port)
            .username(&conf.user)
            .password(&conf.password)
            .database(&conf.database);
        Self { options }
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    async fn connect(&self) -> MonitorResult<Box<dyn DbSession>> {
        let conn = MySqlConnection::connect_with(&self.options).await?;
        Ok(Box::new(MySqlSession { conn }))
    }
}

struct MySqlSession {
    conn: MySqlConnection,
}

type MailTuple = (i64, Option<String>, Option<String>, PrimitiveDateTime, i64);

#[async_trait]
impl DbSession for MySqlSession {
    async fn ping(&mut self) -> MonitorResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&mut self.conn).await?;
        Ok(())
    }

    async fn active_connections(&mut self) -> MonitorResult<i64> {
        let row: Option<(String, String)> =
            sqlx::query_as(ACTIVE_CONNECTIONS).fetch_optional(&mut self.conn).await?;
        let (_, value) = row.ok_or_else(|| MonitorError::Query("Threads_connected not reported".into()))?;
        value
            .parse()
            .map_err(|_| MonitorError::Query(format!("Threads_connected is not a number: {value}")))
    }

    async fn mail_since(&mut self, window: Duration) -> MonitorResult<Vec<MailRow>> {
        let rows: Vec<MailTuple> = sqlx::query_as(MAIL_SINCE)
            .bind(window.as_secs())
            .fetch_all(&mut self.conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, subject, sender, received_at, linked)| MailRow {
                id,
                subject: subject.unwrap_or_default(),
                sender: sender.unwrap_or_default(),
                received_at,
                linked: linked != 0,
            })
            .collect())
    }

    async fn crm_weekly_counts(&mut self) -> MonitorResult<CrmCounts> {
        let (total, linked, recent): (i64, i64, i64) =
            sqlx::query_as(CRM_WEEKLY).fetch_one(&mut self.conn).await?;
        Ok(CrmCounts { total, linked, recent })
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.conn.close().await {
            debug!("mysql session close failed: {e}");
        }
    }
}
