//! Doublures des systèmes externes pour les tests (pas de Docker, MySQL ni
//! Elasticsearch réels).

use crate::error::{MonitorError, MonitorResult};
use crate::probes::{
    ClusterHealth, ContainerInspect, ContainerRuntime, ContainerSummary, CrmCounts, Database,
    DbSession, MailRow, SearchCluster,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::PrimitiveDateTime;

pub fn inspect(name: &str, state: &str, health: Option<&str>) -> ContainerInspect {
    ContainerInspect {
        name: name.to_string(),
        state: state.to_string(),
        running: state == "running",
        health_status: health.map(str::to_string),
        started_at: None,
        restart_count: 0,
    }
}

pub fn mail(id: i64, subject: &str, sender: &str, received_at: PrimitiveDateTime) -> MailRow {
    MailRow {
        id,
        subject: subject.to_string(),
        sender: sender.to_string(),
        received_at,
        linked: false,
    }
}

impl MailRow {
    pub fn as_linked(mut self) -> Self {
        self.linked = true;
        self
    }
}

// ============ RUNTIME ============

#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<Vec<ContainerInspect>>,
    down: AtomicBool,
    inspect_fails: AtomicBool,
    list_calls: AtomicUsize,
}

impl FakeRuntime {
    pub fn new(containers: Vec<ContainerInspect>) -> Self {
        Self { containers: Mutex::new(containers), ..Default::default() }
    }

    pub fn set_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub fn fail_inspect(&self) {
        self.inspect_fails.store(true, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn reachable(&self) -> MonitorResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(MonitorError::Connectivity("docker daemon unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(&self) -> MonitorResult<Vec<ContainerSummary>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.reachable()?;
        Ok(self
            .containers
            .lock()
            .iter()
            .map(|c| ContainerSummary { id: c.name.clone(), name: c.name.clone() })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> MonitorResult<ContainerInspect> {
        self.reachable()?;
        if self.inspect_fails.load(Ordering::SeqCst) {
            return Err(MonitorError::Query("inspect failed".into()));
        }
        self.containers
            .lock()
            .iter()
            .find(|c| c.name == id)
            .cloned()
            .ok_or_else(|| MonitorError::NotFound("Container not found".into()))
    }

    async fn tail_logs(&self, name: &str, lines: usize) -> MonitorResult<Vec<String>> {
        self.reachable()?;
        if !self.containers.lock().iter().any(|c| c.name == name) {
            return Err(MonitorError::NotFound("Container not found".into()));
        }
        Ok((0..lines.min(3))
            .map(|i| format!("2026-03-02T09:00:0{i}.000000000Z {name} line {i}"))
            .collect())
    }
}

// ============ DATABASE ============

#[derive(Default)]
struct DbState {
    unreachable: bool,
    panic_on_connect: bool,
    hang_on_connect: bool,
    status_fails: bool,
    mail_fails: bool,
    crm_fails: bool,
    connections: i64,
    mail: Vec<MailRow>,
    counts: CrmCounts,
}

#[derive(Default)]
pub struct FakeDatabase {
    state: Arc<Mutex<DbState>>,
    open: Arc<AtomicUsize>,
    mail_queries: Arc<AtomicUsize>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        let db = Self::default();
        db.state.lock().connections = 4;
        db
    }

    pub fn set_unreachable(&self) {
        self.state.lock().unreachable = true;
    }

    pub fn panic_on_connect(&self) {
        self.state.lock().panic_on_connect = true;
    }

    /// connect() ne se termine jamais (hôte injoignable sans RST)
    pub fn hang_on_connect(&self) {
        self.state.lock().hang_on_connect = true;
    }

    pub fn fail_status_query(&self) {
        self.state.lock().status_fails = true;
    }

    pub fn fail_mail_query(&self) {
        self.state.lock().mail_fails = true;
    }

    pub fn fail_crm_query(&self) {
        self.state.lock().crm_fails = true;
    }

    pub fn set_connections(&self, n: i64) {
        self.state.lock().connections = n;
    }

    pub fn set_mail(&self, rows: Vec<MailRow>) {
        self.state.lock().mail = rows;
    }

    pub fn set_counts(&self, counts: CrmCounts) {
        self.state.lock().counts = counts;
    }

    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn mail_queries(&self) -> usize {
        self.mail_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Database for FakeDatabase {
    async fn connect(&self) -> MonitorResult<Box<dyn DbSession>> {
        let (unreachable, panics, hangs) = {
            let s = self.state.lock();
            (s.unreachable, s.panic_on_connect, s.hang_on_connect)
        };
        if hangs {
            return std::future::pending().await;
        }
        if panics {
            panic!("driver bug");
        }
        if unreachable {
            return Err(MonitorError::Connectivity("Can't connect to MySQL server".into()));
        }
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
            open: self.open.clone(),
            mail_queries: self.mail_queries.clone(),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<DbState>>,
    open: Arc<AtomicUsize>,
    mail_queries: Arc<AtomicUsize>,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DbSession for FakeSession {
    async fn ping(&mut self) -> MonitorResult<()> {
        Ok(())
    }

    async fn active_connections(&mut self) -> MonitorResult<i64> {
        let s = self.state.lock();
        if s.status_fails {
            return Err(MonitorError::Query("status variables unavailable".into()));
        }
        Ok(s.connections)
    }

    async fn mail_since(&mut self, _window: Duration) -> MonitorResult<Vec<MailRow>> {
        self.mail_queries.fetch_add(1, Ordering::SeqCst);
        let s = self.state.lock();
        if s.mail_fails {
            return Err(MonitorError::Query("Table 'onlyoffice.mail_mail' doesn't exist".into()));
        }
        Ok(s.mail.clone())
    }

    async fn crm_weekly_counts(&mut self) -> MonitorResult<CrmCounts> {
        let s = self.state.lock();
        if s.crm_fails {
            return Err(MonitorError::Query("crm statistics unavailable".into()));
        }
        Ok(s.counts)
    }

    async fn close(self: Box<Self>) {}
}

// ============ SEARCH ============

pub struct FakeSearch {
    status: Mutex<String>,
    down: AtomicBool,
    calls: AtomicUsize,
}

impl FakeSearch {
    pub fn new(status: &str) -> Self {
        Self {
            status: Mutex::new(status.to_string()),
            down: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchCluster for FakeSearch {
    async fn cluster_health(&self) -> MonitorResult<ClusterHealth> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(MonitorError::Connectivity("elasticsearch unreachable".into()));
        }
        Ok(ClusterHealth {
            status: self.status.lock().clone(),
            number_of_nodes: 3,
            active_shards: 12,
        })
    }
}
