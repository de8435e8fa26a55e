use crate::models::{ContainerRecord, ProbeResult};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

pub type ContainerSnapshot = BTreeMap<String, ContainerRecord>;

/// Derniers résultats connus, un par probe.
///
/// Chaque écriture remplace l'Arc complet sous un verrou tenu le temps d'un
/// swap de pointeur : un lecteur voit l'ancien ou le nouveau résultat, jamais
/// un mélange des deux.
#[derive(Default)]
pub struct StateStore {
    results: RwLock<HashMap<String, Arc<ProbeResult>>>,
    containers: RwLock<Arc<ContainerSnapshot>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, result: ProbeResult) {
        let name = result.probe_name.clone();
        self.results.write().insert(name, Arc::new(result));
    }

    pub fn get(&self, probe_name: &str) -> Option<Arc<ProbeResult>> {
        self.results.read().get(probe_name).cloned()
    }

    pub fn results(&self) -> BTreeMap<String, Arc<ProbeResult>> {
        self.results
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn publish_containers(&self, records: Vec<ContainerRecord>) -> Arc<ContainerSnapshot> {
        let snapshot: Arc<ContainerSnapshot> =
            Arc::new(records.into_iter().map(|r| (r.name.clone(), r)).collect());
        *self.containers.write() = snapshot.clone();
        snapshot
    }

    pub fn containers(&self) -> Arc<ContainerSnapshot> {
        self.containers.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContainerHealth, ProbeStatus};

    fn record(name: &str) -> ContainerRecord {
        ContainerRecord {
            name: name.to_string(),
            status: "running".into(),
            running: true,
            health: ContainerHealth::NoHealthcheck,
            healthy: true,
            started_at: None,
            restart_count: 0,
        }
    }

    #[test]
    fn test_publish_replaces_previous_result() {
        let store = StateStore::new();
        store.publish(ProbeResult::new("search").healthy());
        let before = store.get("search").unwrap();
        store.publish(ProbeResult::new("search").failure(ProbeStatus::Unhealthy, "down"));

        assert_eq!(store.results().len(), 1);
        assert_eq!(store.get("search").unwrap().status, ProbeStatus::Unhealthy);
        // un lecteur qui tenait l'ancien Arc le garde intact
        assert_eq!(before.status, ProbeStatus::Healthy);
    }

    #[test]
    fn test_container_snapshot_drops_vanished_records() {
        let store = StateStore::new();
        store.publish_containers(vec![record("a"), record("b")]);
        let held = store.containers();
        store.publish_containers(vec![record("b")]);

        assert_eq!(held.len(), 2);
        let now = store.containers();
        assert_eq!(now.keys().cloned().collect::<Vec<_>>(), vec!["b".to_string()]);
    }
}
