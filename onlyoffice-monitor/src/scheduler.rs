//! Boucle périodique des health checks.
//!
//! Le tick s'exécute dans la boucle elle-même : deux ticks ne se chevauchent
//! jamais, et un tick plus long que l'intervalle fait sauter les suivants
//! (MissedTickBehavior::Skip) au lieu de les rattraper en rafale.

use crate::monitor::Monitor;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Scheduler {
    monitor: Arc<Monitor>,
    period: Duration,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(monitor: Arc<Monitor>, period: Duration, shutdown: CancellationToken) -> Self {
        Self { monitor, period, shutdown }
    }

    /// Premier tick immédiat, puis un tick par période jusqu'à l'annulation.
    pub fn spawn(self) -> JoinHandle<()> {
        task::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = interval.tick() => self.monitor.run_tick().await,
                }
            }
            info!("scheduler stopped");
        })
    }
}
