//! Periodic expiry of commands that were never acknowledged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use smarthome_core::config::CommandsConfig;
use smarthome_core::Result;
use tokio::sync::RwLock;

use crate::lifecycle::CommandManager;

/// Sweeper configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    /// How long a command may stay pending after dispatch.
    pub ack_timeout: Duration,
    /// Time between sweeps.
    pub sweep_interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

impl From<&CommandsConfig> for SweeperConfig {
    fn from(config: &CommandsConfig) -> Self {
        Self {
            ack_timeout: config.ack_timeout,
            sweep_interval: config.sweep_interval,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Commands moved to `timeout`.
    pub expired: usize,
    /// Candidates that were already terminal by the time they were expired.
    pub skipped: usize,
    /// Candidates whose expiry failed; retried on the next sweep.
    pub failed: usize,
}

/// Calls `expire_if_pending` for every command whose acknowledgement window
/// has elapsed.
#[derive(Clone)]
pub struct ExpirySweeper {
    manager: CommandManager,
    config: SweeperConfig,
    running: Arc<RwLock<bool>>,
    // Bumped by every start and stop; a loop exits once it no longer owns it.
    generation: Arc<AtomicU64>,
}

impl ExpirySweeper {
    pub fn new(manager: CommandManager, config: SweeperConfig) -> Self {
        Self {
            manager,
            config,
            running: Arc::new(RwLock::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Start the sweep loop. Starting an already running sweeper is a no-op.
    pub async fn start(&self) -> tokio::task::JoinHandle<()> {
        let mut running = self.running.write().await;
        if *running {
            drop(running);
            return tokio::spawn(async move {});
        }
        *running = true;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        drop(running);

        let sweeper = self.clone();
        tracing::info!(
            category = "commands",
            ack_timeout_ms = self.config.ack_timeout.as_millis() as u64,
            sweep_interval_ms = self.config.sweep_interval.as_millis() as u64,
            "sweeper_started"
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweeper.config.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                if !sweeper.owns_loop(generation).await {
                    break;
                }

                if let Err(e) = sweeper.sweep_once().await {
                    tracing::warn!(category = "commands", error = %e, "sweep_failed");
                }
            }

            tracing::info!(category = "commands", "sweeper_stopped");
        })
    }

    /// Ask the loop to exit. Observed at the next tick, even if the sweeper
    /// has been started again in the meantime.
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    async fn owns_loop(&self, generation: u64) -> bool {
        let running = self.running.read().await;
        *running && self.generation.load(Ordering::SeqCst) == generation
    }

    /// Expire every pending command older than the acknowledgement window.
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let now = self.manager.now();
        // A window too large to represent expires nothing.
        let cutoff = chrono::Duration::from_std(self.config.ack_timeout)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);

        let candidates = self.manager.list_expired(cutoff).await?;
        let mut report = SweepReport::default();

        for command in candidates {
            match self.manager.expire_if_pending(&command.id, now).await {
                Ok(t) if t.applied => report.expired += 1,
                Ok(_) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        category = "commands",
                        command_id = %command.id,
                        error = %e,
                        "expire_failed"
                    );
                }
            }
        }

        if report.expired > 0 || report.failed > 0 {
            tracing::info!(
                category = "commands",
                expired = report.expired,
                skipped = report.skipped,
                failed = report.failed,
                "sweep_completed"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_follows_commands_section() {
        let section = CommandsConfig {
            ack_timeout: Duration::from_secs(12),
            sweep_interval: Duration::from_millis(250),
            sweeper_enabled: true,
        };
        let config = SweeperConfig::from(&section);
        assert_eq!(config.ack_timeout, Duration::from_secs(12));
        assert_eq!(config.sweep_interval, Duration::from_millis(250));
    }
}
