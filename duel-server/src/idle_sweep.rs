use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::match_controller::MatchController;
use duel_core::SweepPolicy;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub settled: usize,
    pub failed: usize,
    pub purged: u64,
    pub pruned_locks: usize,
}

/// Periodically settles running matches nobody has touched recently, so
/// clocks run out and grace windows expire without a triggering request.
pub struct IdleSweep {
    controller: MatchController,
    policy: SweepPolicy,
}

impl IdleSweep {
    pub fn new(controller: MatchController, policy: SweepPolicy) -> Self {
        Self { controller, policy }
    }

    pub async fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let now = self.controller.now();

        match self
            .controller
            .repository()
            .find_idle_ids(self.policy.stale_cutoff(now))
            .await
        {
            Ok(match_ids) => {
                for match_id in match_ids {
                    // Same lock as live requests
                    match self.controller.settle(match_id).await {
                        Ok(()) => report.settled += 1,
                        Err(err) => {
                            warn!("Sweep could not settle match {}: {}", match_id, err);
                            report.failed += 1;
                        }
                    }
                }
            }
            Err(err) => warn!("Sweep could not list idle matches: {}", err),
        }

        match self
            .controller
            .purge_finished(self.policy.purge_cutoff(now))
            .await
        {
            Ok(purged) => report.purged = purged,
            Err(err) => warn!("Sweep could not purge finished matches: {}", err),
        }

        report.pruned_locks = self.controller.locks().prune();

        if report != SweepReport::default() {
            debug!("Idle sweep: {:?}", report);
        }
        report
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.policy.interval.max(Duration::from_millis(10));
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.run_once().await;
            }
        })
    }
}
