//! Recovery of pending votes whose callback never arrived.
//!
//! Each run asks the gateway for the status of every stale pending vote and
//! hands whatever it reports to the [`Reconciler`], exactly as if the
//! callback had been delivered.

use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{debug, error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::future::{BoxFuture, FutureExt},
    tokio::sync::Mutex,
    Orbit, Rocket,
};

use crate::{
    error::{Error, Result},
    scheduled_task::ScheduledTask,
    service::Reconciler,
    Config, GatewayHandle, LedgerHandle,
};

/// What one sweep run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Stale pending votes found.
    pub examined: usize,
    /// Votes moved to a terminal state.
    pub settled: usize,
    /// Votes the gateway reported no status for; left pending.
    pub unresolved: usize,
    /// Votes whose status query or settlement failed; left pending.
    pub failed: usize,
}

pub struct PendingSweep {
    ledger: LedgerHandle,
    gateway: GatewayHandle,
    config: Config,
}

impl PendingSweep {
    pub fn new(ledger: LedgerHandle, gateway: GatewayHandle, config: Config) -> Self {
        Self {
            ledger,
            gateway,
            config,
        }
    }

    /// Sweep every vote that has been pending for longer than the configured
    /// staleness threshold.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let cutoff = Utc::now() - self.config.sweep_stale_after();
        let stale = self.ledger.pending_votes_before(cutoff).await?;
        let reconciler = Reconciler::new(self.ledger.as_ref(), &self.config);
        let mut report = SweepReport {
            examined: stale.len(),
            ..SweepReport::default()
        };

        for vote in stale {
            let external_id = &vote.external_id;
            let status = match self.gateway.transaction_status(external_id).await {
                Ok(Some(status)) => status,
                Ok(None) => {
                    warn!("Vote {external_id} still pending, gateway reports no status");
                    report.unresolved += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Status query for vote {external_id} failed: {e}");
                    report.failed += 1;
                    continue;
                }
            };
            match reconciler.handle_callback(external_id, &status).await {
                Ok(_) => report.settled += 1,
                // The real callback arrived while we were asking.
                Err(Error::PendingVoteNotFound(_)) => {
                    debug!("Vote {external_id} was settled during the sweep")
                }
                Err(e) => {
                    error!("Failed to settle vote {external_id} from the sweep: {e}");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// A future that runs the sweep and then schedules the next run in `slot`.
    /// Since this is a recursive async function, we must use `BoxFuture` to
    /// avoid an infinitely-recursive state machine.
    fn scheduled(
        self: Arc<Self>,
        interval: Duration,
        slot: Arc<Mutex<Option<ScheduledTask<()>>>>,
    ) -> BoxFuture<'static, ()> {
        async move {
            match self.run_once().await {
                Ok(report) if report.examined > 0 => info!("Pending sweep finished: {report:?}"),
                Ok(_) => debug!("Pending sweep had nothing to do"),
                Err(e) => error!("Pending sweep failed, retrying next interval: {e}"),
            }
            let next = self.clone().scheduled(interval, slot.clone());
            let mut slot_locked = slot.lock().await;
            // Shutdown empties the slot; stay stopped.
            if slot_locked.is_some() {
                *slot_locked = Some(ScheduledTask::new(next, Utc::now() + interval));
            }
        }
        .boxed()
    }
}

/// A fairing that runs the pending sweep in the background from liftoff
/// until shutdown, if `sweep_interval` is set.
#[derive(Default)]
pub struct SweepFairing {
    task: Arc<Mutex<Option<ScheduledTask<()>>>>,
}

#[rocket::async_trait]
impl Fairing for SweepFairing {
    fn info(&self) -> Info {
        Info {
            name: "Pending sweep",
            kind: Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (Some(config), Some(ledger), Some(gateway)) = (
            rocket.state::<Config>(),
            rocket.state::<LedgerHandle>(),
            rocket.state::<GatewayHandle>(),
        ) else {
            error!("Pending sweep is missing its config, ledger or gateway");
            return;
        };
        let Some(interval) = config.sweep_interval() else {
            info!("Pending sweep disabled");
            return;
        };

        let sweep = Arc::new(PendingSweep::new(
            ledger.clone(),
            gateway.clone(),
            config.clone(),
        ));
        let first = sweep.scheduled(interval, self.task.clone());
        *self.task.lock().await = Some(ScheduledTask::new(first, Utc::now() + interval));
        info!(
            "Pending sweep every {}s for votes pending over {}s",
            interval.num_seconds(),
            config.sweep_stale_after().num_seconds()
        );
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        if let Some(task) = self.task.lock().await.take() {
            task.cancel().await;
            debug!("Pending sweep stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gateway::StubGateway,
        ledger::{Ledger, MemoryLedger},
        model::{
            common::{ExternalId, VoteStatus},
            db::NewVote,
        },
    };

    async fn sweep_with_pending(
        external_ids: &[&str],
    ) -> (PendingSweep, MemoryLedger, StubGateway) {
        let ledger = MemoryLedger::new();
        let gateway = StubGateway::new();
        for external_id in external_ids {
            ledger
                .insert_vote(NewVote {
                    voter_id: 1,
                    candidate_id: 1,
                    external_id: (*external_id).into(),
                    amount: 10,
                })
                .await
                .unwrap();
        }
        // Every vote is stale straight away.
        let config = Config {
            sweep_stale_after: 0,
            ..Config::default()
        };
        let sweep = PendingSweep::new(
            Arc::new(ledger.clone()),
            Arc::new(gateway.clone()),
            config,
        );
        (sweep, ledger, gateway)
    }

    #[rocket::async_test]
    async fn reported_statuses_go_through_the_reconciler() {
        let (sweep, ledger, gateway) = sweep_with_pending(&["TX_1", "TX_2", "TX_3"]).await;
        gateway.report_status(&"TX_1".into(), "COMPLETED");
        gateway.report_status(&"TX_2".into(), "FAILED");
        rocket::tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let report = sweep.run_once().await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                examined: 3,
                settled: 2,
                unresolved: 1,
                failed: 0,
            }
        );
        let completed = ledger.vote(&ExternalId::from("TX_1")).await.unwrap().unwrap();
        assert_eq!(completed.status, VoteStatus::Completed);
        assert!(ledger.vote(&"TX_2".into()).await.unwrap().is_none());
        let untouched = ledger.vote(&"TX_3".into()).await.unwrap().unwrap();
        assert_eq!(untouched.status, VoteStatus::Pending);
    }

    #[rocket::async_test]
    async fn fresh_votes_are_left_alone() {
        let (mut sweep, ledger, gateway) = sweep_with_pending(&["TX_1"]).await;
        sweep.config.sweep_stale_after = 600;
        gateway.report_status(&"TX_1".into(), "COMPLETED");

        let report = sweep.run_once().await.unwrap();

        assert_eq!(report, SweepReport::default());
        let vote = ledger.vote(&"TX_1".into()).await.unwrap().unwrap();
        assert_eq!(vote.status, VoteStatus::Pending);
    }
}
