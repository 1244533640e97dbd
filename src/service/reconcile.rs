use std::fmt::{Display, Formatter};

use log::info;

use crate::{
    error::{Error, Result},
    ledger::{Ledger, Resolution},
    model::common::ExternalId,
    Config,
};

/// The terminal state a pending vote was moved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Completed,
    Deleted,
    Failed,
}

impl Settlement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Deleted => "deleted",
            Self::Failed => "failed",
        }
    }
}

impl Display for Settlement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies the gateway's verdict on a payment to its pending vote.
///
/// This is the only way a vote leaves the pending state, whether the
/// verdict arrives by callback or is fetched by the pending sweep.
pub struct Reconciler<'a> {
    ledger: &'a dyn Ledger,
    config: &'a Config,
}

impl<'a> Reconciler<'a> {
    pub fn new(ledger: &'a dyn Ledger, config: &'a Config) -> Self {
        Self { ledger, config }
    }

    /// Settle the pending vote with the given external ID according to the
    /// gateway's `transaction_status`.
    ///
    /// Fails with [`Error::PendingVoteNotFound`] if there is no pending vote
    /// with that ID, in which case nothing is changed.
    pub async fn handle_callback(
        &self,
        external_id: &ExternalId,
        transaction_status: &str,
    ) -> Result<Settlement> {
        let (resolution, settlement) = if transaction_status == self.config.success_status() {
            (Resolution::Complete, Settlement::Completed)
        } else if self.config.retain_failed_votes() {
            (Resolution::Fail, Settlement::Failed)
        } else {
            (Resolution::Delete, Settlement::Deleted)
        };

        let vote = self
            .ledger
            .settle_pending(external_id, resolution)
            .await?
            .ok_or_else(|| Error::PendingVoteNotFound(external_id.clone()))?;
        info!(
            "Vote {external_id} for candidate {} {settlement} (gateway status '{transaction_status}')",
            vote.candidate_id
        );
        Ok(settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::MemoryLedger,
        model::{common::VoteStatus, db::NewVote},
    };

    async fn ledger_with_pending(external_ids: &[&str]) -> MemoryLedger {
        let ledger = MemoryLedger::new();
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
        ledger
    }

    #[rocket::async_test]
    async fn success_status_completes_only_that_vote() {
        let ledger = ledger_with_pending(&["TX_1", "TX_2"]).await;
        let config = Config::default();

        let settlement = Reconciler::new(&ledger, &config)
            .handle_callback(&"TX_1".into(), "COMPLETED")
            .await
            .unwrap();

        assert_eq!(settlement, Settlement::Completed);
        let completed = ledger.vote(&"TX_1".into()).await.unwrap().unwrap();
        assert_eq!(completed.status, VoteStatus::Completed);
        let untouched = ledger.vote(&"TX_2".into()).await.unwrap().unwrap();
        assert_eq!(untouched.status, VoteStatus::Pending);
    }

    #[rocket::async_test]
    async fn any_other_status_deletes_the_vote() {
        let ledger = ledger_with_pending(&["TX_1"]).await;
        let config = Config::default();
        let reconciler = Reconciler::new(&ledger, &config);

        // The sentinel is matched exactly.
        let settlement = reconciler
            .handle_callback(&"TX_1".into(), "completed")
            .await
            .unwrap();

        assert_eq!(settlement, Settlement::Deleted);
        assert!(ledger.vote(&"TX_1".into()).await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn failed_votes_can_be_retained() {
        let ledger = ledger_with_pending(&["TX_1"]).await;
        let config = Config {
            retain_failed_votes: true,
            ..Config::default()
        };

        let settlement = Reconciler::new(&ledger, &config)
            .handle_callback(&"TX_1".into(), "FAILED")
            .await
            .unwrap();

        assert_eq!(settlement, Settlement::Failed);
        let vote = ledger.vote(&"TX_1".into()).await.unwrap().unwrap();
        assert_eq!(vote.status, VoteStatus::Failed);
    }

    #[rocket::async_test]
    async fn unknown_external_id_is_not_found() {
        let ledger = ledger_with_pending(&["TX_1"]).await;
        let config = Config::default();

        let result = Reconciler::new(&ledger, &config)
            .handle_callback(&"TX_404".into(), "COMPLETED")
            .await;

        assert!(matches!(result, Err(Error::PendingVoteNotFound(id)) if id.as_str() == "TX_404"));
        let vote = ledger.vote(&"TX_1".into()).await.unwrap().unwrap();
        assert_eq!(vote.status, VoteStatus::Pending);
    }

    #[rocket::async_test]
    async fn replayed_callback_is_not_found() {
        let ledger = ledger_with_pending(&["TX_1"]).await;
        let config = Config::default();
        let reconciler = Reconciler::new(&ledger, &config);

        reconciler
            .handle_callback(&"TX_1".into(), "COMPLETED")
            .await
            .unwrap();
        let replay = reconciler.handle_callback(&"TX_1".into(), "FAILED").await;

        assert!(matches!(replay, Err(Error::PendingVoteNotFound(_))));
        let vote = ledger.vote(&"TX_1".into()).await.unwrap().unwrap();
        assert_eq!(vote.status, VoteStatus::Completed);
    }

    #[rocket::async_test]
    async fn concurrent_callbacks_settle_once() {
        let ledger = ledger_with_pending(&["TX_1"]).await;
        let config = Config::default();
        let reconciler = Reconciler::new(&ledger, &config);
        let id = ExternalId::from("TX_1");

        let (a, b) = rocket::tokio::join!(
            reconciler.handle_callback(&id, "COMPLETED"),
            reconciler.handle_callback(&id, "FAILED"),
        );

        assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
    }
}
