use log::{error, info};

use crate::{
    config::VoterIdentity,
    error::{Error, Result},
    gateway::{PaymentGateway, PaymentRequest},
    ledger::Ledger,
    model::{
        api::VoteRequest,
        common::{CandidateId, ExternalId},
        db::{NewVote, NewVoter, Voter},
    },
    Config,
};

/// A validated vote submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteIntent {
    pub voter_name: String,
    pub voter_phone: String,
    pub candidate_id: CandidateId,
    pub amount: u32,
}

impl TryFrom<VoteRequest> for VoteIntent {
    type Error = Error;

    fn try_from(request: VoteRequest) -> Result<Self> {
        let voter_name = request.voter_name.trim().to_string();
        let voter_phone = request.voter_phone.trim().to_string();
        if voter_name.is_empty() {
            return Err(Error::validation("voter_name must not be empty"));
        }
        if voter_phone.is_empty() {
            return Err(Error::validation("voter_phone must not be empty"));
        }
        let amount = u32::try_from(request.amount)
            .ok()
            .filter(|amount| *amount > 0)
            .ok_or_else(|| Error::validation("amount must be a positive integer"))?;
        Ok(Self {
            voter_name,
            voter_phone,
            candidate_id: request.candidate_id,
            amount,
        })
    }
}

/// Turns vote submissions into pending votes.
pub struct VoteIntents<'a> {
    ledger: &'a dyn Ledger,
    gateway: &'a dyn PaymentGateway,
    config: &'a Config,
}

impl<'a> VoteIntents<'a> {
    pub fn new(ledger: &'a dyn Ledger, gateway: &'a dyn PaymentGateway, config: &'a Config) -> Self {
        Self {
            ledger,
            gateway,
            config,
        }
    }

    /// Initiate payment for a vote and record it as pending, returning the
    /// external ID the gateway's callback will carry.
    ///
    /// Nothing is recorded for the vote if the candidate does not exist or
    /// the gateway refuses the payment.
    pub async fn submit(&self, intent: VoteIntent) -> Result<ExternalId> {
        if self.ledger.candidate(intent.candidate_id).await?.is_none() {
            return Err(Error::CandidateNotFound(intent.candidate_id));
        }
        let voter = self.resolve_voter(&intent).await?;

        let request = PaymentRequest {
            external_id: ExternalId::generate(self.config.external_id_prefix()),
            payer_phone: intent.voter_phone,
            amount: intent.amount,
        };
        self.gateway.initiate(&request).await?;

        let vote = NewVote {
            voter_id: voter.id,
            candidate_id: intent.candidate_id,
            external_id: request.external_id.clone(),
            amount: intent.amount,
        };
        if let Err(e) = self.ledger.insert_vote(vote).await {
            // The gateway will call back for a vote we have no record of.
            error!(
                "Payment {} initiated but its pending vote was not recorded: {e}",
                request.external_id
            );
            return Err(e.into());
        }
        info!(
            "Vote {} for candidate {} pending payment of {}",
            request.external_id, intent.candidate_id, intent.amount
        );
        Ok(request.external_id)
    }

    async fn resolve_voter(&self, intent: &VoteIntent) -> Result<Voter> {
        let new_voter = NewVoter {
            name: intent.voter_name.clone(),
            phone: intent.voter_phone.clone(),
        };
        if self.config.voter_identity() == VoterIdentity::AlwaysCreate {
            return Ok(self.ledger.insert_voter(new_voter).await?);
        }

        // Only the oldest voter sharing the name or phone is considered: it
        // must match on both to be reused.
        let earliest = self
            .ledger
            .voters_by_name_or_phone(&new_voter.name, &new_voter.phone)
            .await?
            .into_iter()
            .next();
        match earliest {
            Some(voter) if voter.name == new_voter.name && voter.phone == new_voter.phone => {
                Ok(voter)
            }
            Some(_) => Err(Error::VoterConflict(
                "voter with this name or phone number already exists".to_string(),
            )),
            None => Ok(self.ledger.insert_voter(new_voter).await?),
        }
    }
}
