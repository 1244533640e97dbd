use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    error::Result,
    ledger::Ledger,
    model::{
        api::{CandidateResult, CategoryResult, PositionResult, VoterResult, VotersSummary},
        common::{CandidateId, VoterId},
        db::{Candidate, Position, Vote, Voter},
    },
    Config,
};

/// Read-only aggregation of completed votes.
pub struct Standings<'a> {
    ledger: &'a dyn Ledger,
    config: &'a Config,
}

impl<'a> Standings<'a> {
    pub fn new(ledger: &'a dyn Ledger, config: &'a Config) -> Self {
        Self { ledger, config }
    }

    /// Ranked results for every position of every category.
    pub async fn compute(&self) -> Result<Vec<CategoryResult>> {
        let mut results = Vec::new();
        for category in self.ledger.categories().await? {
            let mut positions = Vec::new();
            for position in self.ledger.positions(Some(category.id)).await? {
                positions.push(self.position(position).await?);
            }
            results.push(CategoryResult {
                id: category.id,
                name: category.name,
                positions,
            });
        }
        Ok(results)
    }

    async fn position(&self, position: Position) -> Result<PositionResult> {
        let candidates = self.ledger.candidates(Some(position.id)).await?;
        let candidate_ids = candidates.iter().map(|c| c.id).collect::<Vec<_>>();
        let votes = self.ledger.completed_votes(Some(&candidate_ids)).await?;
        let voter_ids = distinct_voters(&votes);
        let voters = self.ledger.voters(&voter_ids).await?;
        Ok(rank_position(
            position,
            candidates,
            &votes,
            &voters,
            self.config.vote_price(),
        ))
    }

    /// Totals over all completed votes, with every voter who cast one.
    pub async fn voters_summary(&self) -> Result<VotersSummary> {
        let votes = self.ledger.completed_votes(None).await?;
        let voter_ids = distinct_voters(&votes);
        let voters = self.ledger.voters(&voter_ids).await?;
        Ok(VotersSummary {
            total_voters: voter_ids.len() as u64,
            total_votes: votes.len() as u64,
            voters: tally_voters(votes.iter(), &voters),
        })
    }
}

fn distinct_voters(votes: &[Vote]) -> Vec<VoterId> {
    votes
        .iter()
        .map(|v| v.voter_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Count vote rows per voter, most votes first, ties by voter ID.
/// Voters missing from `voters` are left out.
fn tally_voters<'v>(votes: impl Iterator<Item = &'v Vote>, voters: &[Voter]) -> Vec<VoterResult> {
    let mut counts = BTreeMap::<VoterId, u64>::new();
    for vote in votes {
        *counts.entry(vote.voter_id).or_default() += 1;
    }
    let by_id = voters.iter().map(|v| (v.id, v)).collect::<HashMap<_, _>>();

    let mut tally = counts
        .into_iter()
        .filter_map(|(id, votes)| by_id.get(&id).map(|voter| (id, votes, *voter)))
        .collect::<Vec<_>>();
    // Stable, so voters with equal counts stay in ID order.
    tally.sort_by(|a, b| b.1.cmp(&a.1));
    tally
        .into_iter()
        .map(|(_, votes, voter)| VoterResult {
            name: voter.name.clone(),
            phone: voter.phone.clone(),
            votes,
        })
        .collect()
}

/// Rank the candidates of one position by their completed votes.
///
/// `votes` must only hold completed votes; those for candidates outside the
/// position are ignored. Candidates are ordered by descending number of
/// distinct voters, ties by ascending ID.
pub fn rank_position(
    position: Position,
    candidates: Vec<Candidate>,
    votes: &[Vote],
    voters: &[Voter],
    vote_price: u32,
) -> PositionResult {
    let vote_price = u64::from(vote_price.max(1));
    let mut by_candidate = HashMap::<CandidateId, Vec<&Vote>>::new();
    for vote in votes {
        by_candidate.entry(vote.candidate_id).or_default().push(vote);
    }

    let total_amount = candidates
        .iter()
        .flat_map(|c| by_candidate.get(&c.id).into_iter().flatten())
        .map(|v| u64::from(v.amount))
        .sum::<u64>();
    let all_vote_count = total_amount / vote_price;

    let mut results = candidates
        .into_iter()
        .map(|candidate| {
            let votes = by_candidate.remove(&candidate.id).unwrap_or_default();
            let amount = votes.iter().map(|v| u64::from(v.amount)).sum::<u64>();
            let vote_count = amount / vote_price;
            let vote_percentage = if all_vote_count == 0 {
                0
            } else {
                vote_count * 100 / all_vote_count
            };
            let voters_count = votes
                .iter()
                .map(|v| v.voter_id)
                .collect::<BTreeSet<_>>()
                .len() as u64;
            CandidateResult {
                id: candidate.id,
                name: candidate.name,
                all_vote_count,
                vote_count,
                vote_percentage,
                voters_count,
                amount,
                voters: tally_voters(votes.into_iter(), voters),
            }
        })
        .collect::<Vec<_>>();
    results.sort_by(|a, b| b.voters_count.cmp(&a.voters_count).then(a.id.cmp(&b.id)));

    PositionResult {
        id: position.id,
        name: position.name,
        candidates: results,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        ledger::{MemoryLedger, Resolution},
        model::{
            common::{ExternalId, VoteStatus},
            db::{ExampleBallot, NewVote, NewVoter},
        },
    };

    fn position() -> Position {
        Position {
            id: 1,
            name: "Female Vocalist".to_string(),
            category_id: 1,
        }
    }

    fn candidate(id: CandidateId, name: &str) -> Candidate {
        Candidate {
            id,
            name: name.to_string(),
            position_id: 1,
        }
    }

    fn voter(id: VoterId, name: &str) -> Voter {
        Voter {
            id,
            name: name.to_string(),
            phone: format!("25471234567{id}"),
        }
    }

    fn completed(id: u32, voter_id: VoterId, candidate_id: CandidateId, amount: u32) -> Vote {
        Vote {
            id,
            voter_id,
            candidate_id,
            external_id: ExternalId::from(format!("TX_{id}")),
            status: VoteStatus::Completed,
            amount,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn counts_and_percentages_follow_amounts() {
        let votes = [completed(1, 1, 5, 10), completed(2, 2, 5, 10), completed(3, 3, 6, 10)];
        let voters = [voter(1, "Amina"), voter(2, "Baraka"), voter(3, "Chebet")];

        let result = rank_position(
            position(),
            vec![candidate(6, "C2"), candidate(5, "C1")],
            &votes,
            &voters,
            10,
        );

        let [first, second] = &result.candidates[..] else {
            panic!("expected two candidates");
        };
        assert_eq!(first.id, 5);
        assert_eq!((first.vote_count, first.all_vote_count), (2, 3));
        assert_eq!(first.vote_percentage, 66);
        assert_eq!((first.amount, first.voters_count), (20, 2));
        assert_eq!(second.id, 6);
        assert_eq!((second.vote_count, second.all_vote_count), (1, 3));
        assert_eq!(second.vote_percentage, 33);
        assert_eq!(second.voters[0].name, "Chebet");
    }

    #[test]
    fn no_votes_means_zero_percent() {
        let result = rank_position(
            position(),
            vec![candidate(1, "C1"), candidate(2, "C2")],
            &[],
            &[],
            10,
        );

        for candidate in &result.candidates {
            assert_eq!(candidate.vote_count, 0);
            assert_eq!(candidate.all_vote_count, 0);
            assert_eq!(candidate.vote_percentage, 0);
            assert!(candidate.voters.is_empty());
        }
        // Equal voter counts fall back to ID order.
        assert_eq!(result.candidates[0].id, 1);
    }

    #[test]
    fn voters_are_listed_by_votes_cast() {
        let votes = [
            completed(1, 1, 1, 10),
            completed(2, 2, 1, 10),
            completed(3, 2, 1, 30),
        ];
        let voters = [voter(1, "Amina"), voter(2, "Baraka")];

        let result = rank_position(position(), vec![candidate(1, "C1")], &votes, &voters, 10);

        let candidate = &result.candidates[0];
        assert_eq!(candidate.vote_count, 5);
        assert_eq!(candidate.voters_count, 2);
        assert_eq!(candidate.voters[0].name, "Baraka");
        assert_eq!(candidate.voters[0].votes, 2);
        assert_eq!(candidate.voters[1].votes, 1);
    }

    #[rocket::async_test]
    async fn only_completed_votes_count() {
        let ledger = MemoryLedger::new();
        let config = Config::default();
        let ballot = ExampleBallot::insert(&ledger).await.unwrap();
        let [first, second] = &ballot.candidates;

        let voter = ledger
            .insert_voter(NewVoter {
                name: "Amina".to_string(),
                phone: "254712345678".to_string(),
            })
            .await
            .unwrap();
        for (external_id, candidate_id) in [("TX_1", first.id), ("TX_2", first.id), ("TX_3", second.id)] {
            ledger
                .insert_vote(NewVote {
                    voter_id: voter.id,
                    candidate_id,
                    external_id: external_id.into(),
                    amount: 10,
                })
                .await
                .unwrap();
        }
        ledger
            .settle_pending(&"TX_1".into(), Resolution::Complete)
            .await
            .unwrap();
        ledger
            .settle_pending(&"TX_3".into(), Resolution::Fail)
            .await
            .unwrap();

        let standings = Standings::new(&ledger, &config).compute().await.unwrap();
        let candidates = &standings[0].positions[0].candidates;
        assert_eq!(candidates[0].id, first.id);
        assert_eq!(candidates[0].vote_count, 1);
        assert_eq!(candidates[0].vote_percentage, 100);
        assert_eq!(candidates[1].vote_count, 0);
        assert_eq!(candidates[1].amount, 0);

        let summary = Standings::new(&ledger, &config).voters_summary().await.unwrap();
        assert_eq!(summary.total_votes, 1);
        assert_eq!(summary.total_voters, 1);
        assert_eq!(summary.voters[0].votes, 1);
    }
}
