use std::collections::HashSet;

use chrono::Utc;
use log::info;

use crate::engine::PollEngine;
use crate::error::{EngineError, EngineResult};
use crate::models::{Ballot, BallotSelection, Poll, PollOption, PollStatus, VotingMethod};

impl PollEngine {
    /// Casts (or recasts) a voter's ballot. The selection must match the
    /// poll's voting method; any prior ballot from the same voter is replaced
    /// atomically, so resubmitting is naturally idempotent.
    pub async fn cast_ballot(
        &self,
        poll_id: &str,
        voter_id: &str,
        selection: BallotSelection,
    ) -> EngineResult<()> {
        let poll = self.store().get_poll(poll_id).await?;

        if poll.status != PollStatus::Active || !poll.window_contains(Utc::now()) {
            return Err(EngineError::Conflict(format!(
                "poll {poll_id} is not open for voting"
            )));
        }
        // Ballots are keyed by (poll, voter), so every ballot needs its own
        // voter id. Anonymous voting means unverified identity, not absent
        // identity: the caller supplies a pseudonymous id per voter.
        if voter_id.trim().is_empty() {
            return Err(EngineError::Validation(
                "voter id is required".to_string(),
            ));
        }
        if poll.requires_authentication
            && !self
                .membership()
                .is_eligible(&poll.organization_id, voter_id)
                .await?
        {
            return Err(EngineError::Conflict(format!(
                "voter {voter_id} is not eligible to vote in organization {}",
                poll.organization_id
            )));
        }

        let options = self.store().list_options(poll_id).await?;
        let rows = build_ballot_rows(&poll, &options, voter_id, selection)?;
        self.store().replace_ballots(poll_id, voter_id, rows).await?;
        info!("recorded ballot from voter {voter_id} on poll {poll_id}");
        Ok(())
    }

    pub async fn has_voted(&self, poll_id: &str, voter_id: &str) -> EngineResult<bool> {
        let rows = self.store().ballots_for_voter(poll_id, voter_id).await?;
        Ok(!rows.is_empty())
    }

    pub async fn count_distinct_voters(&self, poll_id: &str) -> EngineResult<u32> {
        self.store().count_distinct_voters(poll_id).await
    }
}

/// Validates a selection against the poll's method and option catalog and
/// expands it into ballot rows. Ranked rows get contiguous ranks from list
/// position, 1 = most preferred.
fn build_ballot_rows(
    poll: &Poll,
    options: &[PollOption],
    voter_id: &str,
    selection: BallotSelection,
) -> EngineResult<Vec<Ballot>> {
    let known: HashSet<&str> = options.iter().map(|o| o.id.as_str()).collect();
    let check_option = |option_id: &str| -> EngineResult<()> {
        if known.contains(option_id) {
            Ok(())
        } else {
            Err(EngineError::Validation(format!(
                "option {option_id} does not belong to poll {}",
                poll.id
            )))
        }
    };

    match (poll.voting_method, selection) {
        (VotingMethod::Simple, BallotSelection::Simple { option_id }) => {
            check_option(&option_id)?;
            Ok(vec![Ballot::new(&poll.id, voter_id, &option_id, None)])
        }
        (VotingMethod::Approval, BallotSelection::Approval { option_ids }) => {
            if option_ids.is_empty() {
                return Err(EngineError::Validation(
                    "approval ballot must name at least one option".to_string(),
                ));
            }
            let mut seen = HashSet::new();
            for option_id in &option_ids {
                check_option(option_id)?;
                if !seen.insert(option_id.as_str()) {
                    return Err(EngineError::Validation(format!(
                        "option {option_id} approved more than once"
                    )));
                }
            }
            Ok(option_ids
                .iter()
                .map(|option_id| Ballot::new(&poll.id, voter_id, option_id, None))
                .collect())
        }
        (VotingMethod::Ranked, BallotSelection::Ranked { ranking }) => {
            if ranking.is_empty() {
                return Err(EngineError::Validation(
                    "ranked ballot must rank at least one option".to_string(),
                ));
            }
            let mut seen = HashSet::new();
            for option_id in &ranking {
                check_option(option_id)?;
                if !seen.insert(option_id.as_str()) {
                    return Err(EngineError::Validation(format!(
                        "option {option_id} ranked more than once"
                    )));
                }
            }
            Ok(ranking
                .iter()
                .enumerate()
                .map(|(i, option_id)| {
                    Ballot::new(&poll.id, voter_id, option_id, Some(i as u32 + 1))
                })
                .collect())
        }
        (method, _) => Err(EngineError::Validation(format!(
            "selection shape does not match voting method {}",
            method.as_str()
        ))),
    }
}
