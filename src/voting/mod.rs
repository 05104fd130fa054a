pub mod approval;
pub mod ranked;
pub mod simple;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::{Ballot, Poll, PollOption, VotingMethod};

/// Final standing of one option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionTally {
    pub option_id: String,
    pub title: String,
    pub votes: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionVotes {
    pub option_id: String,
    pub votes: u32,
}

/// One instant-runoff round: current-round first-choice counts for the
/// options still standing, which option was eliminated (if any), and how
/// many ballots had run out of ranked options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyRound {
    pub round: u32,
    pub counts: Vec<OptionVotes>,
    pub eliminated_option_id: Option<String>,
    pub exhausted_ballots: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyResult {
    pub poll_id: String,
    pub method: VotingMethod,
    /// Sorted by votes descending, then by option order.
    pub options: Vec<OptionTally>,
    pub total_ballots: u32,
    pub distinct_voters: u32,
    /// distinct voters / eligible snapshot; 0.0 when no snapshot exists.
    pub participation_rate: f64,
    pub quorum_met: bool,
    /// Set when quorum was required and not met, so callers can present the
    /// missing quorum distinctly from a true tie.
    pub quorum_failed: bool,
    pub winning_option_id: Option<String>,
    /// Ranked polls only: the per-round record of the runoff.
    pub rounds: Vec<TallyRound>,
}

impl TallyResult {
    /// Zero result for a poll that has not opened yet.
    pub fn empty(poll: &Poll, options: &[PollOption]) -> Self {
        Self {
            poll_id: poll.id.clone(),
            method: poll.voting_method,
            options: options
                .iter()
                .map(|o| OptionTally {
                    option_id: o.id.clone(),
                    title: o.title.clone(),
                    votes: 0,
                    percentage: 0.0,
                })
                .collect(),
            total_ballots: 0,
            distinct_voters: 0,
            participation_rate: 0.0,
            quorum_met: !poll.requires_quorum || poll.quorum_percentage == 0,
            quorum_failed: poll.requires_quorum && poll.quorum_percentage > 0,
            winning_option_id: None,
            rounds: Vec::new(),
        }
    }
}

/// What a counting method produces before the quorum gate is applied.
pub(crate) struct MethodOutcome {
    pub tallies: Vec<OptionTally>,
    pub winner: Option<String>,
    pub rounds: Vec<TallyRound>,
}

/// Computes the full result for a poll: dispatches to the counting method,
/// then applies the quorum rule uniformly on top of the method's own winner
/// determination.
pub fn tally(poll: &Poll, options: &[PollOption], ballots: &[Ballot]) -> EngineResult<TallyResult> {
    if options.is_empty() {
        return Err(EngineError::Validation(format!(
            "poll {} has no options to tally",
            poll.id
        )));
    }

    let distinct_voters = count_distinct_voters(ballots);
    let total_ballots = ballots.len() as u32;

    let outcome = match poll.voting_method {
        VotingMethod::Simple => simple::calculate_results(options, ballots),
        VotingMethod::Approval => approval::calculate_results(options, ballots),
        VotingMethod::Ranked => ranked::calculate_results(options, ballots),
    };

    let participation_rate = match poll.eligible_voter_count {
        Some(eligible) if eligible > 0 => f64::from(distinct_voters) / f64::from(eligible),
        _ => 0.0,
    };
    let quorum_met =
        !poll.requires_quorum || participation_rate * 100.0 >= f64::from(poll.quorum_percentage);
    let quorum_failed = poll.requires_quorum && !quorum_met;

    // A failed quorum overrides the method's winner; quorum_failed tells a
    // binding miss apart from a true tie.
    let winning_option_id = if quorum_failed { None } else { outcome.winner };

    Ok(TallyResult {
        poll_id: poll.id.clone(),
        method: poll.voting_method,
        options: outcome.tallies,
        total_ballots,
        distinct_voters,
        participation_rate,
        quorum_met,
        quorum_failed,
        winning_option_id,
        rounds: outcome.rounds,
    })
}

pub(crate) fn count_distinct_voters(ballots: &[Ballot]) -> u32 {
    let voters: std::collections::HashSet<&str> =
        ballots.iter().map(|b| b.voter_id.as_str()).collect();
    voters.len() as u32
}

/// Sorts final tallies for presentation: most votes first, option order as
/// the stable tie-break.
pub(crate) fn sort_tallies(tallies: &mut [OptionTally], options: &[PollOption]) {
    let order_of = |id: &str| {
        options
            .iter()
            .find(|o| o.id == id)
            .map_or(u32::MAX, |o| o.order)
    };
    tallies.sort_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then_with(|| order_of(&a.option_id).cmp(&order_of(&b.option_id)))
    });
}

/// The unique option holding the maximum count, or None on a tie or when no
/// votes were cast at all.
pub(crate) fn single_leader(tallies: &[OptionTally]) -> Option<String> {
    let max = tallies.iter().map(|t| t.votes).max()?;
    if max == 0 {
        return None;
    }
    let mut leaders = tallies.iter().filter(|t| t.votes == max);
    let first = leaders.next()?;
    if leaders.next().is_some() {
        None
    } else {
        Some(first.option_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPoll, Poll};
    use chrono::{Duration, Utc};

    fn quorum_poll(eligible: u32, quorum_percentage: u8) -> Poll {
        let now = Utc::now();
        let mut poll = Poll::new(
            "org-1",
            NewPoll {
                title: "Bylaw change".to_string(),
                description: String::new(),
                voting_method: VotingMethod::Simple,
                starts_at: now - Duration::hours(1),
                ends_at: now + Duration::hours(1),
                requires_authentication: false,
                allows_anonymous: true,
                requires_quorum: true,
                quorum_percentage,
            },
        );
        poll.eligible_voter_count = Some(eligible);
        poll
    }

    fn options_for(poll: &Poll, titles: &[&str]) -> Vec<PollOption> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| PollOption::new(&poll.id, t, None, i as u32))
            .collect()
    }

    #[test]
    fn failed_quorum_forces_null_winner() {
        let poll = quorum_poll(10, 50);
        let options = options_for(&poll, &["yes", "no"]);
        // 4 of 10 eligible voters, all for the same option.
        let ballots: Vec<Ballot> = (0..4)
            .map(|i| Ballot::new(&poll.id, &format!("v{i}"), &options[0].id, None))
            .collect();

        let result = tally(&poll, &options, &ballots).unwrap();
        assert_eq!(result.participation_rate, 0.4);
        assert!(!result.quorum_met);
        assert!(result.quorum_failed);
        assert_eq!(result.winning_option_id, None);
        // The per-option counts are still reported.
        assert_eq!(result.options[0].votes, 4);
    }

    #[test]
    fn met_quorum_keeps_the_method_winner() {
        let poll = quorum_poll(10, 50);
        let options = options_for(&poll, &["yes", "no"]);
        let ballots: Vec<Ballot> = (0..5)
            .map(|i| Ballot::new(&poll.id, &format!("v{i}"), &options[0].id, None))
            .collect();

        let result = tally(&poll, &options, &ballots).unwrap();
        assert!(result.quorum_met);
        assert!(!result.quorum_failed);
        assert_eq!(result.winning_option_id, Some(options[0].id.clone()));
    }

    #[test]
    fn zero_options_is_a_validation_error() {
        let poll = quorum_poll(10, 0);
        let err = tally(&poll, &[], &[]).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn result_serializes_to_plain_json() {
        let poll = quorum_poll(4, 0);
        let options = options_for(&poll, &["yes", "no"]);
        let result = tally(&poll, &options, &[]).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["method"], "simple");
        assert_eq!(json["winning_option_id"], serde_json::Value::Null);
    }
}
