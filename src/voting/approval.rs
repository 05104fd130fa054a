use std::collections::HashMap;

use crate::models::{Ballot, PollOption};
use crate::voting::{MethodOutcome, OptionTally, count_distinct_voters, single_leader, sort_tallies};

/// Approval counting: every ballot row is an independent approve signal, so
/// one voter can contribute to several options. Percentages are over distinct
/// voters, not ballot rows, so the denominator never double counts a voter.
pub(crate) fn calculate_results(options: &[PollOption], ballots: &[Ballot]) -> MethodOutcome {
    let mut approvals: HashMap<&str, u32> = HashMap::new();
    for option in options {
        approvals.insert(option.id.as_str(), 0);
    }

    for ballot in ballots {
        if let Some(count) = approvals.get_mut(ballot.option_id.as_str()) {
            *count += 1;
        }
    }

    let voters = count_distinct_voters(ballots);
    let mut tallies: Vec<OptionTally> = options
        .iter()
        .map(|option| {
            let votes = approvals[option.id.as_str()];
            OptionTally {
                option_id: option.id.clone(),
                title: option.title.clone(),
                votes,
                percentage: if voters > 0 {
                    f64::from(votes) * 100.0 / f64::from(voters)
                } else {
                    0.0
                },
            }
        })
        .collect();
    sort_tallies(&mut tallies, options);

    let winner = single_leader(&tallies);
    MethodOutcome {
        tallies,
        winner,
        rounds: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ballot;

    fn options() -> Vec<PollOption> {
        ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, t)| PollOption::new("poll-1", t, None, i as u32))
            .collect()
    }

    fn approve(voter: &str, option: &PollOption) -> Ballot {
        Ballot::new("poll-1", voter, &option.id, None)
    }

    #[test]
    fn approvals_count_per_option_and_cap_at_voter_count() {
        let options = options();
        // v1 approves A and B, v2 approves A, v3 approves B and C.
        let ballots = vec![
            approve("v1", &options[0]),
            approve("v1", &options[1]),
            approve("v2", &options[0]),
            approve("v3", &options[1]),
            approve("v3", &options[2]),
        ];

        let outcome = calculate_results(&options, &ballots);
        let voters = count_distinct_voters(&ballots);
        assert_eq!(voters, 3);
        for tally in &outcome.tallies {
            assert!(tally.votes <= voters);
        }
        // A and B tie at 2 approvals.
        assert_eq!(outcome.winner, None);
    }

    #[test]
    fn clear_approval_winner() {
        let options = options();
        let ballots = vec![
            approve("v1", &options[0]),
            approve("v1", &options[1]),
            approve("v2", &options[1]),
            approve("v3", &options[1]),
        ];

        let outcome = calculate_results(&options, &ballots);
        assert_eq!(outcome.winner, Some(options[1].id.clone()));
        // 3 approvals out of 3 voters.
        assert_eq!(outcome.tallies[0].votes, 3);
        assert_eq!(outcome.tallies[0].percentage, 100.0);
    }
}
