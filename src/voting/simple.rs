use std::collections::HashMap;

use crate::models::{Ballot, PollOption};
use crate::voting::{MethodOutcome, OptionTally, single_leader, sort_tallies};

/// Simple (plurality) counting: one ballot row per voter, one vote per row.
/// Percentages are over total ballots, which equals distinct voters here.
pub(crate) fn calculate_results(options: &[PollOption], ballots: &[Ballot]) -> MethodOutcome {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for option in options {
        counts.insert(option.id.as_str(), 0);
    }

    for ballot in ballots {
        if let Some(count) = counts.get_mut(ballot.option_id.as_str()) {
            *count += 1;
        }
    }

    let total = ballots.len() as u32;
    let mut tallies: Vec<OptionTally> = options
        .iter()
        .map(|option| {
            let votes = counts[option.id.as_str()];
            OptionTally {
                option_id: option.id.clone(),
                title: option.title.clone(),
                votes,
                percentage: if total > 0 {
                    f64::from(votes) * 100.0 / f64::from(total)
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

    fn ballot(voter: &str, option: &PollOption) -> Ballot {
        Ballot::new("poll-1", voter, &option.id, None)
    }

    #[test]
    fn plurality_winner_with_counts() {
        let options = options();
        // A, A, B, C
        let ballots = vec![
            ballot("v1", &options[0]),
            ballot("v2", &options[0]),
            ballot("v3", &options[1]),
            ballot("v4", &options[2]),
        ];

        let outcome = calculate_results(&options, &ballots);
        assert_eq!(outcome.winner, Some(options[0].id.clone()));
        assert_eq!(outcome.tallies[0].votes, 2);
        assert_eq!(outcome.tallies[0].percentage, 50.0);

        // Vote conservation: every ballot lands on exactly one option.
        let total: u32 = outcome.tallies.iter().map(|t| t.votes).sum();
        assert_eq!(total, ballots.len() as u32);
        let pct: f64 = outcome.tallies.iter().map(|t| t.percentage).sum();
        assert!((pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn two_way_tie_has_no_winner() {
        let options = options();
        let ballots = vec![ballot("v1", &options[0]), ballot("v2", &options[1])];
        let outcome = calculate_results(&options, &ballots);
        assert_eq!(outcome.winner, None);
    }

    #[test]
    fn no_ballots_means_no_winner() {
        let outcome = calculate_results(&options(), &[]);
        assert_eq!(outcome.winner, None);
        assert!(outcome.tallies.iter().all(|t| t.votes == 0));
    }
}
