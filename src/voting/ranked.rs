use std::collections::HashMap;

use log::warn;

use crate::models::{Ballot, PollOption};
use crate::voting::{
    MethodOutcome, OptionTally, OptionVotes, TallyRound, count_distinct_voters, sort_tallies,
};

/// Instant-runoff counting.
///
/// Each round counts every non-exhausted ballot for its highest-ranked option
/// still standing. An option holding a strict majority of the non-exhausted
/// ballots wins; otherwise the option with the fewest current-round votes is
/// eliminated and its ballots transfer to their next standing choice. Ballots
/// with no standing choice left are exhausted and leave the denominator.
///
/// Elimination ties are broken by lowest option order, never randomly, so the
/// same ballot set always produces the same winner and round record.
pub(crate) fn calculate_results(options: &[PollOption], ballots: &[Ballot]) -> MethodOutcome {
    // Work in option-order space: index i = i-th option sorted by `order`.
    let mut ordered: Vec<&PollOption> = options.iter().collect();
    ordered.sort_by_key(|o| o.order);
    let index_of: HashMap<&str, usize> = ordered
        .iter()
        .enumerate()
        .map(|(i, o)| (o.id.as_str(), i))
        .collect();

    // One preference list per voter, most preferred first.
    let mut rankings: HashMap<&str, Vec<(u32, usize)>> = HashMap::new();
    for ballot in ballots {
        let (Some(rank), Some(&idx)) = (ballot.rank, index_of.get(ballot.option_id.as_str()))
        else {
            warn!(
                "ignoring malformed ranked ballot row {} on poll {}",
                ballot.id, ballot.poll_id
            );
            continue;
        };
        rankings
            .entry(ballot.voter_id.as_str())
            .or_default()
            .push((rank, idx));
    }
    let preferences: Vec<Vec<usize>> = rankings
        .into_values()
        .map(|mut ranked| {
            ranked.sort_by_key(|(rank, _)| *rank);
            ranked.into_iter().map(|(_, idx)| idx).collect()
        })
        .collect();

    let total_voters = count_distinct_voters(ballots);
    if preferences.is_empty() {
        let mut tallies = zero_tallies(&ordered);
        sort_tallies(&mut tallies, options);
        return MethodOutcome {
            tallies,
            winner: None,
            rounds: Vec::new(),
        };
    }

    let n = ordered.len();
    let mut eliminated = vec![false; n];
    // Last-known count per option: final-round counts for survivors, the
    // count at elimination time for everyone else.
    let mut last_counts = vec![0u32; n];
    let mut rounds: Vec<TallyRound> = Vec::new();
    let mut winner: Option<usize> = None;

    for round_number in 1..=n as u32 {
        let mut counts = vec![0u32; n];
        let mut exhausted = 0u32;
        for prefs in &preferences {
            match prefs.iter().find(|&&idx| !eliminated[idx]) {
                Some(&idx) => counts[idx] += 1,
                None => exhausted += 1,
            }
        }
        let live = (preferences.len() as u32).saturating_sub(exhausted);

        for idx in 0..n {
            if !eliminated[idx] {
                last_counts[idx] = counts[idx];
            }
        }

        let standing: Vec<usize> = (0..n).filter(|&idx| !eliminated[idx]).collect();
        let mut round = TallyRound {
            round: round_number,
            counts: standing
                .iter()
                .map(|&idx| OptionVotes {
                    option_id: ordered[idx].id.clone(),
                    votes: counts[idx],
                })
                .collect(),
            eliminated_option_id: None,
            exhausted_ballots: exhausted,
        };

        // Only one option left: it wins by default.
        if let [last] = standing.as_slice() {
            winner = Some(*last);
            rounds.push(round);
            break;
        }

        // Strict majority of the non-exhausted ballots.
        let leader = standing
            .iter()
            .copied()
            .max_by_key(|&idx| counts[idx])
            .unwrap_or(0);
        if live > 0 && counts[leader] * 2 > live {
            winner = Some(leader);
            rounds.push(round);
            break;
        }

        let min = standing
            .iter()
            .map(|&idx| counts[idx])
            .min()
            .unwrap_or(0);
        // Everyone tied: only a dead end if no live ballot holds a later
        // preference among the standing options. Otherwise an elimination
        // can still move ballots, so the runoff continues.
        if counts[leader] == min {
            let transferable = preferences.iter().any(|prefs| {
                let mut live_prefs = prefs.iter().filter(|&&idx| !eliminated[idx]);
                live_prefs.next().is_some() && live_prefs.next().is_some()
            });
            if !transferable {
                rounds.push(round);
                break;
            }
        }

        // Eliminate the fewest-votes option; `standing` is ordered by option
        // order, so the first minimum is the deterministic tie-break.
        let loser = standing
            .iter()
            .copied()
            .find(|&idx| counts[idx] == min)
            .unwrap_or(leader);
        eliminated[loser] = true;
        round.eliminated_option_id = Some(ordered[loser].id.clone());
        rounds.push(round);
    }

    let mut tallies: Vec<OptionTally> = ordered
        .iter()
        .enumerate()
        .map(|(idx, option)| OptionTally {
            option_id: option.id.clone(),
            title: option.title.clone(),
            votes: last_counts[idx],
            percentage: if total_voters > 0 {
                f64::from(last_counts[idx]) * 100.0 / f64::from(total_voters)
            } else {
                0.0
            },
        })
        .collect();
    sort_tallies(&mut tallies, options);

    MethodOutcome {
        tallies,
        winner: winner.map(|idx| ordered[idx].id.clone()),
        rounds,
    }
}

fn zero_tallies(ordered: &[&PollOption]) -> Vec<OptionTally> {
    ordered
        .iter()
        .map(|option| OptionTally {
            option_id: option.id.clone(),
            title: option.title.clone(),
            votes: 0,
            percentage: 0.0,
        })
        .collect()
}
