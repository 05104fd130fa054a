use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::engine::PollEngine;
use crate::error::EngineResult;
use crate::models::PollStatus;

/// Organization-wide voting participation and engagement summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VotingStats {
    pub total: u32,
    pub active: u32,
    pub closed: u32,
    pub draft: u32,
    pub cancelled: u32,
    /// Draft or active polls whose window has not opened yet.
    pub upcoming: u32,
    /// Mean participation rate over closed and active polls. Polls without an
    /// eligible-voter snapshot are left out of the mean rather than counted
    /// as zero.
    pub average_participation: f64,
}

impl PollEngine {
    pub async fn organization_voting_stats(
        &self,
        organization_id: &str,
    ) -> EngineResult<VotingStats> {
        let polls = self.store().list_polls(organization_id).await?;
        let now = Utc::now();

        let mut stats = VotingStats::default();
        let mut participation_sum = 0.0;
        let mut participation_polls = 0u32;

        for poll in &polls {
            stats.total += 1;
            match poll.status {
                PollStatus::Draft => stats.draft += 1,
                PollStatus::Active => stats.active += 1,
                PollStatus::Closed => stats.closed += 1,
                PollStatus::Cancelled => stats.cancelled += 1,
            }
            if matches!(poll.status, PollStatus::Draft | PollStatus::Active)
                && poll.starts_at > now
            {
                stats.upcoming += 1;
            }

            // Cancelled and draft polls never count toward participation.
            if matches!(poll.status, PollStatus::Active | PollStatus::Closed) {
                if let Some(eligible) = poll.eligible_voter_count.filter(|&n| n > 0) {
                    let voters = self.store().count_distinct_voters(&poll.id).await?;
                    participation_sum += f64::from(voters) / f64::from(eligible);
                    participation_polls += 1;
                }
            }
        }

        if participation_polls > 0 {
            stats.average_participation = participation_sum / f64::from(participation_polls);
        }
        Ok(stats)
    }
}
