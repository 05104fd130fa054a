use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Draft,
    Active,
    Closed,
    Cancelled,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Draft => "draft",
            PollStatus::Active => "active",
            PollStatus::Closed => "closed",
            PollStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> EngineResult<Self> {
        match s {
            "draft" => Ok(PollStatus::Draft),
            "active" => Ok(PollStatus::Active),
            "closed" => Ok(PollStatus::Closed),
            "cancelled" => Ok(PollStatus::Cancelled),
            other => Err(EngineError::Validation(format!(
                "unknown poll status: {other}"
            ))),
        }
    }

    /// Closed and cancelled polls accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollStatus::Closed | PollStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotingMethod {
    Simple,
    Ranked,
    Approval,
}

impl VotingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingMethod::Simple => "simple",
            VotingMethod::Ranked => "ranked",
            VotingMethod::Approval => "approval",
        }
    }

    pub fn parse(s: &str) -> EngineResult<Self> {
        match s {
            "simple" => Ok(VotingMethod::Simple),
            "ranked" => Ok(VotingMethod::Ranked),
            "approval" => Ok(VotingMethod::Approval),
            other => Err(EngineError::Validation(format!(
                "unknown voting method: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    pub description: String,
    pub status: PollStatus,
    pub voting_method: VotingMethod,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub requires_authentication: bool,
    pub allows_anonymous: bool,
    pub requires_quorum: bool,
    pub quorum_percentage: u8,
    /// Snapshot of the eligible membership, taken at first activation.
    /// None until the poll has been activated; immutable once set so quorum
    /// math stays stable even if membership changes afterwards.
    pub eligible_voter_count: Option<u32>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    pub fn new(organization_id: &str, draft: NewPoll) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            title: draft.title,
            description: draft.description,
            status: PollStatus::Draft,
            voting_method: draft.voting_method,
            starts_at: draft.starts_at,
            ends_at: draft.ends_at,
            requires_authentication: draft.requires_authentication,
            allows_anonymous: draft.allows_anonymous,
            requires_quorum: draft.requires_quorum,
            quorum_percentage: draft.quorum_percentage,
            eligible_voter_count: None,
            cancel_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Whether `at` falls inside the poll's voting window.
    pub fn window_contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.starts_at && at <= self.ends_at
    }
}

/// Organizer-supplied fields for a new poll. Everything else (id, status,
/// voter snapshot) is assigned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPoll {
    pub title: String,
    pub description: String,
    pub voting_method: VotingMethod,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub requires_authentication: bool,
    pub allows_anonymous: bool,
    pub requires_quorum: bool,
    pub quorum_percentage: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOption {
    pub id: String,
    pub poll_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Stable display position, also the ranked-choice elimination tie-break.
    pub order: u32,
}

impl PollOption {
    pub fn new(poll_id: &str, title: &str, description: Option<String>, order: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            poll_id: poll_id.to_string(),
            title: title.to_string(),
            description,
            order,
        }
    }
}

/// One persisted ballot row. A voter's full ballot is one row for `simple`,
/// one row per approved option for `approval`, and one row per ranked option
/// for `ranked`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    pub id: String,
    pub poll_id: String,
    pub voter_id: String,
    pub option_id: String,
    /// Only set for ranked polls; 1 = most preferred.
    pub rank: Option<u32>,
    pub cast_at: DateTime<Utc>,
}

impl Ballot {
    pub fn new(poll_id: &str, voter_id: &str, option_id: &str, rank: Option<u32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            poll_id: poll_id.to_string(),
            voter_id: voter_id.to_string(),
            option_id: option_id.to_string(),
            rank,
            cast_at: Utc::now(),
        }
    }
}

/// The selections a voter submits, shaped per voting method so a mismatched
/// payload is rejected at the type level rather than deep in tallying.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum BallotSelection {
    Simple { option_id: String },
    Approval { option_ids: Vec<String> },
    /// Most preferred first; rank is derived from position, so ranks are
    /// contiguous 1..N by construction.
    Ranked { ranking: Vec<String> },
}

/// Filter for listing an organization's polls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollFilter {
    pub status: Option<PollStatus>,
    /// Case-insensitive substring match on title or description.
    pub search: Option<String>,
}

impl PollFilter {
    pub fn matches(&self, poll: &Poll) -> bool {
        if let Some(status) = self.status {
            if poll.status != status {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !poll.title.to_lowercase().contains(&needle)
                && !poll.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(method: VotingMethod) -> NewPoll {
        let now = Utc::now();
        NewPoll {
            title: "Budget 2026".to_string(),
            description: "Annual budget approval".to_string(),
            voting_method: method,
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(1),
            requires_authentication: false,
            allows_anonymous: true,
            requires_quorum: false,
            quorum_percentage: 0,
        }
    }

    #[test]
    fn new_poll_starts_in_draft_without_snapshot() {
        let poll = Poll::new("org-1", draft(VotingMethod::Simple));
        assert_eq!(poll.status, PollStatus::Draft);
        assert_eq!(poll.eligible_voter_count, None);
        assert!(poll.window_contains(Utc::now()));
    }

    #[test]
    fn status_and_method_round_trip_their_codes() {
        for status in [
            PollStatus::Draft,
            PollStatus::Active,
            PollStatus::Closed,
            PollStatus::Cancelled,
        ] {
            assert_eq!(PollStatus::parse(status.as_str()).unwrap(), status);
        }
        for method in [
            VotingMethod::Simple,
            VotingMethod::Ranked,
            VotingMethod::Approval,
        ] {
            assert_eq!(VotingMethod::parse(method.as_str()).unwrap(), method);
        }
        assert!(VotingMethod::parse("borda").is_err());
        assert!(PollStatus::parse("archived").is_err());
    }

    #[test]
    fn filter_matches_status_and_text() {
        let poll = Poll::new("org-1", draft(VotingMethod::Approval));
        let by_text = PollFilter {
            status: None,
            search: Some("budget".to_string()),
        };
        assert!(by_text.matches(&poll));

        let by_status = PollFilter {
            status: Some(PollStatus::Active),
            search: None,
        };
        assert!(!by_status.matches(&poll));
    }
}
