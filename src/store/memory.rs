use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{EngineError, EngineResult};
use crate::models::{Ballot, Poll, PollOption, PollStatus};
use crate::store::PollStore;

/// In-memory store. State is constructor-injected and lives behind a single
/// lock, so tests run isolated and in parallel, and ballot replacement is
/// naturally serialized per voter.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    polls: HashMap<String, Poll>,
    // Keyed by poll id.
    options: HashMap<String, Vec<PollOption>>,
    ballots: HashMap<String, Vec<Ballot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> EngineError {
        EngineError::Store("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn insert_poll(&self, poll: &Poll) -> EngineResult<()> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        state.polls.insert(poll.id.clone(), poll.clone());
        Ok(())
    }

    async fn get_poll(&self, poll_id: &str) -> EngineResult<Poll> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        state
            .polls
            .get(poll_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("poll {poll_id}")))
    }

    async fn update_poll(&self, poll: &Poll) -> EngineResult<()> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        if !state.polls.contains_key(&poll.id) {
            return Err(EngineError::NotFound(format!("poll {}", poll.id)));
        }
        state.polls.insert(poll.id.clone(), poll.clone());
        Ok(())
    }

    async fn delete_poll(&self, poll_id: &str) -> EngineResult<()> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        if state.polls.remove(poll_id).is_none() {
            return Err(EngineError::NotFound(format!("poll {poll_id}")));
        }
        state.options.remove(poll_id);
        state.ballots.remove(poll_id);
        Ok(())
    }

    async fn list_polls(&self, organization_id: &str) -> EngineResult<Vec<Poll>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        let mut polls: Vec<Poll> = state
            .polls
            .values()
            .filter(|p| p.organization_id == organization_id)
            .cloned()
            .collect();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(polls)
    }

    async fn insert_option(&self, option: &PollOption) -> EngineResult<()> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        state
            .options
            .entry(option.poll_id.clone())
            .or_default()
            .push(option.clone());
        Ok(())
    }

    async fn list_options(&self, poll_id: &str) -> EngineResult<Vec<PollOption>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        let mut options = state.options.get(poll_id).cloned().unwrap_or_default();
        options.sort_by_key(|o| o.order);
        Ok(options)
    }

    async fn delete_option(&self, poll_id: &str, option_id: &str) -> EngineResult<()> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        let options = state
            .options
            .get_mut(poll_id)
            .ok_or_else(|| EngineError::NotFound(format!("poll {poll_id}")))?;
        let before = options.len();
        options.retain(|o| o.id != option_id);
        if options.len() == before {
            return Err(EngineError::NotFound(format!("option {option_id}")));
        }
        Ok(())
    }

    async fn replace_ballots(
        &self,
        poll_id: &str,
        voter_id: &str,
        ballots: Vec<Ballot>,
    ) -> EngineResult<()> {
        // Drop and insert under one write lock: the replacement is atomic.
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        let rows = state.ballots.entry(poll_id.to_string()).or_default();
        rows.retain(|b| b.voter_id != voter_id);
        rows.extend(ballots);
        Ok(())
    }

    async fn ballots_for_poll(&self, poll_id: &str) -> EngineResult<Vec<Ballot>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.ballots.get(poll_id).cloned().unwrap_or_default())
    }

    async fn ballots_for_voter(
        &self,
        poll_id: &str,
        voter_id: &str,
    ) -> EngineResult<Vec<Ballot>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state
            .ballots
            .get(poll_id)
            .map(|rows| {
                rows.iter()
                    .filter(|b| b.voter_id == voter_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count_ballots(&self, poll_id: &str) -> EngineResult<u32> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.ballots.get(poll_id).map_or(0, |rows| rows.len() as u32))
    }

    async fn count_distinct_voters(&self, poll_id: &str) -> EngineResult<u32> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        let voters: HashSet<&str> = state
            .ballots
            .get(poll_id)
            .map(|rows| rows.iter().map(|b| b.voter_id.as_str()).collect())
            .unwrap_or_default();
        Ok(voters.len() as u32)
    }

    async fn expired_active_polls(&self, now: DateTime<Utc>) -> EngineResult<Vec<String>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state
            .polls
            .values()
            .filter(|p| p.status == PollStatus::Active && p.ends_at < now)
            .map(|p| p.id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPoll, VotingMethod};
    use chrono::Duration;

    fn poll() -> Poll {
        let now = Utc::now();
        Poll::new(
            "org-1",
            NewPoll {
                title: "Color".to_string(),
                description: String::new(),
                voting_method: VotingMethod::Simple,
                starts_at: now - Duration::hours(1),
                ends_at: now + Duration::hours(1),
                requires_authentication: false,
                allows_anonymous: true,
                requires_quorum: false,
                quorum_percentage: 0,
            },
        )
    }

    #[tokio::test]
    async fn replace_ballots_supersedes_prior_rows() {
        let store = MemoryStore::new();
        let poll = poll();
        store.insert_poll(&poll).await.unwrap();

        store
            .replace_ballots(
                &poll.id,
                "alice",
                vec![Ballot::new(&poll.id, "alice", "opt-a", None)],
            )
            .await
            .unwrap();
        store
            .replace_ballots(
                &poll.id,
                "alice",
                vec![Ballot::new(&poll.id, "alice", "opt-b", None)],
            )
            .await
            .unwrap();

        let rows = store.ballots_for_voter(&poll.id, "alice").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].option_id, "opt-b");
        assert_eq!(store.count_distinct_voters(&poll.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn options_come_back_in_order() {
        let store = MemoryStore::new();
        let poll = poll();
        store.insert_poll(&poll).await.unwrap();
        // Insert out of order on purpose.
        store
            .insert_option(&PollOption::new(&poll.id, "second", None, 1))
            .await
            .unwrap();
        store
            .insert_option(&PollOption::new(&poll.id, "first", None, 0))
            .await
            .unwrap();

        let options = store.list_options(&poll.id).await.unwrap();
        assert_eq!(options[0].title, "first");
        assert_eq!(options[1].title, "second");
    }

    #[tokio::test]
    async fn expired_scan_only_sees_active_polls() {
        let store = MemoryStore::new();
        let mut expired = poll();
        expired.status = PollStatus::Active;
        expired.ends_at = Utc::now() - Duration::minutes(5);
        store.insert_poll(&expired).await.unwrap();

        let mut still_draft = poll();
        still_draft.ends_at = Utc::now() - Duration::minutes(5);
        store.insert_poll(&still_draft).await.unwrap();

        let ids = store.expired_active_polls(Utc::now()).await.unwrap();
        assert_eq!(ids, vec![expired.id]);
    }
}
