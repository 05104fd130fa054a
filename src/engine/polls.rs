use log::info;

use crate::engine::PollEngine;
use crate::error::{EngineError, EngineResult};
use crate::models::{NewPoll, Poll, PollFilter, PollOption, PollStatus};

/// Poll registry and option catalog operations. Options are only mutable
/// while the poll is a draft, so every cast ballot refers to the same
/// option set.
impl PollEngine {
    pub async fn create_poll(&self, organization_id: &str, draft: NewPoll) -> EngineResult<Poll> {
        if draft.title.trim().is_empty() {
            return Err(EngineError::Validation("poll title is required".to_string()));
        }
        if draft.ends_at <= draft.starts_at {
            return Err(EngineError::Validation(
                "poll must end after it starts".to_string(),
            ));
        }
        if draft.requires_quorum && draft.quorum_percentage > 100 {
            return Err(EngineError::Validation(format!(
                "quorum percentage must be within 0-100, got {}",
                draft.quorum_percentage
            )));
        }

        let poll = Poll::new(organization_id, draft);
        self.store().insert_poll(&poll).await?;
        info!("created poll {} for organization {}", poll.id, organization_id);
        Ok(poll)
    }

    pub async fn get_poll(&self, poll_id: &str) -> EngineResult<Poll> {
        self.store().get_poll(poll_id).await
    }

    pub async fn list_polls(
        &self,
        organization_id: &str,
        filter: &PollFilter,
    ) -> EngineResult<Vec<Poll>> {
        let polls = self.store().list_polls(organization_id).await?;
        Ok(polls.into_iter().filter(|p| filter.matches(p)).collect())
    }

    /// Deletes a draft poll. Polls holding cast ballots, or polls past the
    /// draft stage, are retained for audit and refuse deletion.
    pub async fn delete_poll(&self, poll_id: &str) -> EngineResult<()> {
        let poll = self.store().get_poll(poll_id).await?;
        if poll.status != PollStatus::Draft {
            return Err(EngineError::Conflict(format!(
                "only draft polls can be deleted, poll {poll_id} is {}",
                poll.status.as_str()
            )));
        }
        if self.store().count_ballots(poll_id).await? > 0 {
            return Err(EngineError::Conflict(format!(
                "poll {poll_id} has cast ballots and cannot be deleted"
            )));
        }
        self.store().delete_poll(poll_id).await?;
        info!("deleted draft poll {poll_id}");
        Ok(())
    }

    pub async fn add_option(
        &self,
        poll_id: &str,
        title: &str,
        description: Option<String>,
    ) -> EngineResult<PollOption> {
        if title.trim().is_empty() {
            return Err(EngineError::Validation(
                "option title is required".to_string(),
            ));
        }
        let poll = self.store().get_poll(poll_id).await?;
        if poll.status != PollStatus::Draft {
            return Err(EngineError::Conflict(format!(
                "options are frozen once poll {poll_id} leaves draft"
            )));
        }

        let existing = self.store().list_options(poll_id).await?;
        let order = existing.iter().map(|o| o.order + 1).max().unwrap_or(0);
        let option = PollOption::new(poll_id, title, description, order);
        self.store().insert_option(&option).await?;
        Ok(option)
    }

    pub async fn list_options(&self, poll_id: &str) -> EngineResult<Vec<PollOption>> {
        // Surface NotFound for unknown polls instead of an empty list.
        self.store().get_poll(poll_id).await?;
        self.store().list_options(poll_id).await
    }

    pub async fn remove_option(&self, poll_id: &str, option_id: &str) -> EngineResult<()> {
        let poll = self.store().get_poll(poll_id).await?;
        if poll.status != PollStatus::Draft {
            return Err(EngineError::Conflict(format!(
                "options are frozen once poll {poll_id} leaves draft"
            )));
        }

        let existing = self.store().list_options(poll_id).await?;
        if !existing.iter().any(|o| o.id == option_id) {
            return Err(EngineError::NotFound(format!("option {option_id}")));
        }
        // A poll needs at least two options to ever be activatable.
        if existing.len() <= 2 {
            return Err(EngineError::Validation(format!(
                "poll {poll_id} must keep at least 2 options"
            )));
        }
        self.store().delete_option(poll_id, option_id).await
    }
}
