use chrono::{DateTime, Utc};
use log::info;

use crate::engine::PollEngine;
use crate::error::{EngineError, EngineResult};
use crate::models::{Poll, PollStatus};

/// Poll state machine: draft → active → closed, with draft/active → cancelled.
/// Closed and cancelled are terminal.
impl PollEngine {
    /// Opens a draft poll for voting. Snapshots the eligible-voter count from
    /// the membership collaborator on first activation only; the snapshot
    /// stays fixed afterwards so quorum math is stable.
    pub async fn activate(&self, poll_id: &str) -> EngineResult<Poll> {
        let mut poll = self.store().get_poll(poll_id).await?;
        if poll.status != PollStatus::Draft {
            return Err(transition_conflict(&poll, "activate"));
        }

        let options = self.store().list_options(poll_id).await?;
        if options.len() < 2 {
            return Err(EngineError::Validation(format!(
                "poll {poll_id} needs at least 2 options to activate, has {}",
                options.len()
            )));
        }
        if poll.ends_at <= poll.starts_at {
            return Err(EngineError::Validation(
                "poll must end after it starts".to_string(),
            ));
        }
        if Utc::now() > poll.ends_at {
            return Err(EngineError::Conflict(format!(
                "voting window for poll {poll_id} has already passed"
            )));
        }

        if poll.eligible_voter_count.is_none() {
            let eligible = self
                .membership()
                .eligible_voter_count(&poll.organization_id)
                .await?;
            poll.eligible_voter_count = Some(eligible);
        }
        poll.status = PollStatus::Active;
        self.store().update_poll(&poll).await?;
        info!(
            "activated poll {poll_id} with eligible voter snapshot {:?}",
            poll.eligible_voter_count
        );
        Ok(poll)
    }

    /// Manually closes an active poll. Errors on any other state; the sweep
    /// uses `sweep_close` instead so repeated runs stay quiet.
    pub async fn close(&self, poll_id: &str) -> EngineResult<Poll> {
        let mut poll = self.store().get_poll(poll_id).await?;
        if poll.status != PollStatus::Active {
            return Err(transition_conflict(&poll, "close"));
        }
        poll.status = PollStatus::Closed;
        self.store().update_poll(&poll).await?;
        info!("closed poll {poll_id}");
        Ok(poll)
    }

    /// Idempotent close for the scheduled sweep: closing a poll that is
    /// already closed or cancelled is a no-op rather than an error.
    pub async fn sweep_close(&self, poll_id: &str) -> EngineResult<()> {
        let poll = self.store().get_poll(poll_id).await?;
        match poll.status {
            PollStatus::Active => {
                self.close(poll_id).await?;
                Ok(())
            }
            PollStatus::Closed | PollStatus::Cancelled => Ok(()),
            PollStatus::Draft => Err(transition_conflict(&poll, "close")),
        }
    }

    /// Cancels a draft or active poll. Any cast ballots stay in the store for
    /// audit but cancelled polls are excluded from statistics.
    pub async fn cancel(&self, poll_id: &str, reason: &str) -> EngineResult<Poll> {
        let mut poll = self.store().get_poll(poll_id).await?;
        if poll.status.is_terminal() {
            return Err(transition_conflict(&poll, "cancel"));
        }
        poll.status = PollStatus::Cancelled;
        poll.cancel_reason = Some(reason.to_string());
        self.store().update_poll(&poll).await?;
        info!("cancelled poll {poll_id}: {reason}");
        Ok(poll)
    }

    /// Active polls whose window has passed, for the auto-close sweep.
    pub async fn expired_active_polls(&self, now: DateTime<Utc>) -> EngineResult<Vec<String>> {
        self.store().expired_active_polls(now).await
    }
}

fn transition_conflict(poll: &Poll, attempted: &str) -> EngineError {
    EngineError::Conflict(format!(
        "cannot {attempted} poll {} in status {}",
        poll.id,
        poll.status.as_str()
    ))
}
