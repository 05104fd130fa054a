pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EngineResult;
use crate::models::{Ballot, Poll, PollOption};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persistence collaborator for polls, options and ballots.
///
/// `replace_ballots` is the one operation with non-trivial semantics: it must
/// atomically drop every prior ballot row for `(poll_id, voter_id)` and insert
/// the new rows, so a resubmitted ballot supersedes the previous one in full
/// and concurrent casts from the same voter never interleave.
///
/// Cancellation is cooperative-by-drop: callers bound an operation by
/// dropping its future (e.g. under `tokio::time::timeout`). Implementations
/// must keep `replace_ballots` all-or-nothing under such a drop — a partial
/// ballot write must never become observable.
#[async_trait]
pub trait PollStore: Send + Sync {
    async fn insert_poll(&self, poll: &Poll) -> EngineResult<()>;
    async fn get_poll(&self, poll_id: &str) -> EngineResult<Poll>;
    async fn update_poll(&self, poll: &Poll) -> EngineResult<()>;
    async fn delete_poll(&self, poll_id: &str) -> EngineResult<()>;
    async fn list_polls(&self, organization_id: &str) -> EngineResult<Vec<Poll>>;

    async fn insert_option(&self, option: &PollOption) -> EngineResult<()>;
    /// Options ordered by their `order` field.
    async fn list_options(&self, poll_id: &str) -> EngineResult<Vec<PollOption>>;
    async fn delete_option(&self, poll_id: &str, option_id: &str) -> EngineResult<()>;

    async fn replace_ballots(
        &self,
        poll_id: &str,
        voter_id: &str,
        ballots: Vec<Ballot>,
    ) -> EngineResult<()>;
    async fn ballots_for_poll(&self, poll_id: &str) -> EngineResult<Vec<Ballot>>;
    async fn ballots_for_voter(&self, poll_id: &str, voter_id: &str)
    -> EngineResult<Vec<Ballot>>;
    async fn count_ballots(&self, poll_id: &str) -> EngineResult<u32>;
    async fn count_distinct_voters(&self, poll_id: &str) -> EngineResult<u32>;

    /// Ids of active polls whose window has passed, for the auto-close sweep.
    async fn expired_active_polls(&self, now: DateTime<Utc>) -> EngineResult<Vec<String>>;
}
