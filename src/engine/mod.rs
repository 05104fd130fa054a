mod ballots;
mod lifecycle;
mod polls;
mod stats;

use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::membership::MembershipProvider;
use crate::models::PollStatus;
use crate::store::PollStore;
use crate::voting::{self, TallyResult};

pub use stats::VotingStats;

/// The voting engine. Stateless itself; everything lives in the injected
/// store, so engines are cheap to construct per request if callers want to.
pub struct PollEngine {
    store: Arc<dyn PollStore>,
    membership: Arc<dyn MembershipProvider>,
}

impl PollEngine {
    pub fn new(store: Arc<dyn PollStore>, membership: Arc<dyn MembershipProvider>) -> Self {
        Self { store, membership }
    }

    pub(crate) fn store(&self) -> &dyn PollStore {
        self.store.as_ref()
    }

    pub(crate) fn membership(&self) -> &dyn MembershipProvider {
        self.membership.as_ref()
    }

    /// Computes the tally for a poll, fresh from the ballot rows on every
    /// call. A draft poll yields a zero result rather than an error so
    /// organizers can sanity-check before activation.
    pub async fn compute_results(&self, poll_id: &str) -> EngineResult<TallyResult> {
        let poll = self.store.get_poll(poll_id).await?;
        let options = self.store.list_options(poll_id).await?;

        if poll.status == PollStatus::Draft {
            return Ok(TallyResult::empty(&poll, &options));
        }
        if options.is_empty() {
            // Unreachable through the lifecycle manager, which refuses to
            // activate a poll with fewer than two options.
            return Err(EngineError::Validation(format!(
                "poll {poll_id} has no options"
            )));
        }

        let ballots = self.store.ballots_for_poll(poll_id).await?;
        voting::tally(&poll, &options, &ballots)
    }
}
