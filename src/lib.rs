//! Poll lifecycle, ballot casting and tallying for community organizations.
//!
//! The engine is storage-agnostic: operations go through the [`store::PollStore`]
//! trait, with an in-memory implementation for tests and embedding and a
//! SQLite implementation for persistence. Eligibility questions are delegated
//! to a [`membership::MembershipProvider`].

pub mod engine;
pub mod error;
pub mod membership;
pub mod models;
pub mod store;
pub mod tasks;
pub mod voting;

pub use engine::{PollEngine, VotingStats};
pub use error::{EngineError, EngineResult};
pub use membership::{MembershipProvider, StaticMembership};
pub use models::{
    Ballot, BallotSelection, NewPoll, Poll, PollFilter, PollOption, PollStatus, VotingMethod,
};
pub use store::{MemoryStore, PollStore, SqliteStore};
pub use voting::{OptionTally, TallyResult, TallyRound};
