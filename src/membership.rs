use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::error::EngineResult;

/// Membership collaborator. The engine asks it for the eligible-voter
/// snapshot at activation time and, for polls that require authentication,
/// whether a voter belongs to the organization.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    async fn eligible_voter_count(&self, organization_id: &str) -> EngineResult<u32>;
    async fn is_eligible(&self, organization_id: &str, voter_id: &str) -> EngineResult<bool>;
}

/// Fixed roster per organization, for tests and embedding.
#[derive(Default)]
pub struct StaticMembership {
    rosters: HashMap<String, HashSet<String>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roster<I, S>(mut self, organization_id: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rosters.insert(
            organization_id.to_string(),
            members.into_iter().map(Into::into).collect(),
        );
        self
    }
}

#[async_trait]
impl MembershipProvider for StaticMembership {
    async fn eligible_voter_count(&self, organization_id: &str) -> EngineResult<u32> {
        Ok(self
            .rosters
            .get(organization_id)
            .map_or(0, |roster| roster.len() as u32))
    }

    async fn is_eligible(&self, organization_id: &str, voter_id: &str) -> EngineResult<bool> {
        Ok(self
            .rosters
            .get(organization_id)
            .is_some_and(|roster| roster.contains(voter_id)))
    }
}
