use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use super::cache::{AgentSelection, Refresh, SharedSnapshots, ViewSlot};
use super::domain::{Agent, AgentId, Member, ReferenceCode};
use super::error::ConsoleError;
use super::query::QueryEngine;
use super::store::RecordStore;

/// Agent/member association, resolved on demand by reference-code equality.
/// Nothing is materialised beyond the selection the operator is looking at.
pub struct DirectoryIndex<S> {
    queries: QueryEngine<S>,
    snapshots: SharedSnapshots,
}

/// Reference code handed out by more than one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateCode {
    pub reference_code: ReferenceCode,
    pub agents: Vec<AgentId>,
}

impl<S> DirectoryIndex<S>
where
    S: RecordStore + 'static,
{
    pub fn new(queries: QueryEngine<S>, snapshots: SharedSnapshots) -> Self {
        Self { queries, snapshots }
    }

    /// Members referred by `agent`, cached as the current agent selection.
    ///
    /// No match is an empty list, not an error. If the operator selected
    /// another agent (or closed the selection) while this lookup was in
    /// flight, the result is not cached and comes back as `Superseded`. A
    /// failed lookup withdraws its ticket so an earlier one can still land.
    pub async fn resolve_members_for_agent(
        &self,
        agent: &Agent,
    ) -> Result<Refresh<Vec<Member>>, ConsoleError> {
        if agent.reference_code.is_blank() {
            return Err(ConsoleError::InvalidArgument(format!(
                "agent '{}' has no reference code",
                agent.name
            )));
        }

        let ticket = self.snapshots.with(|cache| cache.issue(ViewSlot::AgentMembers));
        let members = match self
            .queries
            .list_members_for_agent(&agent.reference_code)
            .await
        {
            Ok(members) => members,
            Err(error) => {
                self.snapshots.with(|cache| cache.retract(ticket));
                return Err(error);
            }
        };

        let selection = AgentSelection {
            agent: agent.clone(),
            members: members.clone(),
        };
        if self
            .snapshots
            .with(|cache| cache.install_selection(ticket, selection))
        {
            Ok(Refresh::Current(members))
        } else {
            debug!(
                reference_code = %agent.reference_code,
                sequence = ticket.sequence(),
                "discarded superseded agent resolution"
            );
            Ok(Refresh::Superseded(members))
        }
    }

    /// Reverse join: every agent whose code matches the member's `agentRefCode`.
    pub async fn referring_agents(&self, member: &Member) -> Result<Vec<Agent>, ConsoleError> {
        match member.agent_ref_code.as_ref().filter(|code| !code.is_blank()) {
            Some(code) => self.queries.list_agents_with_code(code).await,
            None => Ok(Vec::new()),
        }
    }

    pub fn close_selection(&self) {
        self.snapshots.with(|cache| cache.close(ViewSlot::AgentMembers));
    }
}

/// Groups agents sharing a reference code. Codes are sorted; agents keep roster order.
pub fn duplicate_reference_codes(agents: &[Agent]) -> Vec<DuplicateCode> {
    let mut by_code: BTreeMap<&ReferenceCode, Vec<AgentId>> = BTreeMap::new();
    for agent in agents.iter().filter(|agent| !agent.reference_code.is_blank()) {
        let id = agent
            .id
            .clone()
            .unwrap_or_else(|| AgentId::new(agent.name.clone()));
        by_code.entry(&agent.reference_code).or_default().push(id);
    }

    by_code
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(code, agents)| DuplicateCode {
            reference_code: code.clone(),
            agents,
        })
        .collect()
}
