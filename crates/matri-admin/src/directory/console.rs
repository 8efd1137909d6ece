use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info_span, warn, Instrument};

use super::cache::{Refresh, SharedSnapshots, SnapshotCache, ViewSlot, ViewTicket};
use super::domain::{Agent, AgentId, Member, MemberId, PhotoRef};
use super::error::ConsoleError;
use super::index::{duplicate_reference_codes, DirectoryIndex};
use super::moderation::{Moderator, PartialCommit, PhotoRemoval, Transition};
use super::query::QueryEngine;
use super::session::{OperatorId, OperatorSession};
use super::store::RecordStore;

/// Session-gated entry points composing the query engine, directory index,
/// moderator, and snapshot cache over one record store.
pub struct AdminConsole<S> {
    queries: QueryEngine<S>,
    index: DirectoryIndex<S>,
    moderator: Moderator<S>,
    snapshots: SharedSnapshots,
}

impl<S> AdminConsole<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        let snapshots = SharedSnapshots::new();
        let queries = QueryEngine::new(Arc::clone(&store));
        Self {
            index: DirectoryIndex::new(queries.clone(), snapshots.clone()),
            moderator: Moderator::new(store, snapshots.clone()),
            queries,
            snapshots,
        }
    }

    pub fn snapshots(&self) -> &SharedSnapshots {
        &self.snapshots
    }

    /// Reloads the full directory, newest members first.
    pub async fn refresh_directory(
        &self,
        session: &OperatorSession,
    ) -> Result<Refresh<Vec<Member>>, ConsoleError> {
        let operator = authorize(session)?;
        self.ticketed(
            ViewSlot::Directory,
            self.queries.list_all_members_by_recency(),
            SnapshotCache::install_members,
        )
        .instrument(info_span!("refresh_directory", %operator))
        .await
    }

    /// Reloads the moderation queue of reported members.
    pub async fn refresh_report_queue(
        &self,
        session: &OperatorSession,
    ) -> Result<Refresh<Vec<Member>>, ConsoleError> {
        let operator = authorize(session)?;
        self.ticketed(
            ViewSlot::ReportQueue,
            self.queries.list_reported_members(),
            SnapshotCache::install_members,
        )
        .instrument(info_span!("refresh_report_queue", %operator))
        .await
    }

    /// Reloads the agent roster and flags reference codes shared by several agents.
    pub async fn refresh_agents(
        &self,
        session: &OperatorSession,
    ) -> Result<Refresh<Vec<Agent>>, ConsoleError> {
        let operator = authorize(session)?;
        let span = info_span!("refresh_agents", %operator);
        let refresh = self
            .ticketed(
                ViewSlot::AgentRoster,
                self.queries.list_agents(),
                SnapshotCache::install_agents,
            )
            .instrument(span.clone())
            .await?;

        if let Refresh::Current(agents) = &refresh {
            span.in_scope(|| {
                for duplicate in duplicate_reference_codes(agents) {
                    warn!(
                        reference_code = %duplicate.reference_code,
                        agents = duplicate.agents.len(),
                        "reference code shared by several agents"
                    );
                }
            });
        }
        Ok(refresh)
    }

    /// Selects an agent and resolves the members it referred.
    pub async fn select_agent(
        &self,
        session: &OperatorSession,
        agent: &Agent,
    ) -> Result<Refresh<Vec<Member>>, ConsoleError> {
        let operator = authorize(session)?;
        self.index
            .resolve_members_for_agent(agent)
            .instrument(info_span!("select_agent", %operator, reference_code = %agent.reference_code))
            .await
    }

    pub fn close_agent(&self) {
        self.index.close_selection();
    }

    /// Agents whose reference code matches the member's `agentRefCode`.
    pub async fn referring_agents(
        &self,
        session: &OperatorSession,
        member: &Member,
    ) -> Result<Vec<Agent>, ConsoleError> {
        authorize(session)?;
        self.index.referring_agents(member).await
    }

    pub async fn agent(
        &self,
        session: &OperatorSession,
        id: &AgentId,
    ) -> Result<Agent, ConsoleError> {
        authorize(session)?;
        self.queries.get_agent(id).await
    }

    /// Fetches a member without touching the cache.
    pub async fn member(
        &self,
        session: &OperatorSession,
        id: &MemberId,
    ) -> Result<Member, ConsoleError> {
        authorize(session)?;
        self.queries.get_member(id).await
    }

    /// Opens a member's detail view.
    pub async fn open_member(
        &self,
        session: &OperatorSession,
        id: &MemberId,
    ) -> Result<Refresh<Member>, ConsoleError> {
        let operator = authorize(session)?;
        self.ticketed(
            ViewSlot::SelectedMember,
            self.queries.get_member(id),
            SnapshotCache::install_member,
        )
        .instrument(info_span!("open_member", %operator, member_id = %id))
        .await
    }

    pub fn close_member(&self) {
        self.snapshots
            .with(|cache| cache.close(ViewSlot::SelectedMember));
    }

    pub async fn verify(
        &self,
        session: &OperatorSession,
        member: &Member,
    ) -> Result<Transition, ConsoleError> {
        let operator = authorize(session)?;
        let member = self.with_cached_verification(member);
        self.moderator
            .verify(&member)
            .instrument(info_span!("verify", %operator))
            .await
    }

    pub async fn clear_report(
        &self,
        session: &OperatorSession,
        member: &Member,
    ) -> Result<Transition, ConsoleError> {
        let operator = authorize(session)?;
        self.moderator
            .clear_report(member)
            .instrument(info_span!("clear_report", %operator))
            .await
    }

    pub async fn remove_photo(
        &self,
        session: &OperatorSession,
        member: &Member,
        photo: &PhotoRef,
    ) -> Result<PhotoRemoval, ConsoleError> {
        let operator = authorize(session)?;
        self.moderator
            .remove_photo(member, photo)
            .instrument(info_span!("remove_photo", %operator))
            .await
    }

    /// Partial-commit warnings recorded since the last drain.
    pub fn drain_warnings(&self) -> Vec<PartialCommit> {
        self.snapshots.with(SnapshotCache::drain_warnings)
    }

    /// Carries a confirmed verification from the cache onto the caller's copy.
    /// Verification never reverts, so this is the only flag the cache may
    /// contribute; everything else comes from the caller.
    fn with_cached_verification(&self, member: &Member) -> Member {
        let mut member = member.clone();
        let verified = member.store_id().is_some_and(|id| {
            self.snapshots.read(|cache| {
                cache
                    .find_member(id)
                    .is_some_and(|cached| cached.verified_by_admin)
            })
        });
        if verified {
            member.verified_by_admin = true;
        }
        member
    }

    async fn ticketed<T, F>(
        &self,
        slot: ViewSlot,
        fetch: F,
        install: fn(&mut SnapshotCache, ViewTicket, T) -> bool,
    ) -> Result<Refresh<T>, ConsoleError>
    where
        T: Clone,
        F: Future<Output = Result<T, ConsoleError>>,
    {
        let ticket = self.snapshots.with(|cache| cache.issue(slot));
        let view = match fetch.await {
            Ok(view) => view,
            Err(error) => {
                self.snapshots.with(|cache| cache.retract(ticket));
                return Err(error);
            }
        };

        if self
            .snapshots
            .with(|cache| install(cache, ticket, view.clone()))
        {
            Ok(Refresh::Current(view))
        } else {
            debug!(
                slot = slot.label(),
                sequence = ticket.sequence(),
                "discarded superseded view"
            );
            Ok(Refresh::Superseded(view))
        }
    }
}

fn authorize(session: &OperatorSession) -> Result<&OperatorId, ConsoleError> {
    session.authorize(Utc::now())
}
