//! Last-confirmed views the operator is looking at.
//!
//! Reads are tagged with a [`ViewTicket`] before they suspend; a result is
//! installed only while its ticket is still the newest one issued for the
//! slot. A read that fails hands its ticket back, so an older read still in
//! flight can land. Writes reach the cache as [`MemberPatch`]es after the
//! store has confirmed them, never before.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::domain::{Agent, Member, MemberId, PhotoRef};
use super::moderation::PartialCommit;

/// Independent view slots of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSlot {
    Directory,
    ReportQueue,
    AgentRoster,
    AgentMembers,
    SelectedMember,
}

impl ViewSlot {
    pub const fn label(self) -> &'static str {
        match self {
            ViewSlot::Directory => "directory",
            ViewSlot::ReportQueue => "report_queue",
            ViewSlot::AgentRoster => "agent_roster",
            ViewSlot::AgentMembers => "agent_members",
            ViewSlot::SelectedMember => "selected_member",
        }
    }
}

/// Sequence-numbered claim on a slot, issued when a read starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTicket {
    slot: ViewSlot,
    sequence: u64,
}

impl ViewTicket {
    pub fn slot(&self) -> ViewSlot {
        self.slot
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Outcome of a ticketed read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh<T> {
    /// The result was the newest request for its slot and is now cached.
    Current(T),
    /// A newer request (or a close) overtook this one. The fetched value is
    /// handed back but was not cached.
    Superseded(T),
}

impl<T> Refresh<T> {
    /// The value, only if it was installed.
    pub fn current(self) -> Option<T> {
        match self {
            Refresh::Current(value) => Some(value),
            Refresh::Superseded(_) => None,
        }
    }

    /// The fetched value whether or not it was installed.
    pub fn into_inner(self) -> T {
        match self {
            Refresh::Current(value) | Refresh::Superseded(value) => value,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Refresh::Superseded(_))
    }
}

/// Agent picked by the operator together with the members it referred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSelection {
    pub agent: Agent,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    kind: ViewSlot,
    issued: u64,
    value: Option<T>,
}

impl<T> Slot<T> {
    fn new(kind: ViewSlot) -> Self {
        Self {
            kind,
            issued: 0,
            value: None,
        }
    }

    fn issue(&mut self) -> ViewTicket {
        self.issued += 1;
        ViewTicket {
            slot: self.kind,
            sequence: self.issued,
        }
    }

    fn install(&mut self, ticket: ViewTicket, value: T) -> bool {
        if ticket.slot != self.kind || ticket.sequence != self.issued {
            return false;
        }
        self.value = Some(value);
        true
    }

    /// Withdraws the newest ticket after its read failed. Older tickets are
    /// left alone, so this only helps when nothing newer was issued since.
    fn retract(&mut self, ticket: ViewTicket) -> bool {
        if ticket.slot != self.kind || ticket.sequence != self.issued {
            return false;
        }
        self.issued -= 1;
        true
    }

    /// Drops the value and invalidates every outstanding ticket.
    fn close(&mut self) {
        self.issued += 1;
        self.value = None;
    }
}

/// Confirmed mutation of a single member, replayed onto every cached copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberPatch {
    Verified(MemberId),
    ReportCleared(MemberId),
    PhotoRemoved(MemberId, PhotoRef),
}

impl MemberPatch {
    pub fn member_id(&self) -> &MemberId {
        match self {
            MemberPatch::Verified(id)
            | MemberPatch::ReportCleared(id)
            | MemberPatch::PhotoRemoved(id, _) => id,
        }
    }

    pub fn apply_to(&self, member: &mut Member) {
        match self {
            MemberPatch::Verified(_) => member.verified_by_admin = true,
            MemberPatch::ReportCleared(_) => {
                member.reported = false;
                member.report_reason.clear();
            }
            MemberPatch::PhotoRemoved(_, photo) => member.photos.retain(|item| item != photo),
        }
    }

    fn targets(&self, member: &Member) -> bool {
        member.store_id() == Some(self.member_id())
    }
}

#[derive(Debug)]
pub struct SnapshotCache {
    directory: Slot<Vec<Member>>,
    report_queue: Slot<Vec<Member>>,
    agent_roster: Slot<Vec<Agent>>,
    agent_members: Slot<AgentSelection>,
    selected_member: Slot<Member>,
    warnings: Vec<PartialCommit>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self {
            directory: Slot::new(ViewSlot::Directory),
            report_queue: Slot::new(ViewSlot::ReportQueue),
            agent_roster: Slot::new(ViewSlot::AgentRoster),
            agent_members: Slot::new(ViewSlot::AgentMembers),
            selected_member: Slot::new(ViewSlot::SelectedMember),
            warnings: Vec::new(),
        }
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, slot: ViewSlot) -> ViewTicket {
        match slot {
            ViewSlot::Directory => self.directory.issue(),
            ViewSlot::ReportQueue => self.report_queue.issue(),
            ViewSlot::AgentRoster => self.agent_roster.issue(),
            ViewSlot::AgentMembers => self.agent_members.issue(),
            ViewSlot::SelectedMember => self.selected_member.issue(),
        }
    }

    /// Hands back the ticket of a failed read so the previous one may install.
    pub fn retract(&mut self, ticket: ViewTicket) -> bool {
        match ticket.slot {
            ViewSlot::Directory => self.directory.retract(ticket),
            ViewSlot::ReportQueue => self.report_queue.retract(ticket),
            ViewSlot::AgentRoster => self.agent_roster.retract(ticket),
            ViewSlot::AgentMembers => self.agent_members.retract(ticket),
            ViewSlot::SelectedMember => self.selected_member.retract(ticket),
        }
    }

    pub fn close(&mut self, slot: ViewSlot) {
        match slot {
            ViewSlot::Directory => self.directory.close(),
            ViewSlot::ReportQueue => self.report_queue.close(),
            ViewSlot::AgentRoster => self.agent_roster.close(),
            ViewSlot::AgentMembers => self.agent_members.close(),
            ViewSlot::SelectedMember => self.selected_member.close(),
        }
    }

    /// Installs a member list into the directory or report-queue slot named by the ticket.
    pub fn install_members(&mut self, ticket: ViewTicket, members: Vec<Member>) -> bool {
        match ticket.slot {
            ViewSlot::Directory => self.directory.install(ticket, members),
            ViewSlot::ReportQueue => self.report_queue.install(ticket, members),
            _ => false,
        }
    }

    pub fn install_agents(&mut self, ticket: ViewTicket, agents: Vec<Agent>) -> bool {
        self.agent_roster.install(ticket, agents)
    }

    pub fn install_selection(&mut self, ticket: ViewTicket, selection: AgentSelection) -> bool {
        self.agent_members.install(ticket, selection)
    }

    pub fn install_member(&mut self, ticket: ViewTicket, member: Member) -> bool {
        self.selected_member.install(ticket, member)
    }

    pub fn directory(&self) -> Option<&[Member]> {
        self.directory.value.as_deref()
    }

    pub fn report_queue(&self) -> Option<&[Member]> {
        self.report_queue.value.as_deref()
    }

    pub fn agent_roster(&self) -> Option<&[Agent]> {
        self.agent_roster.value.as_deref()
    }

    pub fn agent_selection(&self) -> Option<&AgentSelection> {
        self.agent_members.value.as_ref()
    }

    pub fn selected_member(&self) -> Option<&Member> {
        self.selected_member.value.as_ref()
    }

    /// Freshest cached copy of a member; the open detail view wins over list rows.
    pub fn find_member(&self, id: &MemberId) -> Option<&Member> {
        let matches = |member: &&Member| member.store_id() == Some(id);
        self.selected_member
            .value
            .iter()
            .find(matches)
            .or_else(|| self.member_lists().flatten().find(matches))
    }

    /// Replays a confirmed mutation onto every cached copy of the member and
    /// returns how many copies changed. Slots not holding the member are left
    /// alone, so a late confirmation cannot disturb a view opened since.
    pub fn apply(&mut self, patch: &MemberPatch) -> usize {
        let mut touched = 0;

        if let MemberPatch::ReportCleared(_) = patch {
            if let Some(queue) = self.report_queue.value.as_mut() {
                let before = queue.len();
                queue.retain(|member| !patch.targets(member));
                touched += before - queue.len();
            }
        }

        let lists = [
            self.directory.value.as_mut(),
            self.report_queue.value.as_mut(),
            self.agent_members
                .value
                .as_mut()
                .map(|selection| &mut selection.members),
        ];
        for members in lists.into_iter().flatten() {
            for member in members.iter_mut().filter(|member| patch.targets(member)) {
                patch.apply_to(member);
                touched += 1;
            }
        }

        if let Some(member) = self
            .selected_member
            .value
            .as_mut()
            .filter(|member| patch.targets(member))
        {
            patch.apply_to(member);
            touched += 1;
        }

        touched
    }

    pub fn record_warning(&mut self, warning: PartialCommit) {
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[PartialCommit] {
        &self.warnings
    }

    pub fn drain_warnings(&mut self) -> Vec<PartialCommit> {
        std::mem::take(&mut self.warnings)
    }

    fn member_lists(&self) -> impl Iterator<Item = std::slice::Iter<'_, Member>> {
        [
            self.directory.value.as_deref(),
            self.report_queue.value.as_deref(),
            self.agent_members
                .value
                .as_ref()
                .map(|selection| selection.members.as_slice()),
        ]
        .into_iter()
        .flatten()
        .map(|members| members.iter())
    }
}

/// Shared handle to the cache. The lock is only held for synchronous
/// bookkeeping, never across a store call.
#[derive(Debug, Clone, Default)]
pub struct SharedSnapshots {
    inner: Arc<Mutex<SnapshotCache>>,
}

impl SharedSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, apply: impl FnOnce(&mut SnapshotCache) -> R) -> R {
        let mut guard = self.inner.lock().expect("snapshot mutex poisoned");
        apply(&mut guard)
    }

    pub fn read<R>(&self, inspect: impl FnOnce(&SnapshotCache) -> R) -> R {
        let guard = self.inner.lock().expect("snapshot mutex poisoned");
        inspect(&guard)
    }
}
