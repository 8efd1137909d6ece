//! Directory & moderation engine: member/agent reads, the agent referral
//! join, moderation transitions, and the operator's snapshot cache.

pub mod cache;
pub mod console;
pub mod domain;
pub mod error;
pub mod index;
pub mod memory;
pub mod moderation;
pub mod query;
pub mod router;
pub mod session;
pub mod store;

#[cfg(test)]
mod tests;

pub use cache::{
    AgentSelection, MemberPatch, Refresh, SharedSnapshots, SnapshotCache, ViewSlot, ViewTicket,
};
pub use console::AdminConsole;
pub use domain::{
    Agent, AgentId, Member, MemberId, MemberProfile, PhotoRef, ReferenceCode, ReportState,
    VerificationState,
};
pub use error::ConsoleError;
pub use index::{duplicate_reference_codes, DirectoryIndex, DuplicateCode};
pub use memory::{InMemoryRecordStore, SeedError};
pub use moderation::{Effect, Moderator, PartialCommit, PhotoRemoval, Transition};
pub use query::{agent_from_record, member_from_record, QueryEngine};
pub use router::{console_router, ConsoleState};
pub use session::{FixedSessionProvider, OperatorId, OperatorSession, SessionProvider};
pub use store::{
    Collection, Direction, FieldEquals, FieldPatch, Filter, OrderBy, Record, RecordStore,
    StoreError,
};
