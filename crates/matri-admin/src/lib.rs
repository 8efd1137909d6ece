//! Directory and moderation engine behind the matchmaking administration console.
//!
//! Operators browse member records, resolve which referral agent introduced a
//! member, clear abuse reports, verify profiles, and curate uploaded photos.
//! The remote document/blob store is reached only through
//! [`directory::RecordStore`]; everything the operator sees is served from a
//! [`directory::SnapshotCache`] that is patched after confirmed writes.

pub mod config;
pub mod directory;
pub mod error;
pub mod telemetry;
