//! Moderation transitions on member records.
//!
//! Verification (`Unverified -> Verified`, terminal) and report clearing
//! (`Reported -> Clear`) are independent sub-machines; photo removal is a
//! two-step remote operation. The snapshot cache is patched only after the
//! store confirms.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::cache::{MemberPatch, SharedSnapshots};
use super::domain::{Member, MemberId, PhotoRef, ReportState, VerificationState};
use super::error::ConsoleError;
use super::store::{Collection, FieldPatch, RecordStore};

const VERIFIED_FIELD: &str = "verifiedByAdmin";
const REPORTED_FIELD: &str = "reported";
const REPORT_REASON_FIELD: &str = "reportReason";
const PHOTOS_FIELD: &str = "photos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// The store was written and the cache patched.
    Applied,
    /// The member was already in the target state; nothing was sent.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub member: Member,
    pub effect: Effect,
}

/// The photo reference was dropped from the member but its blob could not be
/// deleted. The removal stands; the blob needs operational cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("photo {photo} removed from member {member_id} but its blob was left behind: {reason}")]
pub struct PartialCommit {
    pub member_id: MemberId,
    pub photo: PhotoRef,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoRemoval {
    pub member: Member,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<PartialCommit>,
}

/// Executes moderation transitions against the store.
pub struct Moderator<S> {
    store: Arc<S>,
    snapshots: SharedSnapshots,
}

impl<S> Moderator<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>, snapshots: SharedSnapshots) -> Self {
        Self { store, snapshots }
    }

    /// Marks the member verified. Already-verified members short-circuit
    /// without contacting the store.
    pub async fn verify(&self, member: &Member) -> Result<Transition, ConsoleError> {
        let id = require_id(member)?;

        if member.verification() == VerificationState::Verified {
            return Ok(Transition {
                member: member.clone(),
                effect: Effect::Unchanged,
            });
        }

        let patch = FieldPatch::new().set(VERIFIED_FIELD, true);
        self.store
            .update_fields(Collection::Users, id.as_str(), &patch)
            .await?;

        let change = MemberPatch::Verified(id.clone());
        let touched = self.snapshots.with(|cache| cache.apply(&change));
        info!(member_id = %id, touched, "member verified");

        let mut updated = member.clone();
        change.apply_to(&mut updated);
        Ok(Transition {
            member: updated,
            effect: Effect::Applied,
        })
    }

    /// Clears the report flag and reasons in one update so neither field is
    /// ever visible without the other.
    pub async fn clear_report(&self, member: &Member) -> Result<Transition, ConsoleError> {
        let id = require_id(member)?;

        if member.report_state() == ReportState::Clear {
            return Ok(Transition {
                member: member.clone(),
                effect: Effect::Unchanged,
            });
        }

        let patch = FieldPatch::new()
            .set(REPORTED_FIELD, false)
            .set(REPORT_REASON_FIELD, Value::Array(Vec::new()));
        self.store
            .update_fields(Collection::Users, id.as_str(), &patch)
            .await?;

        let change = MemberPatch::ReportCleared(id.clone());
        let touched = self.snapshots.with(|cache| cache.apply(&change));
        info!(
            member_id = %id,
            previous = member.report_state().label(),
            touched,
            "member report cleared"
        );

        let mut updated = member.clone();
        change.apply_to(&mut updated);
        Ok(Transition {
            member: updated,
            effect: Effect::Applied,
        })
    }

    /// Detaches `photo` from the member, then deletes its blob.
    ///
    /// A failed detach aborts with nothing changed. A failed blob delete after
    /// a successful detach still counts as a removal: the cache is patched and
    /// the orphaned blob is reported as a [`PartialCommit`] warning.
    pub async fn remove_photo(
        &self,
        member: &Member,
        photo: &PhotoRef,
    ) -> Result<PhotoRemoval, ConsoleError> {
        let id = require_id(member)?;

        if !member.has_photo(photo) {
            return Err(ConsoleError::InvalidArgument(format!(
                "photo {photo} is not attached to member {id}"
            )));
        }

        self.store
            .remove_from_array_field(
                Collection::Users,
                id.as_str(),
                PHOTOS_FIELD,
                &Value::String(photo.as_str().to_string()),
            )
            .await?;

        let warning = match self.store.delete_blob(photo.as_str()).await {
            Ok(()) => None,
            Err(err) => Some(PartialCommit {
                member_id: id.clone(),
                photo: photo.clone(),
                reason: err.to_string(),
            }),
        };

        let change = MemberPatch::PhotoRemoved(id.clone(), photo.clone());
        let touched = self.snapshots.with(|cache| {
            let touched = cache.apply(&change);
            if let Some(warning) = &warning {
                cache.record_warning(warning.clone());
            }
            touched
        });

        match &warning {
            Some(partial) => warn!(
                member_id = %id,
                photo = %photo,
                reason = %partial.reason,
                "photo detached but blob deletion failed"
            ),
            None => info!(member_id = %id, photo = %photo, touched, "photo removed"),
        }

        let mut updated = member.clone();
        change.apply_to(&mut updated);
        Ok(PhotoRemoval {
            member: updated,
            warning,
        })
    }
}

fn require_id(member: &Member) -> Result<&MemberId, ConsoleError> {
    member.store_id().ok_or_else(|| {
        ConsoleError::InvalidArgument(format!(
            "member '{}' has no store identifier",
            member.name
        ))
    })
}
