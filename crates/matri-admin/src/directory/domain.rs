use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Store-assigned identifier of a member document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

/// Store-assigned identifier of an agent document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

/// Referral code an agent hands out; members carry it as a soft foreign key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceCode(pub String);

/// Opaque blob URI stored verbatim in a member's photo list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoRef(pub String);

macro_rules! string_newtype {
    ($($name:ident),+) => {
        $(
            impl $name {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }
        )+
    };
}

string_newtype!(MemberId, AgentId, ReferenceCode, PhotoRef);

impl ReferenceCode {
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Display-only profile attributes. Stored documents are loosely typed, so
/// every attribute is kept as text: numbers, booleans and nested values are
/// rendered as JSON and null reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub age: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub sex: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_of_birth: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub mother_tongue: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub religion: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub profession: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub employment_status: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub salary: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

/// A platform registrant subject to moderation.
///
/// Only the fields moderation and ordering act on are decoded strictly; a
/// wrongly typed display field never makes the document unreadable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MemberId>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, rename = "number", deserialize_with = "lenient_string")]
    pub phone_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(flatten)]
    pub profile: MemberProfile,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
    #[serde(
        default,
        deserialize_with = "lenient_code",
        skip_serializing_if = "Option::is_none"
    )]
    pub agent_ref_code: Option<ReferenceCode>,
    #[serde(default)]
    pub verified_by_admin: bool,
    #[serde(default)]
    pub reported: bool,
    #[serde(default)]
    pub report_reason: Vec<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Member {
    /// The identifier moderation writes are addressed to; blank ids count as missing.
    pub fn store_id(&self) -> Option<&MemberId> {
        self.id.as_ref().filter(|id| !id.0.trim().is_empty())
    }

    pub fn verification(&self) -> VerificationState {
        if self.verified_by_admin {
            VerificationState::Verified
        } else {
            VerificationState::Unverified
        }
    }

    pub fn report_state(&self) -> ReportState {
        match (self.reported, self.report_reason.is_empty()) {
            (true, _) => ReportState::Reported,
            (false, true) => ReportState::Clear,
            (false, false) => ReportState::StaleReasons,
        }
    }

    pub fn has_photo(&self, photo: &PhotoRef) -> bool {
        self.photos.iter().any(|candidate| candidate == photo)
    }

    pub fn referred_by(&self, code: &ReferenceCode) -> bool {
        self.agent_ref_code.as_ref() == Some(code)
    }
}

/// A referral partner whose reference code attributes members to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AgentId>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reference_code: ReferenceCode,
}

/// Verification sub-state; `Verified` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    Unverified,
    Verified,
}

impl VerificationState {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationState::Unverified => "unverified",
            VerificationState::Verified => "verified",
        }
    }
}

/// Report sub-state. `StaleReasons` is the invalid combination of a cleared
/// flag with leftover reasons; clearing repairs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Reported,
    Clear,
    StaleReasons,
}

impl ReportState {
    pub const fn label(self) -> &'static str {
        match self {
            ReportState::Reported => "reported",
            ReportState::Clear => "clear",
            ReportState::StaleReasons => "stale_reasons",
        }
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    lenient_text(deserializer).map(|text| T::from(text.unwrap_or_default()))
}

fn lenient_code<'de, D>(deserializer: D) -> Result<Option<ReferenceCode>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_text(deserializer).map(|text| text.map(ReferenceCode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_loosely_typed_member_document() {
        let member: Member = serde_json::from_value(json!({
            "name": "Asha",
            "number": 9876543210u64,
            "age": "29",
            "salary": 54000,
            "religion": "Hindu",
            "photos": ["gs://photos/a.jpg"],
            "agentRefCode": "AG1",
            "reported": true,
            "reportReason": ["spam"],
            "createdAt": 1_700_000_000_000i64
        }))
        .expect("member decodes");

        assert_eq!(member.phone_number, "9876543210");
        assert_eq!(member.profile.age.as_deref(), Some("29"));
        assert_eq!(member.profile.salary.as_deref(), Some("54000"));
        assert_eq!(member.profile.religion.as_deref(), Some("Hindu"));
        assert_eq!(member.agent_ref_code, Some(ReferenceCode::new("AG1")));
        assert_eq!(member.report_state(), ReportState::Reported);
        assert_eq!(
            member.created_at.map(|at| at.timestamp_millis()),
            Some(1_700_000_000_000)
        );
        assert!(!member.verified_by_admin);
    }

    #[test]
    fn wrongly_typed_display_fields_do_not_reject_the_document() {
        let member: Member = serde_json::from_value(json!({
            "name": null,
            "email": false,
            "age": "twenty-nine",
            "dateOfBirth": 19970314,
            "motherTongue": ["Tamil", "English"],
            "agentRefCode": 42,
            "reported": false
        }))
        .expect("member decodes");

        assert_eq!(member.name, "");
        assert_eq!(member.email, "false");
        assert_eq!(member.profile.age.as_deref(), Some("twenty-nine"));
        assert_eq!(member.profile.date_of_birth.as_deref(), Some("19970314"));
        assert_eq!(
            member.profile.mother_tongue.as_deref(),
            Some(r#"["Tamil","English"]"#)
        );
        assert_eq!(member.agent_ref_code, Some(ReferenceCode::new("42")));
    }

    #[test]
    fn moderation_fields_stay_strict() {
        for document in [
            json!({ "reported": "yes" }),
            json!({ "photos": "gs://photos/a.jpg" }),
            json!({ "reportReason": "spam" }),
            json!({ "verifiedByAdmin": 1 }),
            json!({ "createdAt": "yesterday" }),
        ] {
            let decoded = serde_json::from_value::<Member>(document.clone());
            assert!(decoded.is_err(), "{document} should be rejected");
        }
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let member: Member = serde_json::from_value(json!({})).expect("empty document decodes");
        assert!(member.photos.is_empty());
        assert!(member.created_at.is_none());
        assert_eq!(member.verification(), VerificationState::Unverified);
        assert_eq!(member.report_state(), ReportState::Clear);
        assert!(member.store_id().is_none());
    }

    #[test]
    fn stale_reasons_are_distinguished_from_clear() {
        let member = Member {
            reported: false,
            report_reason: vec!["old complaint".to_string()],
            ..Member::default()
        };
        assert_eq!(member.report_state(), ReportState::StaleReasons);
    }

    #[test]
    fn blank_ids_are_not_store_ids() {
        let member = Member {
            id: Some(MemberId::new("  ")),
            ..Member::default()
        };
        assert!(member.store_id().is_none());
    }
}
