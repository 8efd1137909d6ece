use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::domain::{Agent, AgentId, Member, MemberId, ReferenceCode};
use super::error::ConsoleError;
use super::store::{Collection, Filter, OrderBy, Record, RecordStore};

const CREATED_AT_FIELD: &str = "createdAt";
const REPORTED_FIELD: &str = "reported";
const AGENT_REF_CODE_FIELD: &str = "agentRefCode";
const REFERENCE_CODE_FIELD: &str = "referenceCode";

/// Read side of the console: composes predicates for each operator workflow
/// and maps raw records into typed views. Every call produces a fresh view.
pub struct QueryEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for QueryEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> QueryEngine<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Whole directory, newest first. Members without `createdAt` come last;
    /// their relative order is whatever the store returned.
    pub async fn list_all_members_by_recency(&self) -> Result<Vec<Member>, ConsoleError> {
        let records = self
            .store
            .list_where(
                Collection::Users,
                &Filter::all(),
                Some(&OrderBy::descending(CREATED_AT_FIELD)),
            )
            .await?;
        let mut members = decode_all::<Member>(Collection::Users, records)?;
        members.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(members)
    }

    /// Moderation queue: members flagged `reported == true`, in store order.
    pub async fn list_reported_members(&self) -> Result<Vec<Member>, ConsoleError> {
        let records = self
            .store
            .list_where(
                Collection::Users,
                &Filter::field_eq(REPORTED_FIELD, true),
                None,
            )
            .await?;
        let members = decode_all::<Member>(Collection::Users, records)?;
        Ok(members.into_iter().filter(|member| member.reported).collect())
    }

    /// Members whose `agentRefCode` equals `code`, in store order.
    pub async fn list_members_for_agent(
        &self,
        code: &ReferenceCode,
    ) -> Result<Vec<Member>, ConsoleError> {
        let records = self
            .store
            .list_where(
                Collection::Users,
                &Filter::field_eq(AGENT_REF_CODE_FIELD, code.as_str()),
                None,
            )
            .await?;
        let members = decode_all::<Member>(Collection::Users, records)?;
        Ok(members
            .into_iter()
            .filter(|member| member.referred_by(code))
            .collect())
    }

    /// The full agent roster in store order.
    pub async fn list_agents(&self) -> Result<Vec<Agent>, ConsoleError> {
        let records = self
            .store
            .list_where(Collection::Agents, &Filter::all(), None)
            .await?;
        decode_all::<Agent>(Collection::Agents, records)
    }

    /// Agents handing out `code`. More than one result means the code is not unique.
    pub async fn list_agents_with_code(
        &self,
        code: &ReferenceCode,
    ) -> Result<Vec<Agent>, ConsoleError> {
        let records = self
            .store
            .list_where(
                Collection::Agents,
                &Filter::field_eq(REFERENCE_CODE_FIELD, code.as_str()),
                None,
            )
            .await?;
        let agents = decode_all::<Agent>(Collection::Agents, records)?;
        Ok(agents
            .into_iter()
            .filter(|agent| &agent.reference_code == code)
            .collect())
    }

    pub async fn get_member(&self, id: &MemberId) -> Result<Member, ConsoleError> {
        let record = self
            .store
            .get_by_id(Collection::Users, id.as_str())
            .await?;
        member_from_record(record)
    }

    pub async fn get_agent(&self, id: &AgentId) -> Result<Agent, ConsoleError> {
        let record = self
            .store
            .get_by_id(Collection::Agents, id.as_str())
            .await?;
        agent_from_record(record)
    }
}

/// Maps a `users` document into a [`Member`]; the document id always wins
/// over any `id` field stored in the body.
pub fn member_from_record(record: Record) -> Result<Member, ConsoleError> {
    decode(Collection::Users, record)
}

pub fn agent_from_record(record: Record) -> Result<Agent, ConsoleError> {
    decode(Collection::Agents, record)
}

fn decode<T>(collection: Collection, record: Record) -> Result<T, ConsoleError>
where
    T: DeserializeOwned,
{
    let Record { id, mut fields } = record;
    fields.insert("id".to_string(), Value::String(id.clone()));
    serde_json::from_value(Value::Object(fields)).map_err(|source| ConsoleError::Malformed {
        collection: collection.name(),
        id,
        source,
    })
}

fn decode_all<T>(collection: Collection, records: Vec<Record>) -> Result<Vec<T>, ConsoleError>
where
    T: DeserializeOwned,
{
    records
        .into_iter()
        .map(|record| decode(collection, record))
        .collect()
}
