use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Map, Value};
use tokio::sync::oneshot;

use crate::directory::{
    AdminConsole, Agent, AgentId, Collection, FieldPatch, Filter, InMemoryRecordStore, Member,
    MemberId, OperatorSession, OrderBy, Record, RecordStore, ReferenceCode, StoreError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum Op {
    GetById,
    ListWhere,
    UpdateFields,
    RemoveFromArray,
    DeleteBlob,
}

/// In-memory store with per-operation fault injection, call counting, and an
/// optional gate that holds one listing until released.
#[derive(Default)]
pub(super) struct ScriptedStore {
    pub(super) inner: InMemoryRecordStore,
    failures: Mutex<HashMap<Op, StoreError>>,
    calls: Mutex<HashMap<Op, usize>>,
    updates: Mutex<Vec<(String, FieldPatch)>>,
    held: Mutex<Option<(Value, oneshot::Receiver<()>)>>,
}

impl ScriptedStore {
    pub(super) fn fail_on(&self, op: Op, error: StoreError) {
        self.failures
            .lock()
            .expect("failure mutex poisoned")
            .insert(op, error);
    }

    pub(super) fn calls(&self, op: Op) -> usize {
        self.calls
            .lock()
            .expect("call mutex poisoned")
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    pub(super) fn writes(&self) -> usize {
        self.calls(Op::UpdateFields) + self.calls(Op::RemoveFromArray) + self.calls(Op::DeleteBlob)
    }

    pub(super) fn updates(&self) -> Vec<(String, FieldPatch)> {
        self.updates.lock().expect("update mutex poisoned").clone()
    }

    /// Holds the next listing whose filter mentions `value` until the returned sender fires.
    pub(super) fn hold_listing_for(&self, value: impl Into<Value>) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        *self.held.lock().expect("gate mutex poisoned") = Some((value.into(), gate));
        release
    }

    fn enter(&self, op: Op) -> Result<(), StoreError> {
        *self
            .calls
            .lock()
            .expect("call mutex poisoned")
            .entry(op)
            .or_default() += 1;
        match self.failures.lock().expect("failure mutex poisoned").get(&op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn take_gate(&self, filter: &Filter) -> Option<oneshot::Receiver<()>> {
        let mut held = self.held.lock().expect("gate mutex poisoned");
        let mentioned = held.as_ref().map_or(false, |(value, _)| {
            filter.clauses().iter().any(|clause| &clause.value == value)
        });
        if mentioned {
            held.take().map(|(_, gate)| gate)
        } else {
            None
        }
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Record, StoreError> {
        self.enter(Op::GetById)?;
        self.inner.get_by_id(collection, id).await
    }

    async fn list_where(
        &self,
        collection: Collection,
        filter: &Filter,
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Record>, StoreError> {
        self.enter(Op::ListWhere)?;
        if let Some(gate) = self.take_gate(filter) {
            let _ = gate.await;
        }
        self.inner.list_where(collection, filter, order_by).await
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        patch: &FieldPatch,
    ) -> Result<(), StoreError> {
        self.enter(Op::UpdateFields)?;
        self.updates
            .lock()
            .expect("update mutex poisoned")
            .push((id.to_string(), patch.clone()));
        self.inner.update_fields(collection, id, patch).await
    }

    async fn remove_from_array_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: &Value,
    ) -> Result<(), StoreError> {
        self.enter(Op::RemoveFromArray)?;
        self.inner
            .remove_from_array_field(collection, id, field, value)
            .await
    }

    async fn delete_blob(&self, path: &str) -> Result<(), StoreError> {
        self.enter(Op::DeleteBlob)?;
        self.inner.delete_blob(path).await
    }
}

pub(super) fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Two agents and four members:
/// - `u-1` AG1, reported with two reasons, photos `p/a` and `p/b`, created at 1
/// - `u-2` AG2, created at 2
/// - `u-3` AG1, created at 3
/// - `u-4` no agent, no timestamp, `reported == false` with a stale reason
pub(super) fn seeded_store() -> Arc<ScriptedStore> {
    let store = ScriptedStore::default();
    let inner = &store.inner;

    inner.put(
        Collection::Agents,
        Record::new(
            "ag-1",
            fields(json!({ "name": "Ravi", "email": "ravi@agents.test", "referenceCode": "AG1" })),
        ),
    );
    inner.put(
        Collection::Agents,
        Record::new(
            "ag-2",
            fields(json!({ "name": "Meena", "email": "meena@agents.test", "referenceCode": "AG2" })),
        ),
    );

    inner.put(
        Collection::Users,
        Record::new(
            "u-1",
            fields(json!({
                "name": "Asha",
                "email": "asha@example.test",
                "number": "9000000001",
                "photos": ["p/a", "p/b"],
                "agentRefCode": "AG1",
                "verifiedByAdmin": false,
                "reported": true,
                "reportReason": ["spam", "fake photo"],
                "createdAt": 1
            })),
        ),
    );
    inner.put(
        Collection::Users,
        Record::new(
            "u-2",
            fields(json!({
                "name": "Bala",
                "agentRefCode": "AG2",
                "reported": false,
                "reportReason": [],
                "createdAt": 2
            })),
        ),
    );
    inner.put(
        Collection::Users,
        Record::new(
            "u-3",
            fields(json!({
                "name": "Chitra",
                "agentRefCode": "AG1",
                "verifiedByAdmin": false,
                "createdAt": 3
            })),
        ),
    );
    inner.put(
        Collection::Users,
        Record::new(
            "u-4",
            fields(json!({
                "name": "Devi",
                "reported": false,
                "reportReason": ["stale complaint"]
            })),
        ),
    );

    for blob in ["p/a", "p/b"] {
        inner.put_blob(blob);
    }

    Arc::new(store)
}

pub(super) fn session() -> OperatorSession {
    OperatorSession::new("op-test")
}

pub(super) fn console(store: &Arc<ScriptedStore>) -> AdminConsole<ScriptedStore> {
    AdminConsole::new(Arc::clone(store))
}

pub(super) fn agent(id: &str, code: &str) -> Agent {
    Agent {
        id: Some(AgentId::new(id)),
        name: format!("Agent {id}"),
        email: format!("{id}@agents.test"),
        reference_code: ReferenceCode::new(code),
    }
}

pub(super) async fn stored_member(store: &ScriptedStore, id: &str) -> Member {
    let record = store
        .inner
        .get_by_id(Collection::Users, id)
        .await
        .expect("member stored");
    crate::directory::member_from_record(record).expect("member decodes")
}

pub(super) fn ids(members: &[Member]) -> Vec<&str> {
    members
        .iter()
        .map(|member| member.id.as_ref().map_or("", MemberId::as_str))
        .collect()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
