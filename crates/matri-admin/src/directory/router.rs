use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::cache::Refresh;
use super::console::AdminConsole;
use super::domain::{AgentId, MemberId, PhotoRef};
use super::error::ConsoleError;
use super::session::{OperatorSession, SessionProvider};
use super::store::RecordStore;

/// Shared state for the console routes.
pub struct ConsoleState<S, P> {
    pub console: Arc<AdminConsole<S>>,
    pub sessions: Arc<P>,
}

impl<S, P> Clone for ConsoleState<S, P> {
    fn clone(&self) -> Self {
        Self {
            console: Arc::clone(&self.console),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PhotoRemovalRequest {
    pub(crate) photo: PhotoRef,
}

#[derive(Debug, Serialize)]
struct WarningView {
    member_id: MemberId,
    photo: PhotoRef,
    reason: String,
}

/// Router builder exposing directory reads and moderation actions.
pub fn console_router<S, P>(console: Arc<AdminConsole<S>>, sessions: Arc<P>) -> Router
where
    S: RecordStore + 'static,
    P: SessionProvider + 'static,
{
    Router::new()
        .route("/api/v1/members", get(directory_handler::<S, P>))
        .route("/api/v1/members/reported", get(report_queue_handler::<S, P>))
        .route("/api/v1/members/:member_id", get(member_handler::<S, P>))
        .route(
            "/api/v1/members/:member_id/verify",
            post(verify_handler::<S, P>),
        )
        .route(
            "/api/v1/members/:member_id/clear-report",
            post(clear_report_handler::<S, P>),
        )
        .route(
            "/api/v1/members/:member_id/photos",
            delete(remove_photo_handler::<S, P>),
        )
        .route("/api/v1/agents", get(agents_handler::<S, P>))
        .route(
            "/api/v1/agents/:agent_id/members",
            get(agent_members_handler::<S, P>),
        )
        .route(
            "/api/v1/moderation/warnings",
            get(warnings_handler::<S, P>),
        )
        .with_state(ConsoleState { console, sessions })
}

pub(crate) async fn directory_handler<S, P>(State(state): State<ConsoleState<S, P>>) -> Response
where
    S: RecordStore + 'static,
    P: SessionProvider + 'static,
{
    let session = match signed_in(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match state.console.refresh_directory(&session).await {
        Ok(refresh) => refresh_response(refresh),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn report_queue_handler<S, P>(
    State(state): State<ConsoleState<S, P>>,
) -> Response
where
    S: RecordStore + 'static,
    P: SessionProvider + 'static,
{
    let session = match signed_in(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match state.console.refresh_report_queue(&session).await {
        Ok(refresh) => refresh_response(refresh),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn member_handler<S, P>(
    State(state): State<ConsoleState<S, P>>,
    Path(member_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    P: SessionProvider + 'static,
{
    let session = match signed_in(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match state
        .console
        .open_member(&session, &MemberId(member_id))
        .await
    {
        Ok(refresh) => refresh_response(refresh),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn verify_handler<S, P>(
    State(state): State<ConsoleState<S, P>>,
    Path(member_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    P: SessionProvider + 'static,
{
    let session = match signed_in(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let result = async {
        let member = state
            .console
            .member(&session, &MemberId(member_id))
            .await?;
        state.console.verify(&session, &member).await
    }
    .await;
    match result {
        Ok(transition) => (StatusCode::OK, Json(transition)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn clear_report_handler<S, P>(
    State(state): State<ConsoleState<S, P>>,
    Path(member_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    P: SessionProvider + 'static,
{
    let session = match signed_in(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let result = async {
        let member = state
            .console
            .member(&session, &MemberId(member_id))
            .await?;
        state.console.clear_report(&session, &member).await
    }
    .await;
    match result {
        Ok(transition) => (StatusCode::OK, Json(transition)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_photo_handler<S, P>(
    State(state): State<ConsoleState<S, P>>,
    Path(member_id): Path<String>,
    Json(request): Json<PhotoRemovalRequest>,
) -> Response
where
    S: RecordStore + 'static,
    P: SessionProvider + 'static,
{
    let session = match signed_in(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let result = async {
        let member = state
            .console
            .member(&session, &MemberId(member_id))
            .await?;
        state
            .console
            .remove_photo(&session, &member, &request.photo)
            .await
    }
    .await;
    match result {
        Ok(removal) => (StatusCode::OK, Json(removal)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn agents_handler<S, P>(State(state): State<ConsoleState<S, P>>) -> Response
where
    S: RecordStore + 'static,
    P: SessionProvider + 'static,
{
    let session = match signed_in(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match state.console.refresh_agents(&session).await {
        Ok(refresh) => refresh_response(refresh),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn agent_members_handler<S, P>(
    State(state): State<ConsoleState<S, P>>,
    Path(agent_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    P: SessionProvider + 'static,
{
    let session = match signed_in(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let result = async {
        let agent = state.console.agent(&session, &AgentId(agent_id)).await?;
        let members = state.console.select_agent(&session, &agent).await?;
        Ok::<_, ConsoleError>((agent, members))
    }
    .await;
    match result {
        Ok((agent, members)) => (
            StatusCode::OK,
            Json(json!({ "agent": agent, "members": members.into_inner() })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn warnings_handler<S, P>(State(state): State<ConsoleState<S, P>>) -> Response
where
    S: RecordStore + 'static,
    P: SessionProvider + 'static,
{
    if let Err(response) = signed_in(&state) {
        return response;
    }
    let warnings: Vec<WarningView> = state
        .console
        .drain_warnings()
        .into_iter()
        .map(|warning| WarningView {
            member_id: warning.member_id,
            photo: warning.photo,
            reason: warning.reason,
        })
        .collect();
    (StatusCode::OK, Json(json!({ "warnings": warnings }))).into_response()
}

fn signed_in<S, P>(state: &ConsoleState<S, P>) -> Result<OperatorSession, Response>
where
    P: SessionProvider,
{
    state.sessions.current_operator().ok_or_else(|| {
        let payload = json!({ "error": "operator session required" });
        (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
    })
}

/// HTTP callers share one cache, so a read overtaken by another client's
/// request still answers with what it fetched.
fn refresh_response<T: Serialize>(refresh: Refresh<T>) -> Response {
    (StatusCode::OK, Json(refresh.into_inner())).into_response()
}

fn error_response(error: ConsoleError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (error.status_code(), Json(payload)).into_response()
}
