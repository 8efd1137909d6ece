use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::directory::{console_router, FixedSessionProvider, StoreError};

fn signed_in_router(store: &Arc<ScriptedStore>) -> Router {
    console_router(
        Arc::new(console(store)),
        Arc::new(FixedSessionProvider::signed_in(session())),
    )
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn member_ids(payload: &Value) -> Vec<&str> {
    payload
        .as_array()
        .expect("member array")
        .iter()
        .map(|member| member["id"].as_str().unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn directory_route_lists_members_newest_first() {
    let store = seeded_store();

    let response = signed_in_router(&store)
        .oneshot(get("/api/v1/members"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(member_ids(&payload), vec!["u-3", "u-2", "u-1", "u-4"]);
}

#[tokio::test]
async fn report_queue_route_lists_reported_members() {
    let store = seeded_store();

    let response = signed_in_router(&store)
        .oneshot(get("/api/v1/members/reported"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(member_ids(&payload), vec!["u-1"]);
    assert_eq!(payload[0]["reportReason"], json!(["spam", "fake photo"]));
}

#[tokio::test]
async fn routes_require_an_operator_session() {
    let store = seeded_store();
    let router = console_router(
        Arc::new(console(&store)),
        Arc::new(FixedSessionProvider::signed_out()),
    );

    let response = router.oneshot(get("/api/v1/members")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "operator session required");
    assert_eq!(store.calls(Op::ListWhere), 0);
}

#[tokio::test]
async fn unknown_member_maps_to_not_found() {
    let store = seeded_store();

    let response = signed_in_router(&store)
        .oneshot(get("/api/v1/members/u-404"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn verify_route_reports_the_effect() {
    let store = seeded_store();
    let router = signed_in_router(&store);

    let first = router
        .clone()
        .oneshot(post("/api/v1/members/u-3/verify"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let payload = read_json_body(first).await;
    assert_eq!(payload["effect"], "applied");
    assert_eq!(payload["member"]["verifiedByAdmin"], true);

    let second = router
        .oneshot(post("/api/v1/members/u-3/verify"))
        .await
        .unwrap();
    let payload = read_json_body(second).await;
    assert_eq!(payload["effect"], "unchanged");
    assert_eq!(store.calls(Op::UpdateFields), 1);
}

#[tokio::test]
async fn clear_report_route_maps_outage_to_service_unavailable() {
    let store = seeded_store();
    store.fail_on(Op::UpdateFields, StoreError::Unavailable("offline".into()));

    let response = signed_in_router(&store)
        .oneshot(post("/api/v1/members/u-1/clear-report"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn photo_removal_route_surfaces_partial_commits() {
    let store = seeded_store();
    store.fail_on(Op::DeleteBlob, StoreError::Unavailable("bucket offline".into()));
    let router = signed_in_router(&store);

    let response = router
        .clone()
        .oneshot(
            Request::delete("/api/v1/members/u-1/photos")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "photo": "p/b" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["member"]["photos"], json!(["p/a"]));
    assert_eq!(payload["warning"]["photo"], "p/b");

    let warnings = router
        .oneshot(get("/api/v1/moderation/warnings"))
        .await
        .unwrap();
    let payload = read_json_body(warnings).await;
    assert_eq!(payload["warnings"][0]["member_id"], "u-1");
}

#[tokio::test]
async fn photo_removal_rejects_unattached_photos() {
    let store = seeded_store();

    let response = signed_in_router(&store)
        .oneshot(
            Request::delete("/api/v1/members/u-2/photos")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "photo": "p/a" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn agent_members_route_returns_the_agent_and_its_referrals() {
    let store = seeded_store();

    let response = signed_in_router(&store)
        .oneshot(get("/api/v1/agents/ag-1/members"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["agent"]["referenceCode"], "AG1");
    assert_eq!(member_ids(&payload["members"]), vec!["u-1", "u-3"]);
}

#[tokio::test]
async fn agents_route_lists_the_roster() {
    let store = seeded_store();

    let response = signed_in_router(&store)
        .oneshot(get("/api/v1/agents"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn overlapping_agent_reads_both_answer_with_their_own_members() {
    let store = seeded_store();
    let router = signed_in_router(&store);
    let release = store.hold_listing_for("AG1");

    let (ravi, meena, _) = tokio::join!(
        router.clone().oneshot(get("/api/v1/agents/ag-1/members")),
        router.clone().oneshot(get("/api/v1/agents/ag-2/members")),
        async {
            let _ = release.send(());
        }
    );

    let ravi = ravi.unwrap();
    let meena = meena.unwrap();
    assert_eq!(ravi.status(), StatusCode::OK);
    assert_eq!(meena.status(), StatusCode::OK);
    let payload = read_json_body(ravi).await;
    assert_eq!(payload["agent"]["referenceCode"], "AG1");
    assert_eq!(member_ids(&payload["members"]), vec!["u-1", "u-3"]);
    let payload = read_json_body(meena).await;
    assert_eq!(member_ids(&payload["members"]), vec!["u-2"]);
}

#[tokio::test]
async fn overlapping_directory_reads_never_conflict() {
    let store = seeded_store();
    let router = signed_in_router(&store);
    let release = store.hold_listing_for(true);

    let (first, second, _) = tokio::join!(
        router.clone().oneshot(get("/api/v1/members/reported")),
        router.clone().oneshot(get("/api/v1/members/reported")),
        async {
            let _ = release.send(());
        }
    );

    for response in [first.unwrap(), second.unwrap()] {
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(member_ids(&read_json_body(response).await), vec!["u-1"]);
    }
}
