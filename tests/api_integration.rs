//! HTTP-level tests driving the full router over the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use content_battle_back::{
    config::AppConfig,
    dao::{
        battle_store::{BattleMutation, BattleStore, MemoryBattleStore},
        models::{BattleEntity, BattleStatus},
    },
    routes,
    state::AppState,
};
use futures::future::join_all;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

const ADMIN_TOKEN: &str = "s3cret";

async fn test_app() -> (Router, MemoryBattleStore) {
    let mut config = AppConfig::default();
    config.matching.upload_delay = Duration::from_secs(3600);
    config.admin_token = Some(ADMIN_TOKEN.into());
    let state = AppState::new(config);
    let store = MemoryBattleStore::new();
    state.install_battle_store(Arc::new(store.clone())).await;
    (routes::router(state), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).method("GET");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn upload(app: &Router, user: &str, category: &str) -> Uuid {
    let (status, body) = send(
        app,
        post_json(
            "/contents",
            Some(user),
            json!({
                "title": format!("{user} in {category}"),
                "category": category,
                "imageUrl": "https://cdn.example.com/pic.png",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["contentId"].as_str().unwrap().parse().unwrap()
}

async fn create_battle(app: &Router) -> Uuid {
    let a = upload(app, "alice", "music").await;
    let b = upload(app, "bob", "music").await;
    let (status, body) = send(
        app,
        post_json(
            "/battles",
            Some("carol"),
            json!({ "contentAId": a, "contentBId": b }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["battleId"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn healthcheck_reports_ok_with_storage() {
    let (app, _store) = test_app().await;
    let (status, body) = send(&app, get("/healthcheck", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn matching_pairs_each_category_once() {
    let (app, _store) = test_app().await;
    upload(&app, "alice", "music").await;
    upload(&app, "bob", "music").await;
    upload(&app, "carol", "food").await;
    upload(&app, "dave", "food").await;

    let (status, body) = send(&app, post_json("/matching/run", Some("runner"), json!({ "quota": 2 }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["matchesCreated"], 2);
    assert_eq!(body["usedFallback"], false);
    for battle in body["battles"].as_array().unwrap() {
        assert_eq!(battle["isSameCreator"], false);
        assert_eq!(battle["isCrossCategory"], false);
        assert_eq!(battle["matchingMethod"], "flexible_algorithm");
    }

    let (_, available) = send(&app, get("/contents/available", None)).await;
    assert_eq!(available["contents"].as_array().unwrap().len(), 0);

    let (_, stats) = send(&app, get("/matching/stats", None)).await;
    assert_eq!(stats["availableContents"], 0);
    assert_eq!(stats["ongoingBattles"], 2);
}

#[tokio::test]
async fn same_creator_pool_falls_back_to_permissive_run() {
    let (app, _store) = test_app().await;
    upload(&app, "alice", "music").await;
    upload(&app, "alice", "music").await;

    let (status, body) = send(
        &app,
        post_json("/matching/run", Some("runner"), json!({ "allowSameCreator": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["matchesCreated"], 1);
    assert_eq!(body["usedFallback"], true);
    assert_eq!(body["battles"][0]["isSameCreator"], true);
}

#[tokio::test]
async fn matching_with_one_content_reports_insufficient_contenders() {
    let (app, _store) = test_app().await;
    upload(&app, "alice", "music").await;

    let (status, body) = send(&app, post_json("/matching/run", Some("runner"), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "insufficient_contenders");
    assert!(!body["details"]["suggestions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn vote_then_repeat_vote_conflicts() {
    let (app, _store) = test_app().await;
    let battle_id = create_battle(&app).await;
    let uri = format!("/battles/{battle_id}/vote");

    let (status, body) = send(&app, post_json(&uri, Some("voter"), json!({ "choice": "itemA" }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["newVoteCount"], 1);
    assert_eq!(body["newTotalVotes"], 1);
    assert_eq!(body["currentLeader"]["winner"], "itemA");

    let (status, body) = send(&app, post_json(&uri, Some("voter"), json!({ "choice": "itemB" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "conflict");

    let (_, voted) = send(&app, get(&uri, Some("voter"))).await;
    assert_eq!(voted["hasVoted"], true);
    let (_, voted) = send(&app, get(&uri, Some("someone-else"))).await;
    assert_eq!(voted["hasVoted"], false);

    let (status, live) = send(&app, get(&format!("/battles/{battle_id}/live"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(live["confirmed"]["itemA"], 1);
    assert_eq!(live["confirmed"]["itemB"], 0);
    assert_eq!(live["pendingVotes"], 0);
}

#[tokio::test]
async fn concurrent_votes_by_one_user_count_once() {
    let (app, store) = test_app().await;
    let battle_id = create_battle(&app).await;
    let uri = format!("/battles/{battle_id}/vote");

    let requests = (0..8).map(|i| {
        let side = if i % 2 == 0 { "itemA" } else { "itemB" };
        send(&app, post_json(&uri, Some("eager"), json!({ "choice": side })))
    });
    let statuses: Vec<StatusCode> = join_all(requests)
        .await
        .into_iter()
        .map(|(status, _)| status)
        .collect();

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(),
        7
    );

    let battle = store.find_battle(battle_id).await.unwrap().unwrap();
    assert_eq!(battle.total_votes, 1);
    assert_eq!(battle.item_a.votes + battle.item_b.votes, battle.total_votes);
    assert_eq!(battle.participants.len() as u64, battle.total_votes);
}

#[tokio::test]
async fn ended_battle_rejects_votes() {
    let (app, store) = test_app().await;
    let battle_id = create_battle(&app).await;
    let end: BattleMutation = Arc::new(|battle: &mut BattleEntity| {
        battle.status = BattleStatus::Ended;
        Ok(())
    });
    store.modify_battle(battle_id, end).await.unwrap();

    let (status, body) = send(
        &app,
        post_json(&format!("/battles/{battle_id}/vote"), Some("late"), json!({ "choice": "itemB" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let battle = store.find_battle(battle_id).await.unwrap().unwrap();
    assert_eq!(battle.total_votes, 0);
    assert!(battle.participants.is_empty());
}

#[tokio::test]
async fn mutations_require_identity() {
    let (app, _store) = test_app().await;

    let (status, body) = send(
        &app,
        post_json(
            "/contents",
            None,
            json!({ "title": "Cat", "category": "pets", "imageUrl": "https://x.io/cat.png" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "unauthorized");

    let (status, _) = send(
        &app,
        post_json(
            &format!("/battles/{}/vote", Uuid::new_v4()),
            None,
            json!({ "choice": "itemA" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, post_json("/matching/run", None, json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "unauthorized");
}

#[tokio::test]
async fn unknown_battle_is_not_found() {
    let (app, _store) = test_app().await;
    let (status, body) = send(&app, get(&format!("/battles/{}", Uuid::new_v4()), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "not_found");
}

#[tokio::test]
async fn listing_limit_out_of_range_is_rejected() {
    let (app, _store) = test_app().await;
    let (status, _) = send(&app, get("/battles/trending?limit=500", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_routes_check_the_token() {
    let (app, _store) = test_app().await;
    upload(&app, "alice", "music").await;
    upload(&app, "bob", "food").await;

    let (status, _) = send(&app, get("/admin/contents/status", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/admin/contents/status")
        .header("x-admin-token", "nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let force = Request::builder()
        .uri("/admin/matching/force")
        .method("POST")
        .header("x-admin-token", ADMIN_TOKEN)
        .header("Content-Type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(&app, force).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["matchesCreated"], 1);
    assert_eq!(body["battles"][0]["matchingMethod"], "force_matching");
    assert_eq!(body["battles"][0]["isCrossCategory"], true);

    let status_request = Request::builder()
        .uri("/admin/contents/status")
        .header("x-admin-token", ADMIN_TOKEN)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, status_request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inBattle"], 2);
    assert_eq!(body["available"], 0);
}

#[tokio::test]
async fn openapi_document_lists_the_vote_route() {
    let (app, _store) = test_app().await;
    let (status, body) = send(&app, get(routes::docs::OPENAPI_PATH, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/battles/{id}/vote"]["post"].is_object());
    assert!(body["paths"]["/matching/run"].is_object());
}
