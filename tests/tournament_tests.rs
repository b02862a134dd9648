//! Integration tests for the tournament HTTP API
//!
//! These tests verify the complete tournament lifecycle over HTTP including:
//! - Creation, editing and creator-only administration
//! - Registration
//! - Solve submission and puzzle selection
//! - Leaderboard, dashboard and final results
//! - Error status mapping

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tournament_server::create_test_app;

const USER_ID: HeaderName = HeaderName::from_static("x-user-id");

/// Helper to create a test server instance
async fn setup() -> TestServer {
    let (app, _manager) = create_test_app().await;
    TestServer::new(app).unwrap()
}

fn as_user(user_id: &str) -> HeaderValue {
    HeaderValue::from_str(user_id).unwrap()
}

/// Helper to create a tournament starting in an hour and return its id
async fn create_tournament(server: &TestServer, creator: &str, name: &str) -> String {
    let start = Utc::now() + Duration::hours(1);
    let response = server
        .post("/api/tournaments")
        .add_header(USER_ID, as_user(creator))
        .json(&json!({
            "name": name,
            "description": "Solve as many puzzles as you can",
            "start_time": start.to_rfc3339(),
            "end_time": (start + Duration::hours(2)).to_rfc3339(),
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["id"].as_str().unwrap().to_string()
}

async fn register(server: &TestServer, tournament_id: &str, user_id: &str) {
    server
        .post(&format!("/api/tournaments/{}/register", tournament_id))
        .add_header(USER_ID, as_user(user_id))
        .json(&json!({ "display_name": user_id.to_uppercase() }))
        .await
        .assert_status(StatusCode::CREATED);
}

async fn start(server: &TestServer, tournament_id: &str, creator: &str) {
    server
        .post(&format!("/api/tournaments/{}/start", tournament_id))
        .add_header(USER_ID, as_user(creator))
        .await
        .assert_status_ok();
}

async fn solve(
    server: &TestServer,
    tournament_id: &str,
    user_id: &str,
    puzzle_id: &str,
    ms: i64,
) -> Value {
    let response = server
        .post(&format!("/api/tournaments/{}/solves", tournament_id))
        .add_header(USER_ID, as_user(user_id))
        .json(&json!({ "puzzle_id": puzzle_id, "solve_time_ms": ms }))
        .await;

    response.assert_status_ok();
    response.json()
}

// ============================================================================
// Tournament management
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = setup().await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_create_tournament() {
    let server = setup().await;
    let id = create_tournament(&server, "host", "Friday Puzzles").await;

    let response = server.get(&format!("/api/tournaments/{}", id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["name"], "Friday Puzzles");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["created_by"], "host");
}

#[tokio::test]
async fn test_create_requires_identity() {
    let server = setup().await;
    let start = Utc::now();
    let response = server
        .post("/api/tournaments")
        .json(&json!({
            "name": "Anonymous",
            "start_time": start.to_rfc3339(),
            "end_time": (start + Duration::hours(1)).to_rfc3339(),
        }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_create_validates_input() {
    let server = setup().await;
    let start = Utc::now();
    let response = server
        .post("/api/tournaments")
        .add_header(USER_ID, as_user("host"))
        .json(&json!({
            "name": "   ",
            "start_time": start.to_rfc3339(),
            "end_time": (start + Duration::hours(1)).to_rfc3339(),
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_malformed_requests_use_error_body() {
    let server = setup().await;

    let response = server
        .post("/api/tournaments")
        .add_header(USER_ID, as_user("host"))
        .json(&json!({
            "name": "Bad dates",
            "start_time": "not-a-date",
            "end_time": Utc::now().to_rfc3339(),
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "validation_error");
    assert!(body["error"].as_str().unwrap().contains("start_time"));

    let id = create_tournament(&server, "host", "Malformed").await;

    let response = server
        .post(&format!("/api/tournaments/{}/register", id))
        .add_header(USER_ID, as_user("alice"))
        .json(&json!({ "name": "missing display_name" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "validation_error");

    let response = server
        .get(&format!("/api/tournaments/{}/leaderboard?limit=-1", id))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "validation_error");

    let response = server
        .post(&format!("/api/tournaments/{}/solves", id))
        .add_header(USER_ID, as_user("alice"))
        .text("puzzle_id=easy-001")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_list_and_current_tournament() {
    let server = setup().await;
    server
        .get("/api/tournaments/current")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    create_tournament(&server, "host", "One").await;
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    let second = create_tournament(&server, "host", "Two").await;

    let body: Value = server.get("/api/tournaments").await.json();
    assert_eq!(body["tournaments"].as_array().unwrap().len(), 2);

    let body: Value = server.get("/api/tournaments?status=active").await.json();
    assert!(body["tournaments"].as_array().unwrap().is_empty());

    server
        .get("/api/tournaments?status=bogus")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let body: Value = server.get("/api/tournaments/current").await.json();
    assert_eq!(body["id"], second.as_str());
}

#[tokio::test]
async fn test_only_creator_can_administer() {
    let server = setup().await;
    let id = create_tournament(&server, "host", "Guarded").await;

    for path in ["start", "finish", "cancel"] {
        let response = server
            .post(&format!("/api/tournaments/{}/{}", id, path))
            .add_header(USER_ID, as_user("intruder"))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    server
        .put(&format!("/api/tournaments/{}", id))
        .add_header(USER_ID, as_user("intruder"))
        .json(&json!({ "name": "Hijacked" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .delete(&format!("/api/tournaments/{}", id))
        .add_header(USER_ID, as_user("intruder"))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_tournament() {
    let server = setup().await;
    let id = create_tournament(&server, "host", "Draft").await;

    let response = server
        .put(&format!("/api/tournaments/{}", id))
        .add_header(USER_ID, as_user("host"))
        .json(&json!({ "name": "Final Name" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["name"], "Final Name");

    server
        .put(&format!("/api/tournaments/{}", id))
        .add_header(USER_ID, as_user("host"))
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_tournament_is_not_found() {
    let server = setup().await;
    let response = server.get("/api/tournaments/nope").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "not_found");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_start_twice_conflicts() {
    let server = setup().await;
    let id = create_tournament(&server, "host", "Once").await;
    start(&server, &id, "host").await;

    let response = server
        .post(&format!("/api/tournaments/{}/start", id))
        .add_header(USER_ID, as_user("host"))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "invalid_transition");
}

#[tokio::test]
async fn test_cancel_then_edit_is_closed() {
    let server = setup().await;
    let id = create_tournament(&server, "host", "Short lived").await;
    register(&server, &id, "alice").await;

    let response = server
        .post(&format!("/api/tournaments/{}/cancel", id))
        .add_header(USER_ID, as_user("host"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "cancelled");

    let participants: Value = server
        .get(&format!("/api/tournaments/{}/participants", id))
        .await
        .json();
    assert!(participants.as_array().unwrap().is_empty());

    let response = server
        .put(&format!("/api/tournaments/{}", id))
        .add_header(USER_ID, as_user("host"))
        .json(&json!({ "name": "Back again" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "tournament_closed");
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_registration_flow() {
    let server = setup().await;
    let id = create_tournament(&server, "host", "Open").await;
    register(&server, &id, "alice").await;

    let response = server
        .post(&format!("/api/tournaments/{}/register", id))
        .add_header(USER_ID, as_user("alice"))
        .json(&json!({ "display_name": "Alice" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "already_registered");

    server
        .delete(&format!("/api/tournaments/{}/register", id))
        .add_header(USER_ID, as_user("alice"))
        .await
        .assert_status_ok();

    let participants: Value = server
        .get(&format!("/api/tournaments/{}/participants", id))
        .await
        .json();
    assert!(participants.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_registration_closes_at_start() {
    let server = setup().await;
    let id = create_tournament(&server, "host", "Closed doors").await;
    start(&server, &id, "host").await;

    let response = server
        .post(&format!("/api/tournaments/{}/register", id))
        .add_header(USER_ID, as_user("late"))
        .json(&json!({ "display_name": "Late" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "tournament_not_pending");
}

// ============================================================================
// Play and standings
// ============================================================================

#[tokio::test]
async fn test_solve_submission_is_idempotent() {
    let server = setup().await;
    let id = create_tournament(&server, "host", "Speed run").await;
    register(&server, &id, "alice").await;
    start(&server, &id, "host").await;

    let first = solve(&server, &id, "alice", "easy-001", 30_000).await;
    assert_eq!(first["accepted"], true);
    assert_eq!(first["score"], 15);

    let second = solve(&server, &id, "alice", "easy-001", 1_000).await;
    assert_eq!(second["accepted"], false);
    assert_eq!(second["score"], 15);
    assert_eq!(second["solved_count"], 1);
}

#[tokio::test]
async fn test_solve_before_start_conflicts() {
    let server = setup().await;
    let id = create_tournament(&server, "host", "Not yet").await;
    register(&server, &id, "alice").await;

    let response = server
        .post(&format!("/api/tournaments/{}/solves", id))
        .add_header(USER_ID, as_user("alice"))
        .json(&json!({ "puzzle_id": "easy-001", "solve_time_ms": 1000 }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "tournament_not_active");
}

#[tokio::test]
async fn test_next_puzzle() {
    let server = setup().await;
    let id = create_tournament(&server, "host", "Puzzles").await;
    register(&server, &id, "alice").await;
    start(&server, &id, "host").await;

    let response = server
        .get(&format!("/api/tournaments/{}/puzzles/next?difficulty=very_hard", id))
        .add_header(USER_ID, as_user("alice"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["difficulty"], "very_hard");

    server
        .get(&format!("/api/tournaments/{}/puzzles/next", id))
        .add_header(USER_ID, as_user("alice"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_leaderboard_and_dashboard() {
    let server = setup().await;
    let id = create_tournament(&server, "host", "Standings").await;
    for user in ["alice", "bob", "carol"] {
        register(&server, &id, user).await;
    }
    start(&server, &id, "host").await;

    solve(&server, &id, "bob", "medium-001", 60_000).await;
    solve(&server, &id, "carol", "easy-001", 60_000).await;

    let body: Value = server
        .get(&format!("/api/tournaments/{}/leaderboard?limit=2", id))
        .await
        .json();
    let standings = body["standings"].as_array().unwrap();
    assert_eq!(standings.len(), 2);
    assert_eq!(standings[0]["user_id"], "bob");
    assert_eq!(standings[0]["score"], 30);
    assert_eq!(standings[1]["user_id"], "carol");

    server
        .get(&format!("/api/tournaments/{}/leaderboard?limit=0", id))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let me: Value = server
        .get(&format!("/api/tournaments/{}/leaderboard/me", id))
        .add_header(USER_ID, as_user("alice"))
        .await
        .json();
    assert_eq!(me["rank"], 3);

    let dashboard: Value = server
        .get(&format!("/api/tournaments/{}/dashboard", id))
        .await
        .json();
    let entries = dashboard.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["display_name"], "BOB");
    assert_eq!(entries[2]["solved_count"], 0);
}

#[tokio::test]
async fn test_tournament_complete_flow() {
    let server = setup().await;
    let id = create_tournament(&server, "host", "Championship").await;
    register(&server, &id, "alice").await;
    register(&server, &id, "bob").await;
    start(&server, &id, "host").await;

    solve(&server, &id, "alice", "hard-001", 90_000).await;
    solve(&server, &id, "bob", "easy-001", 10_000).await;

    let response = server
        .get(&format!("/api/tournaments/{}/results", id))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "results_not_ready");

    let response = server
        .post(&format!("/api/tournaments/{}/finish", id))
        .add_header(USER_ID, as_user("host"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["tournament"]["status"], "finished");
    assert_eq!(body["results"][0]["user_id"], "alice");
    assert_eq!(body["results"][0]["rank"], 1);
    assert_eq!(body["results"][1]["rank"], 2);

    let results: Value = server
        .get(&format!("/api/tournaments/{}/results", id))
        .await
        .json();
    assert_eq!(results["results"].as_array().unwrap().len(), 2);
    assert_eq!(results["results"][0]["score"], 45);

    let response = server
        .post(&format!("/api/tournaments/{}/solves", id))
        .add_header(USER_ID, as_user("bob"))
        .json(&json!({ "puzzle_id": "easy-002", "solve_time_ms": 1000 }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    server
        .delete(&format!("/api/tournaments/{}", id))
        .add_header(USER_ID, as_user("host"))
        .await
        .assert_status(StatusCode::CONFLICT);
}
