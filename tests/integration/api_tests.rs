//! API integration tests against a running server
//!
//! Start the server and run with `cargo test -- --ignored`. The numbering
//! test exercises whichever store the server runs on; use the Postgres
//! backend to cover the database allocator. Tokens are signed locally with
//! `JWT_SECRET`, which must match the server's.

use std::collections::HashSet;

use chrono::{Datelike, Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};

use gearguard_server::{
    lifecycle::board::{move_card, Board, DropTarget, HttpStageClient, MoveOutcome},
    lifecycle::RequestNumber,
    models::{enums::Stage, request::RequestDetails, user::UserClaims},
};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn auth_token() -> String {
    let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "change-this-secret-in-production".to_string());
    UserClaims {
        sub: "admin@gearguard.local".to_string(),
        user_id: 1,
        role: "admin".to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp(),
        iat: Utc::now().timestamp(),
    }
    .create_token(&secret)
    .expect("Failed to sign token")
}

async fn create_equipment(client: &Client, token: &str) -> i64 {
    let serial = format!("LIVE-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
    let response = client
        .post(format!("{}/equipment", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "name": "Conveyor belt",
            "serial_number": serial,
            "category": "Conveyors",
            "location": "Dock 2"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No id in response")
}

async fn create_request(client: &Client, token: &str, equipment_id: i64) -> RequestDetails {
    let response = client
        .post(format!("{}/requests", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "subject": "Belt slipping",
            "equipment_id": equipment_id,
            "request_type": "corrective"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    response.json().await.expect("Failed to parse response")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_list_requests_without_token() {
    let client = Client::new();

    let response = client
        .get(format!("{}/requests", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_create_and_scrap_request() {
    let client = Client::new();
    let token = auth_token();
    let equipment_id = create_equipment(&client, &token).await;
    let request = create_request(&client, &token, equipment_id).await;
    assert!(request.request_number.starts_with("REQ-"));

    let response = client
        .patch(format!("{}/requests/{}/stage", BASE_URL, request.id))
        .bearer_auth(&token)
        .json(&json!({ "stage": "scrap" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let equipment: Value = client
        .get(format!("{}/equipment/{}", BASE_URL, equipment_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(equipment["status"], "scrapped");
}

#[tokio::test]
#[ignore]
async fn test_board_move_commits_and_reverts() {
    let client = Client::new();
    let token = auth_token();
    let equipment_id = create_equipment(&client, &token).await;
    let request = create_request(&client, &token, equipment_id).await;
    let id = request.id;

    let mut board = Board::new(vec![request]);
    let stage_client = HttpStageClient::new(BASE_URL, token);

    let outcome = move_card(&mut board, &stage_client, id, DropTarget::Column(Stage::InProgress))
        .await
        .expect("Move failed");
    assert!(matches!(outcome, MoveOutcome::Committed { stage: Stage::InProgress }));

    // in_progress -> new is refused by the server
    let outcome = move_card(&mut board, &stage_client, id, DropTarget::Column(Stage::New))
        .await
        .expect("Move failed");
    assert!(matches!(outcome, MoveOutcome::Reverted { stage: Stage::InProgress, .. }));
    assert_eq!(board.card(id).map(|c| c.stage()), Some(Stage::InProgress));
}

#[tokio::test]
#[ignore]
async fn test_concurrent_creations_are_numbered_without_gaps() {
    const N: usize = 32;

    let client = Client::new();
    let token = auth_token();
    let equipment_id = create_equipment(&client, &token).await;

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let client = client.clone();
            let token = token.clone();
            tokio::spawn(async move { create_request(&client, &token, equipment_id).await })
        })
        .collect();

    let year = Utc::now().year();
    let mut sequences = Vec::new();
    for handle in handles {
        let request = handle.await.expect("Task panicked");
        let number: RequestNumber = request.request_number.parse().expect("Malformed number");
        assert_eq!(number.year(), year);
        sequences.push(number.sequence());
    }

    let unique: HashSet<u32> = sequences.iter().copied().collect();
    assert_eq!(unique.len(), N);

    // every number stored for the year, ours included, forms 1..=max
    let listed: Vec<RequestDetails> = client
        .get(format!("{}/requests", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    let mut all: Vec<u32> = listed
        .iter()
        .filter_map(|r| r.request_number.parse::<RequestNumber>().ok())
        .filter(|n| n.year() == year)
        .map(|n| n.sequence())
        .collect();
    all.sort_unstable();
    let max = all.last().copied().unwrap_or_default();
    assert_eq!(all, (1..=max).collect::<Vec<u32>>());
    assert!(unique.iter().all(|s| all.binary_search(s).is_ok()));
}
