//! Router tests over the in-memory store
//!
//! Requests go through the full axum stack (auth extractor, JSON bodies,
//! error mapping) without a database or a listening socket.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use gearguard_server::{
    api,
    config::AppConfig,
    lifecycle::clock::FixedClock,
    models::user::UserClaims,
    repository::memory::InMemoryStore,
    services::Services,
    AppState,
};

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    clock: Arc<FixedClock>,
    token: String,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

fn setup() -> TestApp {
    let config = AppConfig::default();
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(start()));
    store.add_team(1).unwrap();
    store.add_technician(7).unwrap();

    let claims = UserClaims {
        sub: "manager@gearguard.local".to_string(),
        user_id: 7,
        role: "manager".to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp(),
        iat: Utc::now().timestamp(),
    };
    let token = claims.create_token(&config.auth.jwt_secret).unwrap();

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(Services::new(store.clone(), clock.clone())),
    };

    TestApp {
        router: api::create_router(state),
        store,
        clock,
        token,
    }
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token));

        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_equipment(&self, serial: &str) -> i64 {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/equipment",
                Some(json!({
                    "name": "Hydraulic press",
                    "serial_number": serial,
                    "category": "Presses",
                    "location": "Hall A",
                    "assigned_to_team": 1,
                    "default_technician": 7
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let app = setup();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = app.call(Method::GET, "/api/v1/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_requests_require_bearer_token() {
    let app = setup();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/api/v1/requests").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/requests")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_request_fills_defaults_and_numbers() {
    let app = setup();
    let equipment_id = app.create_equipment("HP-001").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/requests",
            Some(json!({
                "subject": "Oil leak",
                "equipment_id": equipment_id,
                "request_type": "corrective"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["request_number"], "REQ-2024-0001");
    assert_eq!(body["stage"], "new");
    assert_eq!(body["priority"], "medium");
    assert_eq!(body["team_id"], 1);
    assert_eq!(body["assigned_to"], 7);
    assert_eq!(body["created_by"], 7);
    assert_eq!(body["is_overdue"], false);

    let (_, second) = app
        .call(
            Method::POST,
            "/api/v1/requests",
            Some(json!({
                "subject": "Pressure drop",
                "equipment_id": equipment_id,
                "request_type": "preventive",
                "priority": "high"
            })),
        )
        .await;
    assert_eq!(second["request_number"], "REQ-2024-0002");
}

#[tokio::test]
async fn test_create_request_with_both_targets_is_rejected() {
    let app = setup();
    let equipment_id = app.create_equipment("HP-002").await;
    let work_center = app.store.add_work_center("Assembly", "WC-A", start()).unwrap();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/requests",
            Some(json!({
                "subject": "Oil leak",
                "equipment_id": equipment_id,
                "work_center_id": work_center.id,
                "request_type": "corrective"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidTarget");
    assert_eq!(app.store.request_count().unwrap(), 0);
}

#[tokio::test]
async fn test_scrap_stage_cascades_to_equipment() {
    let app = setup();
    let equipment_id = app.create_equipment("HP-003").await;
    let (_, request) = app
        .call(
            Method::POST,
            "/api/v1/requests",
            Some(json!({
                "subject": "Frame cracked",
                "equipment_id": equipment_id,
                "request_type": "corrective"
            })),
        )
        .await;
    let id = request["id"].as_i64().unwrap();

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/api/v1/requests/{}/stage", id),
            Some(json!({ "stage": "scrap" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Request scrapped and equipment marked as scrapped");
    assert_eq!(body["request"]["stage"], "scrap");
    assert!(body["request"]["started_at"].is_null());

    let (_, equipment) = app
        .call(Method::GET, &format!("/api/v1/equipment/{}", equipment_id), None)
        .await;
    assert_eq!(equipment["status"], "scrapped");

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/v1/equipment/{}", equipment_id),
            Some(json!({ "status": "active" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Duplicate");
}

#[tokio::test]
async fn test_stage_lifecycle_and_invalid_moves() {
    let app = setup();
    let equipment_id = app.create_equipment("HP-004").await;
    let (_, request) = app
        .call(
            Method::POST,
            "/api/v1/requests",
            Some(json!({
                "subject": "Seal replacement",
                "equipment_id": equipment_id,
                "request_type": "preventive"
            })),
        )
        .await;
    let stage_uri = format!("/api/v1/requests/{}/stage", request["id"]);

    let (status, body) = app.call(Method::PATCH, &stage_uri, Some(json!({ "stage": "finished" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidStage");

    let (status, body) = app.call(Method::PATCH, &stage_uri, Some(json!({ "stage": "in_progress" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Stage updated successfully");
    let started_at = body["request"]["started_at"].clone();
    assert!(!started_at.is_null());

    app.clock.set(start() + Duration::hours(2));
    let (status, body) = app
        .call(
            Method::PATCH,
            &stage_uri,
            Some(json!({ "stage": "repaired", "duration_minutes": 120, "resolution_notes": "Seals replaced" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["duration_minutes"], 120);
    assert_eq!(body["request"]["started_at"], started_at);

    let (status, _) = app.call(Method::PATCH, &stage_uri, Some(json!({ "stage": "new" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, equipment) = app
        .call(Method::GET, &format!("/api/v1/equipment/{}", equipment_id), None)
        .await;
    assert_eq!(equipment["status"], "active");
}

#[tokio::test]
async fn test_overdue_flag_and_calendar() {
    let app = setup();
    let equipment_id = app.create_equipment("HP-005").await;
    let scheduled = start() + Duration::days(1);

    let (_, request) = app
        .call(
            Method::POST,
            "/api/v1/requests",
            Some(json!({
                "subject": "Quarterly inspection",
                "equipment_id": equipment_id,
                "request_type": "preventive",
                "scheduled_date": scheduled
            })),
        )
        .await;
    assert_eq!(request["is_overdue"], false);

    app.clock.set(scheduled + Duration::minutes(1));
    let (_, calendar) = app.call(Method::GET, "/api/v1/requests/calendar", None).await;
    assert_eq!(calendar.as_array().unwrap().len(), 1);
    assert_eq!(calendar[0]["is_overdue"], true);

    let (_, listed) = app.call(Method::GET, "/api/v1/requests?stage=new", None).await;
    assert_eq!(listed[0]["is_overdue"], true);

    let (_, open) = app
        .call(Method::GET, &format!("/api/v1/equipment/{}/requests", equipment_id), None)
        .await;
    assert_eq!(open.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_equipment_defaults_endpoint() {
    let app = setup();
    let equipment_id = app.create_equipment("HP-006").await;

    let (status, body) = app
        .call(Method::GET, &format!("/api/v1/equipment/{}/defaults", equipment_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["team_id"], 1);
    assert_eq!(body["technician_id"], 7);
    assert_eq!(body["category"], "Presses");
    assert_eq!(body["location"], "Hall A");

    let (status, body) = app.call(Method::GET, "/api/v1/equipment/999/defaults", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchData");
}

#[tokio::test]
async fn test_update_request_cannot_change_stage() {
    let app = setup();
    let equipment_id = app.create_equipment("HP-007").await;
    let (_, request) = app
        .call(
            Method::POST,
            "/api/v1/requests",
            Some(json!({
                "subject": "Noise",
                "equipment_id": equipment_id,
                "request_type": "corrective"
            })),
        )
        .await;

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/v1/requests/{}", request["id"]),
            Some(json!({ "subject": "Loud noise at startup", "stage": "repaired" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject"], "Loud noise at startup");
    assert_eq!(body["stage"], "new");
}

#[tokio::test]
async fn test_update_request_null_clears_schedule() {
    let app = setup();
    let equipment_id = app.create_equipment("HP-008").await;
    let (_, request) = app
        .call(
            Method::POST,
            "/api/v1/requests",
            Some(json!({
                "subject": "Annual calibration",
                "equipment_id": equipment_id,
                "request_type": "preventive",
                "scheduled_date": start() + Duration::days(3)
            })),
        )
        .await;
    let uri = format!("/api/v1/requests/{}", request["id"]);

    let (status, body) = app
        .call(Method::PUT, &uri, Some(json!({ "scheduled_date": null, "assigned_to": null })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["scheduled_date"].is_null());
    assert!(body["assigned_to"].is_null());
    assert_eq!(body["team_id"], 1);

    let (_, calendar) = app.call(Method::GET, "/api/v1/requests/calendar", None).await;
    assert!(calendar.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_equipment_filters() {
    let app = setup();
    let press = app.create_equipment("HP-009").await;
    let (status, lift) = app
        .call(
            Method::POST,
            "/api/v1/equipment",
            Some(json!({
                "name": "Scissor lift",
                "serial_number": "SL-001",
                "category": "Lifts",
                "department": "Logistics",
                "location": "Yard"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, presses) = app.call(Method::GET, "/api/v1/equipment?category=Presses", None).await;
    assert_eq!(presses.as_array().unwrap().len(), 1);
    assert_eq!(presses[0]["id"], press);

    let (_, logistics) = app.call(Method::GET, "/api/v1/equipment?department=Logistics", None).await;
    assert_eq!(logistics.as_array().unwrap().len(), 1);
    assert_eq!(logistics[0]["id"], lift["id"]);

    let (_, scrapped) = app.call(Method::GET, "/api/v1/equipment?status=scrapped", None).await;
    assert!(scrapped.as_array().unwrap().is_empty());

    let (status, body) = app.call(Method::GET, "/api/v1/equipment?status=broken", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}
