//! Repository tests against a real Postgres database
//!
//! Point `DATABASE_URL` at a scratch database and run with
//! `cargo test --test postgres_tests -- --ignored`. Migrations are applied on
//! connect. Each test numbers requests in its own far-future year so the
//! tests can share one database.

use std::collections::HashSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;

use gearguard_server::{
    error::AppError,
    lifecycle::StageParams,
    models::{
        enums::{EquipmentStatus, Priority, RequestType, Stage},
        equipment::{CreateEquipment, NewEquipment},
        request::{RequestDraft, RequestTarget},
    },
    repository::{MaintenanceStore, Repository},
};

async fn repository() -> Repository {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(&url)
        .await
        .expect("Failed to connect");
    sqlx::migrate!("./migrations").run(&pool).await.expect("Failed to migrate");
    Repository::new(pool)
}

/// Start from an empty year: no stored numbers and no counter row
async fn reset_year(repo: &Repository, year: i32) {
    sqlx::query("DELETE FROM maintenance_requests WHERE request_number LIKE $1")
        .bind(format!("REQ-{}-%", year))
        .execute(&repo.pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM request_sequences WHERE year = $1")
        .bind(year)
        .execute(&repo.pool)
        .await
        .unwrap();
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 7, 24, 17).unwrap()
}

async fn equipment_id(repo: &Repository, tag: &str) -> i32 {
    let serial = format!("PG-{}-{}", tag, Utc::now().timestamp_micros());
    let equipment = repo
        .create_equipment(
            &NewEquipment {
                data: CreateEquipment {
                    name: "Compressor".to_string(),
                    serial_number: serial,
                    category: "Pneumatics".to_string(),
                    department: None,
                    location: "Bay 4".to_string(),
                    assigned_to_team: None,
                    default_technician: None,
                    purchase_date: None,
                    warranty_expiry: None,
                    status: None,
                    notes: None,
                },
                status: EquipmentStatus::Active,
            },
            now(),
        )
        .await
        .unwrap();
    equipment.id
}

fn draft(equipment_id: i32) -> RequestDraft {
    RequestDraft {
        subject: "Pressure loss".to_string(),
        description: None,
        target: RequestTarget::Equipment(equipment_id),
        request_type: RequestType::Corrective,
        priority: Priority::Medium,
        team_id: None,
        assigned_to: None,
        created_by: None,
        scheduled_date: None,
    }
}

async fn counter(repo: &Repository, year: i32) -> Option<i32> {
    sqlx::query_scalar("SELECT last_value FROM request_sequences WHERE year = $1")
        .bind(year)
        .fetch_optional(&repo.pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_concurrent_inserts_are_unique_and_gapless() {
    const YEAR: i32 = 2991;
    const N: u32 = 40;

    let repo = repository().await;
    reset_year(&repo, YEAR).await;
    let equipment_id = equipment_id(&repo, "concurrent").await;

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.insert_request(&draft(equipment_id), YEAR, now()).await })
        })
        .collect();

    let mut sequences = Vec::new();
    for handle in handles {
        let request = handle.await.unwrap().unwrap();
        assert_eq!(request.request_number.year(), YEAR);
        sequences.push(request.request_number.sequence());
    }

    let unique: HashSet<u32> = sequences.iter().copied().collect();
    assert_eq!(unique.len(), N as usize);
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=N).collect::<Vec<u32>>());
    assert_eq!(counter(&repo, YEAR).await, Some(N as i32));
}

#[tokio::test]
#[ignore]
async fn test_missing_counter_row_is_seeded_from_stored_numbers() {
    const YEAR: i32 = 2992;

    let repo = repository().await;
    reset_year(&repo, YEAR).await;
    let equipment_id = equipment_id(&repo, "seed").await;

    for _ in 0..3 {
        repo.insert_request(&draft(equipment_id), YEAR, now()).await.unwrap();
    }

    // counter lost, numbers kept
    sqlx::query("DELETE FROM request_sequences WHERE year = $1")
        .bind(YEAR)
        .execute(&repo.pool)
        .await
        .unwrap();
    let next = repo.insert_request(&draft(equipment_id), YEAR, now()).await.unwrap();
    assert_eq!(next.request_number.to_string(), "REQ-2992-0004");

    // counter behind the stored numbers is pulled forward
    sqlx::query("UPDATE request_sequences SET last_value = 1 WHERE year = $1")
        .bind(YEAR)
        .execute(&repo.pool)
        .await
        .unwrap();
    let next = repo.insert_request(&draft(equipment_id), YEAR, now()).await.unwrap();
    assert_eq!(next.request_number.to_string(), "REQ-2992-0005");

    // the following year starts over
    reset_year(&repo, YEAR + 1).await;
    let first = repo.insert_request(&draft(equipment_id), YEAR + 1, now()).await.unwrap();
    assert_eq!(first.request_number.to_string(), "REQ-2993-0001");
}

#[tokio::test]
#[ignore]
async fn test_stage_change_answers_with_stored_timestamps() {
    const YEAR: i32 = 2994;

    let repo = repository().await;
    reset_year(&repo, YEAR).await;
    let equipment_id = equipment_id(&repo, "stage").await;
    let request = repo.insert_request(&draft(equipment_id), YEAR, now()).await.unwrap();

    let started = now() + Duration::nanoseconds(291_038_178);
    let first = repo
        .change_stage(request.id, Stage::InProgress, &StageParams::default(), started)
        .await
        .unwrap();
    let second = repo
        .change_stage(request.id, Stage::InProgress, &StageParams::default(), started + Duration::hours(1))
        .await
        .unwrap();
    let stored = repo.get_request(request.id).await.unwrap();

    assert_eq!(first.request.started_at, Some(now() + Duration::microseconds(291_038)));
    assert_eq!(second.request.started_at, first.request.started_at);
    assert_eq!(stored, first.request);
}

#[tokio::test]
#[ignore]
async fn test_scrap_cascade_commits_with_the_stage() {
    const YEAR: i32 = 2995;

    let repo = repository().await;
    reset_year(&repo, YEAR).await;
    let equipment_id = equipment_id(&repo, "scrap").await;
    let request = repo.insert_request(&draft(equipment_id), YEAR, now()).await.unwrap();

    let change = repo
        .change_stage(request.id, Stage::Scrap, &StageParams::default(), now())
        .await
        .unwrap();
    assert_eq!(change.request.stage, Stage::Scrap);
    assert_eq!(change.request.started_at, None);

    let equipment = repo.get_equipment(equipment_id).await.unwrap();
    assert_eq!(equipment.status, EquipmentStatus::Scrapped);

    let backwards = repo
        .change_stage(request.id, Stage::New, &StageParams::default(), now())
        .await;
    assert!(matches!(backwards, Err(AppError::InvalidStage(_))));
}
