//! Repository layer for database operations
//!
//! [`MaintenanceStore`] is the persistence seam used by the services. The
//! Postgres [`Repository`] is the production implementation;
//! [`memory::InMemoryStore`] backs tests and local runs without a database.
//!
//! Every method that changes more than one row is a single transactional unit:
//! request number allocation commits together with the insert, and a stage
//! change commits together with its asset cascade.

pub mod equipment;
pub mod memory;
pub mod requests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    lifecycle::stage::{StageChange, StageParams},
    models::{
        enums::Stage,
        equipment::{Equipment, EquipmentChanges, EquipmentFilter, NewEquipment},
        request::{MaintenanceRequest, RequestChanges, RequestDraft, RequestFilter},
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MaintenanceStore: Send + Sync {
    /// Cheap liveness probe
    async fn ping(&self) -> AppResult<()>;

    // --- Equipment ---

    /// Matching equipment, by name
    async fn list_equipment(&self, filter: &EquipmentFilter) -> AppResult<Vec<Equipment>>;

    /// Fails with `NotFound` when the equipment does not exist
    async fn get_equipment(&self, id: i32) -> AppResult<Equipment>;

    async fn create_equipment(&self, data: &NewEquipment, now: DateTime<Utc>) -> AppResult<Equipment>;

    /// Operator edit. Moving equipment away from `scrapped` fails with
    /// `Conflict` while a scrapped request still targets it.
    async fn update_equipment(
        &self,
        id: i32,
        changes: &EquipmentChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Equipment>;

    // --- Collaborator existence checks ---

    async fn work_center_exists(&self, id: i32) -> AppResult<bool>;

    async fn team_exists(&self, id: i32) -> AppResult<bool>;

    async fn technician_exists(&self, id: i32) -> AppResult<bool>;

    // --- Requests ---

    /// Allocate the next request number of `year` and insert the request in
    /// stage `new`, atomically. A duplicate number surfaces as
    /// `SequenceConflict`.
    async fn insert_request(
        &self,
        draft: &RequestDraft,
        year: i32,
        now: DateTime<Utc>,
    ) -> AppResult<MaintenanceRequest>;

    async fn get_request(&self, id: i32) -> AppResult<MaintenanceRequest>;

    /// Matching requests, newest first
    async fn list_requests(&self, filter: &RequestFilter) -> AppResult<Vec<MaintenanceRequest>>;

    /// Requests with a scheduled date, soonest first
    async fn list_scheduled_requests(&self) -> AppResult<Vec<MaintenanceRequest>>;

    async fn update_request(
        &self,
        id: i32,
        changes: &RequestChanges,
        now: DateTime<Utc>,
    ) -> AppResult<MaintenanceRequest>;

    /// Run the state machine against the locked current row and persist the
    /// result together with its cascade. Nothing is written on error.
    async fn change_stage(
        &self,
        id: i32,
        target: Stage,
        params: &StageParams,
        now: DateTime<Utc>,
    ) -> AppResult<StageChange>;
}

/// Postgres-backed store
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MaintenanceStore for Repository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_equipment(&self, filter: &EquipmentFilter) -> AppResult<Vec<Equipment>> {
        self.equipment_list(filter).await
    }

    async fn get_equipment(&self, id: i32) -> AppResult<Equipment> {
        self.equipment_get_by_id(id).await
    }

    async fn create_equipment(&self, data: &NewEquipment, now: DateTime<Utc>) -> AppResult<Equipment> {
        self.equipment_create(data, now).await
    }

    async fn update_equipment(
        &self,
        id: i32,
        changes: &EquipmentChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Equipment> {
        self.equipment_update(id, changes, now).await
    }

    async fn work_center_exists(&self, id: i32) -> AppResult<bool> {
        self.exists("SELECT EXISTS(SELECT 1 FROM work_centers WHERE id = $1)", id).await
    }

    async fn team_exists(&self, id: i32) -> AppResult<bool> {
        self.exists("SELECT EXISTS(SELECT 1 FROM teams WHERE id = $1)", id).await
    }

    async fn technician_exists(&self, id: i32) -> AppResult<bool> {
        self.exists("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)", id).await
    }

    async fn insert_request(
        &self,
        draft: &RequestDraft,
        year: i32,
        now: DateTime<Utc>,
    ) -> AppResult<MaintenanceRequest> {
        self.requests_insert(draft, year, now).await
    }

    async fn get_request(&self, id: i32) -> AppResult<MaintenanceRequest> {
        self.requests_get_by_id(id).await
    }

    async fn list_requests(&self, filter: &RequestFilter) -> AppResult<Vec<MaintenanceRequest>> {
        self.requests_list(filter).await
    }

    async fn list_scheduled_requests(&self) -> AppResult<Vec<MaintenanceRequest>> {
        self.requests_list_scheduled().await
    }

    async fn update_request(
        &self,
        id: i32,
        changes: &RequestChanges,
        now: DateTime<Utc>,
    ) -> AppResult<MaintenanceRequest> {
        self.requests_update(id, changes, now).await
    }

    async fn change_stage(
        &self,
        id: i32,
        target: Stage,
        params: &StageParams,
        now: DateTime<Utc>,
    ) -> AppResult<StageChange> {
        self.requests_change_stage(id, target, params, now).await
    }
}

impl Repository {
    async fn exists(&self, query: &str, id: i32) -> AppResult<bool> {
        let found: bool = sqlx::query_scalar(query)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }
}
