//! Maintenance request domain methods on Repository

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    lifecycle::{
        numbering::RequestNumber,
        stage::{self, Cascade, StageChange, StageParams},
    },
    models::{
        enums::{EquipmentStatus, Priority, RequestType, Stage},
        request::{MaintenanceRequest, RequestChanges, RequestDraft, RequestFilter, RequestTarget},
    },
};

const REQUEST_NUMBER_CONSTRAINT: &str = "maintenance_requests_request_number_key";

/// Row shape of `maintenance_requests`
#[derive(Debug, FromRow)]
struct RequestRow {
    id: i32,
    request_number: String,
    subject: String,
    description: Option<String>,
    equipment_id: Option<i32>,
    work_center_id: Option<i32>,
    request_type: RequestType,
    priority: Priority,
    stage: Stage,
    team_id: Option<i32>,
    assigned_to: Option<i32>,
    created_by: Option<i32>,
    scheduled_date: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    duration_minutes: Option<i32>,
    resolution_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for MaintenanceRequest {
    type Error = AppError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let target = RequestTarget::from_ids(row.equipment_id, row.work_center_id)
            .map_err(|e| AppError::Internal(format!("Request {} has a corrupt target: {}", row.id, e)))?;
        let request_number = row
            .request_number
            .parse()
            .map_err(|e| AppError::Internal(format!("Request {}: {}", row.id, e)))?;

        Ok(MaintenanceRequest {
            id: row.id,
            request_number,
            subject: row.subject,
            description: row.description,
            target,
            request_type: row.request_type,
            priority: row.priority,
            stage: row.stage,
            team_id: row.team_id,
            assigned_to: row.assigned_to,
            created_by: row.created_by,
            scheduled_date: row.scheduled_date,
            started_at: row.started_at,
            completed_at: row.completed_at,
            duration_minutes: row.duration_minutes,
            resolution_notes: row.resolution_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_requests(rows: Vec<RequestRow>) -> AppResult<Vec<MaintenanceRequest>> {
    rows.into_iter().map(MaintenanceRequest::try_from).collect()
}

impl Repository {
    /// Get a request by ID
    pub async fn requests_get_by_id(&self, id: i32) -> AppResult<MaintenanceRequest> {
        sqlx::query_as::<_, RequestRow>("SELECT * FROM maintenance_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))?
            .try_into()
    }

    /// List requests matching the filter, newest first
    pub async fn requests_list(&self, filter: &RequestFilter) -> AppResult<Vec<MaintenanceRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT * FROM maintenance_requests
            WHERE ($1::text IS NULL OR stage = $1)
              AND ($2::text IS NULL OR request_type = $2)
              AND ($3::int IS NULL OR team_id = $3)
              AND ($4::text IS NULL OR priority = $4)
              AND ($5::int IS NULL OR equipment_id = $5)
              AND ($6::int IS NULL OR work_center_id = $6)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(filter.stage)
        .bind(filter.request_type)
        .bind(filter.team_id)
        .bind(filter.priority)
        .bind(filter.equipment_id)
        .bind(filter.work_center_id)
        .fetch_all(&self.pool)
        .await?;

        into_requests(rows)
    }

    /// Requests with a scheduled date (calendar view)
    pub async fn requests_list_scheduled(&self) -> AppResult<Vec<MaintenanceRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(
            "SELECT * FROM maintenance_requests WHERE scheduled_date IS NOT NULL ORDER BY scheduled_date ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        into_requests(rows)
    }

    /// Allocate a number and insert a request in one transaction.
    ///
    /// The upsert on `request_sequences` takes the row lock for the year and
    /// holds it until commit, so concurrent creations are serialized and a
    /// rolled-back insert gives its number back. The counter never trails the
    /// highest number already stored for the year.
    pub async fn requests_insert(
        &self,
        draft: &RequestDraft,
        year: i32,
        now: DateTime<Utc>,
    ) -> AppResult<MaintenanceRequest> {
        let mut tx = self.pool.begin().await?;

        let sequence: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO request_sequences (year, last_value)
            VALUES (
                $1,
                COALESCE((
                    SELECT MAX(CAST(split_part(request_number, '-', 3) AS INTEGER))
                    FROM maintenance_requests
                    WHERE request_number LIKE $2
                ), 0) + 1
            )
            ON CONFLICT (year) DO UPDATE
                SET last_value = GREATEST(request_sequences.last_value + 1, EXCLUDED.last_value)
            RETURNING last_value
            "#,
        )
        .bind(year)
        .bind(RequestNumber::year_pattern(year))
        .fetch_one(&mut *tx)
        .await?;

        let sequence = u32::try_from(sequence)
            .map_err(|_| AppError::Internal(format!("Negative request sequence {} for {}", sequence, year)))?;
        let number = RequestNumber::new(year, sequence)?;

        let row = sqlx::query_as::<_, RequestRow>(
            r#"
            INSERT INTO maintenance_requests (
                request_number, subject, description, equipment_id, work_center_id,
                request_type, priority, stage, team_id, assigned_to, created_by,
                scheduled_date, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING *
            "#,
        )
        .bind(number.to_string())
        .bind(&draft.subject)
        .bind(&draft.description)
        .bind(draft.target.equipment_id())
        .bind(draft.target.work_center_id())
        .bind(draft.request_type)
        .bind(draft.priority)
        .bind(Stage::New)
        .bind(draft.team_id)
        .bind(draft.assigned_to)
        .bind(draft.created_by)
        .bind(draft.scheduled_date)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.constraint() == Some(REQUEST_NUMBER_CONSTRAINT) => {
                AppError::SequenceConflict(format!("Request number {} is already taken", number))
            }
            other => other.into(),
        })?;

        tx.commit().await?;

        row.try_into()
    }

    /// Update the editable fields of a request. Absent fields are kept; the
    /// nullable ones can be set to NULL.
    pub async fn requests_update(
        &self,
        id: i32,
        changes: &RequestChanges,
        now: DateTime<Utc>,
    ) -> AppResult<MaintenanceRequest> {
        sqlx::query_as::<_, RequestRow>(
            r#"
            UPDATE maintenance_requests SET
                subject = COALESCE($1, subject),
                description = CASE WHEN $2 THEN $3 ELSE description END,
                request_type = COALESCE($4, request_type),
                priority = COALESCE($5, priority),
                team_id = CASE WHEN $6 THEN $7 ELSE team_id END,
                assigned_to = CASE WHEN $8 THEN $9 ELSE assigned_to END,
                scheduled_date = CASE WHEN $10 THEN $11 ELSE scheduled_date END,
                updated_at = $12
            WHERE id = $13
            RETURNING *
            "#,
        )
        .bind(&changes.subject)
        .bind(changes.description.is_some())
        .bind(changes.description.as_ref().and_then(|d| d.as_deref()))
        .bind(changes.request_type)
        .bind(changes.priority)
        .bind(changes.team_id.is_some())
        .bind(changes.team_id.flatten())
        .bind(changes.assigned_to.is_some())
        .bind(changes.assigned_to.flatten())
        .bind(changes.scheduled_date.is_some())
        .bind(changes.scheduled_date.flatten())
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))?
        .try_into()
    }

    /// Apply a stage transition and its cascade in one transaction
    pub async fn requests_change_stage(
        &self,
        id: i32,
        target: Stage,
        params: &StageParams,
        now: DateTime<Utc>,
    ) -> AppResult<StageChange> {
        let mut tx = self.pool.begin().await?;

        let current: MaintenanceRequest =
            sqlx::query_as::<_, RequestRow>("SELECT * FROM maintenance_requests WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))?
                .try_into()?;

        // Dropping `tx` on any error below rolls everything back
        let mut change = stage::plan_transition(&current, target, params, now)?;

        if change.request != current {
            let updated = &change.request;
            let stored: MaintenanceRequest = sqlx::query_as::<_, RequestRow>(
                r#"
                UPDATE maintenance_requests SET
                    stage = $1, started_at = $2, completed_at = $3,
                    duration_minutes = $4, resolution_notes = $5, updated_at = $6
                WHERE id = $7
                RETURNING *
                "#,
            )
            .bind(updated.stage)
            .bind(updated.started_at)
            .bind(updated.completed_at)
            .bind(updated.duration_minutes)
            .bind(&updated.resolution_notes)
            .bind(updated.updated_at)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
            .try_into()?;
            // Answer with what was stored, at the column's precision
            change.request = stored;
        }

        if let Some(Cascade::ScrapEquipment(equipment_id)) = change.cascade {
            let result = sqlx::query("UPDATE equipment SET status = $1, updated_at = $2 WHERE id = $3")
                .bind(EquipmentStatus::Scrapped)
                .bind(now)
                .bind(equipment_id)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::NotFound(format!(
                    "Equipment {} targeted by request {} not found",
                    equipment_id, current.request_number
                )));
            }
        }

        tx.commit().await?;

        Ok(change)
    }
}
