//! Equipment domain methods on Repository

use chrono::{DateTime, Utc};

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{EquipmentStatus, Stage},
        equipment::{Equipment, EquipmentChanges, EquipmentFilter, NewEquipment},
    },
};

impl Repository {
    /// List equipment matching the filter, by name
    pub async fn equipment_list(&self, filter: &EquipmentFilter) -> AppResult<Vec<Equipment>> {
        let rows = sqlx::query_as::<_, Equipment>(
            r#"
            SELECT * FROM equipment
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR category = $2)
              AND ($3::text IS NULL OR department = $3)
            ORDER BY name, id
            "#,
        )
        .bind(filter.status)
        .bind(&filter.category)
        .bind(&filter.department)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Get equipment by ID
    pub async fn equipment_get_by_id(&self, id: i32) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Create equipment
    pub async fn equipment_create(&self, new: &NewEquipment, now: DateTime<Utc>) -> AppResult<Equipment> {
        let data = &new.data;
        let row = sqlx::query_as::<_, Equipment>(
            r#"
            INSERT INTO equipment (
                name, serial_number, category, department, location,
                assigned_to_team, default_technician, purchase_date, warranty_expiry,
                status, notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.serial_number)
        .bind(&data.category)
        .bind(&data.department)
        .bind(&data.location)
        .bind(data.assigned_to_team)
        .bind(data.default_technician)
        .bind(data.purchase_date)
        .bind(data.warranty_expiry)
        .bind(new.status)
        .bind(&data.notes)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict(format!(
                "Serial number {} already exists",
                data.serial_number
            )),
            other => other.into(),
        })?;
        Ok(row)
    }

    /// Update equipment.
    ///
    /// The row is locked first so that a concurrent scrap cascade either
    /// commits before we look or waits for us; un-scrapping is refused while
    /// a scrapped request still targets the equipment.
    pub async fn equipment_update(
        &self,
        id: i32,
        changes: &EquipmentChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Equipment> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;

        if let Some(status) = changes.status {
            if current.status == EquipmentStatus::Scrapped && status != EquipmentStatus::Scrapped {
                let scrapped_by_request: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM maintenance_requests WHERE equipment_id = $1 AND stage = $2)",
                )
                .bind(id)
                .bind(Stage::Scrap)
                .fetch_one(&mut *tx)
                .await?;

                if scrapped_by_request {
                    return Err(AppError::Conflict(format!(
                        "Equipment {} was scrapped by a maintenance request and cannot become {}",
                        id, status
                    )));
                }
            }
        }

        let data = &changes.data;
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.name, "name");
        add_field!(data.category, "category");
        add_field!(data.department, "department");
        add_field!(data.location, "location");
        add_field!(data.assigned_to_team, "assigned_to_team");
        add_field!(data.default_technician, "default_technician");
        add_field!(data.warranty_expiry, "warranty_expiry");
        add_field!(changes.status, "status");
        add_field!(data.notes, "notes");

        let query = format!(
            "UPDATE equipment SET {} WHERE id = ${} RETURNING *",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_as::<_, Equipment>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.name);
        bind_field!(data.category);
        bind_field!(data.department);
        bind_field!(data.location);
        bind_field!(data.assigned_to_team);
        bind_field!(data.default_technician);
        bind_field!(data.warranty_expiry);
        bind_field!(changes.status);
        bind_field!(data.notes);

        let updated = builder.bind(id).fetch_one(&mut *tx).await?;
        tx.commit().await?;

        Ok(updated)
    }
}
