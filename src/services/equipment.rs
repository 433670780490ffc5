//! Equipment service (operator-facing asset editor)

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    lifecycle::Clock,
    models::{
        enums::EquipmentStatus,
        equipment::{
            CreateEquipment, Equipment, EquipmentChanges, EquipmentFilter, EquipmentQuery, NewEquipment,
            UpdateEquipment,
        },
    },
    repository::MaintenanceStore,
};

#[derive(Clone)]
pub struct EquipmentService {
    store: Arc<dyn MaintenanceStore>,
    clock: Arc<dyn Clock>,
}

fn parse_status(value: &str) -> AppResult<EquipmentStatus> {
    value.parse().map_err(AppError::Validation)
}

impl EquipmentService {
    pub fn new(store: Arc<dyn MaintenanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn list(&self, query: EquipmentQuery) -> AppResult<Vec<Equipment>> {
        let filter = EquipmentFilter {
            status: query.status.as_deref().map(parse_status).transpose()?,
            category: query.category,
            department: query.department,
        };
        self.store.list_equipment(&filter).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Equipment> {
        self.store.get_equipment(id).await
    }

    pub async fn create(&self, data: CreateEquipment) -> AppResult<Equipment> {
        data.validate()?;
        let status = data
            .status
            .as_deref()
            .map(parse_status)
            .transpose()?
            .unwrap_or_default();

        self.check_defaults(data.assigned_to_team, data.default_technician).await?;

        let equipment = self
            .store
            .create_equipment(&NewEquipment { data, status }, self.clock.now())
            .await?;

        tracing::info!(equipment_id = equipment.id, serial = %equipment.serial_number, "Equipment created");
        Ok(equipment)
    }

    pub async fn update(&self, id: i32, data: UpdateEquipment) -> AppResult<Equipment> {
        data.validate()?;
        let status = data.status.as_deref().map(parse_status).transpose()?;

        self.check_defaults(data.assigned_to_team, data.default_technician).await?;

        let equipment = self
            .store
            .update_equipment(id, &EquipmentChanges { data, status }, self.clock.now())
            .await?;

        if let Some(status) = status {
            tracing::info!(equipment_id = id, %status, "Equipment status set by operator");
        }
        Ok(equipment)
    }

    async fn check_defaults(&self, team_id: Option<i32>, technician_id: Option<i32>) -> AppResult<()> {
        if let Some(team_id) = team_id {
            if !self.store.team_exists(team_id).await? {
                return Err(AppError::NotFound(format!("Team {} not found", team_id)));
            }
        }
        if let Some(technician_id) = technician_id {
            if !self.store.technician_exists(technician_id).await? {
                return Err(AppError::NotFound(format!("Technician {} not found", technician_id)));
            }
        }
        Ok(())
    }
}
