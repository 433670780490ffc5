//! In-memory store
//!
//! [`InMemoryStore`] implements [`MaintenanceStore`] behind one mutex. Holding
//! that mutex across each operation gives the same all-or-nothing guarantees
//! the Postgres transactions give: number allocation and insert happen
//! together, and a stage change and its cascade are applied together or not
//! at all.
//!
//! Not durable and single-process only.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::MaintenanceStore;
use crate::{
    error::{AppError, AppResult},
    lifecycle::{
        numbering::RequestNumber,
        stage::{self, Cascade, StageChange, StageParams},
    },
    models::{
        enums::{EquipmentStatus, Stage},
        equipment::{Equipment, EquipmentChanges, EquipmentFilter, NewEquipment, WorkCenter},
        request::{MaintenanceRequest, RequestChanges, RequestDraft, RequestFilter},
    },
};

#[derive(Debug, Default)]
struct State {
    equipment: BTreeMap<i32, Equipment>,
    work_centers: BTreeMap<i32, WorkCenter>,
    teams: HashSet<i32>,
    technicians: HashSet<i32>,
    requests: BTreeMap<i32, MaintenanceRequest>,
    /// Last allocated sequence per calendar year
    sequences: HashMap<i32, u32>,
    last_id: i32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn highest_stored_sequence(&self, year: i32) -> Option<u32> {
        self.requests
            .values()
            .map(|r| r.request_number)
            .filter(|n| n.year() == year)
            .map(|n| n.sequence())
            .max()
    }

    fn has_scrapped_request(&self, equipment_id: i32) -> bool {
        self.requests
            .values()
            .any(|r| r.stage == Stage::Scrap && r.target.equipment_id() == Some(equipment_id))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

fn poison_err<T>(_: PoisonError<T>) -> AppError {
    AppError::Internal("store lock poisoned".to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(poison_err)
    }

    /// Register a team known to the team-management service
    pub fn add_team(&self, id: i32) -> AppResult<()> {
        self.lock()?.teams.insert(id);
        Ok(())
    }

    /// Register a technician known to the authentication service
    pub fn add_technician(&self, id: i32) -> AppResult<()> {
        self.lock()?.technicians.insert(id);
        Ok(())
    }

    pub fn add_work_center(&self, name: &str, code: &str, now: DateTime<Utc>) -> AppResult<WorkCenter> {
        let mut state = self.lock()?;
        let work_center = WorkCenter {
            id: state.next_id(),
            name: name.to_string(),
            code: code.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.work_centers.insert(work_center.id, work_center.clone());
        Ok(work_center)
    }

    /// Drop an equipment record, as an external asset editor might
    pub fn remove_equipment(&self, id: i32) -> AppResult<Option<Equipment>> {
        Ok(self.lock()?.equipment.remove(&id))
    }

    pub fn request_count(&self) -> AppResult<usize> {
        Ok(self.lock()?.requests.len())
    }
}

#[async_trait]
impl MaintenanceStore for InMemoryStore {
    async fn ping(&self) -> AppResult<()> {
        self.lock().map(|_| ())
    }

    async fn list_equipment(&self, filter: &EquipmentFilter) -> AppResult<Vec<Equipment>> {
        let state = self.lock()?;
        let mut equipment: Vec<Equipment> = state
            .equipment
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        equipment.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(equipment)
    }

    async fn get_equipment(&self, id: i32) -> AppResult<Equipment> {
        self.lock()?
            .equipment
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    async fn create_equipment(&self, new: &NewEquipment, now: DateTime<Utc>) -> AppResult<Equipment> {
        let mut state = self.lock()?;
        let data = &new.data;

        if state.equipment.values().any(|e| e.serial_number == data.serial_number) {
            return Err(AppError::Conflict(format!(
                "Serial number {} already exists",
                data.serial_number
            )));
        }

        let equipment = Equipment {
            id: state.next_id(),
            name: data.name.clone(),
            serial_number: data.serial_number.clone(),
            category: data.category.clone(),
            department: data.department.clone(),
            location: data.location.clone(),
            assigned_to_team: data.assigned_to_team,
            default_technician: data.default_technician,
            purchase_date: data.purchase_date,
            warranty_expiry: data.warranty_expiry,
            status: new.status,
            notes: data.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        state.equipment.insert(equipment.id, equipment.clone());
        Ok(equipment)
    }

    async fn update_equipment(
        &self,
        id: i32,
        changes: &EquipmentChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Equipment> {
        let mut state = self.lock()?;

        let current_status = state
            .equipment
            .get(&id)
            .map(|e| e.status)
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;

        if let Some(status) = changes.status {
            if current_status == EquipmentStatus::Scrapped
                && status != EquipmentStatus::Scrapped
                && state.has_scrapped_request(id)
            {
                return Err(AppError::Conflict(format!(
                    "Equipment {} was scrapped by a maintenance request and cannot become {}",
                    id, status
                )));
            }
        }

        let equipment = state
            .equipment
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
        let data = &changes.data;

        if let Some(name) = &data.name {
            equipment.name = name.clone();
        }
        if let Some(category) = &data.category {
            equipment.category = category.clone();
        }
        if let Some(department) = &data.department {
            equipment.department = Some(department.clone());
        }
        if let Some(location) = &data.location {
            equipment.location = location.clone();
        }
        if let Some(team) = data.assigned_to_team {
            equipment.assigned_to_team = Some(team);
        }
        if let Some(technician) = data.default_technician {
            equipment.default_technician = Some(technician);
        }
        if let Some(expiry) = data.warranty_expiry {
            equipment.warranty_expiry = Some(expiry);
        }
        if let Some(status) = changes.status {
            equipment.status = status;
        }
        if let Some(notes) = &data.notes {
            equipment.notes = Some(notes.clone());
        }
        equipment.updated_at = now;

        Ok(equipment.clone())
    }

    async fn work_center_exists(&self, id: i32) -> AppResult<bool> {
        Ok(self.lock()?.work_centers.contains_key(&id))
    }

    async fn team_exists(&self, id: i32) -> AppResult<bool> {
        Ok(self.lock()?.teams.contains(&id))
    }

    async fn technician_exists(&self, id: i32) -> AppResult<bool> {
        Ok(self.lock()?.technicians.contains(&id))
    }

    async fn insert_request(
        &self,
        draft: &RequestDraft,
        year: i32,
        now: DateTime<Utc>,
    ) -> AppResult<MaintenanceRequest> {
        let mut state = self.lock()?;

        let counter = state.sequences.get(&year).copied();
        let stored = state.highest_stored_sequence(year);
        let last = counter
            .max(stored)
            .map(|sequence| RequestNumber::new(year, sequence))
            .transpose()?;
        let number = RequestNumber::next_after(last.as_ref(), year)?;

        if state.requests.values().any(|r| r.request_number == number) {
            return Err(AppError::SequenceConflict(format!(
                "Request number {} is already taken",
                number
            )));
        }

        let request = MaintenanceRequest {
            id: state.next_id(),
            request_number: number,
            subject: draft.subject.clone(),
            description: draft.description.clone(),
            target: draft.target,
            request_type: draft.request_type,
            priority: draft.priority,
            stage: Stage::New,
            team_id: draft.team_id,
            assigned_to: draft.assigned_to,
            created_by: draft.created_by,
            scheduled_date: draft.scheduled_date,
            started_at: None,
            completed_at: None,
            duration_minutes: None,
            resolution_notes: None,
            created_at: now,
            updated_at: now,
        };

        state.sequences.insert(year, number.sequence());
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_request(&self, id: i32) -> AppResult<MaintenanceRequest> {
        self.lock()?
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))
    }

    async fn list_requests(&self, filter: &RequestFilter) -> AppResult<Vec<MaintenanceRequest>> {
        let state = self.lock()?;
        let mut requests: Vec<MaintenanceRequest> = state
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn list_scheduled_requests(&self) -> AppResult<Vec<MaintenanceRequest>> {
        let state = self.lock()?;
        let mut requests: Vec<MaintenanceRequest> = state
            .requests
            .values()
            .filter(|r| r.scheduled_date.is_some())
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.scheduled_date.cmp(&b.scheduled_date).then(a.id.cmp(&b.id)));
        Ok(requests)
    }

    async fn update_request(
        &self,
        id: i32,
        changes: &RequestChanges,
        now: DateTime<Utc>,
    ) -> AppResult<MaintenanceRequest> {
        let mut state = self.lock()?;
        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))?;

        changes.apply_to(request);
        request.updated_at = now;
        Ok(request.clone())
    }

    async fn change_stage(
        &self,
        id: i32,
        target: Stage,
        params: &StageParams,
        now: DateTime<Utc>,
    ) -> AppResult<StageChange> {
        let mut state = self.lock()?;

        let current = state
            .requests
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))?;

        let change = stage::plan_transition(current, target, params, now)?;

        // Validate the cascade target before writing anything
        if let Some(Cascade::ScrapEquipment(equipment_id)) = change.cascade {
            if !state.equipment.contains_key(&equipment_id) {
                return Err(AppError::NotFound(format!(
                    "Equipment {} targeted by request {} not found",
                    equipment_id, change.request.request_number
                )));
            }
        }

        if let Some(Cascade::ScrapEquipment(equipment_id)) = change.cascade {
            if let Some(equipment) = state.equipment.get_mut(&equipment_id) {
                equipment.status = EquipmentStatus::Scrapped;
                equipment.updated_at = now;
            }
        }
        state.requests.insert(id, change.request.clone());

        Ok(change)
    }
}
