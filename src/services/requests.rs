//! Maintenance request lifecycle service
//!
//! Composes the lifecycle rules with the store: creation (numbering plus
//! assignment defaults), stage changes with their cascade, and the read paths
//! that attach the overdue flag.

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    lifecycle::{
        is_overdue,
        stage::{self, Cascade, StageParams},
        Assignment, AssignmentDefaults, Clock,
    },
    models::{
        enums::{Priority, RequestType, Stage},
        request::{
            CreateRequest, MaintenanceRequest, RequestChanges, RequestDetails, RequestDraft,
            RequestFilter, RequestQuery, RequestTarget, UpdateRequest,
        },
    },
    repository::MaintenanceStore,
};

/// Outcome of a stage change
#[derive(Debug, Clone)]
pub struct StageChanged {
    pub request: RequestDetails,
    pub previous: Stage,
    /// Equipment forced to `scrapped` by this change
    pub scrapped_equipment: Option<i32>,
}

#[derive(Clone)]
pub struct RequestsService {
    store: Arc<dyn MaintenanceStore>,
    clock: Arc<dyn Clock>,
}

fn parse_request_type(value: &str) -> AppResult<RequestType> {
    value.parse().map_err(AppError::Validation)
}

fn parse_priority(value: &str) -> AppResult<Priority> {
    value.parse().map_err(AppError::Validation)
}

impl RequestsService {
    pub fn new(store: Arc<dyn MaintenanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Overdue flag as of now; recomputed on every read
    pub fn compute_overdue(&self, request: &MaintenanceRequest) -> bool {
        is_overdue(request, self.clock.now())
    }

    fn details(&self, request: MaintenanceRequest) -> RequestDetails {
        let overdue = self.compute_overdue(&request);
        RequestDetails::new(request, overdue)
    }

    /// Assignment hints for an equipment. Read-only.
    pub async fn resolve_defaults(&self, equipment_id: i32) -> AppResult<AssignmentDefaults> {
        let equipment = self.store.get_equipment(equipment_id).await?;
        Ok(AssignmentDefaults::from(&equipment))
    }

    /// Create a request in stage `new`
    pub async fn create(&self, data: CreateRequest, created_by: Option<i32>) -> AppResult<RequestDetails> {
        data.validate()?;

        let target = RequestTarget::from_ids(data.equipment_id, data.work_center_id)?;
        let request_type = parse_request_type(&data.request_type)?;
        let priority = data
            .priority
            .as_deref()
            .map(parse_priority)
            .transpose()?
            .unwrap_or_default();

        let defaults = match target {
            RequestTarget::Equipment(id) => Some(self.resolve_defaults(id).await?),
            RequestTarget::WorkCenter(id) => {
                if !self.store.work_center_exists(id).await? {
                    return Err(AppError::NotFound(format!("Work center {} not found", id)));
                }
                None
            }
        };

        let explicit = Assignment {
            team_id: data.team_id,
            assigned_to: data.assigned_to,
        };
        self.check_assignment(explicit).await?;
        let assignment = Assignment::resolve(explicit, defaults.as_ref());

        let draft = RequestDraft {
            subject: data.subject,
            description: data.description,
            target,
            request_type,
            priority,
            team_id: assignment.team_id,
            assigned_to: assignment.assigned_to,
            created_by,
            scheduled_date: data.scheduled_date,
        };

        let request = self.insert_numbered(&draft).await?;

        tracing::info!(
            request_id = request.id,
            request_number = %request.request_number,
            team_id = ?request.team_id,
            assigned_to = ?request.assigned_to,
            "Maintenance request created"
        );

        Ok(self.details(request))
    }

    /// Insert with one retry when the allocated number turns out to be taken
    async fn insert_numbered(&self, draft: &RequestDraft) -> AppResult<MaintenanceRequest> {
        let now = self.clock.now();
        let year = self.clock.year();

        match self.store.insert_request(draft, year, now).await {
            Err(AppError::SequenceConflict(msg)) => {
                tracing::warn!("{}; allocating again", msg);
                self.store.insert_request(draft, year, now).await
            }
            other => other,
        }
    }

    async fn check_assignment(&self, explicit: Assignment) -> AppResult<()> {
        if let Some(team_id) = explicit.team_id {
            if !self.store.team_exists(team_id).await? {
                return Err(AppError::NotFound(format!("Team {} not found", team_id)));
            }
        }
        if let Some(technician_id) = explicit.assigned_to {
            if !self.store.technician_exists(technician_id).await? {
                return Err(AppError::NotFound(format!("Technician {} not found", technician_id)));
            }
        }
        Ok(())
    }

    pub async fn get(&self, id: i32) -> AppResult<RequestDetails> {
        let request = self.store.get_request(id).await?;
        Ok(self.details(request))
    }

    pub async fn list(&self, query: RequestQuery) -> AppResult<Vec<RequestDetails>> {
        let filter = RequestFilter {
            stage: query.stage.as_deref().map(stage::parse_stage).transpose()?,
            request_type: query.request_type.as_deref().map(parse_request_type).transpose()?,
            team_id: query.team_id,
            priority: query.priority.as_deref().map(parse_priority).transpose()?,
            equipment_id: query.equipment_id,
            work_center_id: query.work_center_id,
        };

        let requests = self.store.list_requests(&filter).await?;
        Ok(requests.into_iter().map(|r| self.details(r)).collect())
    }

    /// Open requests on one equipment, newest first
    pub async fn open_for_equipment(&self, equipment_id: i32) -> AppResult<Vec<RequestDetails>> {
        self.store.get_equipment(equipment_id).await?;

        let filter = RequestFilter {
            equipment_id: Some(equipment_id),
            ..Default::default()
        };
        let requests = self.store.list_requests(&filter).await?;
        Ok(requests
            .into_iter()
            .filter(|r| !r.stage.is_terminal())
            .map(|r| self.details(r))
            .collect())
    }

    /// Requests with a scheduled date, soonest first
    pub async fn calendar(&self) -> AppResult<Vec<RequestDetails>> {
        let requests = self.store.list_scheduled_requests().await?;
        Ok(requests.into_iter().map(|r| self.details(r)).collect())
    }

    /// Edit descriptive fields; stage changes go through [`Self::change_stage`]
    pub async fn update(&self, id: i32, data: UpdateRequest) -> AppResult<RequestDetails> {
        data.validate()?;

        let changes = RequestChanges {
            subject: data.subject,
            description: data.description,
            request_type: data.request_type.as_deref().map(parse_request_type).transpose()?,
            priority: data.priority.as_deref().map(parse_priority).transpose()?,
            team_id: data.team_id,
            assigned_to: data.assigned_to,
            scheduled_date: data.scheduled_date,
        };
        self.check_assignment(Assignment {
            team_id: changes.team_id.flatten(),
            assigned_to: changes.assigned_to.flatten(),
        })
        .await?;

        let request = self.store.update_request(id, &changes, self.clock.now()).await?;
        Ok(self.details(request))
    }

    /// Move a request to `stage`, applying the asset cascade atomically
    pub async fn change_stage(&self, id: i32, stage: &str, params: StageParams) -> AppResult<StageChanged> {
        let target = stage::parse_stage(stage)?;
        let change = self.store.change_stage(id, target, &params, self.clock.now()).await?;

        let scrapped_equipment = match change.cascade {
            Some(Cascade::ScrapEquipment(equipment_id)) => {
                tracing::info!(
                    request_number = %change.request.request_number,
                    equipment_id,
                    "Equipment automatically marked as scrapped"
                );
                Some(equipment_id)
            }
            None => None,
        };

        if change.previous != change.request.stage {
            tracing::info!(
                request_number = %change.request.request_number,
                from = %change.previous,
                to = %change.request.stage,
                "Stage changed"
            );
        }

        Ok(StageChanged {
            previous: change.previous,
            request: self.details(change.request),
            scrapped_equipment,
        })
    }
}
