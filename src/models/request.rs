//! Maintenance request model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{Priority, RequestType, Stage};
use crate::{
    error::{AppError, AppResult},
    lifecycle::numbering::RequestNumber,
};

/// What a request targets: exactly one piece of equipment or one work center
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestTarget {
    Equipment(i32),
    WorkCenter(i32),
}

impl RequestTarget {
    /// Build a target from the two optional ids, rejecting both and neither
    pub fn from_ids(equipment_id: Option<i32>, work_center_id: Option<i32>) -> AppResult<Self> {
        match (equipment_id, work_center_id) {
            (Some(id), None) => Ok(RequestTarget::Equipment(id)),
            (None, Some(id)) => Ok(RequestTarget::WorkCenter(id)),
            (Some(_), Some(_)) => Err(AppError::InvalidTarget(
                "A request targets either equipment or a work center, not both".to_string(),
            )),
            (None, None) => Err(AppError::InvalidTarget(
                "Either equipment or a work center is required".to_string(),
            )),
        }
    }

    pub fn equipment_id(&self) -> Option<i32> {
        match self {
            RequestTarget::Equipment(id) => Some(*id),
            RequestTarget::WorkCenter(_) => None,
        }
    }

    pub fn work_center_id(&self) -> Option<i32> {
        match self {
            RequestTarget::WorkCenter(id) => Some(*id),
            RequestTarget::Equipment(_) => None,
        }
    }
}

/// Maintenance request as held by the lifecycle engine
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceRequest {
    pub id: i32,
    pub request_number: RequestNumber,
    pub subject: String,
    pub description: Option<String>,
    pub target: RequestTarget,
    pub request_type: RequestType,
    pub priority: Priority,
    pub stage: Stage,
    pub team_id: Option<i32>,
    pub assigned_to: Option<i32>,
    pub created_by: Option<i32>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request as returned by every read path, with the derived overdue flag
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequestDetails {
    pub id: i32,
    /// REQ-<year>-<sequence>
    pub request_number: String,
    pub subject: String,
    pub description: Option<String>,
    pub equipment_id: Option<i32>,
    pub work_center_id: Option<i32>,
    pub request_type: RequestType,
    pub priority: Priority,
    pub stage: Stage,
    pub team_id: Option<i32>,
    pub assigned_to: Option<i32>,
    pub created_by: Option<i32>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Computed at read time, never stored
    pub is_overdue: bool,
}

impl RequestDetails {
    pub fn new(request: MaintenanceRequest, is_overdue: bool) -> Self {
        Self {
            id: request.id,
            request_number: request.request_number.to_string(),
            subject: request.subject,
            description: request.description,
            equipment_id: request.target.equipment_id(),
            work_center_id: request.target.work_center_id(),
            request_type: request.request_type,
            priority: request.priority,
            stage: request.stage,
            team_id: request.team_id,
            assigned_to: request.assigned_to,
            created_by: request.created_by,
            scheduled_date: request.scheduled_date,
            started_at: request.started_at,
            completed_at: request.completed_at,
            duration_minutes: request.duration_minutes,
            resolution_notes: request.resolution_notes,
            created_at: request.created_at,
            updated_at: request.updated_at,
            is_overdue,
        }
    }
}

/// Create maintenance request body
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRequest {
    #[validate(length(min = 1, max = 255, message = "Subject must be 1 to 255 characters"))]
    pub subject: String,
    pub description: Option<String>,
    pub equipment_id: Option<i32>,
    pub work_center_id: Option<i32>,
    /// corrective or preventive
    pub request_type: String,
    /// low, medium, high or critical (default medium)
    pub priority: Option<String>,
    /// Overrides the equipment's default team
    pub team_id: Option<i32>,
    /// Overrides the equipment's default technician
    pub assigned_to: Option<i32>,
    pub scheduled_date: Option<DateTime<Utc>>,
}

/// A validated request ready to be numbered and inserted
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDraft {
    pub subject: String,
    pub description: Option<String>,
    pub target: RequestTarget,
    pub request_type: RequestType,
    pub priority: Priority,
    pub team_id: Option<i32>,
    pub assigned_to: Option<i32>,
    pub created_by: Option<i32>,
    pub scheduled_date: Option<DateTime<Utc>>,
}

/// Update maintenance request body. Stage, number, target and lifecycle
/// timestamps are not editable here.
///
/// Omitted fields are kept. The nullable fields are cleared by an explicit
/// `null`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateRequest {
    #[validate(length(min = 1, max = 255, message = "Subject must be 1 to 255 characters"))]
    pub subject: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub request_type: Option<String>,
    pub priority: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<i32>)]
    pub team_id: Option<Option<i32>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<i32>)]
    pub assigned_to: Option<Option<i32>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub scheduled_date: Option<Option<DateTime<Utc>>>,
}

/// Parsed form of [`UpdateRequest`]. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestChanges {
    pub subject: Option<String>,
    pub description: Option<Option<String>>,
    pub request_type: Option<RequestType>,
    pub priority: Option<Priority>,
    pub team_id: Option<Option<i32>>,
    pub assigned_to: Option<Option<i32>>,
    pub scheduled_date: Option<Option<DateTime<Utc>>>,
}

impl RequestChanges {
    pub fn apply_to(&self, request: &mut MaintenanceRequest) {
        if let Some(subject) = &self.subject {
            request.subject = subject.clone();
        }
        if let Some(description) = &self.description {
            request.description = description.clone();
        }
        if let Some(request_type) = self.request_type {
            request.request_type = request_type;
        }
        if let Some(priority) = self.priority {
            request.priority = priority;
        }
        if let Some(team_id) = self.team_id {
            request.team_id = team_id;
        }
        if let Some(assigned_to) = self.assigned_to {
            request.assigned_to = assigned_to;
        }
        if let Some(scheduled_date) = self.scheduled_date {
            request.scheduled_date = scheduled_date;
        }
    }
}

/// Query parameters for listing requests
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct RequestQuery {
    pub stage: Option<String>,
    pub request_type: Option<String>,
    pub team_id: Option<i32>,
    pub priority: Option<String>,
    pub equipment_id: Option<i32>,
    pub work_center_id: Option<i32>,
}

/// Parsed listing filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFilter {
    pub stage: Option<Stage>,
    pub request_type: Option<RequestType>,
    pub team_id: Option<i32>,
    pub priority: Option<Priority>,
    pub equipment_id: Option<i32>,
    pub work_center_id: Option<i32>,
}

impl RequestFilter {
    pub fn matches(&self, request: &MaintenanceRequest) -> bool {
        self.stage.map_or(true, |s| request.stage == s)
            && self.request_type.map_or(true, |t| request.request_type == t)
            && self.team_id.map_or(true, |t| request.team_id == Some(t))
            && self.priority.map_or(true, |p| request.priority == p)
            && self.equipment_id.map_or(true, |e| request.target.equipment_id() == Some(e))
            && self.work_center_id.map_or(true, |w| request.target.work_center_id() == Some(w))
    }
}
