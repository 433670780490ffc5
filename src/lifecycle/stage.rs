//! Lifecycle state machine for maintenance requests
//!
//! ```text
//! new ──► in_progress ──► repaired
//!  │           │
//!  └───────────┴────────► scrap
//! ```
//!
//! `repaired` and `scrap` are terminal. Entering `scrap` on an equipment
//! request yields a cascade that the store must apply in the same
//! transaction as the stage write.

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{enums::Stage, request::MaintenanceRequest},
};

/// Optional parameters carried by a stage change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageParams {
    pub duration_minutes: Option<i32>,
    pub resolution_notes: Option<String>,
}

/// Side effect on the targeted asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cascade {
    ScrapEquipment(i32),
}

/// Result of planning a transition: the updated request and the cascade to
/// apply with it.
#[derive(Debug, Clone, PartialEq)]
pub struct StageChange {
    pub request: MaintenanceRequest,
    pub previous: Stage,
    pub cascade: Option<Cascade>,
}

impl StageChange {
    pub fn is_noop(&self) -> bool {
        self.previous == self.request.stage && self.cascade.is_none()
    }
}

/// Whether `from -> to` is a legal move. Same-stage moves are always legal.
pub fn can_transition(from: Stage, to: Stage) -> bool {
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (Stage::New, Stage::InProgress)
            | (Stage::InProgress, Stage::Repaired)
            | (Stage::New, Stage::Scrap)
            | (Stage::InProgress, Stage::Scrap)
    )
}

/// Parse a caller-supplied stage name
pub fn parse_stage(value: &str) -> AppResult<Stage> {
    value.parse().map_err(AppError::InvalidStage)
}

/// Compute the request after entering `target`.
///
/// Pure: the input request is not modified and nothing is persisted. On error
/// the caller must leave state untouched.
pub fn plan_transition(
    request: &MaintenanceRequest,
    target: Stage,
    params: &StageParams,
    now: DateTime<Utc>,
) -> AppResult<StageChange> {
    let previous = request.stage;

    if !can_transition(previous, target) {
        return Err(AppError::InvalidStage(format!(
            "Request {} cannot move from {} to {}",
            request.request_number, previous, target
        )));
    }

    if let Some(minutes) = params.duration_minutes {
        if minutes < 0 {
            return Err(AppError::Validation(
                "duration_minutes must not be negative".to_string(),
            ));
        }
    }

    let mut updated = request.clone();
    updated.stage = target;
    let mut cascade = None;

    match target {
        Stage::New => {}
        Stage::InProgress => {
            if updated.started_at.is_none() {
                updated.started_at = Some(now);
            }
        }
        Stage::Repaired => {
            if updated.completed_at.is_none() {
                updated.completed_at = Some(now);
            }
            if params.duration_minutes.is_some() {
                updated.duration_minutes = params.duration_minutes;
            }
            if params.resolution_notes.is_some() {
                updated.resolution_notes = params.resolution_notes.clone();
            }
        }
        Stage::Scrap => {
            cascade = request.target.equipment_id().map(Cascade::ScrapEquipment);
        }
    }

    if updated != *request {
        updated.updated_at = now;
    }

    Ok(StageChange {
        request: updated,
        previous,
        cascade,
    })
}
