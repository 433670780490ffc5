//! Default team / technician resolution from the targeted equipment

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::equipment::Equipment;

/// Assignment hints taken from an equipment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AssignmentDefaults {
    pub team_id: Option<i32>,
    pub technician_id: Option<i32>,
    pub category: String,
    pub location: String,
}

impl From<&Equipment> for AssignmentDefaults {
    fn from(equipment: &Equipment) -> Self {
        Self {
            team_id: equipment.assigned_to_team,
            technician_id: equipment.default_technician,
            category: equipment.category.clone(),
            location: equipment.location.clone(),
        }
    }
}

/// Team and technician a request ends up with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Assignment {
    pub team_id: Option<i32>,
    pub assigned_to: Option<i32>,
}

impl Assignment {
    /// Explicit values win; defaults only fill what the caller left unset.
    pub fn resolve(explicit: Assignment, defaults: Option<&AssignmentDefaults>) -> Self {
        let Some(defaults) = defaults else {
            return explicit;
        };
        Self {
            team_id: explicit.team_id.or(defaults.team_id),
            assigned_to: explicit.assigned_to.or(defaults.technician_id),
        }
    }
}
