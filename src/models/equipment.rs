//! Equipment and work center models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::EquipmentStatus;

/// Equipment record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Equipment {
    pub id: i32,
    pub name: String,
    pub serial_number: String,
    pub category: String,
    pub department: Option<String>,
    pub location: String,
    /// Default maintenance team for requests on this equipment
    pub assigned_to_team: Option<i32>,
    /// Default technician for requests on this equipment
    pub default_technician: Option<i32>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_expiry: Option<NaiveDate>,
    pub status: EquipmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create equipment request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateEquipment {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub serial_number: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub department: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub location: String,
    pub assigned_to_team: Option<i32>,
    pub default_technician: Option<i32>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_expiry: Option<NaiveDate>,
    /// Status (active, under_maintenance, scrapped); defaults to active
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// Update equipment request (operator editor)
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipment {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    pub department: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub location: Option<String>,
    pub assigned_to_team: Option<i32>,
    pub default_technician: Option<i32>,
    pub warranty_expiry: Option<NaiveDate>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// Equipment fields after parsing, ready to persist
#[derive(Debug, Clone)]
pub struct NewEquipment {
    pub data: CreateEquipment,
    pub status: EquipmentStatus,
}

/// Parsed equipment update
#[derive(Debug, Clone, Default)]
pub struct EquipmentChanges {
    pub data: UpdateEquipment,
    pub status: Option<EquipmentStatus>,
}

/// Query parameters for listing equipment
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct EquipmentQuery {
    /// active, under_maintenance or scrapped
    pub status: Option<String>,
    pub category: Option<String>,
    pub department: Option<String>,
}

/// Parsed equipment listing filter; text fields match exactly
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquipmentFilter {
    pub status: Option<EquipmentStatus>,
    pub category: Option<String>,
    pub department: Option<String>,
}

impl EquipmentFilter {
    pub fn matches(&self, equipment: &Equipment) -> bool {
        self.status.map_or(true, |s| equipment.status == s)
            && self.category.as_ref().map_or(true, |c| &equipment.category == c)
            && self
                .department
                .as_ref()
                .map_or(true, |d| equipment.department.as_ref() == Some(d))
    }
}

/// Work center record. Work centers carry no lifecycle status in this server.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct WorkCenter {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
