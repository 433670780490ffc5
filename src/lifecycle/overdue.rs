//! Overdue predicate

use chrono::{DateTime, Utc};

use crate::models::request::MaintenanceRequest;

/// A request is overdue when it is still open and its scheduled date has
/// passed. Terminal requests are never overdue.
pub fn is_overdue(request: &MaintenanceRequest, now: DateTime<Utc>) -> bool {
    match request.scheduled_date {
        None => false,
        Some(_) if request.stage.is_terminal() => false,
        Some(scheduled) => scheduled < now,
    }
}
