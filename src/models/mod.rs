//! Data models for GearGuard

pub mod enums;
pub mod equipment;
pub mod request;
pub mod user;

// Re-export commonly used types
pub use enums::{EquipmentStatus, Priority, RequestType, Stage};
pub use equipment::{Equipment, WorkCenter};
pub use request::{MaintenanceRequest, RequestDetails, RequestTarget};
pub use user::UserClaims;
