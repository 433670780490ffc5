//! GearGuard maintenance server
//!
//! REST JSON API over the maintenance request lifecycle: request numbering,
//! assignment defaults, the stage state machine with its scrap cascade, and
//! the overdue flag. The board module holds the client side of optimistic
//! stage moves.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
