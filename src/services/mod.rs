//! Business logic services

pub mod equipment;
pub mod requests;

use std::sync::Arc;

use crate::{error::AppResult, lifecycle::Clock, repository::MaintenanceStore};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub equipment: equipment::EquipmentService,
    pub requests: requests::RequestsService,
    store: Arc<dyn MaintenanceStore>,
}

impl Services {
    /// Create all services over the given store and clock
    pub fn new(store: Arc<dyn MaintenanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            equipment: equipment::EquipmentService::new(store.clone(), clock.clone()),
            requests: requests::RequestsService::new(store.clone(), clock),
            store,
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
