//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{equipment, health, requests};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "GearGuard API",
        version = "1.0.0",
        description = "Maintenance request lifecycle REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Requests
        requests::list_requests,
        requests::calendar_requests,
        requests::get_request,
        requests::create_request,
        requests::update_request,
        requests::change_stage,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        equipment::get_equipment_defaults,
        equipment::get_equipment_requests,
    ),
    components(
        schemas(
            // Requests
            crate::models::request::RequestDetails,
            crate::models::request::CreateRequest,
            crate::models::request::UpdateRequest,
            crate::models::request::RequestQuery,
            requests::ChangeStageRequest,
            requests::StageChangeResponse,
            crate::models::enums::RequestType,
            crate::models::enums::Priority,
            crate::models::enums::Stage,
            // Equipment
            crate::models::equipment::Equipment,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::UpdateEquipment,
            crate::models::equipment::EquipmentQuery,
            crate::models::enums::EquipmentStatus,
            crate::lifecycle::AssignmentDefaults,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "requests", description = "Maintenance request lifecycle"),
        (name = "equipment", description = "Equipment and assignment defaults")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
