//! Maintenance request endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    lifecycle::StageParams,
    models::{
        enums::Stage,
        request::{CreateRequest, RequestDetails, RequestQuery, UpdateRequest},
    },
};

use super::AuthenticatedUser;

/// Stage change request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeStageRequest {
    /// new, in_progress, repaired or scrap
    pub stage: String,
    /// Time spent, recorded when moving to repaired
    pub duration_minutes: Option<i32>,
    /// Recorded when moving to repaired
    pub resolution_notes: Option<String>,
}

/// Stage change response
#[derive(Serialize, ToSchema)]
pub struct StageChangeResponse {
    pub request: RequestDetails,
    /// Status message
    pub message: String,
}

/// List maintenance requests
#[utoipa::path(
    get,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(RequestQuery),
    responses(
        (status = 200, description = "Requests, newest first", body = Vec<RequestDetails>),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_requests(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<RequestQuery>,
) -> AppResult<Json<Vec<RequestDetails>>> {
    let requests = state.services.requests.list(query).await?;
    Ok(Json(requests))
}

/// Scheduled requests for the calendar view
#[utoipa::path(
    get,
    path = "/requests/calendar",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Requests with a scheduled date, soonest first", body = Vec<RequestDetails>)
    )
)]
pub async fn calendar_requests(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<RequestDetails>>> {
    let requests = state.services.requests.calendar().await?;
    Ok(Json(requests))
}

/// Get maintenance request by ID
#[utoipa::path(
    get,
    path = "/requests/{id}",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Request details", body = RequestDetails),
        (status = 404, description = "Request not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<RequestDetails>> {
    let request = state.services.requests.get(id).await?;
    Ok(Json(request))
}

/// Create a maintenance request
#[utoipa::path(
    post,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    request_body = CreateRequest,
    responses(
        (status = 201, description = "Request created", body = RequestDetails),
        (status = 400, description = "Invalid target or input", body = crate::error::ErrorResponse),
        (status = 404, description = "Equipment, work center, team or technician not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Request number conflict", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateRequest>,
) -> AppResult<(StatusCode, Json<RequestDetails>)> {
    let request = state.services.requests.create(data, Some(claims.user_id)).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Update descriptive fields of a request
#[utoipa::path(
    put,
    path = "/requests/{id}",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Request ID")
    ),
    request_body = UpdateRequest,
    responses(
        (status = 200, description = "Request updated", body = RequestDetails),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateRequest>,
) -> AppResult<Json<RequestDetails>> {
    let request = state.services.requests.update(id, data).await?;
    Ok(Json(request))
}

/// Move a request to another stage
#[utoipa::path(
    patch,
    path = "/requests/{id}/stage",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Request ID")
    ),
    request_body = ChangeStageRequest,
    responses(
        (status = 200, description = "Stage changed", body = StageChangeResponse),
        (status = 400, description = "Invalid stage or transition", body = crate::error::ErrorResponse),
        (status = 404, description = "Request or targeted equipment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn change_stage(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(body): Json<ChangeStageRequest>,
) -> AppResult<Json<StageChangeResponse>> {
    let params = StageParams {
        duration_minutes: body.duration_minutes,
        resolution_notes: body.resolution_notes,
    };

    let changed = state.services.requests.change_stage(id, &body.stage, params).await?;
    tracing::debug!(request_id = id, user_id = claims.user_id, from = %changed.previous, "Stage change applied");

    let message = if changed.request.stage == Stage::Scrap {
        "Request scrapped and equipment marked as scrapped"
    } else {
        "Stage updated successfully"
    };

    Ok(Json(StageChangeResponse {
        request: changed.request,
        message: message.to_string(),
    }))
}
