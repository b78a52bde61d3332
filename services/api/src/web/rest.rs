//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification, plus the handlers that
//! belong to no resource: the health check and the unknown-route fallback.

use axum::{http::StatusCode, http::Uri, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::error::ErrorBody;
use crate::web::{slots, users};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        users::login_handler,
        users::logout_handler,
        users::create_password_handler,
        users::create_user_handler,
        users::list_users_handler,
        users::me_handler,
        users::get_user_handler,
        users::impersonate_handler,
        users::stop_impersonation_handler,
        slots::create_slot_handler,
        slots::list_slots_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorBody,
            users::LoginRequest,
            users::CreatePasswordRequest,
            users::CreateUserRequest,
            users::ApiRole,
            users::UserResponse,
            users::MessageResponse,
            users::LoginResponse,
            users::UserEnvelope,
            users::UserListResponse,
            users::CreatedUserResponse,
            users::MeResponse,
            slots::CreateSlotRequest,
            slots::SlotResponse,
            slots::CreatedSlotResponse,
            slots::SlotListResponse,
        )
    ),
    tags(
        (name = "Users", description = "Sessions, invitations and impersonation."),
        (name = "Slots", description = "Coach availability.")
    )
)]
pub struct ApiDoc;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn not_found_handler(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::new(
            format!("Route {} not found", uri.path()),
            "ROUTE_NOT_FOUND",
            true,
        )),
    )
}
