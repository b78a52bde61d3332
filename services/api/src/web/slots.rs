//! services/api/src/web/slots.rs
//!
//! Coach availability endpoints. Both act on the effective user, so an admin
//! impersonating a coach manages that coach's slots.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use coach_connect_core::{AuthContext, Slot, SlotQuery, SlotRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::extract::{ApiJson, ApiQuery};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlotRequest {
    /// RFC 3339 timestamp, e.g. `2025-03-10T10:00:00Z`.
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListSlotsParams {
    /// Calendar day, `YYYY-MM-DD`. Without it every slot is returned.
    pub date: Option<String>,
    /// IANA zone the day is interpreted in. Defaults to UTC.
    pub time_zone: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotResponse {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Slot> for SlotResponse {
    fn from(slot: Slot) -> Self {
        Self {
            id: slot.id,
            coach_id: slot.coach_id,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: slot.status.as_str().to_string(),
            created_at: slot.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SlotData {
    pub slot: SlotResponse,
}

#[derive(Serialize, ToSchema)]
pub struct CreatedSlotResponse {
    pub success: bool,
    pub message: String,
    pub data: SlotData,
}

#[derive(Serialize, ToSchema)]
pub struct SlotList {
    pub slots: Vec<SlotResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct SlotListResponse {
    pub success: bool,
    pub message: String,
    pub data: SlotList,
}

/// POST /api/slots - Publish an availability slot for the effective coach.
#[utoipa::path(
    post,
    path = "/api/slots",
    request_body = CreateSlotRequest,
    responses(
        (status = 201, description = "Slot created", body = CreatedSlotResponse),
        (status = 400, description = "Missing or invalid times", body = crate::error::ErrorBody),
        (status = 403, description = "Missing CSRF header or not a coach", body = crate::error::ErrorBody),
        (status = 409, description = "Overlaps an existing slot", body = crate::error::ErrorBody)
    ),
    params(("x-csrf-token" = String, Header, description = "Must equal the csrfToken cookie")),
    tag = "Slots"
)]
pub async fn create_slot_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateSlotRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(start_time), Some(end_time)) = (req.start_time, req.end_time) else {
        return Err(ApiError::bad_request("Start time and end time are required"));
    };
    let slot = state
        .slots
        .create(ctx.effective().user_id, SlotRequest { start_time, end_time })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedSlotResponse {
            success: true,
            message: "Slot successfully created".to_string(),
            data: SlotData { slot: slot.into() },
        }),
    ))
}

/// GET /api/slots - The effective coach's slots, optionally limited to one local day.
#[utoipa::path(
    get,
    path = "/api/slots",
    params(
        ListSlotsParams,
        ("x-csrf-token" = String, Header, description = "Must equal the csrfToken cookie")
    ),
    responses(
        (status = 200, description = "Slots ordered by start time", body = SlotListResponse),
        (status = 400, description = "Bad date or time zone", body = crate::error::ErrorBody)
    ),
    tag = "Slots"
)]
pub async fn list_slots_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    ApiQuery(params): ApiQuery<ListSlotsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let slots = state
        .slots
        .get_all(
            ctx.effective().user_id,
            SlotQuery {
                date: params.date,
                time_zone: params.time_zone,
            },
        )
        .await?;
    Ok(Json(SlotListResponse {
        success: true,
        message: "Success".to_string(),
        data: SlotList {
            slots: slots.into_iter().map(SlotResponse::from).collect(),
        },
    }))
}
