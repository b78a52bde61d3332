//! services/api/src/web/users.rs
//!
//! Account endpoints: login and logout, invitation completion, user management and
//! admin impersonation.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use coach_connect_core::{AuthContext, NewUser, Role, UserView};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::cookies::{self, AUTH_COOKIE, CSRF_COOKIE, IMPERSONATION_COOKIE};
use crate::web::extract::{ApiJson, ApiPath};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePasswordRequest {
    pub token: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

/// Role names as they appear on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiRole {
    Admin,
    Coach,
    Student,
}

impl From<ApiRole> for Role {
    fn from(role: ApiRole) -> Self {
        match role {
            ApiRole::Admin => Role::Admin,
            ApiRole::Coach => Role::Coach,
            ApiRole::Student => Role::Student,
        }
    }
}

impl From<Role> for ApiRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => ApiRole::Admin,
            Role::Coach => ApiRole::Coach,
            Role::Student => ApiRole::Student,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: ApiRole,
}

/// A user as returned to clients. Never carries the password or invite hash.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: ApiRole,
    pub status: String,
    pub join_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<UserView> for UserResponse {
    fn from(user: UserView) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone_number: user.phone_number,
            role: user.role.into(),
            status: user.status.as_str().to_string(),
            join_date: user.join_date,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

#[derive(Serialize, ToSchema)]
pub struct UserData {
    pub user: UserResponse,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub csrf_token: String,
    pub data: UserData,
}

#[derive(Serialize, ToSchema)]
pub struct UserEnvelope {
    pub success: bool,
    pub message: String,
    pub data: UserData,
}

#[derive(Serialize, ToSchema)]
pub struct UserListResponse {
    pub success: bool,
    pub data: Vec<UserResponse>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUserData {
    pub user: UserResponse,
    pub invite_token: String,
}

#[derive(Serialize, ToSchema)]
pub struct CreatedUserResponse {
    pub success: bool,
    pub message: String,
    pub data: CreatedUserData,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeData {
    /// The effective user: the impersonated account while impersonating.
    pub user: UserResponse,
    /// The signed-in admin, present only while impersonating.
    pub admin_user: Option<UserResponse>,
    pub is_impersonating: bool,
    pub csrf_token: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub success: bool,
    pub data: MeData,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/users/login - Exchange credentials for a session.
///
/// Sets the `authToken` and `csrfToken` cookies; the CSRF token is also returned in
/// the body so the client can echo it in the `x-csrf-token` header.
#[utoipa::path(
    post,
    path = "/api/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing fields or inactive account", body = crate::error::ErrorBody),
        (status = 401, description = "Wrong credentials", body = crate::error::ErrorBody)
    ),
    tag = "Users"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(password)) = (required(req.email), required(req.password)) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    let outcome = state.credentials.login(&email, &password).await?;
    let ttl = state.tokens.session_ttl();
    let jar = jar
        .add(cookies::issue(&state.config, AUTH_COOKIE, outcome.tokens.session_token, ttl))
        .add(cookies::issue(
            &state.config,
            CSRF_COOKIE,
            outcome.tokens.csrf_token.clone(),
            ttl,
        ));

    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            message: "Login successful".to_string(),
            csrf_token: outcome.tokens.csrf_token,
            data: UserData {
                user: outcome.user.into(),
            },
        }),
    ))
}

/// POST /api/users/logout - Clear every session cookie.
#[utoipa::path(
    post,
    path = "/api/users/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse)),
    tag = "Users"
)]
pub async fn logout_handler(jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .add(cookies::clear(AUTH_COOKIE))
        .add(cookies::clear(CSRF_COOKIE))
        .add(cookies::clear(IMPERSONATION_COOKIE));
    (jar, MessageResponse::ok("Logged out successfully"))
}

/// POST /api/users/create-password - Complete an invitation.
#[utoipa::path(
    post,
    path = "/api/users/create-password",
    request_body = CreatePasswordRequest,
    responses(
        (status = 200, description = "Password created", body = MessageResponse),
        (status = 400, description = "Missing fields", body = crate::error::ErrorBody),
        (status = 401, description = "Unknown invite token", body = crate::error::ErrorBody),
        (status = 404, description = "Email does not match the invitation", body = crate::error::ErrorBody)
    ),
    tag = "Users"
)]
pub async fn create_password_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreatePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(token), Some(password), Some(email)) =
        (required(req.token), required(req.password), required(req.email))
    else {
        return Err(ApiError::bad_request("Token, password and email are required"));
    };
    state
        .credentials
        .create_password(&token, &password, &email)
        .await?;
    Ok(MessageResponse::ok("Password created successfully"))
}

/// POST /api/users - Invite a new user (admin only).
///
/// The invite token is returned once; only its hash is stored.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = CreatedUserResponse),
        (status = 400, description = "Invalid profile", body = crate::error::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::error::ErrorBody)
    ),
    tag = "Users"
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .credentials
        .create_user(NewUser {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            phone_number: req.phone_number,
            role: req.role.into(),
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            success: true,
            message: "User created successfully".to_string(),
            data: CreatedUserData {
                user: created.user.into(),
                invite_token: created.invite_token,
            },
        }),
    ))
}

/// GET /api/users - Every non-admin account.
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "Users", body = UserListResponse),
        (status = 401, description = "Not signed in", body = crate::error::ErrorBody)
    ),
    tag = "Users"
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.credentials.get_all().await?;
    Ok(Json(UserListResponse {
        success: true,
        data: users.into_iter().map(UserResponse::from).collect(),
    }))
}

/// GET /api/users/me - The signed-in user, resolved through any active impersonation.
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Not signed in", body = crate::error::ErrorBody)
    ),
    tag = "Users"
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let csrf_token = jar.get(CSRF_COOKIE).map(|c| c.value().to_string());
    let signed_in = state.credentials.get_one(ctx.user.user_id).await?;

    let data = match ctx.impersonated {
        Some(target) => MeData {
            user: state.credentials.get_one(target.user_id).await?.into(),
            admin_user: Some(signed_in.into()),
            is_impersonating: true,
            csrf_token,
        },
        None => MeData {
            user: signed_in.into(),
            admin_user: None,
            is_impersonating: false,
            csrf_token,
        },
    };
    Ok(Json(MeResponse {
        success: true,
        data,
    }))
}

/// GET /api/users/{id} - A single user (admin only).
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "The user's id")),
    responses(
        (status = 200, description = "User", body = UserEnvelope),
        (status = 404, description = "No such user", body = crate::error::ErrorBody)
    ),
    tag = "Users"
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.credentials.get_one(id).await?;
    Ok(Json(UserEnvelope {
        success: true,
        message: "Success".to_string(),
        data: UserData { user: user.into() },
    }))
}

/// POST /api/users/{id}/impersonate - Act as another, non-admin, user (admin only).
///
/// Sets the short-lived `impersonationToken` cookie; the admin's own session cookie
/// is left untouched.
#[utoipa::path(
    post,
    path = "/api/users/{id}/impersonate",
    params(("id" = Uuid, Path, description = "The user to impersonate")),
    responses(
        (status = 200, description = "Impersonation started", body = UserEnvelope),
        (status = 403, description = "Target is an admin", body = crate::error::ErrorBody),
        (status = 404, description = "No such user", body = crate::error::ErrorBody)
    ),
    tag = "Users"
)]
pub async fn impersonate_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    jar: CookieJar,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.credentials.impersonate(id).await?;
    info!(admin = %ctx.user.user_id, target = %id, "Impersonation started");
    let jar = jar.add(cookies::issue(
        &state.config,
        IMPERSONATION_COOKIE,
        outcome.token,
        state.tokens.impersonation_ttl(),
    ));
    Ok((
        jar,
        Json(UserEnvelope {
            success: true,
            message: "Impersonation started".to_string(),
            data: UserData {
                user: outcome.user.into(),
            },
        }),
    ))
}

/// POST /api/users/stop-impersonation - Drop the impersonation cookie.
#[utoipa::path(
    post,
    path = "/api/users/stop-impersonation",
    responses((status = 200, description = "Impersonation stopped", body = MessageResponse)),
    tag = "Users"
)]
pub async fn stop_impersonation_handler(
    Extension(ctx): Extension<AuthContext>,
    jar: CookieJar,
) -> impl IntoResponse {
    info!(admin = %ctx.user.user_id, "Impersonation stopped");
    (
        jar.add(cookies::clear(IMPERSONATION_COOKIE)),
        MessageResponse::ok("Impersonation stopped"),
    )
}
