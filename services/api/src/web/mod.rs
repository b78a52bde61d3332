pub mod cookies;
pub mod extract;
pub mod middleware;
pub mod rest;
pub mod slots;
pub mod state;
pub mod users;

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use coach_connect_core::AccessPolicy;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::web::cookies::CSRF_HEADER;
use crate::web::middleware::{authorize, Guard};
use crate::web::rest::{health_handler, not_found_handler};
use crate::web::slots::{create_slot_handler, list_slots_handler};
use crate::web::state::AppState;
use crate::web::users::{
    create_password_handler, create_user_handler, get_user_handler, impersonate_handler,
    list_users_handler, login_handler, logout_handler, me_handler, stop_impersonation_handler,
};

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, HeaderName::from_static(CSRF_HEADER)])
}

/// Builds the API router. Each protected route runs the authorization chain of
/// its policy before the handler.
pub fn router(state: Arc<AppState>) -> Router {
    let session = Guard::new(&state, AccessPolicy::session());
    let admin = Guard::new(&state, AccessPolicy::admin());
    let admin_action = Guard::new(&state, AccessPolicy::admin_action());
    let coach = Guard::new(&state, AccessPolicy::coach_workspace());
    let cors = cors_layer(&state);

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/users/login", post(login_handler))
        .route("/api/users/logout", post(logout_handler))
        .route("/api/users/create-password", post(create_password_handler))
        .route(
            "/api/users",
            get(list_users_handler)
                .route_layer(from_fn_with_state(session.clone(), authorize))
                .merge(
                    post(create_user_handler)
                        .route_layer(from_fn_with_state(admin_action.clone(), authorize)),
                ),
        )
        .route(
            "/api/users/me",
            get(me_handler).route_layer(from_fn_with_state(session, authorize)),
        )
        // Admin-only and without impersonation, so an expired impersonation cookie
        // can still be dropped.
        .route(
            "/api/users/stop-impersonation",
            post(stop_impersonation_handler)
                .route_layer(from_fn_with_state(admin_action.clone(), authorize)),
        )
        .route(
            "/api/users/{id}",
            get(get_user_handler).route_layer(from_fn_with_state(admin, authorize)),
        )
        .route(
            "/api/users/{id}/impersonate",
            post(impersonate_handler).route_layer(from_fn_with_state(admin_action, authorize)),
        )
        .route(
            "/api/slots",
            post(create_slot_handler)
                .get(list_slots_handler)
                .route_layer(from_fn_with_state(coach, authorize)),
        )
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
