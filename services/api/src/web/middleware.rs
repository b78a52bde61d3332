//! services/api/src/web/middleware.rs
//!
//! Runs the authorization chain in front of protected routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use coach_connect_core::{AccessPolicy, RequestCredentials};
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::web::cookies::{AUTH_COOKIE, CSRF_COOKIE, CSRF_HEADER, IMPERSONATION_COOKIE};
use crate::web::state::AppState;

/// Middleware state: the shared app state plus the policy of the guarded routes.
#[derive(Clone)]
pub struct Guard {
    state: Arc<AppState>,
    policy: AccessPolicy,
}

impl Guard {
    pub fn new(state: &Arc<AppState>, policy: AccessPolicy) -> Self {
        Self {
            state: state.clone(),
            policy,
        }
    }
}

/// Middleware that evaluates the route's `AccessPolicy` against the request cookies
/// and the CSRF header.
///
/// On success the resulting `AuthContext` is inserted into request extensions for
/// handlers to use; otherwise the classified failure is returned.
pub async fn authorize(
    State(guard): State<Guard>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let result = {
        let creds = RequestCredentials {
            session_token: jar.get(AUTH_COOKIE).map(|c| c.value()),
            csrf_cookie: jar.get(CSRF_COOKIE).map(|c| c.value()),
            csrf_header: req.headers().get(CSRF_HEADER).and_then(|v| v.to_str().ok()),
            impersonation_token: jar.get(IMPERSONATION_COOKIE).map(|c| c.value()),
        };
        guard.policy.evaluate(&guard.state.tokens, &creds)
    };

    let ctx = result.map_err(|e| {
        warn!(method = %req.method(), path = %req.uri().path(), error = %e, "Request not authorized");
        e
    })?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
