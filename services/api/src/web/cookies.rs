//! services/api/src/web/cookies.rs
//!
//! Names and attributes of the cookies set by the login and impersonation flows.

use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::config::Config;

pub const AUTH_COOKIE: &str = "authToken";
pub const CSRF_COOKIE: &str = "csrfToken";
pub const IMPERSONATION_COOKIE: &str = "impersonationToken";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// HTTP-only cookie; `Secure` and `SameSite=None` in production, `Lax` otherwise.
pub fn issue(config: &Config, name: &'static str, value: String, max_age: chrono::Duration) -> Cookie<'static> {
    let production = config.is_production();
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(production)
        .same_site(if production { SameSite::None } else { SameSite::Lax })
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}

/// An expired, empty cookie that overwrites `name` whether or not the request sent it.
pub fn clear(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, "")).path("/").http_only(true).build();
    cookie.make_removal();
    cookie
}
