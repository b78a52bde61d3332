//! crates/coach_connect_core/src/authz.rs
//!
//! The request-time authorization chain.
//!
//! Each stage takes the credentials presented with a request and the context built
//! by the previous stages, and either returns an updated context or a terminal
//! `ServiceError`. `AccessPolicy` runs the stages a route needs in a fixed order:
//! authenticate, CSRF, role, impersonation, effective user, effective role.

use tracing::warn;

use crate::domain::{Identity, Role};
use crate::error::{ServiceError, ServiceResult, INVALID_CREDENTIALS, SESSION_EXPIRED};
use crate::ports::TokenError;
use crate::tokens::TokenService;

/// Cookie and header values lifted from an inbound request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestCredentials<'a> {
    pub session_token: Option<&'a str>,
    pub csrf_cookie: Option<&'a str>,
    pub csrf_header: Option<&'a str>,
    pub impersonation_token: Option<&'a str>,
}

/// Who is calling, and who they are acting as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user: Identity,
    pub impersonated: Option<Identity>,
}

impl AuthContext {
    pub fn new(user: Identity) -> Self {
        Self {
            user,
            impersonated: None,
        }
    }

    pub fn is_impersonating(&self) -> bool {
        self.impersonated.is_some()
    }

    /// The identity whose permissions govern the request.
    pub fn effective(&self) -> Identity {
        self.impersonated.unwrap_or(self.user)
    }
}

//=========================================================================================
// Stages
//=========================================================================================

pub fn authenticate(tokens: &TokenService, session_token: Option<&str>) -> ServiceResult<AuthContext> {
    let token = session_token.ok_or_else(|| ServiceError::authentication_failed(SESSION_EXPIRED))?;
    match tokens.verify_session(token) {
        Ok(identity) => Ok(AuthContext::new(identity)),
        Err(TokenError::Expired) => Err(ServiceError::authentication_failed(SESSION_EXPIRED)),
        Err(TokenError::Invalid(reason)) => {
            warn!(%reason, "Rejected session token");
            Err(ServiceError::authentication_failed(INVALID_CREDENTIALS))
        }
    }
}

/// Double-submit check: the cookie and the echoed header must be byte-for-byte equal.
pub fn verify_csrf(csrf_cookie: Option<&str>, csrf_header: Option<&str>) -> ServiceResult<()> {
    let cookie = csrf_cookie.ok_or_else(|| ServiceError::authentication_failed(SESSION_EXPIRED))?;
    match csrf_header {
        Some(header) if header == cookie => Ok(()),
        _ => Err(ServiceError::forbidden("Invalid request")),
    }
}

pub fn require_role(ctx: &AuthContext, allowed: &[Role]) -> ServiceResult<()> {
    if allowed.contains(&ctx.user.role) {
        Ok(())
    } else {
        Err(ServiceError::forbidden("Insufficient permissions"))
    }
}

/// Resolves the impersonated identity for admins holding an impersonation token.
/// A no-op for every other caller, and for admins without the cookie.
pub fn verify_impersonation(
    tokens: &TokenService,
    ctx: AuthContext,
    impersonation_token: Option<&str>,
) -> ServiceResult<AuthContext> {
    if !ctx.user.role.is_admin() {
        return Ok(ctx);
    }
    let Some(token) = impersonation_token else {
        return Ok(ctx);
    };
    let target = tokens.verify_impersonation(token).map_err(|e| {
        warn!(admin = %ctx.user.user_id, error = %e, "Rejected impersonation token");
        ServiceError::authentication_failed(INVALID_CREDENTIALS)
    })?;
    if !target.role.can_be_impersonated() {
        return Err(ServiceError::forbidden("Cannot impersonate an admin"));
    }
    Ok(AuthContext {
        user: ctx.user,
        impersonated: Some(target),
    })
}

pub fn resolve_effective_user(ctx: Option<&AuthContext>) -> ServiceResult<Identity> {
    ctx.map(AuthContext::effective)
        .ok_or_else(|| ServiceError::authentication_failed(INVALID_CREDENTIALS))
}

pub fn verify_effective_role(effective: &Identity, allowed: &[Role]) -> ServiceResult<()> {
    if allowed.contains(&effective.role) {
        Ok(())
    } else {
        Err(ServiceError::forbidden("Not authorized"))
    }
}

//=========================================================================================
// Route policies
//=========================================================================================

/// The set of stages a route runs. Authentication always runs first.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy {
    pub csrf: bool,
    pub roles: Option<&'static [Role]>,
    pub impersonation: bool,
    pub effective_roles: Option<&'static [Role]>,
}

impl AccessPolicy {
    /// Any signed-in user; an admin's impersonation is honoured.
    pub const fn session() -> Self {
        Self {
            csrf: false,
            roles: None,
            impersonation: true,
            effective_roles: None,
        }
    }

    /// Signed-in admins acting as themselves.
    pub const fn admin() -> Self {
        Self {
            csrf: false,
            roles: Some(&[Role::Admin]),
            impersonation: false,
            effective_roles: None,
        }
    }

    /// State-changing admin routes: `admin()` plus the CSRF pair.
    pub const fn admin_action() -> Self {
        Self {
            csrf: true,
            ..Self::admin()
        }
    }

    /// Coaches, and admins impersonating a coach. Requires the CSRF pair.
    pub const fn coach_workspace() -> Self {
        Self {
            csrf: true,
            roles: Some(&[Role::Admin, Role::Coach]),
            impersonation: true,
            effective_roles: Some(&[Role::Coach]),
        }
    }

    pub fn evaluate(
        &self,
        tokens: &TokenService,
        creds: &RequestCredentials<'_>,
    ) -> ServiceResult<AuthContext> {
        let mut ctx = authenticate(tokens, creds.session_token)?;
        if self.csrf {
            verify_csrf(creds.csrf_cookie, creds.csrf_header)?;
        }
        if let Some(roles) = self.roles {
            require_role(&ctx, roles)?;
        }
        if self.impersonation {
            ctx = verify_impersonation(tokens, ctx, creds.impersonation_token)?;
        }
        let effective = resolve_effective_user(Some(&ctx))?;
        if let Some(roles) = self.effective_roles {
            verify_effective_role(&effective, roles)?;
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSigner;
    use chrono::Duration;
    use std::sync::Arc;
    use uuid::Uuid;

    fn tokens() -> TokenService {
        TokenService::new(Arc::new(FakeSigner), Duration::days(1), Duration::minutes(15))
    }

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    fn session_for(svc: &TokenService, who: &Identity) -> (String, String) {
        let issued = svc.issue_session(who).unwrap();
        (issued.session_token, issued.csrf_token)
    }

    fn assert_auth_failed(result: ServiceResult<impl std::fmt::Debug>, message: &str) {
        match result {
            Err(ServiceError::AuthenticationFailed(m)) => assert_eq!(m, message),
            other => panic!("expected AuthenticationFailed, got {:?}", other),
        }
    }

    fn assert_forbidden(result: ServiceResult<impl std::fmt::Debug>) {
        assert!(
            matches!(result, Err(ServiceError::Forbidden(_))),
            "expected Forbidden, got {:?}",
            result
        );
    }

    #[test]
    fn test_authenticate_missing_cookie_reports_expired_session() {
        assert_auth_failed(authenticate(&tokens(), None), SESSION_EXPIRED);
    }

    #[test]
    fn test_authenticate_distinguishes_expired_from_invalid() {
        let expired = TokenService::new(Arc::new(FakeSigner), Duration::seconds(-1), Duration::minutes(15));
        let (token, _) = session_for(&expired, &identity(Role::Coach));
        assert_auth_failed(authenticate(&tokens(), Some(&token)), SESSION_EXPIRED);
        assert_auth_failed(authenticate(&tokens(), Some("garbage")), INVALID_CREDENTIALS);
    }

    #[test]
    fn test_impersonation_token_is_not_a_session() {
        let svc = tokens();
        let token = svc.issue_impersonation(&identity(Role::Coach)).unwrap();
        assert_auth_failed(authenticate(&svc, Some(&token)), INVALID_CREDENTIALS);
    }

    #[test]
    fn test_authenticate_attaches_identity() {
        let svc = tokens();
        let who = identity(Role::Student);
        let (token, _) = session_for(&svc, &who);
        let ctx = authenticate(&svc, Some(&token)).unwrap();
        assert_eq!(ctx.user, who);
        assert_eq!(ctx.effective(), who);
    }

    #[test]
    fn test_csrf_matching_pair_passes() {
        assert!(verify_csrf(Some("abc"), Some("abc")).is_ok());
    }

    #[test]
    fn test_csrf_failures_are_classified() {
        assert_auth_failed(verify_csrf(None, Some("abc")), SESSION_EXPIRED);
        assert_forbidden(verify_csrf(Some("abc"), None));
        assert_forbidden(verify_csrf(Some("abc"), Some("abd")));
        assert_forbidden(verify_csrf(Some("abc"), Some("ABC")));
    }

    #[test]
    fn test_require_role_checks_authenticated_identity() {
        let ctx = AuthContext::new(identity(Role::Student));
        assert_forbidden(require_role(&ctx, &[Role::Admin, Role::Coach]));
        assert!(require_role(&ctx, &[Role::Student]).is_ok());
    }

    #[test]
    fn test_impersonation_is_ignored_for_non_admins() {
        let svc = tokens();
        let target = identity(Role::Student);
        let token = svc.issue_impersonation(&target).unwrap();
        let ctx = AuthContext::new(identity(Role::Coach));
        let resolved = verify_impersonation(&svc, ctx, Some(&token)).unwrap();
        assert_eq!(resolved, ctx);
        let tampered = verify_impersonation(&svc, ctx, Some("tampered")).unwrap();
        assert_eq!(tampered, ctx);
    }

    #[test]
    fn test_admin_with_valid_impersonation_resolves_effective_user() {
        let svc = tokens();
        let admin = identity(Role::Admin);
        let coach = identity(Role::Coach);
        let token = svc.issue_impersonation(&coach).unwrap();
        let ctx = verify_impersonation(&svc, AuthContext::new(admin), Some(&token)).unwrap();
        assert_eq!(ctx.user, admin);
        assert_eq!(ctx.effective(), coach);
        assert!(ctx.is_impersonating());
    }

    #[test]
    fn test_admin_with_tampered_impersonation_fails() {
        let svc = tokens();
        let coach = identity(Role::Coach);
        let mut token = svc.issue_impersonation(&coach).unwrap();
        token.push('9');
        assert_auth_failed(
            verify_impersonation(&svc, AuthContext::new(identity(Role::Admin)), Some(&token)),
            INVALID_CREDENTIALS,
        );
    }

    #[test]
    fn test_admin_without_impersonation_cookie_is_unchanged() {
        let ctx = AuthContext::new(identity(Role::Admin));
        assert_eq!(verify_impersonation(&tokens(), ctx, None).unwrap(), ctx);
    }

    #[test]
    fn test_impersonating_an_admin_is_forbidden() {
        let svc = tokens();
        let token = svc.issue_impersonation(&identity(Role::Admin)).unwrap();
        assert_forbidden(verify_impersonation(&svc, AuthContext::new(identity(Role::Admin)), Some(&token)));
    }

    #[test]
    fn test_resolve_effective_user_without_context_fails() {
        assert_auth_failed(resolve_effective_user(None), INVALID_CREDENTIALS);
    }

    #[test]
    fn test_coach_workspace_policy() {
        let svc = tokens();
        let policy = AccessPolicy::coach_workspace();

        let coach = identity(Role::Coach);
        let (session, csrf) = session_for(&svc, &coach);
        let creds = RequestCredentials {
            session_token: Some(&session),
            csrf_cookie: Some(&csrf),
            csrf_header: Some(&csrf),
            impersonation_token: None,
        };
        assert_eq!(policy.evaluate(&svc, &creds).unwrap().effective(), coach);

        // A bare admin is not a coach.
        let admin = identity(Role::Admin);
        let (session, csrf) = session_for(&svc, &admin);
        let creds = RequestCredentials {
            session_token: Some(&session),
            csrf_cookie: Some(&csrf),
            csrf_header: Some(&csrf),
            impersonation_token: None,
        };
        assert_forbidden(policy.evaluate(&svc, &creds));

        // Impersonating a coach passes the effective-role check.
        let target = identity(Role::Coach);
        let impersonation = svc.issue_impersonation(&target).unwrap();
        let creds = RequestCredentials {
            impersonation_token: Some(&impersonation),
            ..creds
        };
        let ctx = policy.evaluate(&svc, &creds).unwrap();
        assert_eq!(ctx.user, admin);
        assert_eq!(ctx.effective(), target);

        // Students are stopped by the role stage.
        let student = identity(Role::Student);
        let (session, csrf) = session_for(&svc, &student);
        let creds = RequestCredentials {
            session_token: Some(&session),
            csrf_cookie: Some(&csrf),
            csrf_header: Some(&csrf),
            impersonation_token: None,
        };
        assert_forbidden(policy.evaluate(&svc, &creds));
    }

    #[test]
    fn test_policy_runs_csrf_before_role_check() {
        let svc = tokens();
        let (session, csrf) = session_for(&svc, &identity(Role::Student));
        let creds = RequestCredentials {
            session_token: Some(&session),
            csrf_cookie: None,
            csrf_header: Some(&csrf),
            impersonation_token: None,
        };
        assert_auth_failed(AccessPolicy::coach_workspace().evaluate(&svc, &creds), SESSION_EXPIRED);
    }

    #[test]
    fn test_admin_policy_ignores_impersonation() {
        let svc = tokens();
        let admin = identity(Role::Admin);
        let (session, _) = session_for(&svc, &admin);
        let impersonation = svc.issue_impersonation(&identity(Role::Student)).unwrap();
        let creds = RequestCredentials {
            session_token: Some(&session),
            impersonation_token: Some(&impersonation),
            ..Default::default()
        };
        let ctx = AccessPolicy::admin().evaluate(&svc, &creds).unwrap();
        assert_eq!(ctx.effective(), admin);
    }

    #[test]
    fn test_admin_action_policy_requires_csrf() {
        let svc = tokens();
        let admin = identity(Role::Admin);
        let (session, csrf) = session_for(&svc, &admin);
        let policy = AccessPolicy::admin_action();

        let missing_header = RequestCredentials {
            session_token: Some(&session),
            csrf_cookie: Some(&csrf),
            ..Default::default()
        };
        assert_forbidden(policy.evaluate(&svc, &missing_header));

        let complete = RequestCredentials {
            csrf_header: Some(&csrf),
            ..missing_header
        };
        assert_eq!(policy.evaluate(&svc, &complete).unwrap().effective(), admin);

        let (session, csrf) = session_for(&svc, &identity(Role::Coach));
        let coach = RequestCredentials {
            session_token: Some(&session),
            csrf_cookie: Some(&csrf),
            csrf_header: Some(&csrf),
            impersonation_token: None,
        };
        assert_forbidden(policy.evaluate(&svc, &coach));
    }
}
