//! crates/coach_connect_core/src/tokens.rs
//!
//! Issues session, CSRF and impersonation tokens on top of a `TokenSigningService`.
//! Verification is stateless; there is no server-side token store.

use chrono::Duration;
use std::sync::Arc;

use crate::crypto;
use crate::domain::Identity;
use crate::ports::{PortResult, TokenError, TokenKind, TokenSigningService};

pub const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_IMPERSONATION_TTL_SECS: i64 = 15 * 60;

/// A signed session token plus its paired double-submit CSRF token.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub session_token: String,
    pub csrf_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    signer: Arc<dyn TokenSigningService>,
    session_ttl: Duration,
    impersonation_ttl: Duration,
}

impl TokenService {
    pub fn new(
        signer: Arc<dyn TokenSigningService>,
        session_ttl: Duration,
        impersonation_ttl: Duration,
    ) -> Self {
        Self {
            signer,
            session_ttl,
            impersonation_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub fn impersonation_ttl(&self) -> Duration {
        self.impersonation_ttl
    }

    /// Signs a session token for `identity`. The CSRF token is generated
    /// independently and is never embedded in the signed claims.
    pub fn issue_session(&self, identity: &Identity) -> PortResult<SessionTokens> {
        let session_token = self.signer.sign(identity, TokenKind::Session, self.session_ttl)?;
        Ok(SessionTokens {
            session_token,
            csrf_token: crypto::create_token(),
        })
    }

    /// Signs a short-lived token naming the impersonated identity. Callers must have
    /// confirmed that the actor is an admin.
    pub fn issue_impersonation(&self, target: &Identity) -> PortResult<String> {
        self.signer
            .sign(target, TokenKind::Impersonation, self.impersonation_ttl)
    }

    pub fn verify_session(&self, token: &str) -> Result<Identity, TokenError> {
        self.signer.verify(token, TokenKind::Session)
    }

    /// Impersonation tokens are not accepted as sessions, nor the other way round.
    pub fn verify_impersonation(&self, token: &str) -> Result<Identity, TokenError> {
        self.signer.verify(token, TokenKind::Impersonation)
    }
}
