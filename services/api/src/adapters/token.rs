//! services/api/src/adapters/token.rs
//!
//! HS256 JSON Web Tokens implementing the `TokenSigningService` port.

use chrono::{Duration, Utc};
use coach_connect_core::ports::{
    PortError, PortResult, TokenError, TokenKind, TokenSigningService,
};
use coach_connect_core::{Identity, Role};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The claim set carried by session and impersonation tokens. `typ` names the kind,
/// so one cannot stand in for the other.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: Uuid,
    role: String,
    typ: String,
    iat: i64,
    exp: i64,
}

pub struct JwtSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtSigner {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl TokenSigningService for JwtSigner {
    fn sign(&self, identity: &Identity, kind: TokenKind, ttl: Duration) -> PortResult<String> {
        let now = Utc::now();
        let claims = Claims {
            id: identity.user_id,
            role: identity.role.as_str().to_string(),
            typ: kind.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| PortError::Unexpected(format!("failed to sign token: {}", e)))
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<Identity, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;
        if data.claims.typ != kind.as_str() {
            return Err(TokenError::Invalid(format!(
                "expected a {} token, got '{}'",
                kind.as_str(),
                data.claims.typ
            )));
        }
        let role = data
            .claims
            .role
            .parse::<Role>()
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        Ok(Identity {
            user_id: data.claims.id,
            role,
        })
    }
}
