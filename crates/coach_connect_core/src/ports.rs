//! crates/coach_connect_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or
//! signing libraries.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{Identity, NewSlot, PasswordActivation, Slot, User, UserRecordInput};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, crypto).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A storage-level uniqueness or exclusion constraint rejected the write.
    #[error("Conflicting item: {0}")]
    Conflict(String),
    /// A storage-level check (foreign key, not-null, check constraint) rejected the data.
    #[error("Rejected item: {0}")]
    Invalid(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Why a signed token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// What a signed token may be used for. A token only verifies as the kind it was
/// signed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Session,
    Impersonation,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Session => "session",
            TokenKind::Impersonation => "impersonation",
        }
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<Option<User>>;

    /// Looks a user up by an already-normalized email.
    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>>;

    async fn find_user_by_invite_hash(&self, invite_token_hash: &str) -> PortResult<Option<User>>;

    /// Inserts a new INACTIVE user. Fails with `PortError::Conflict` on a duplicate email.
    async fn create_user(&self, input: UserRecordInput) -> PortResult<User>;

    /// Stores the password hash, clears the invite token, marks the user ACTIVE and
    /// stamps the join date in a single write.
    async fn activate_user(&self, activation: PasswordActivation) -> PortResult<()>;

    /// Every non-admin account, oldest first.
    async fn list_non_admin_users(&self) -> PortResult<Vec<User>>;

    // --- Slot Management ---

    /// Returns any slot of `coach_id` satisfying `start < end_time AND end > start_time`.
    async fn find_overlapping_slot(
        &self,
        coach_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> PortResult<Option<Slot>>;

    /// Persists a slot. Fails with `PortError::Conflict` when storage detects an overlap.
    async fn create_slot(&self, slot: NewSlot) -> PortResult<Slot>;

    /// Slots of `coach_id` ordered by start time. With a window, only slots whose
    /// start lies in `[window.0, window.1)` are returned.
    async fn list_slots(
        &self,
        coach_id: Uuid,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> PortResult<Vec<Slot>>;
}

/// Signs and verifies stateless identity tokens.
pub trait TokenSigningService: Send + Sync {
    fn sign(&self, identity: &Identity, kind: TokenKind, ttl: Duration) -> PortResult<String>;

    /// Checks signature, kind and expiry, distinguishing expiry from every other failure.
    fn verify(&self, token: &str, kind: TokenKind) -> Result<Identity, TokenError>;
}

#[async_trait]
pub trait PasswordHashingService: Send + Sync {
    /// Hashes a password with a salted adaptive hash.
    async fn hash(&self, password: &str) -> PortResult<String>;

    /// Compares a password against a stored hash in constant time.
    async fn verify(&self, password: &str, hash: &str) -> PortResult<bool>;
}
