//! crates/coach_connect_core/src/testing.rs
//!
//! In-memory implementations of the ports, used by the unit tests of this crate and
//! (through the `testing` feature) by the HTTP tests of the api service.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    Identity, NewSlot, PasswordActivation, Role, Slot, User, UserRecordInput, UserStatus,
};
use crate::ports::{
    DatabaseService, PasswordHashingService, PortError, PortResult, TokenError, TokenKind,
    TokenSigningService,
};

//=========================================================================================
// Token signing
//=========================================================================================

/// Readable tokens of the form `fake.<kind>.<user id>.<role>.<expiry>.<digest>`, where the
/// digest covers the rest of the token so that any edit is detected.
pub struct FakeSigner;

impl FakeSigner {
    fn digest(payload: &str) -> String {
        crate::crypto::hash_token(&format!("{payload}:fake-signer"))
    }
}

impl TokenSigningService for FakeSigner {
    fn sign(&self, identity: &Identity, kind: TokenKind, ttl: Duration) -> PortResult<String> {
        let exp = (Utc::now() + ttl).timestamp();
        let payload = format!("fake.{}.{}.{}.{}", kind.as_str(), identity.user_id, identity.role, exp);
        Ok(format!("{}.{}", payload, Self::digest(&payload)))
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<Identity, TokenError> {
        let invalid = || TokenError::Invalid(format!("malformed token '{token}'"));
        let (payload, digest) = token.rsplit_once('.').ok_or_else(invalid)?;
        if digest != Self::digest(payload) {
            return Err(TokenError::Invalid("signature mismatch".to_string()));
        }
        let mut parts = payload.split('.');
        if parts.next() != Some("fake") {
            return Err(invalid());
        }
        if parts.next() != Some(kind.as_str()) {
            return Err(TokenError::Invalid(format!("not a {} token", kind.as_str())));
        }
        let user_id = parts
            .next()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(invalid)?;
        let role = parts
            .next()
            .and_then(|s| s.parse::<Role>().ok())
            .ok_or_else(invalid)?;
        let exp = parts
            .next()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(invalid)?;
        if exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(Identity { user_id, role })
    }
}

//=========================================================================================
// Password hashing
//=========================================================================================

/// Stores passwords behind a `plain:` prefix. Never use outside tests.
pub struct PlainHasher;

#[async_trait]
impl PasswordHashingService for PlainHasher {
    async fn hash(&self, password: &str) -> PortResult<String> {
        Ok(format!("plain:{password}"))
    }

    async fn verify(&self, password: &str, hash: &str) -> PortResult<bool> {
        Ok(hash.strip_prefix("plain:") == Some(password))
    }
}

//=========================================================================================
// Storage
//=========================================================================================

/// A `DatabaseService` backed by two vectors. Slot inserts reject overlaps the way the
/// exclusion constraint of the real schema does.
#[derive(Default)]
pub struct InMemoryDatabase {
    users: Mutex<Vec<User>>,
    slots: Mutex<Vec<Slot>>,
    slot_writes: Mutex<usize>,
    stale_overlap_reads: Mutex<bool>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }

    pub fn insert_slot(&self, slot: Slot) {
        self.slots.lock().unwrap().push(slot);
    }

    pub fn users(&self) -> Vec<User> {
        self.users.lock().unwrap().clone()
    }

    pub fn slots(&self) -> Vec<Slot> {
        self.slots.lock().unwrap().clone()
    }

    /// Makes `find_overlapping_slot` miss every stored slot, as if they were written by
    /// a concurrent transaction after the lookup ran. Inserts still reject overlaps.
    pub fn hide_overlaps_from_lookup(&self) {
        *self.stale_overlap_reads.lock().unwrap() = true;
    }

    /// Number of `create_slot` calls that reached storage.
    pub fn slot_writes(&self) -> usize {
        *self.slot_writes.lock().unwrap()
    }
}

/// Builds a user row with sensible defaults.
pub fn sample_user(email: &str, role: Role, status: UserStatus, password_hash: Option<&str>) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        first_name: "Sam".to_string(),
        last_name: "Taylor".to_string(),
        phone_number: None,
        password_hash: password_hash.map(str::to_string),
        role,
        status,
        invite_token_hash: None,
        join_date: None,
        created_at: Utc::now(),
    }
}

/// Builds a slot owned by `coach_id`.
pub fn sample_slot(coach_id: Uuid, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Slot {
    Slot {
        id: Uuid::new_v4(),
        coach_id,
        start_time,
        end_time,
        status: crate::domain::SlotStatus::Available,
        created_at: Utc::now(),
    }
}

fn overlaps(slot: &Slot, coach_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    slot.coach_id == coach_id && slot.start_time < end && slot.end_time > start
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_invite_hash(&self, invite_token_hash: &str) -> PortResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.invite_token_hash.as_deref() == Some(invite_token_hash))
            .cloned())
    }

    async fn create_user(&self, input: UserRecordInput) -> PortResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == input.email) {
            return Err(PortError::Conflict(format!("email {} already exists", input.email)));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: input.email,
            first_name: input.first_name,
            last_name: input.last_name,
            phone_number: input.phone_number,
            password_hash: None,
            role: input.role,
            status: UserStatus::Inactive,
            invite_token_hash: Some(input.invite_token_hash),
            join_date: None,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn activate_user(&self, activation: PasswordActivation) -> PortResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| {
                u.id == activation.user_id
                    && u.invite_token_hash.as_deref() == Some(activation.invite_token_hash.as_str())
            })
            .ok_or_else(|| {
                PortError::NotFound(format!("No pending invitation for user {}", activation.user_id))
            })?;
        user.password_hash = Some(activation.password_hash);
        user.invite_token_hash = None;
        user.status = UserStatus::Active;
        user.join_date = Some(activation.join_date);
        Ok(())
    }

    async fn list_non_admin_users(&self) -> PortResult<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.role != Role::Admin)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn find_overlapping_slot(
        &self,
        coach_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> PortResult<Option<Slot>> {
        if *self.stale_overlap_reads.lock().unwrap() {
            return Ok(None);
        }
        Ok(self
            .slots
            .lock()
            .unwrap()
            .iter()
            .find(|s| overlaps(s, coach_id, start_time, end_time))
            .cloned())
    }

    async fn create_slot(&self, slot: NewSlot) -> PortResult<Slot> {
        *self.slot_writes.lock().unwrap() += 1;
        let mut slots = self.slots.lock().unwrap();
        if slots
            .iter()
            .any(|s| overlaps(s, slot.coach_id, slot.start_time, slot.end_time))
        {
            return Err(PortError::Conflict("slots_no_overlap".to_string()));
        }
        let stored = Slot {
            id: Uuid::new_v4(),
            coach_id: slot.coach_id,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: slot.status,
            created_at: Utc::now(),
        };
        slots.push(stored.clone());
        Ok(stored)
    }

    async fn list_slots(
        &self,
        coach_id: Uuid,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> PortResult<Vec<Slot>> {
        let mut slots: Vec<Slot> = self
            .slots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.coach_id == coach_id)
            .filter(|s| match window {
                Some((from, to)) => s.start_time >= from && s.start_time < to,
                None => true,
            })
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.start_time);
        Ok(slots)
    }
}
