//! crates/coach_connect_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Roles and Statuses
//=========================================================================================

/// The closed set of roles a user account can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Coach,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Coach => "COACH",
            Role::Student => "STUDENT",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Whether an admin may act as an account holding this role.
    pub fn can_be_impersonated(&self) -> bool {
        !self.is_admin()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "COACH" => Ok(Role::Coach),
            "STUDENT" => Ok(Role::Student),
            other => Err(ParseEnumError {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for UserStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(UserStatus::Active),
            "INACTIVE" => Ok(UserStatus::Inactive),
            other => Err(ParseEnumError {
                kind: "user status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Available,
    Booked,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "AVAILABLE",
            SlotStatus::Booked => "BOOKED",
        }
    }
}

impl FromStr for SlotStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(SlotStatus::Available),
            "BOOKED" => Ok(SlotStatus::Booked),
            other => Err(ParseEnumError {
                kind: "slot status",
                value: other.to_string(),
            }),
        }
    }
}

//=========================================================================================
// Users
//=========================================================================================

/// A user account as stored, including its secrets.
/// Only used internally; callers receive a `UserView`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub password_hash: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub invite_token_hash: Option<String>,
    pub join_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            role: self.role,
        }
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone_number: self.phone_number.clone(),
            role: self.role,
            status: self.status,
            join_date: self.join_date,
            created_at: self.created_at,
        }
    }
}

/// The public projection of a user: never carries the password or invite-token hashes.
#[derive(Debug, Clone, PartialEq)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub join_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Profile data supplied when an admin creates an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: Role,
}

/// The row written for a freshly created account.
#[derive(Debug, Clone)]
pub struct UserRecordInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub invite_token_hash: String,
}

/// The single write that completes an invitation. It only applies while the row
/// still carries `invite_token_hash`, so an invitation is consumed at most once.
#[derive(Debug, Clone)]
pub struct PasswordActivation {
    pub user_id: Uuid,
    pub invite_token_hash: String,
    pub password_hash: String,
    pub join_date: DateTime<Utc>,
}

//=========================================================================================
// Identities
//=========================================================================================

/// The claim set carried by every signed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

//=========================================================================================
// Slots
//=========================================================================================

/// A bookable time window owned by one coach. `start_time < end_time` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSlot {
    pub coach_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
}
