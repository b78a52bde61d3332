//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_connect_core::domain::{
    NewSlot, PasswordActivation, Slot, SlotStatus, User, UserRecordInput, UserStatus,
};
use coach_connect_core::ports::{DatabaseService, PortError, PortResult};
use coach_connect_core::Role;
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, first_name, last_name, phone_number, password_hash, \
     role, status, invite_token_hash, join_date, created_at";
const SLOT_COLUMNS: &str = "id, coach_id, start_time, end_time, status, created_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Classifies a driver error by its PostgreSQL SQLSTATE code.
fn map_db_error(e: sqlx::Error) -> PortError {
    let code = e
        .as_database_error()
        .and_then(|db| db.code().map(|c| c.into_owned()));
    match code.as_deref() {
        // unique_violation, exclusion_violation
        Some("23505") | Some("23P01") => PortError::Conflict(e.to_string()),
        // foreign_key_violation, not_null_violation, check_violation
        Some("23503") | Some("23502") | Some("23514") => PortError::Invalid(e.to_string()),
        _ => {
            error!(error = %e, code = ?code, "Database query failed");
            PortError::Unexpected(e.to_string())
        }
    }
}

fn corrupt(column: &str, value: &str) -> PortError {
    PortError::Unexpected(format!("unexpected {} value '{}' in database", column, value))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    phone_number: Option<String>,
    password_hash: Option<String>,
    role: String,
    status: String,
    invite_token_hash: Option<String>,
    join_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|_| corrupt("role", &self.role))?;
        let status = self
            .status
            .parse::<UserStatus>()
            .map_err(|_| corrupt("status", &self.status))?;
        Ok(User {
            id: self.id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            phone_number: self.phone_number,
            password_hash: self.password_hash,
            role,
            status,
            invite_token_hash: self.invite_token_hash,
            join_date: self.join_date,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct SlotRecord {
    id: Uuid,
    coach_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
}
impl SlotRecord {
    fn to_domain(self) -> PortResult<Slot> {
        let status = self
            .status
            .parse::<SlotStatus>()
            .map_err(|_| corrupt("slot status", &self.status))?;
        Ok(Slot {
            id: self.id,
            coach_id: self.coach_id,
            start_time: self.start_time,
            end_time: self.end_time,
            status,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

impl DbAdapter {
    async fn find_user_where(&self, column: &str, value: impl ToString) -> PortResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(value.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .map(UserRecord::to_domain)
            .transpose()
    }
}

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .map(UserRecord::to_domain)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        self.find_user_where("email", email).await
    }

    async fn find_user_by_invite_hash(&self, invite_token_hash: &str) -> PortResult<Option<User>> {
        self.find_user_where("invite_token_hash", invite_token_hash).await
    }

    async fn create_user(&self, input: UserRecordInput) -> PortResult<User> {
        let sql = format!(
            "INSERT INTO users (id, email, first_name, last_name, phone_number, role, status, invite_token_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.email)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.phone_number)
            .bind(input.role.as_str())
            .bind(UserStatus::Inactive.as_str())
            .bind(&input.invite_token_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?
            .to_domain()
    }

    async fn activate_user(&self, activation: PasswordActivation) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, status = $2, invite_token_hash = NULL, join_date = $3 \
             WHERE id = $4 AND invite_token_hash = $5",
        )
        .bind(&activation.password_hash)
        .bind(UserStatus::Active.as_str())
        .bind(activation.join_date)
        .bind(activation.user_id)
        .bind(&activation.invite_token_hash)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        // Zero rows: the invitation was consumed or replaced since it was looked up.
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "No pending invitation for user {}",
                activation.user_id
            )));
        }
        Ok(())
    }

    async fn list_non_admin_users(&self) -> PortResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE role <> $1 ORDER BY created_at ASC",
            USER_COLUMNS
        );
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Role::Admin.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        records.into_iter().map(UserRecord::to_domain).collect()
    }

    async fn find_overlapping_slot(
        &self,
        coach_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> PortResult<Option<Slot>> {
        let sql = format!(
            "SELECT {} FROM slots WHERE coach_id = $1 AND start_time < $2 AND end_time > $3 LIMIT 1",
            SLOT_COLUMNS
        );
        sqlx::query_as::<_, SlotRecord>(&sql)
            .bind(coach_id)
            .bind(end_time)
            .bind(start_time)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .map(SlotRecord::to_domain)
            .transpose()
    }

    async fn create_slot(&self, slot: NewSlot) -> PortResult<Slot> {
        let sql = format!(
            "INSERT INTO slots (id, coach_id, start_time, end_time, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            SLOT_COLUMNS
        );
        sqlx::query_as::<_, SlotRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(slot.coach_id)
            .bind(slot.start_time)
            .bind(slot.end_time)
            .bind(slot.status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?
            .to_domain()
    }

    async fn list_slots(
        &self,
        coach_id: Uuid,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> PortResult<Vec<Slot>> {
        let records = match window {
            Some((from, to)) => {
                let sql = format!(
                    "SELECT {} FROM slots WHERE coach_id = $1 AND start_time >= $2 AND start_time < $3 \
                     ORDER BY start_time ASC",
                    SLOT_COLUMNS
                );
                sqlx::query_as::<_, SlotRecord>(&sql)
                    .bind(coach_id)
                    .bind(from)
                    .bind(to)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM slots WHERE coach_id = $1 ORDER BY start_time ASC",
                    SLOT_COLUMNS
                );
                sqlx::query_as::<_, SlotRecord>(&sql)
                    .bind(coach_id)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(map_db_error)?;

        records.into_iter().map(SlotRecord::to_domain).collect()
    }
}
