//! services/api/src/adapters/password.rs
//!
//! bcrypt implementation of the `PasswordHashingService` port. Hashing is CPU-bound,
//! so it runs on the blocking thread pool.

use async_trait::async_trait;
use coach_connect_core::ports::{PasswordHashingService, PortError, PortResult};

pub const DEFAULT_COST: u32 = 12;

pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

fn join_error(e: tokio::task::JoinError) -> PortError {
    PortError::Unexpected(format!("password hashing task failed: {}", e))
}

#[async_trait]
impl PasswordHashingService for BcryptHasher {
    async fn hash(&self, password: &str) -> PortResult<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(join_error)?
            .map_err(|e| PortError::Unexpected(format!("failed to hash password: {}", e)))
    }

    async fn verify(&self, password: &str, hash: &str) -> PortResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(join_error)?
            .map_err(|e| PortError::Unexpected(format!("failed to verify password: {}", e)))
    }
}
