//! services/api/src/bin/seed.rs
//!
//! Populates a development database with one admin, ten students and five coaches.
//! Every account is activated through the regular invitation flow with the password
//! `<FirstName><LastName>`. Accounts whose email already exists are skipped.

use api_lib::{
    adapters::{BcryptHasher, DbAdapter, JwtSigner},
    config::Config,
    error::ApiError,
    web::state::AppState,
};
use coach_connect_core::{NewUser, Role, ServiceError};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const NAMES: [(&str, &str); 16] = [
    ("Ada", "Lovelace"),
    ("Noah", "Bennett"),
    ("Mia", "Kowalski"),
    ("Liam", "Okafor"),
    ("Emma", "Lindqvist"),
    ("Lucas", "Moreau"),
    ("Sofia", "Tanaka"),
    ("Mateo", "Ruiz"),
    ("Chloe", "Brennan"),
    ("Ethan", "Haddad"),
    ("Zoe", "Marsh"),
    ("Grace", "Hopper"),
    ("Arjun", "Mehta"),
    ("Hannah", "Schultz"),
    ("Diego", "Alvarez"),
    ("Ines", "Carvalho"),
];

fn profiles() -> Vec<NewUser> {
    NAMES
        .iter()
        .enumerate()
        .map(|(i, (first, last))| {
            let role = match i {
                0 => Role::Admin,
                1..=10 => Role::Student,
                _ => Role::Coach,
            };
            NewUser {
                email: format!("{}.{}@gmail.com", first, last).to_lowercase(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                phone_number: Some(format!("(555) 010-{:04}", i)),
                role,
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    db_adapter.run_migrations().await?;

    let state = AppState::new(
        config.clone(),
        db_adapter,
        Arc::new(JwtSigner::new(&config.jwt_secret)),
        Arc::new(BcryptHasher::default()),
    );

    let mut seeded = 0;
    for profile in profiles() {
        let email = profile.email.clone();
        let created = match state.credentials.create_user(profile).await {
            Ok(created) => created,
            Err(ServiceError::Conflict(_)) => {
                warn!(%email, "User already exists, skipping");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let password = format!("{}{}", created.user.first_name, created.user.last_name);
        state
            .credentials
            .create_password(&created.invite_token, &password, &created.user.email)
            .await?;
        info!(%email, role = %created.user.role, "Seeded user");
        seeded += 1;
    }

    info!(seeded, "Seeding complete");
    Ok(())
}
