//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use coach_connect_core::ports::{DatabaseService, PasswordHashingService, TokenSigningService};
use coach_connect_core::{CredentialPolicy, CredentialService, SlotService, TokenService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
/// Nothing in it is mutated after construction.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: TokenService,
    pub credentials: CredentialService,
    pub slots: SlotService,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        signer: Arc<dyn TokenSigningService>,
        hasher: Arc<dyn PasswordHashingService>,
    ) -> Self {
        let tokens = TokenService::new(signer, config.session_ttl, config.impersonation_ttl);
        let credentials = CredentialService::new(
            db.clone(),
            hasher,
            tokens.clone(),
            CredentialPolicy {
                allow_unset_password_login: config.allow_unset_password_login,
            },
        );
        let slots = SlotService::new(db);
        Self {
            config,
            tokens,
            credentials,
            slots,
        }
    }
}
