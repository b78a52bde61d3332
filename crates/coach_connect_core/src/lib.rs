pub mod authz;
pub mod credentials;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod ports;
pub mod scheduling;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tokens;

pub use authz::{AccessPolicy, AuthContext, RequestCredentials};
pub use credentials::{CredentialPolicy, CredentialService};
pub use domain::{Identity, NewUser, Role, Slot, SlotStatus, User, UserStatus, UserView};
pub use error::{ServiceError, ServiceResult};
pub use ports::{
    DatabaseService, PasswordHashingService, PortError, PortResult, TokenError,
    TokenKind, TokenSigningService,
};
pub use scheduling::{SlotQuery, SlotRequest, SlotService};
pub use tokens::{SessionTokens, TokenService};
