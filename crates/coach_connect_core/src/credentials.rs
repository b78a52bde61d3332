//! crates/coach_connect_core/src/credentials.rs
//!
//! Login, invite-based password creation, account creation and impersonation.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::crypto;
use crate::domain::{NewUser, PasswordActivation, User, UserRecordInput, UserStatus, UserView};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{DatabaseService, PasswordHashingService, PortError};
use crate::tokens::{SessionTokens, TokenService};

const WRONG_CREDENTIALS: &str = "Wrong credentials";

/// Knobs for behaviour that differs between deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialPolicy {
    /// Lets an invited user whose password was never set sign in without one.
    pub allow_unset_password_login: bool,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: SessionTokens,
    pub user: UserView,
}

/// A new account together with the plaintext invite token. Only the hash of the
/// token is stored; delivering it is up to the caller.
#[derive(Debug, Clone)]
pub struct CreatedUser {
    pub user: UserView,
    pub invite_token: String,
}

#[derive(Debug, Clone)]
pub struct ImpersonationOutcome {
    pub token: String,
    pub user: UserView,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct CredentialService {
    db: Arc<dyn DatabaseService>,
    hasher: Arc<dyn PasswordHashingService>,
    tokens: TokenService,
    policy: CredentialPolicy,
}

impl CredentialService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        hasher: Arc<dyn PasswordHashingService>,
        tokens: TokenService,
        policy: CredentialPolicy,
    ) -> Self {
        Self {
            db,
            hasher,
            tokens,
            policy,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<LoginOutcome> {
        let email = normalize_email(email);
        let user = self
            .db
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::authentication_failed(WRONG_CREDENTIALS))?;

        if user.status == UserStatus::Inactive {
            return Err(ServiceError::bad_request("Inactive account"));
        }

        match user.password_hash.as_deref() {
            Some(hash) => {
                if !self.hasher.verify(password, hash).await? {
                    warn!(user_id = %user.id, "Password mismatch");
                    return Err(ServiceError::authentication_failed(WRONG_CREDENTIALS));
                }
            }
            None if self.policy.allow_unset_password_login => {
                warn!(user_id = %user.id, "Login without a password set");
            }
            None => {
                return Err(ServiceError::authentication_failed(WRONG_CREDENTIALS));
            }
        }

        let tokens = self.tokens.issue_session(&user.identity())?;
        info!(user_id = %user.id, role = %user.role, "User logged in");
        Ok(LoginOutcome {
            tokens,
            user: user.view(),
        })
    }

    /// Completes an invitation: the invite token is only ever compared by its hash.
    pub async fn create_password(
        &self,
        invite_token: &str,
        raw_password: &str,
        email: &str,
    ) -> ServiceResult<()> {
        if raw_password.is_empty() {
            return Err(ServiceError::bad_request("Password is required"));
        }
        let invite_hash = crypto::hash_token(invite_token);
        let user = self
            .db
            .find_user_by_invite_hash(&invite_hash)
            .await?
            .ok_or_else(|| ServiceError::authentication_failed("Invalid token"))?;

        if user.email != normalize_email(email) {
            return Err(ServiceError::not_found("User not found"));
        }

        let password_hash = self.hasher.hash(raw_password).await?;
        self.db
            .activate_user(PasswordActivation {
                user_id: user.id,
                invite_token_hash: invite_hash,
                password_hash,
                join_date: Utc::now(),
            })
            .await
            .map_err(|e| match e {
                // Consumed by a concurrent request since the lookup.
                PortError::NotFound(_) => ServiceError::authentication_failed("Invalid token"),
                other => ServiceError::Port(other),
            })?;
        info!(user_id = %user.id, "Password created, account activated");
        Ok(())
    }

    pub async fn create_user(&self, profile: NewUser) -> ServiceResult<CreatedUser> {
        let email = normalize_email(&profile.email);
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::bad_request("A valid email is required"));
        }
        if profile.first_name.trim().is_empty() || profile.last_name.trim().is_empty() {
            return Err(ServiceError::bad_request("First and last name are required"));
        }

        let invite_token = crypto::create_token();
        let created = self
            .db
            .create_user(UserRecordInput {
                email,
                first_name: profile.first_name.trim().to_string(),
                last_name: profile.last_name.trim().to_string(),
                phone_number: profile.phone_number,
                role: profile.role,
                invite_token_hash: crypto::hash_token(&invite_token),
            })
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => ServiceError::conflict("A user with this email already exists"),
                other => ServiceError::Port(other),
            })?;

        info!(user_id = %created.id, role = %created.role, "User created");
        Ok(CreatedUser {
            user: created.view(),
            invite_token,
        })
    }

    pub async fn impersonate(&self, target_id: Uuid) -> ServiceResult<ImpersonationOutcome> {
        let target = self.load(target_id).await?;
        if !target.role.can_be_impersonated() {
            return Err(ServiceError::forbidden("Cannot impersonate an admin"));
        }
        let token = self.tokens.issue_impersonation(&target.identity())?;
        info!(target = %target.id, "Impersonation token issued");
        Ok(ImpersonationOutcome {
            token,
            user: target.view(),
        })
    }

    pub async fn get_one(&self, id: Uuid) -> ServiceResult<UserView> {
        Ok(self.load(id).await?.view())
    }

    /// Every account except admins.
    pub async fn get_all(&self) -> ServiceResult<Vec<UserView>> {
        let users = self.db.list_non_admin_users().await?;
        Ok(users.iter().map(User::view).collect())
    }

    async fn load(&self, id: Uuid) -> ServiceResult<User> {
        self.db
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::testing::{sample_user, FakeSigner, InMemoryDatabase, PlainHasher};
    use chrono::Duration;

    fn service_with(db: Arc<InMemoryDatabase>, policy: CredentialPolicy) -> CredentialService {
        let tokens = TokenService::new(Arc::new(FakeSigner), Duration::days(1), Duration::minutes(15));
        CredentialService::new(db, Arc::new(PlainHasher), tokens, policy)
    }

    fn service(db: Arc<InMemoryDatabase>) -> CredentialService {
        service_with(db, CredentialPolicy::default())
    }

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            email: email.to_string(),
            first_name: "Jamie".to_string(),
            last_name: "Rivera".to_string(),
            phone_number: Some("555-0100".to_string()),
            role,
        }
    }

    #[tokio::test]
    async fn test_login_normalizes_email_and_issues_session() {
        let db = Arc::new(InMemoryDatabase::new());
        let user = sample_user("coach@example.com", Role::Coach, UserStatus::Active, Some("plain:secret"));
        db.insert_user(user.clone());

        let outcome = service(db).login("  Coach@Example.COM ", "secret").await.unwrap();
        assert_eq!(outcome.user.id, user.id);
        assert!(!outcome.tokens.session_token.is_empty());
        assert_eq!(outcome.tokens.csrf_token.len(), 64);
    }

    #[tokio::test]
    async fn test_login_rejects_unknown_user_and_bad_password() {
        let db = Arc::new(InMemoryDatabase::new());
        db.insert_user(sample_user("a@example.com", Role::Student, UserStatus::Active, Some("plain:right")));
        let svc = service(db);

        assert!(matches!(
            svc.login("missing@example.com", "x").await,
            Err(ServiceError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            svc.login("a@example.com", "wrong").await,
            Err(ServiceError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_login_reports_inactive_account_as_business_rule() {
        let db = Arc::new(InMemoryDatabase::new());
        db.insert_user(sample_user("i@example.com", Role::Student, UserStatus::Inactive, Some("plain:pw")));
        assert!(matches!(
            service(db).login("i@example.com", "pw").await,
            Err(ServiceError::BadRequest(m)) if m == "Inactive account"
        ));
    }

    #[tokio::test]
    async fn test_login_without_password_follows_policy() {
        let db = Arc::new(InMemoryDatabase::new());
        db.insert_user(sample_user("new@example.com", Role::Coach, UserStatus::Active, None));

        assert!(matches!(
            service(db.clone()).login("new@example.com", "anything").await,
            Err(ServiceError::AuthenticationFailed(_))
        ));

        let lenient = service_with(
            db,
            CredentialPolicy {
                allow_unset_password_login: true,
            },
        );
        assert!(lenient.login("new@example.com", "anything").await.is_ok());
    }

    #[tokio::test]
    async fn test_invite_flow_activates_account() {
        let db = Arc::new(InMemoryDatabase::new());
        let svc = service(db.clone());

        let created = svc.create_user(new_user("Invitee@Example.com", Role::Coach)).await.unwrap();
        assert_eq!(created.user.email, "invitee@example.com");
        assert_eq!(created.user.status, UserStatus::Inactive);

        let stored = db.users().pop().unwrap();
        assert_eq!(stored.invite_token_hash, Some(crypto::hash_token(&created.invite_token)));
        assert_ne!(stored.invite_token_hash.as_deref(), Some(created.invite_token.as_str()));

        svc.create_password(&created.invite_token, "hunter2", "invitee@example.com")
            .await
            .unwrap();

        let activated = db.users().pop().unwrap();
        assert_eq!(activated.status, UserStatus::Active);
        assert_eq!(activated.invite_token_hash, None);
        assert_eq!(activated.password_hash.as_deref(), Some("plain:hunter2"));
        assert!(activated.join_date.is_some());

        assert!(svc.login("invitee@example.com", "hunter2").await.is_ok());

        // The invite token is single use.
        assert!(matches!(
            svc.create_password(&created.invite_token, "again", "invitee@example.com").await,
            Err(ServiceError::AuthenticationFailed(_))
        ));
    }

    /// Completes the same invitation with another password while the first request
    /// is still hashing.
    struct RacingHasher {
        db: Arc<InMemoryDatabase>,
        invite_hash: String,
    }

    #[async_trait::async_trait]
    impl PasswordHashingService for RacingHasher {
        async fn hash(&self, password: &str) -> crate::ports::PortResult<String> {
            let user = self.db.users().pop().unwrap();
            self.db
                .activate_user(PasswordActivation {
                    user_id: user.id,
                    invite_token_hash: self.invite_hash.clone(),
                    password_hash: "plain:winner".to_string(),
                    join_date: Utc::now(),
                })
                .await?;
            Ok(format!("plain:{password}"))
        }

        async fn verify(&self, _password: &str, _hash: &str) -> crate::ports::PortResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_invitation_consumed_during_hashing_is_invalid() {
        let db = Arc::new(InMemoryDatabase::new());
        let created = service(db.clone())
            .create_user(new_user("racer@example.com", Role::Coach))
            .await
            .unwrap();

        let hasher = RacingHasher {
            db: db.clone(),
            invite_hash: crypto::hash_token(&created.invite_token),
        };
        let tokens = TokenService::new(Arc::new(FakeSigner), Duration::days(1), Duration::minutes(15));
        let svc = CredentialService::new(db.clone(), Arc::new(hasher), tokens, CredentialPolicy::default());

        match svc
            .create_password(&created.invite_token, "loser", "racer@example.com")
            .await
        {
            Err(ServiceError::AuthenticationFailed(m)) => assert_eq!(m, "Invalid token"),
            other => panic!("expected AuthenticationFailed, got {:?}", other),
        }
        let stored = db.users().pop().unwrap();
        assert_eq!(stored.password_hash.as_deref(), Some("plain:winner"));
        assert_eq!(stored.status, UserStatus::Active);
    }

    #[tokio::test]
    async fn test_create_password_rejects_email_mismatch() {
        let db = Arc::new(InMemoryDatabase::new());
        let svc = service(db.clone());
        let created = svc.create_user(new_user("owner@example.com", Role::Student)).await.unwrap();

        assert!(matches!(
            svc.create_password(&created.invite_token, "pw", "other@example.com").await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(db.users()[0].status, UserStatus::Inactive);
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates_and_bad_input() {
        let db = Arc::new(InMemoryDatabase::new());
        let svc = service(db);
        svc.create_user(new_user("dup@example.com", Role::Student)).await.unwrap();

        assert!(matches!(
            svc.create_user(new_user("DUP@example.com", Role::Coach)).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            svc.create_user(new_user("not-an-email", Role::Coach)).await,
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_impersonate() {
        let db = Arc::new(InMemoryDatabase::new());
        let coach = sample_user("c@example.com", Role::Coach, UserStatus::Active, None);
        let admin = sample_user("a@example.com", Role::Admin, UserStatus::Active, None);
        db.insert_user(coach.clone());
        db.insert_user(admin.clone());
        let svc = service(db);

        let outcome = svc.impersonate(coach.id).await.unwrap();
        assert_eq!(outcome.user.id, coach.id);
        assert_eq!(svc.tokens.verify_impersonation(&outcome.token), Ok(coach.identity()));

        assert!(matches!(svc.impersonate(Uuid::new_v4()).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(svc.impersonate(admin.id).await, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_get_all_excludes_admins() {
        let db = Arc::new(InMemoryDatabase::new());
        db.insert_user(sample_user("a@example.com", Role::Admin, UserStatus::Active, None));
        db.insert_user(sample_user("c@example.com", Role::Coach, UserStatus::Active, None));
        db.insert_user(sample_user("s@example.com", Role::Student, UserStatus::Inactive, None));
        let svc = service(db);

        let all = svc.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|u| u.role != Role::Admin));
        assert!(matches!(svc.get_one(Uuid::new_v4()).await, Err(ServiceError::NotFound(_))));
    }
}
