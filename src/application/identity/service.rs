//! Sign-in and session issuing
//!
//! HTTP handlers stay thin and delegate credential checks and token
//! creation here. A session token only names the account; every request
//! re-reads the row so deactivation and role changes apply immediately.

use std::sync::Arc;

use tracing::{info, warn};

use super::context::{RequestContext, ADMIN_ROLE};
use crate::config::AdminSection;
use crate::domain::{
    normalize_email, DomainError, DomainResult, NewUser, UserRepositoryInterface, UserStatus,
};
use crate::infrastructure::crypto::jwt::{create_token, verify_token, JwtConfig, SessionClaims};
use crate::infrastructure::crypto::password::{hash_password, verify_password};

/// A signed session ready to be stored in the cookie.
#[derive(Debug, Clone)]
pub struct SignedSession {
    pub token: String,
    pub context: RequestContext,
    /// Lifetime in seconds
    pub expires_in: i64,
}

pub struct IdentityService {
    repo: Arc<dyn UserRepositoryInterface>,
    jwt_config: JwtConfig,
}

impl IdentityService {
    pub fn new(repo: Arc<dyn UserRepositoryInterface>, jwt_config: JwtConfig) -> Self {
        Self { repo, jwt_config }
    }

    /// Checks email and password and signs a session for an active account.
    pub async fn login(&self, email: &str, password: &str) -> DomainResult<SignedSession> {
        let email = normalize_email(email);
        let Some(user) = self.repo.find_by_email(&email).await? else {
            info!(email = %email, "Login failed: unknown email");
            return Err(DomainError::Unauthorized("Invalid credentials".into()));
        };

        if !verify_password(password, &user.password_hash) {
            info!(user_id = user.id, "Login failed: wrong password");
            return Err(DomainError::Unauthorized("Invalid credentials".into()));
        }

        if !user.is_active() {
            info!(user_id = user.id, "Login refused: account inactive");
            return Err(DomainError::Forbidden("Account is disabled".into()));
        }

        let session = self.issue(&RequestContext::from(&user))?;

        info!(user_id = user.id, role = %user.role_name, "User signed in");
        Ok(session)
    }

    /// Signs a session for an already known identity, e.g. after the user
    /// changed their own name or avatar.
    pub fn issue(&self, context: &RequestContext) -> DomainResult<SignedSession> {
        let claims = SessionClaims::new(
            context.user_id,
            &context.role,
            &context.display_name,
            context.avatar.as_deref(),
            &self.jwt_config,
        );
        let token = create_token(&claims, &self.jwt_config)
            .map_err(|e| DomainError::Storage(format!("Failed to create token: {}", e)))?;

        Ok(SignedSession {
            token,
            context: context.clone(),
            expires_in: self.jwt_config.expiration_hours * 3600,
        })
    }

    /// Resolves a session token into the request identity, built from the
    /// current account row. `None` when the token is invalid or the account
    /// is gone or inactive; `Err` only when the lookup itself failed.
    pub async fn authenticate(&self, token: &str) -> DomainResult<Option<RequestContext>> {
        let claims = match verify_token(token, &self.jwt_config) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Rejected session token");
                return Ok(None);
            }
        };

        match self.repo.find_by_id(claims.sub).await? {
            Some(user) if user.is_active() => Ok(Some(RequestContext::from(&user))),
            Some(user) => {
                info!(user_id = user.id, "Session refused: account inactive");
                Ok(None)
            }
            None => {
                info!(user_id = claims.sub, "Session refused: account no longer exists");
                Ok(None)
            }
        }
    }
}

/// Creates the configured administrator when no users exist yet.
/// Returns the new user's id, or `None` when accounts already exist.
pub async fn bootstrap_admin(
    repo: &dyn UserRepositoryInterface,
    admin: &AdminSection,
    bcrypt_cost: u32,
) -> DomainResult<Option<i32>> {
    if repo.count_users().await? > 0 {
        return Ok(None);
    }

    let role = repo
        .find_role_by_name(ADMIN_ROLE)
        .await?
        .ok_or(DomainError::NotFound {
            entity: "Role",
            field: "name",
            value: ADMIN_ROLE.to_string(),
        })?;

    let password_hash = hash_password(&admin.password, bcrypt_cost)
        .map_err(|e| DomainError::Storage(e.to_string()))?;

    let mut txn = repo.begin().await?;
    let id = txn
        .insert(NewUser {
            first_name: admin.first_name.clone(),
            last_name: admin.last_name.clone(),
            middle_name: String::new(),
            email: normalize_email(&admin.email),
            password_hash,
            role_id: role.id,
            status: UserStatus::Active,
        })
        .await?;
    txn.commit().await?;

    warn!(
        email = %admin.email,
        "Default admin created; change its password"
    );
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountChanges, ProfileChanges};
    use crate::infrastructure::crypto::password::TEST_BCRYPT_COST;
    use crate::infrastructure::database::{memory_database, UserRepository};

    fn admin_section() -> AdminSection {
        AdminSection {
            email: "root@example.com".into(),
            password: "rootpassword".into(),
            ..AdminSection::default()
        }
    }

    async fn service() -> (IdentityService, Arc<UserRepository>) {
        let repo = Arc::new(UserRepository::new(memory_database().await));
        bootstrap_admin(repo.as_ref(), &admin_section(), TEST_BCRYPT_COST)
            .await
            .unwrap();
        (IdentityService::new(repo.clone(), JwtConfig::default()), repo)
    }

    #[tokio::test]
    async fn bootstrap_runs_once() {
        let (_, repo) = service().await;
        let again = bootstrap_admin(repo.as_ref(), &admin_section(), TEST_BCRYPT_COST)
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(repo.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn login_issues_verifiable_session() {
        let (service, _) = service().await;
        let session = service.login(" root@example.com ", "rootpassword").await.unwrap();

        assert_eq!(session.context.role, "admin");
        assert_eq!(session.context.display_name, "System");
        assert!(session.context.avatar.is_none());

        let ctx = service.authenticate(&session.token).await.unwrap().unwrap();
        assert_eq!(ctx, session.context);
    }

    #[tokio::test]
    async fn login_ignores_email_case() {
        let (service, _) = service().await;
        let session = service.login("Root@Example.COM", "rootpassword").await.unwrap();
        assert_eq!(session.context.role, "admin");
    }

    #[tokio::test]
    async fn deactivated_account_loses_its_session() {
        let (service, repo) = service().await;
        let session = service.login("root@example.com", "rootpassword").await.unwrap();
        deactivate(repo.as_ref(), "root@example.com").await;

        assert_eq!(service.authenticate(&session.token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn session_reflects_current_account_row() {
        let (service, repo) = service().await;
        let session = service.login("root@example.com", "rootpassword").await.unwrap();
        let admin = repo.find_by_email("root@example.com").await.unwrap().unwrap();

        let mut txn = repo.begin().await.unwrap();
        txn.update_profile(
            admin.id,
            &ProfileChanges {
                first_name: "Renamed".into(),
                last_name: admin.last_name.clone(),
                middle_name: String::new(),
            },
        )
        .await
        .unwrap();
        txn.commit().await.unwrap();

        let ctx = service.authenticate(&session.token).await.unwrap().unwrap();
        assert_eq!(ctx.display_name, "Renamed");
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let (service, _) = service().await;
        let err = service.login("root@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));

        let err = service.login("nobody@example.com", "rootpassword").await.unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    async fn deactivate(repo: &UserRepository, email: &str) {
        let user = repo.find_by_email(email).await.unwrap().unwrap();
        let mut txn = repo.begin().await.unwrap();
        txn.update_account(
            user.id,
            &AccountChanges {
                profile: ProfileChanges {
                    first_name: user.first_name.clone(),
                    last_name: user.last_name.clone(),
                    middle_name: String::new(),
                },
                role_id: user.role_id,
                status: UserStatus::Inactive,
            },
        )
        .await
        .unwrap();
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn inactive_account_cannot_sign_in() {
        let (service, repo) = service().await;
        deactivate(repo.as_ref(), "root@example.com").await;

        let err = service.login("root@example.com", "rootpassword").await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn garbage_token_does_not_authenticate() {
        let (service, _) = service().await;
        assert_eq!(service.authenticate("garbage").await.unwrap(), None);
    }
}
