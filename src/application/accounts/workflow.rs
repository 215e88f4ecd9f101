//! Account update workflow
//!
//! One procedure behind the three account forms: validate without side
//! effects, write inside a transaction while promoting any avatar, commit,
//! then clean up. A failure after promotion rolls the transaction back and
//! restores the avatar directory. Commit and the avatar settlement that
//! follows it run on a detached task, so a dropped request cannot leave the
//! database and the directory disagreeing.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use super::forms::{AvatarSubmission, CreateUserForm, EditUserForm, NameFields, ProfileForm};
use super::validation::Violations;
use crate::application::identity::RequestContext;
use crate::domain::{
    normalize_email, AccountChanges, AvatarRejection, DomainError, NewUser, ProfileChanges, User,
    UserRepositoryInterface, UserStatus, UserTransaction,
};
use crate::infrastructure::crypto::password::hash_password;
use crate::infrastructure::storage::{AvatarStore, Promotion, ValidatedUpload};

pub const PROFILE_UPDATED: &str = "Profile updated successfully.";
pub const USER_CREATED: &str = "User registered successfully.";
pub const PROFILE_FAILED: &str = "Could not update the profile. Please try again.";
pub const CREATE_FAILED: &str = "Could not register the user. Please try again.";
pub const EDIT_FAILED: &str = "Could not save the changes. Please try again.";

#[derive(Debug, Error)]
pub enum AccountError {
    /// User-correctable problems, in form order
    #[error("{}", .0.join(" "))]
    ValidationFailed(Vec<String>),

    /// Database or storage failure; everything was rolled back
    #[error("{0}")]
    PersistenceFailed(String),

    #[error("User not found")]
    NotFound,
}

impl AccountError {
    /// Messages to show above the form.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::ValidationFailed(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// A completed account change.
#[derive(Debug, Clone)]
pub struct AccountOutcome {
    pub message: String,
    /// The user as stored after commit
    pub user: User,
    /// Set when the signed-in user changed their own account; the session
    /// must be re-issued with these values.
    pub refreshed_session: Option<RequestContext>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Profile,
    Create,
    Edit,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Create => "create",
            Self::Edit => "edit",
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Self::Profile => PROFILE_FAILED,
            Self::Create => CREATE_FAILED,
            Self::Edit => EDIT_FAILED,
        }
    }
}

enum CoreWrite {
    Insert(NewUser),
    Profile { id: i32, changes: ProfileChanges },
    Account { id: i32, changes: AccountChanges },
}

/// Avatar work decided during validation.
struct AvatarPlan {
    upload: Option<ValidatedUpload>,
    /// Clear the column; only set when no upload supersedes the removal
    clear: bool,
    /// Path held before the change, deleted after commit when replaced
    previous: Option<String>,
}

impl AvatarPlan {
    fn new(upload: Option<ValidatedUpload>, remove_requested: bool, previous: Option<String>) -> Self {
        let clear = remove_requested && upload.is_none() && previous.is_some();
        Self {
            upload,
            clear,
            previous,
        }
    }
}

#[derive(Debug, Error)]
enum PersistError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] crate::infrastructure::storage::AvatarStoreError),
}

pub struct AccountWorkflow {
    repo: Arc<dyn UserRepositoryInterface>,
    avatars: AvatarStore,
    bcrypt_cost: u32,
}

impl AccountWorkflow {
    pub fn new(repo: Arc<dyn UserRepositoryInterface>, avatars: AvatarStore, bcrypt_cost: u32) -> Self {
        Self {
            repo,
            avatars,
            bcrypt_cost,
        }
    }

    pub fn avatars(&self) -> &AvatarStore {
        &self.avatars
    }

    /// The signed-in user edits their own names and avatar.
    pub async fn update_profile(
        &self,
        ctx: &RequestContext,
        form: ProfileForm,
    ) -> Result<AccountOutcome, AccountError> {
        let flow = Flow::Profile;
        let current = self.load_target(flow, ctx.user_id()).await?;

        let names = form.names.trimmed();
        let mut violations = Violations::default();
        violations.check_names(&names);
        let upload = self.check_avatar(form.avatar, &mut violations);
        reject_if_any(flow, violations)?;

        let write = CoreWrite::Profile {
            id: current.id,
            changes: profile_changes(&names),
        };
        let plan = AvatarPlan::new(upload, form.remove_avatar, current.avatar.clone());
        let user = self.persist(flow, write, plan).await?;

        Ok(self.success(flow, ctx, PROFILE_UPDATED.to_string(), user))
    }

    /// An admin registers a new account.
    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        form: CreateUserForm,
    ) -> Result<AccountOutcome, AccountError> {
        let flow = Flow::Create;
        let fields = &form.fields;
        let names = fields.names.trimmed();
        let email = normalize_email(&fields.email);

        let mut violations = Violations::default();
        violations.check_names(&names);
        let email_ok = violations.check_email_syntax(&email);
        violations.check_password(&form.password, &form.password_confirmation);
        violations
            .check_role(self.repo.as_ref(), fields.role_id)
            .await
            .map_err(|e| self.persistence_failed(flow, e))?;
        if email_ok {
            violations
                .check_email_unique(self.repo.as_ref(), &email)
                .await
                .map_err(|e| self.persistence_failed(flow, e))?;
        }
        let upload = self.check_avatar(form.avatar, &mut violations);
        reject_if_any(flow, violations)?;

        // A role is always present once validation passed.
        let role_id = fields.role_id.unwrap_or_default();
        let password_hash = hash_password(&form.password, self.bcrypt_cost)
            .map_err(|e| self.persistence_failed(flow, e))?;

        let write = CoreWrite::Insert(NewUser {
            first_name: names.first_name,
            last_name: names.last_name,
            middle_name: names.middle_name,
            email,
            password_hash,
            role_id,
            status: UserStatus::parse_lenient(&fields.status),
        });
        let user = self.persist(flow, write, AvatarPlan::new(upload, false, None)).await?;

        info!(
            admin_id = ctx.user_id(),
            user_id = user.id,
            email = %user.email,
            "User registered"
        );
        Ok(self.success(flow, ctx, USER_CREATED.to_string(), user))
    }

    /// An admin edits another account, or their own.
    pub async fn edit_user(
        &self,
        ctx: &RequestContext,
        id: i32,
        form: EditUserForm,
    ) -> Result<AccountOutcome, AccountError> {
        let flow = Flow::Edit;
        let current = self.load_target(flow, id).await?;

        let fields = &form.fields;
        let names = fields.names.trimmed();
        let mut violations = Violations::default();
        violations.check_names(&names);
        violations
            .check_role(self.repo.as_ref(), fields.role_id)
            .await
            .map_err(|e| self.persistence_failed(flow, e))?;
        let upload = self.check_avatar(form.avatar, &mut violations);
        reject_if_any(flow, violations)?;

        let write = CoreWrite::Account {
            id,
            changes: AccountChanges {
                profile: profile_changes(&names),
                role_id: fields.role_id.unwrap_or(current.role_id),
                status: UserStatus::parse_lenient(&fields.status),
            },
        };
        let plan = AvatarPlan::new(upload, form.remove_avatar, current.avatar.clone());
        let user = self.persist(flow, write, plan).await?;

        info!(admin_id = ctx.user_id(), user_id = id, "User updated");
        let message = format!("User {} was updated successfully.", user.full_name());
        Ok(self.success(flow, ctx, message, user))
    }

    async fn load_target(&self, flow: Flow, id: i32) -> Result<User, AccountError> {
        match self.repo.find_by_id(id).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                warn!(flow = flow.as_str(), user_id = id, "Account not found");
                Err(AccountError::NotFound)
            }
            Err(e) => Err(self.persistence_failed(flow, e)),
        }
    }

    fn check_avatar(
        &self,
        submission: AvatarSubmission,
        violations: &mut Violations,
    ) -> Option<ValidatedUpload> {
        let rejection = match submission {
            AvatarSubmission::None => return None,
            AvatarSubmission::Interrupted => AvatarRejection::UploadTransportError,
            AvatarSubmission::Staged(staged) => match self.avatars.validate(staged) {
                Ok(validated) => return Some(validated),
                Err(rejection) => rejection,
            },
        };
        info!(reason = %rejection, "Avatar upload rejected");
        violations.push(rejection.to_string());
        None
    }

    /// Runs the writes in one transaction and returns the committed user.
    async fn persist(
        &self,
        flow: Flow,
        write: CoreWrite,
        mut plan: AvatarPlan,
    ) -> Result<User, AccountError> {
        let fail = |e: PersistError| self.persistence_failed(flow, e);

        let mut txn = self.repo.begin().await.map_err(|e| fail(e.into()))?;
        let mut promotion = None;

        let id = match apply(txn.as_mut(), &self.avatars, write, &mut plan, &mut promotion).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "Explicit rollback failed");
                }
                if let Some(promotion) = promotion {
                    promotion.revert().await;
                    metrics::counter!("avatar_promotions_total", "outcome" => "reverted").increment(1);
                }
                return Err(fail(e));
            }
        };

        let new_path = match tokio::spawn(commit_and_settle(txn, promotion)).await {
            Ok(Ok(new_path)) => new_path,
            Ok(Err(e)) => return Err(fail(e.into())),
            Err(join) => return Err(fail(DomainError::Storage(join.to_string()).into())),
        };
        if plan.clear || new_path.is_some() {
            self.discard_previous(plan.previous.as_deref(), new_path.as_deref()).await;
        }

        match self.repo.find_by_id(id).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(fail(DomainError::user_not_found(id).into())),
            Err(e) => Err(fail(e.into())),
        }
    }

    /// Best-effort deletion of an avatar that is no longer referenced.
    async fn discard_previous(&self, previous: Option<&str>, replacement: Option<&str>) {
        let Some(previous) = previous else { return };
        if Some(previous) == replacement {
            return;
        }
        if let Err(e) = self.avatars.remove(previous).await {
            warn!(path = previous, error = %e, "Failed to delete previous avatar");
        }
    }

    fn success(&self, flow: Flow, ctx: &RequestContext, message: String, user: User) -> AccountOutcome {
        metrics::counter!("account_updates_total", "flow" => flow.as_str(), "outcome" => "success")
            .increment(1);

        let refreshed_session = (user.id == ctx.user_id()).then(|| RequestContext::from(&user));

        AccountOutcome {
            message,
            user,
            refreshed_session,
        }
    }

    fn persistence_failed(&self, flow: Flow, e: impl std::fmt::Display) -> AccountError {
        error!(flow = flow.as_str(), error = %e, "Account update failed");
        metrics::counter!("account_updates_total", "flow" => flow.as_str(), "outcome" => "failed")
            .increment(1);
        AccountError::PersistenceFailed(flow.failure_message().to_string())
    }
}

/// Commits, then finalizes or reverts the promotion to match. Returns the
/// newly stored avatar path, if any.
async fn commit_and_settle(
    txn: Box<dyn UserTransaction>,
    promotion: Option<Promotion>,
) -> Result<Option<String>, DomainError> {
    match txn.commit().await {
        Ok(()) => {
            let Some(promotion) = promotion else { return Ok(None) };
            let stored = promotion.stored_path().to_string();
            promotion.finalize().await;
            metrics::counter!("avatar_promotions_total", "outcome" => "committed").increment(1);
            Ok(Some(stored))
        }
        Err(e) => {
            if let Some(promotion) = promotion {
                promotion.revert().await;
                metrics::counter!("avatar_promotions_total", "outcome" => "reverted").increment(1);
            }
            Err(e)
        }
    }
}

/// The in-transaction steps: core fields, avatar removal, avatar promotion.
async fn apply(
    txn: &mut dyn UserTransaction,
    avatars: &AvatarStore,
    write: CoreWrite,
    plan: &mut AvatarPlan,
    promotion: &mut Option<Promotion>,
) -> Result<i32, PersistError> {
    let id = match write {
        CoreWrite::Insert(new_user) => txn.insert(new_user).await?,
        CoreWrite::Profile { id, changes } => {
            txn.update_profile(id, &changes).await?;
            id
        }
        CoreWrite::Account { id, changes } => {
            txn.update_account(id, &changes).await?;
            id
        }
    };

    if plan.clear {
        txn.set_avatar(id, None).await?;
    }

    if let Some(upload) = plan.upload.take() {
        let promoted = avatars.promote(id, upload).await.map_err(|e| {
            metrics::counter!("avatar_promotions_total", "outcome" => "failed").increment(1);
            e
        })?;
        let stored = promoted.stored_path().to_string();
        *promotion = Some(promoted);
        txn.set_avatar(id, Some(&stored)).await?;
    }

    Ok(id)
}

fn profile_changes(names: &NameFields) -> ProfileChanges {
    ProfileChanges {
        first_name: names.first_name.clone(),
        last_name: names.last_name.clone(),
        middle_name: names.middle_name.clone(),
    }
}

fn reject_if_any(flow: Flow, violations: Violations) -> Result<(), AccountError> {
    if violations.is_empty() {
        return Ok(());
    }
    metrics::counter!("account_updates_total", "flow" => flow.as_str(), "outcome" => "rejected")
        .increment(1);
    Err(AccountError::ValidationFailed(violations.into_vec()))
}
