use async_trait::async_trait;

use super::{AccountChanges, NewUser, ProfileChanges, Role, User};
use crate::support::DomainResult;

/// Read side of the user store plus the entry point for write transactions.
///
/// Reads go through the connection pool and must not be issued while the
/// caller holds an open [`UserTransaction`].
#[async_trait]
pub trait UserRepositoryInterface: Send + Sync {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>>;
    async fn email_exists(&self, email: &str) -> DomainResult<bool>;
    async fn count_users(&self) -> DomainResult<u64>;
    async fn list_users(&self) -> DomainResult<Vec<User>>;

    async fn list_roles(&self) -> DomainResult<Vec<Role>>;
    async fn role_exists(&self, role_id: i32) -> DomainResult<bool>;
    async fn find_role_by_name(&self, name: &str) -> DomainResult<Option<Role>>;

    /// Opens a write transaction. Dropping the handle without calling
    /// [`UserTransaction::commit`] rolls it back.
    async fn begin(&self) -> DomainResult<Box<dyn UserTransaction>>;
}

/// Writes executed inside a single database transaction.
#[async_trait]
pub trait UserTransaction: Send {
    /// Inserts a user without an avatar and returns the new id.
    async fn insert(&mut self, user: NewUser) -> DomainResult<i32>;
    async fn update_profile(&mut self, id: i32, changes: &ProfileChanges) -> DomainResult<()>;
    async fn update_account(&mut self, id: i32, changes: &AccountChanges) -> DomainResult<()>;
    async fn set_avatar(&mut self, id: i32, avatar: Option<&str>) -> DomainResult<()>;

    async fn commit(self: Box<Self>) -> DomainResult<()>;
    async fn rollback(self: Box<Self>) -> DomainResult<()>;
}
