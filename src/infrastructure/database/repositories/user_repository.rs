use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use tracing::debug;

use crate::domain::{
    AccountChanges, DomainError, DomainResult, NewUser, ProfileChanges, Role, User,
    UserRepositoryInterface, UserStatus, UserTransaction,
};
use crate::infrastructure::database::entities::{role, user};

pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn entity_status_to_domain(status: user::UserStatus) -> UserStatus {
    match status {
        user::UserStatus::Active => UserStatus::Active,
        user::UserStatus::Inactive => UserStatus::Inactive,
    }
}

fn domain_status_to_entity(status: UserStatus) -> user::UserStatus {
    match status {
        UserStatus::Active => user::UserStatus::Active,
        UserStatus::Inactive => user::UserStatus::Inactive,
    }
}

fn user_model_to_domain(model: user::Model, role: Option<role::Model>) -> User {
    User {
        id: model.id,
        first_name: model.first_name,
        last_name: model.last_name,
        middle_name: model.middle_name,
        email: model.email,
        password_hash: model.password_hash,
        role_id: model.role_id,
        role_name: role.map(|r| r.name).unwrap_or_default(),
        status: entity_status_to_domain(model.status),
        avatar: model.avatar,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn role_model_to_domain(model: role::Model) -> Role {
    Role {
        id: model.id,
        name: model.name,
    }
}

/// Case-insensitive email match; rows written before emails were
/// normalized may still carry upper-case letters.
fn email_matches(email: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col((user::Entity, user::Column::Email)))).eq(email.to_lowercase())
}

fn insert_err(e: sea_orm::DbErr) -> DomainError {
    let msg = e.to_string();
    if msg.contains("UNIQUE") || msg.contains("duplicate") {
        DomainError::Conflict("Email already exists".to_string())
    } else {
        e.into()
    }
}

// ── Repository implementation ───────────────────────────────────

#[async_trait]
impl UserRepositoryInterface for UserRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<User>> {
        let found = user::Entity::find_by_id(id)
            .find_also_related(role::Entity)
            .one(&self.db)
            .await?;

        Ok(found.map(|(model, role)| user_model_to_domain(model, role)))
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        let found = user::Entity::find()
            .filter(email_matches(email))
            .find_also_related(role::Entity)
            .one(&self.db)
            .await?;

        Ok(found.map(|(model, role)| user_model_to_domain(model, role)))
    }

    async fn email_exists(&self, email: &str) -> DomainResult<bool> {
        let count = user::Entity::find()
            .filter(email_matches(email))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    async fn count_users(&self) -> DomainResult<u64> {
        Ok(user::Entity::find().count(&self.db).await?)
    }

    async fn list_users(&self) -> DomainResult<Vec<User>> {
        let rows = user::Entity::find()
            .find_also_related(role::Entity)
            .order_by_asc(user::Column::LastName)
            .order_by_asc(user::Column::FirstName)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(model, role)| user_model_to_domain(model, role))
            .collect())
    }

    async fn list_roles(&self) -> DomainResult<Vec<Role>> {
        let rows = role::Entity::find()
            .order_by_asc(role::Column::Name)
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(role_model_to_domain).collect())
    }

    async fn role_exists(&self, role_id: i32) -> DomainResult<bool> {
        Ok(role::Entity::find_by_id(role_id)
            .one(&self.db)
            .await?
            .is_some())
    }

    async fn find_role_by_name(&self, name: &str) -> DomainResult<Option<Role>> {
        let found = role::Entity::find()
            .filter(role::Column::Name.eq(name))
            .one(&self.db)
            .await?;

        Ok(found.map(role_model_to_domain))
    }

    async fn begin(&self) -> DomainResult<Box<dyn UserTransaction>> {
        let txn = self.db.begin().await?;
        debug!("User transaction opened");
        Ok(Box::new(SeaOrmUserTransaction { txn }))
    }
}

/// Write handle over a SeaORM transaction. SeaORM rolls the transaction back
/// when it is dropped without a commit.
pub struct SeaOrmUserTransaction {
    txn: DatabaseTransaction,
}

impl SeaOrmUserTransaction {
    async fn load(&self, id: i32) -> DomainResult<user::ActiveModel> {
        let existing = user::Entity::find_by_id(id)
            .one(&self.txn)
            .await?
            .ok_or_else(|| DomainError::user_not_found(id))?;

        Ok(existing.into())
    }
}

fn apply_profile(active: &mut user::ActiveModel, changes: &ProfileChanges) {
    active.first_name = Set(changes.first_name.clone());
    active.last_name = Set(changes.last_name.clone());
    active.middle_name = Set(changes.middle_name.clone());
    active.updated_at = Set(Utc::now());
}

#[async_trait]
impl UserTransaction for SeaOrmUserTransaction {
    async fn insert(&mut self, new_user: NewUser) -> DomainResult<i32> {
        let now = Utc::now();

        let row = user::ActiveModel {
            id: NotSet,
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            middle_name: Set(new_user.middle_name),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            role_id: Set(new_user.role_id),
            status: Set(domain_status_to_entity(new_user.status)),
            avatar: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = row.insert(&self.txn).await.map_err(insert_err)?;
        Ok(inserted.id)
    }

    async fn update_profile(&mut self, id: i32, changes: &ProfileChanges) -> DomainResult<()> {
        let mut active = self.load(id).await?;
        apply_profile(&mut active, changes);
        active.update(&self.txn).await?;
        Ok(())
    }

    async fn update_account(&mut self, id: i32, changes: &AccountChanges) -> DomainResult<()> {
        let mut active = self.load(id).await?;
        apply_profile(&mut active, &changes.profile);
        active.role_id = Set(changes.role_id);
        active.status = Set(domain_status_to_entity(changes.status));
        active.update(&self.txn).await?;
        Ok(())
    }

    async fn set_avatar(&mut self, id: i32, avatar: Option<&str>) -> DomainResult<()> {
        let mut active = self.load(id).await?;
        active.avatar = Set(avatar.map(str::to_string));
        active.updated_at = Set(Utc::now());
        active.update(&self.txn).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> DomainResult<()> {
        self.txn.commit().await?;
        debug!("User transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DomainResult<()> {
        self.txn.rollback().await?;
        debug!("User transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::memory_database;

    fn new_user(email: &str, role_id: i32) -> NewUser {
        NewUser {
            first_name: "Ana".into(),
            last_name: "Lopez".into(),
            middle_name: String::new(),
            email: email.into(),
            password_hash: "hash".into(),
            role_id,
            status: UserStatus::Active,
        }
    }

    async fn repo_with_roles() -> (UserRepository, Role) {
        let repo = UserRepository::new(memory_database().await);
        let role = repo.find_role_by_name("user").await.unwrap().unwrap();
        (repo, role)
    }

    #[tokio::test]
    async fn seeded_roles_are_listed_by_name() {
        let (repo, _) = repo_with_roles().await;
        let names: Vec<String> = repo.list_roles().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["admin", "coordinator", "user"]);
    }

    #[tokio::test]
    async fn committed_insert_is_visible_with_role_name() {
        let (repo, role) = repo_with_roles().await;

        let mut txn = repo.begin().await.unwrap();
        let id = txn.insert(new_user("ana@example.com", role.id)).await.unwrap();
        txn.commit().await.unwrap();

        let user = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.role_name, "user");
        assert!(user.avatar.is_none());
        assert!(repo.email_exists("ana@example.com").await.unwrap());
        assert_eq!(repo.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let (repo, role) = repo_with_roles().await;

        {
            let mut txn = repo.begin().await.unwrap();
            txn.insert(new_user("ghost@example.com", role.id)).await.unwrap();
        }

        assert!(!repo.email_exists("ghost@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn explicit_rollback_discards_updates() {
        let (repo, role) = repo_with_roles().await;
        let mut txn = repo.begin().await.unwrap();
        let id = txn.insert(new_user("ana@example.com", role.id)).await.unwrap();
        txn.commit().await.unwrap();

        let mut txn = repo.begin().await.unwrap();
        txn.set_avatar(id, Some("uploads/avatars/user_1.png")).await.unwrap();
        txn.rollback().await.unwrap();

        assert!(repo.find_by_id(id).await.unwrap().unwrap().avatar.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let (repo, role) = repo_with_roles().await;
        let mut txn = repo.begin().await.unwrap();
        txn.insert(new_user("dup@example.com", role.id)).await.unwrap();
        let err = txn.insert(new_user("dup@example.com", role.id)).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_account_changes_role_and_status() {
        let (repo, role) = repo_with_roles().await;
        let admin = repo.find_role_by_name("admin").await.unwrap().unwrap();
        let mut txn = repo.begin().await.unwrap();
        let id = txn.insert(new_user("ana@example.com", role.id)).await.unwrap();
        txn.update_account(
            id,
            &AccountChanges {
                profile: ProfileChanges {
                    first_name: "Ana".into(),
                    last_name: "Perez".into(),
                    middle_name: "Ruiz".into(),
                },
                role_id: admin.id,
                status: UserStatus::Inactive,
            },
        )
        .await
        .unwrap();
        txn.commit().await.unwrap();

        let user = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.last_name, "Perez");
        assert_eq!(user.middle_name, "Ruiz");
        assert_eq!(user.role_name, "admin");
        assert_eq!(user.status, UserStatus::Inactive);
    }

    #[tokio::test]
    async fn updating_missing_user_is_not_found() {
        let (repo, _) = repo_with_roles().await;
        let mut txn = repo.begin().await.unwrap();
        let err = txn.set_avatar(999, None).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
