use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn user_not_found(id: i32) -> Self {
        Self::NotFound {
            entity: "User",
            field: "id",
            value: id.to_string(),
        }
    }
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Storage(format!("Database error: {}", e))
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Infra(#[from] InfraError),
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_errors_become_storage_errors() {
        let err: DomainError = sea_orm::DbErr::Custom("boom".into()).into();
        assert!(matches!(err, DomainError::Storage(ref msg) if msg.contains("boom")));
    }

    #[test]
    fn user_not_found_names_the_id() {
        assert_eq!(
            DomainError::user_not_found(42).to_string(),
            "Not found: User with id=42"
        );
    }
}
