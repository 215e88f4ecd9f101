pub mod avatar;
pub mod user;

// Re-export commonly used types
pub use avatar::{AvatarFormat, AvatarRejection};
pub use user::{
    normalize_email, AccountChanges, NewUser, ProfileChanges, Role, User, UserRepositoryInterface, UserStatus,
    UserTransaction,
};

// Re-export DomainError from support for convenience
pub use crate::support::errors::{DomainError, DomainResult};
