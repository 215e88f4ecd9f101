//! User aggregate
//!
//! Contains the User entity, the role lookup, DTOs, and the repository
//! interface.

pub mod model;
pub mod repository;

mod dto_create;
mod dto_update;

// Re-export model types
pub use model::{normalize_email, Role, User, UserStatus};

// Re-export DTOs
pub use dto_create::NewUser;
pub use dto_update::{AccountChanges, ProfileChanges};

// Re-export repository traits
pub use repository::{UserRepositoryInterface, UserTransaction};
