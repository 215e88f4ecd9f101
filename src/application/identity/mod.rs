//! Identity: the signed-in user, sign-in and session tokens

pub mod context;
pub mod service;

pub use context::{RequestContext, ADMIN_ROLE, COORDINATOR_ROLE};
pub use service::{bootstrap_admin, IdentityService, SignedSession};
