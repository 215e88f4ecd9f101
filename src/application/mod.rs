pub mod accounts;
pub mod identity;

// Re-export key types for convenience
pub use accounts::{AccountError, AccountOutcome, AccountWorkflow};
pub use identity::{bootstrap_admin, IdentityService, RequestContext, SignedSession};
