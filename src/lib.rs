//! # Account Portal
//!
//! Small server-rendered web application for signing in, editing one's own
//! profile and, for administrators, registering and editing users.
//!
//! ## Architecture
//!
//! - **domain**: users, roles, avatar rules and the repository traits
//! - **application**: sign-in, sessions and the account update workflows
//! - **infrastructure**: SQLite via SeaORM, password hashing, JWT, avatar files
//! - **interfaces**: axum router, middleware and HTML views
//! - **support**: error types and graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod support;

pub use config::{default_config_path, resolve_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{init_database, DatabaseConfig};

// Re-export the router
pub use interfaces::http::{create_router, AppState};
