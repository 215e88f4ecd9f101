//! Own-profile editing

pub mod handlers;

pub use handlers::*;
