//! Users module: admin listing, create and edit

pub mod handlers;

pub use handlers::*;
