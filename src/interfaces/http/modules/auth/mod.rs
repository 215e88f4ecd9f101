//! Auth module: sign-in and sign-out

pub mod dto;
pub mod handlers;

pub use handlers::*;
