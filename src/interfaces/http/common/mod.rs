//! Shared HTTP helpers

pub mod account_form;

pub use account_form::{AccountMultipart, AVATAR_FIELD};
