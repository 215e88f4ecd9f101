//! Sign-in form

use serde::Deserialize;

/// Urlencoded body of `POST /login`
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}
