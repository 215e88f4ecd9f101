//! Session token handling
//!
//! The session cookie carries a signed JWT. Besides the identity it caches
//! the display name and avatar path shown in the navigation bar, so pages
//! can render the shell without another query.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Token expiration time in hours
    pub expiration_hours: i64,
    /// Issuer claim
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            expiration_hours: 8,
            issuer: "account-portal".to_string(),
        }
    }
}

/// Session token claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: i32,
    /// Role name at sign-in time
    pub role: String,
    /// Cached first name for the navigation bar
    pub name: String,
    /// Cached avatar path; `None` renders the default image
    pub avatar: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl SessionClaims {
    pub fn new(
        user_id: i32,
        role: &str,
        name: &str,
        avatar: Option<&str>,
        config: &JwtConfig,
    ) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(config.expiration_hours);

        Self {
            sub: user_id,
            role: role.to_string(),
            name: name.to_string(),
            avatar: avatar.map(str::to_string),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: config.issuer.clone(),
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Sign session claims into a token
pub fn create_token(
    claims: &SessionClaims,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Verify and decode a session token
pub fn verify_token(
    token: &str,
    config: &JwtConfig,
) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.set_issuer(&[&config.issuer]);

    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_verify_token() {
        let config = JwtConfig::default();
        let claims = SessionClaims::new(7, "admin", "Ana", Some("uploads/avatars/user_7.png"), &config);
        let token = create_token(&claims, &config).unwrap();

        let decoded = verify_token(&token, &config).unwrap();
        assert_eq!(decoded, claims);
        assert!(!decoded.is_expired());
    }

    #[test]
    fn test_invalid_token() {
        let config = JwtConfig::default();
        assert!(verify_token("invalid-token", &config).is_err());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = JwtConfig::default();
        let other = JwtConfig {
            secret: "another-secret".into(),
            ..JwtConfig::default()
        };
        let token = create_token(&SessionClaims::new(1, "user", "Bo", None, &other), &other).unwrap();
        assert!(verify_token(&token, &config).is_err());
    }
}
