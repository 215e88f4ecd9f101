//! Application configuration
//!
//! Read from a TOML file, by default `~/.config/account-portal/config.toml`.
//! Every section and field has a default, so a partial file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::avatar::DEFAULT_MAX_AVATAR_BYTES;
use crate::infrastructure::crypto::jwt::JwtConfig;
use crate::infrastructure::database::DatabaseConfig;
use crate::infrastructure::storage::AvatarStoreConfig;
use crate::support::InfraError;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "ACCOUNT_PORTAL_CONFIG";

/// Default config location under the user's config directory.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("account-portal")
        .join("config.toml")
}

/// Config path from `ACCOUNT_PORTAL_CONFIG`, falling back to the default.
pub fn resolve_config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_config_path())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub logging: LoggingSection,
    pub security: SecuritySection,
    pub avatars: AvatarSection,
    pub admin: AdminSection,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| InfraError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, InfraError> {
        toml::from_str(raw).map_err(|e| InfraError::Config(e.to_string()))
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
        }
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig {
            secret: self.security.jwt_secret.clone(),
            expiration_hours: self.security.session_hours,
            ..JwtConfig::default()
        }
    }

    pub fn avatar_store_config(&self) -> AvatarStoreConfig {
        AvatarStoreConfig {
            directory: self.avatars.directory.clone(),
            staging_directory: self.avatars.staging_directory.clone(),
            max_bytes: self.avatars.max_bytes,
            ..AvatarStoreConfig::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Seconds to wait for in-flight requests on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: 30,
        }
    }
}

impl ServerSection {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let defaults = DatabaseConfig::default();
        Self {
            url: defaults.url,
            max_connections: defaults.max_connections,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub jwt_secret: String,
    pub session_hours: i64,
    pub bcrypt_cost: u32,
    /// Adds the `Secure` attribute to the session cookie
    pub secure_cookies: bool,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            jwt_secret: JwtConfig::default().secret,
            session_hours: 8,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            secure_cookies: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarSection {
    pub directory: PathBuf,
    pub staging_directory: PathBuf,
    pub max_bytes: u64,
}

impl Default for AvatarSection {
    fn default() -> Self {
        let defaults = AvatarStoreConfig::default();
        Self {
            directory: defaults.directory,
            staging_directory: defaults.staging_directory,
            max_bytes: DEFAULT_MAX_AVATAR_BYTES,
        }
    }
}

/// Account created on first start when the users table is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSection {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl Default for AdminSection {
    fn default() -> Self {
        Self {
            email: "admin@example.com".to_string(),
            password: "admin12345".to_string(),
            first_name: "System".to_string(),
            last_name: "Administrator".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = AppConfig::parse(
            r#"
            [server]
            port = 9090

            [avatars]
            max_bytes = 1048576
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.avatars.max_bytes, 1024 * 1024);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.avatar_store_config().public_prefix, "uploads/avatars");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = AppConfig::parse("[server\nport = ").unwrap_err();
        assert!(matches!(err, InfraError::Config(_)));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, InfraError::Config(_)));
    }

    #[test]
    fn security_section_feeds_jwt_config() {
        let cfg = AppConfig::parse("[security]\njwt_secret = \"s3cret\"\nsession_hours = 2").unwrap();
        let jwt = cfg.jwt_config();
        assert_eq!(jwt.secret, "s3cret");
        assert_eq!(jwt.expiration_hours, 2);
        assert_eq!(jwt.issuer, "account-portal");
    }
}
