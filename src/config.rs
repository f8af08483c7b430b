use anyhow::Result;
use config::{builder::DefaultState, Config, ConfigBuilder, Environment};
use serde::Deserialize;

/// Application configuration, read from the environment (and `.env` via dotenv)
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Connection string for the application pool
    pub database_url: String,
    /// Connection string with privileges to run migrations
    pub database_admin_url: Option<String>,
    pub database_max_connections: u32,
    /// Address the HTTP server listens on
    pub bind_address: String,
    /// Secret used to sign session tokens
    pub jwt_secret: String,
    pub jwt_expiration_seconds: i64,
    pub jwt_issuer: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        let settings = Self::builder()?
            .add_source(Environment::default().try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Builder pre-populated with defaults for every optional setting
    fn builder() -> Result<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            .set_default("database_max_connections", 5_i64)?
            .set_default("bind_address", "0.0.0.0:8080")?
            .set_default("jwt_expiration_seconds", 86_400_i64)? // 24 hours
            .set_default("jwt_issuer", "plannercore")?;

        Ok(builder)
    }

    /// Migrations fall back to the application URL when no admin URL is configured
    pub fn admin_database_url(&self) -> &str {
        self.database_admin_url
            .as_deref()
            .unwrap_or(&self.database_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn load_from_toml(source: &str) -> Result<AppConfig> {
        let settings = AppConfig::builder()?
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    #[test]
    fn test_defaults_applied() {
        let config = load_from_toml(
            r#"
            database_url = "postgres://app@localhost/planner"
            jwt_secret = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.jwt_expiration_seconds, 86_400);
        assert_eq!(config.jwt_issuer, "plannercore");
        assert_eq!(config.admin_database_url(), "postgres://app@localhost/planner");
    }

    #[test]
    fn test_admin_url_override() {
        let config = load_from_toml(
            r#"
            database_url = "postgres://app@localhost/planner"
            database_admin_url = "postgres://admin@localhost/planner"
            jwt_secret = "secret"
            bind_address = "127.0.0.1:3000"
            "#,
        )
        .unwrap();

        assert_eq!(config.admin_database_url(), "postgres://admin@localhost/planner");
        assert_eq!(config.bind_address, "127.0.0.1:3000");
    }

    #[test]
    fn test_missing_secret_rejected() {
        let result = load_from_toml(r#"database_url = "postgres://app@localhost/planner""#);
        assert!(result.is_err());
    }
}
