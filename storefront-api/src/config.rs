/// Configuration management for the API server
///
/// Loaded from environment variables (a `.env` file is read first when
/// present).
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `CORS_ORIGINS`: comma-separated allowed origins, `*` for any (default: *)
/// - `PRODUCTION`: enables HSTS (default: false)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `JWT_SECRET`: HS256 signing key, at least 32 characters (required)
/// - `JWT_ACCESS_TTL_MINUTES`: access token lifetime (default: 30)
/// - `JWT_REFRESH_TTL_DAYS`: refresh token lifetime (default: 7)
/// - `FRONTEND_URL`: base URL for links in account e-mails (default: http://localhost:3000)
/// - `AUTH_RATE_LIMIT_PER_MINUTE`: per-IP budget on sensitive auth routes (default: 10)
///
/// # Example
///
/// ```no_run
/// use storefront_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;

use anyhow::Context;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use storefront_shared::auth::jwt::TokenLifetimes;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub accounts: AccountsConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Enables HSTS
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing key
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

impl JwtConfig {
    pub fn lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access: Duration::minutes(self.access_ttl_minutes),
            refresh: Duration::days(self.refresh_ttl_days),
        }
    }
}

/// Account flow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// Base URL of the frontend, used to build verification and reset links
    pub frontend_url: String,

    /// Requests per minute per client IP on login, registration and password reset
    pub auth_rate_limit_per_minute: u32,
}

fn var_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, value)),
        Err(_) => Ok(default),
    }
}

/// Splits `CORS_ORIGINS`
pub fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value does not
    /// parse, or the JWT secret is shorter than 32 characters.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        let config = Self {
            api: ApiConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: var_or("API_PORT", 8080)?,
                cors_origins: parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string())),
                production: var_or("PRODUCTION", false)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: var_or("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_ttl_minutes: var_or("JWT_ACCESS_TTL_MINUTES", 30)?,
                refresh_ttl_days: var_or("JWT_REFRESH_TTL_DAYS", 7)?,
            },
            accounts: AccountsConfig {
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                auth_rate_limit_per_minute: var_or("AUTH_RATE_LIMIT_PER_MINUTE", 10)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but make no sense
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt.secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }
        if self.jwt.access_ttl_minutes <= 0 || self.jwt.refresh_ttl_days <= 0 {
            anyhow::bail!("JWT lifetimes must be positive");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }
        if self.accounts.auth_rate_limit_per_minute == 0 {
            anyhow::bail!("AUTH_RATE_LIMIT_PER_MINUTE must be at least 1");
        }
        Ok(())
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether any origin may call the API
    pub fn cors_allows_any(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                max_connections: 10,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
                access_ttl_minutes: 30,
                refresh_ttl_days: 7,
            },
            accounts: AccountsConfig {
                frontend_url: "http://localhost:3000".to_string(),
                auth_rate_limit_per_minute: 10,
            },
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(config().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_validate() {
        assert!(config().validate().is_ok());

        let mut short_secret = config();
        short_secret.jwt.secret = "too-short".to_string();
        assert!(short_secret.validate().is_err());

        let mut no_limit = config();
        no_limit.accounts.auth_rate_limit_per_minute = 0;
        assert!(no_limit.validate().is_err());
    }

    #[test]
    fn test_lifetimes() {
        let lifetimes = config().jwt.lifetimes();
        assert_eq!(lifetimes.access, Duration::minutes(30));
        assert_eq!(lifetimes.refresh, Duration::days(7));
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://shop.example.com/, http://localhost:3000,,"),
            vec!["https://shop.example.com", "http://localhost:3000"]
        );
        assert!(config().cors_allows_any());
    }
}
