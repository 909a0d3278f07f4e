use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Duration;

use parley_api::AuthConfig;

/// Secrets shipped in sample env files. Refuse to sign tokens with them.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub auth: AuthConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = var("PARLEY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PARLEY_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let host = get("PARLEY_HOST", "0.0.0.0");
        let port: u16 = get("PARLEY_PORT", "3000")
            .parse()
            .context("PARLEY_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let ttl_days: i64 = get("PARLEY_TOKEN_TTL_DAYS", "14")
            .parse()
            .context("PARLEY_TOKEN_TTL_DAYS must be a whole number of days")?;
        if ttl_days <= 0 {
            bail!("PARLEY_TOKEN_TTL_DAYS must be positive");
        }

        Ok(Self {
            addr,
            db_path: PathBuf::from(get("PARLEY_DB_PATH", "parley.db")),
            auth: AuthConfig::new(
                jwt_secret,
                get("PARLEY_JWT_ISSUER", "parley"),
                get("PARLEY_JWT_AUDIENCE", "parley-clients"),
                Duration::days(ttl_days),
            ),
        })
    }
}
