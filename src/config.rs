use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

/// Seven days, the validity window of every issued token.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 7;

pub const DEFAULT_BCRYPT_COST: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub bcrypt_cost: u32,
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    /// Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .context("DATABASE_URL must be set")?;

        let secret = lookup("JWT_SECRET")
            .or_else(|| lookup("TOKEN_SECRET"))
            .filter(|v| !v.trim().is_empty())
            .context("JWT_SECRET must be set; refusing to sign tokens without a secret")?;

        let ttl_minutes = match lookup("JWT_TTL_MINUTES") {
            Some(v) => v
                .parse::<i64>()
                .ok()
                .filter(|m| *m > 0)
                .with_context(|| format!("JWT_TTL_MINUTES is not a positive integer: {v}"))?,
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(v) => v
                .parse::<u32>()
                .ok()
                .filter(|c| (4..=31).contains(c))
                .with_context(|| format!("BCRYPT_COST must be between 4 and 31: {v}"))?,
            None => DEFAULT_BCRYPT_COST,
        };

        let port = lookup("APP_PORT")
            .or_else(|| lookup("PORT"))
            .map(|v| v.parse::<u16>().with_context(|| format!("invalid port: {v}")))
            .transpose()?
            .unwrap_or(8080);

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url,
            jwt: JwtConfig { secret, ttl_minutes },
            bcrypt_cost,
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            cors_origins,
        })
    }
}
