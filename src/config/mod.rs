use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub run_migrations: bool,
    pub paseto_access_key: [u8; 32],
    pub auth_issuer: String,
    pub admin_token: Option<String>,
    pub request_body_limit_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let http_addr = env.or("HTTP_ADDR", "0.0.0.0:8080");
        SocketAddr::from_str(&http_addr).map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        Ok(Self {
            http_addr,
            database_url: env.required("DATABASE_URL")?,
            db_max_connections: env.parse_or("DB_MAX_CONNECTIONS", "10")?,
            db_connect_timeout_seconds: env.parse_or("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env.parse_or("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env.parse_or("DB_MAX_LIFETIME_SECONDS", "1800")?,
            run_migrations: env.parse_or("RUN_MIGRATIONS", "true")?,
            paseto_access_key: env.key_32("PASETO_ACCESS_KEY")?,
            auth_issuer: env.or("AUTH_ISSUER", "hiremebahamas"),
            admin_token: (env.lookup)("ADMIN_TOKEN").filter(|token| !token.is_empty()),
            request_body_limit_bytes: env.parse_or("REQUEST_BODY_LIMIT_BYTES", "16384")?,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn or(&self, key: &str, default: &str) -> String {
        (self.lookup)(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> Result<String> {
        (self.lookup)(key).ok_or_else(|| anyhow!("missing required env var: {}", key))
    }

    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        self.or(key, default)
            .parse::<T>()
            .map_err(|err| anyhow!("invalid {}: {}", key, err))
    }

    fn key_32(&self, key: &str) -> Result<[u8; 32]> {
        let value = self.required(key)?;
        let decoded = STANDARD
            .decode(value.as_bytes())
            .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
        if decoded.len() != 32 {
            return Err(anyhow!("invalid {}: expected 32 bytes", key));
        }
        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&decoded);
        Ok(key_bytes)
    }
}
