// src/config.rs

use std::{env, str::FromStr, time::Duration};

use dotenvy::dotenv;

use crate::transaction::RetryParams;

/// Where quizzes, submissions and authors are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Postgres,
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StorageKind::Postgres),
            "memory" => Ok(StorageKind::Memory),
            other => Err(format!("unknown STORAGE '{}', expected postgres or memory", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageKind,
    /// Required only for `StorageKind::Postgres`.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub retry_max: u32,
    pub retry_min_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| format!("{} must be a valid number, got '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv().ok();

        let storage = match env::var("STORAGE") {
            Ok(raw) => raw.parse()?,
            Err(_) => StorageKind::Postgres,
        };

        let database_url = env::var("DATABASE_URL").ok();
        if storage == StorageKind::Postgres && database_url.is_none() {
            return Err("DATABASE_URL must be set".to_string());
        }

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set".to_string())?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Ok(Self {
            storage,
            database_url,
            jwt_secret,
            jwt_expiration: parse_or("JWT_EXPIRATION", 14 * 24 * 60 * 60)?,
            rust_log,
            bind_addr,
            retry_max: parse_or("RETRY_MAX", 3)?,
            retry_min_delay_ms: parse_or("RETRY_MIN_DELAY_MS", 100)?,
            retry_max_delay_ms: parse_or("RETRY_MAX_DELAY_MS", 1000)?,
        })
    }

    /// In-memory settings for tests and local runs.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self {
            storage: StorageKind::Memory,
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            jwt_expiration: 3600,
            rust_log: "info".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            retry_max: 3,
            retry_min_delay_ms: 100,
            retry_max_delay_ms: 1000,
        }
    }

    pub fn retry_params(&self) -> RetryParams {
        RetryParams {
            max_retries: self.retry_max,
            min_delay: Duration::from_millis(self.retry_min_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}
