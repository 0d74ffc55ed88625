// src/config.rs

use std::{env, str::FromStr, time::Duration};

use dotenvy::dotenv;

pub const DEFAULT_GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: String,
    pub rust_log: String,
    pub gemini_api_key: Option<String>,
    pub gemini_endpoint: String,
    pub explainer_timeout: Duration,
    pub cors_origins: Vec<String>,
    /// Open sessions untouched for this long are dropped.
    pub session_idle_ttl: Duration,
    /// Completed sessions stay this long so retried submissions still get a conflict.
    pub session_retention: Duration,
    pub session_sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://exams.db?mode=rwc".to_string());

        let max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 5);

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        // An empty key counts as unset.
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let gemini_endpoint =
            env::var("GEMINI_ENDPOINT").unwrap_or_else(|_| DEFAULT_GEMINI_ENDPOINT.to_string());

        let explainer_timeout = Duration::from_secs(parse_or("EXPLAINER_TIMEOUT_SECS", 15));

        let session_idle_ttl = Duration::from_secs(parse_or("SESSION_IDLE_TTL_SECS", 7200));
        let session_retention = Duration::from_secs(parse_or("SESSION_RETENTION_SECS", 600));
        let session_sweep_interval =
            Duration::from_secs(parse_or("SESSION_SWEEP_SECS", 60).max(1));

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:8081".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Self {
            database_url,
            max_connections,
            bind_addr,
            rust_log,
            gemini_api_key,
            gemini_endpoint,
            explainer_timeout,
            cors_origins,
            session_idle_ttl,
            session_retention,
            session_sweep_interval,
        }
    }

    /// Configuration for tests: in-memory database, no explainer key, short timeout.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            bind_addr: "127.0.0.1:0".to_string(),
            rust_log: "error".to_string(),
            gemini_api_key: None,
            gemini_endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            explainer_timeout: Duration::from_millis(200),
            cors_origins: vec!["http://localhost:3000".to_string()],
            session_idle_ttl: Duration::from_secs(3600),
            session_retention: Duration::from_secs(600),
            session_sweep_interval: Duration::from_secs(60),
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value '{}' for {}, using {}", raw, key, default);
            default
        }),
        Err(_) => default,
    }
}
