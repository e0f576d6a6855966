use anyhow::{Context, Result, bail};
use std::env;
use std::time::Duration;

use crate::generator::options::{DEFAULT_SIZE, MAX_SIZE, MIN_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("Unknown STORAGE_BACKEND '{}', expected 'mongo' or 'memory'", other),
        }
    }
}

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub port: u16,
    /// Public origin that tracking paths are joined onto.
    pub app_url: String,
    pub storage_backend: StorageBackend,
    pub mongodb_uri: String,
    pub database_name: String,
    /// Remote tracking backend. When unset this server issues tracking
    /// links itself.
    pub tracking_api_url: Option<String>,
    /// Bearer token sent to the remote tracking backend.
    pub tracking_api_token: Option<String>,
    pub tracking_timeout: Duration,
    pub jwt_secret: String,
    pub check_link_reachability: bool,
    pub qr_default_size: u32,
    pub cors_origins: Vec<String>,
    pub ip_hash_salt: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("127.0.0.1"),
            port: 8080,
            app_url: String::from("http://localhost:8080"),
            storage_backend: StorageBackend::Memory,
            mongodb_uri: String::from("mongodb://localhost:27017"),
            database_name: String::from("qrsmall"),
            tracking_api_url: None,
            tracking_api_token: None,
            tracking_timeout: Duration::from_secs(10),
            jwt_secret: String::from("change-me"),
            check_link_reachability: true,
            qr_default_size: DEFAULT_SIZE,
            cors_origins: vec![
                String::from("http://localhost:5173"),
                String::from("http://localhost:4173"),
            ],
            ip_hash_salt: String::from("qrsmall"),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let port = match env::var("PORT") {
            Ok(port) => port.parse::<u16>().context("PORT must be a valid port number")?,
            Err(_) => defaults.port,
        };
        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::Mongo,
        };
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET not set")?;
        let check_link_reachability = match env::var("CHECK_LINK_REACHABILITY") {
            Ok(value) => parse_bool(&value)
                .with_context(|| format!("CHECK_LINK_REACHABILITY has invalid value '{}'", value))?,
            Err(_) => defaults.check_link_reachability,
        };
        let qr_default_size = match env::var("QR_DEFAULT_SIZE") {
            Ok(value) => value
                .parse::<u32>()
                .context("QR_DEFAULT_SIZE must be a number of pixels")?
                .clamp(MIN_SIZE, MAX_SIZE),
            Err(_) => defaults.qr_default_size,
        };
        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(value) => value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => defaults.cors_origins,
        };

        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port,
            app_url: env::var("APP_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://localhost:{}", port)),
            storage_backend,
            mongodb_uri: env::var("MONGODB_URI").unwrap_or(defaults.mongodb_uri),
            database_name: env::var("DATABASE_NAME").unwrap_or(defaults.database_name),
            tracking_api_url: env::var("TRACKING_API_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            tracking_api_token: env::var("TRACKING_API_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            tracking_timeout: defaults.tracking_timeout,
            jwt_secret,
            check_link_reachability,
            qr_default_size,
            cors_origins,
            ip_hash_salt: env::var("IP_HASH_SALT").unwrap_or(defaults.ip_hash_salt),
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected a boolean"),
    }
}
