use crate::error::{Error, Result};
use crate::services::scheduler_service::is_day_divisor;
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub admin_secret: Option<String>,
    pub public_rps: u32,
    pub ingestion: IngestionSettings,
}

/// Tunables for the ingestion scheduler, the producer calls and the read cache.
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    pub fetch_interval_hours: u32,
    pub expire_interval_hours: u32,
    pub cache_ttl: Duration,
    pub scheduled_batch_size: usize,
    pub page_batch_size: usize,
    pub producer_timeout: Duration,
    pub fetch_on_startup: bool,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            fetch_interval_hours: 2,
            expire_interval_hours: 1,
            cache_ttl: Duration::from_secs(60 * 60),
            scheduled_batch_size: 10,
            page_batch_size: 100,
            producer_timeout: Duration::from_secs(120),
            fetch_on_startup: true,
        }
    }
}

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let defaults = IngestionSettings::default();
        let ingestion = IngestionSettings {
            fetch_interval_hours: get_env_parse_or(
                "FETCH_INTERVAL_HOURS",
                defaults.fetch_interval_hours,
            )?,
            expire_interval_hours: get_env_parse_or(
                "EXPIRE_INTERVAL_HOURS",
                defaults.expire_interval_hours,
            )?,
            cache_ttl: Duration::from_secs(get_env_parse_or(
                "CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            scheduled_batch_size: get_env_parse_or(
                "SCHEDULED_BATCH_SIZE",
                defaults.scheduled_batch_size,
            )?,
            page_batch_size: get_env_parse_or("PAGE_BATCH_SIZE", defaults.page_batch_size)?,
            producer_timeout: Duration::from_secs(get_env_parse_or(
                "PRODUCER_TIMEOUT_SECS",
                defaults.producer_timeout.as_secs(),
            )?),
            fetch_on_startup: get_env_parse_or("FETCH_ON_STARTUP", defaults.fetch_on_startup)?,
        };
        validate_interval("FETCH_INTERVAL_HOURS", ingestion.fetch_interval_hours)?;
        validate_interval("EXPIRE_INTERVAL_HOURS", ingestion.expire_interval_hours)?;

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            gemini_api_key: get_env_opt("GEMINI_API_KEY"),
            gemini_model: get_env_opt("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: get_env_opt("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            admin_secret: get_env_opt("ADMIN_SECRET"),
            public_rps: get_env_parse_or("PUBLIC_RPS", 20)?,
            ingestion,
        })
    }
}

fn validate_interval(name: &str, hours: u32) -> Result<()> {
    if is_day_divisor(hours) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} must divide 24 evenly (1, 2, 3, 4, 6, 8, 12 or 24), got {}",
            name, hours
        )))
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
