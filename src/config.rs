use crate::error::{Error, Result};
use crate::models::participant::AdmissionPolicy;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
}

/// Credentials for the administrator account created at startup.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub api_rps: u32,
    pub public_rps: u32,
    pub sweep_interval_secs: Option<u64>,
    pub admission_policy: AdmissionPolicy,
    pub enforce_listing_ownership: bool,
    pub cors_allowed_origin: Option<String>,
    pub ai: Option<AiConfig>,
    pub admin: Option<AdminBootstrap>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let ai = match env::var("AI_API_KEY").ok().filter(|key| !key.is_empty()) {
            Some(api_key) => Some(AiConfig {
                api_key,
                api_url: get_env_or(
                    "AI_API_URL",
                    "https://api.openai.com/v1/chat/completions",
                ),
                model: get_env_or("AI_MODEL", "gpt-4o-mini"),
            }),
            None => None,
        };

        let admin = match (
            env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
            env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                name: get_env_or("ADMIN_NAME", "Administrator"),
                email,
                password,
            }),
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "ADMIN_EMAIL and ADMIN_PASSWORD must be set together".to_string(),
                ))
            }
        };

        let admission_policy = match env::var("ENROLLMENT_REENTRY") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("Invalid value for ENROLLMENT_REENTRY: {}", e)))?,
            Err(_) => AdmissionPolicy::default(),
        };

        let log_format = match get_env_or("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "" => LogFormat::Pretty,
            other => {
                return Err(Error::Config(format!(
                    "Invalid value for LOG_FORMAT: {}",
                    other
                )))
            }
        };

        Ok(Self {
            server_address: get_env_or("SERVER_ADDRESS", "0.0.0.0:8080"),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            jwt_secret: get_env("JWT_SECRET")?,
            jwt_ttl_hours: get_env_parse_or("JWT_TTL_HOURS", 24)?,
            api_rps: get_env_parse_or("API_RPS", 100)?,
            public_rps: get_env_parse_or("PUBLIC_RPS", 20)?,
            sweep_interval_secs: get_env_parse_opt("SWEEP_INTERVAL_SECS")?,
            admission_policy,
            enforce_listing_ownership: get_env_parse_or("ENFORCE_LISTING_OWNERSHIP", true)?,
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN").ok().filter(|o| !o.is_empty()),
            ai,
            admin,
            log_format,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_opt<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(None),
    }
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(get_env_parse_opt(name)?.unwrap_or(default))
}
