use std::{str::FromStr, time::Duration};

const HOST: &str = "0.0.0.0";
const PORT: u16 = 8080;
const DATABASE: &str = "Tourism";
const PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;
const OPENAI_MODEL: &str = "gpt-4-1106-preview";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GENERATION_TIMEOUT_SECS: u64 = 60;
const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "Invalid value for {}: '{}'", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: StoreBackend,
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,
    pub page_size: u64,
    pub max_page_size: u64,
    pub max_photo_bytes: usize,
    /// `None` allows any origin.
    pub cors_allowed_origins: Option<Vec<String>>,
    pub llm: LlmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: HOST.to_string(),
            port: PORT,
            backend: StoreBackend::Memory,
            mongodb_uri: None,
            mongodb_database: DATABASE.to_string(),
            page_size: PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            max_photo_bytes: MAX_PHOTO_BYTES,
            cors_allowed_origins: None,
            llm: LlmConfig {
                api_key: None,
                model: OPENAI_MODEL.to_string(),
                base_url: OPENAI_BASE_URL.to_string(),
                timeout: Duration::from_secs(GENERATION_TIMEOUT_SECS),
            },
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|value| !value.is_empty()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("mongo") => StoreBackend::Mongo,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let mongodb_uri = lookup("MONGODB_URI");
        if backend == StoreBackend::Mongo && mongodb_uri.is_none() {
            return Err(ConfigError::Missing("MONGODB_URI"));
        }

        let page_size = parse_or(&lookup, "PAGE_SIZE", PAGE_SIZE)?;
        let max_page_size = parse_or(&lookup, "MAX_PAGE_SIZE", MAX_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "PAGE_SIZE",
                value: page_size.to_string(),
            });
        }
        if max_page_size < page_size {
            return Err(ConfigError::Invalid {
                key: "MAX_PAGE_SIZE",
                value: max_page_size.to_string(),
            });
        }

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS").and_then(|raw| {
            let origins: Vec<String> = raw
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
            if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
                None
            } else {
                Some(origins)
            }
        });

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| HOST.to_string()),
            port: parse_or(&lookup, "PORT", PORT)?,
            backend,
            mongodb_uri,
            mongodb_database: lookup("MONGODB_DATABASE").unwrap_or_else(|| DATABASE.to_string()),
            page_size,
            max_page_size,
            max_photo_bytes: parse_or(&lookup, "MAX_PHOTO_BYTES", MAX_PHOTO_BYTES)?,
            cors_allowed_origins,
            llm: LlmConfig {
                api_key: lookup("OPENAI_API_KEY"),
                model: lookup("OPENAI_MODEL").unwrap_or_else(|| OPENAI_MODEL.to_string()),
                base_url: lookup("OPENAI_BASE_URL")
                    .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
                timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "GENERATION_TIMEOUT_SECS",
                    GENERATION_TIMEOUT_SECS,
                )?),
            },
        })
    }
}
