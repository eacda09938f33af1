use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Default GraphQL endpoint of the comic platform.
pub const DEFAULT_GRAPHQL_URL: &str = "https://bff-page.kakao.com/graphql";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Remote GraphQL source
    pub graphql_url: String,
    pub graphql_referer: String,
    pub crawl_page_size: NonZeroU32,
    pub http_timeout: Duration,

    // LLM inference server
    pub llm_api_url: String,
    pub llm_timeout: Duration,

    // Web Server
    pub web_host: String,
    pub web_port: u16,
    pub api_page_size: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Database
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/comments.sqlite",
            )),

            // Remote GraphQL source
            graphql_url: env_or_default("GRAPHQL_URL", DEFAULT_GRAPHQL_URL),
            graphql_referer: env_or_default("GRAPHQL_REFERER", "https://page.kakao.com/"),
            crawl_page_size: parse_env_non_zero_u32("CRAWL_PAGE_SIZE", 25)?,
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 30)?),

            // LLM inference server
            llm_api_url: required_env("LLM_API_URL")?,
            llm_timeout: Duration::from_secs(parse_env_u64("LLM_TIMEOUT_SECS", 200)?),

            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,
            api_page_size: parse_env_u32("API_PAGE_SIZE", 20)?,
        })
    }

    /// A complete configuration pointing at local placeholders, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from(":memory:"),
            graphql_url: "http://127.0.0.1:9/graphql".to_string(),
            graphql_referer: "https://page.kakao.com/".to_string(),
            crawl_page_size: NonZeroU32::MIN.saturating_add(24),
            http_timeout: Duration::from_secs(5),
            llm_api_url: "http://127.0.0.1:9".to_string(),
            llm_timeout: Duration::from_secs(5),
            web_host: "127.0.0.1".to_string(),
            web_port: 8080,
            api_page_size: 20,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_page_size == 0 || self.api_page_size > crate::web::MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                name: "API_PAGE_SIZE".to_string(),
                message: format!("must be between 1 and {}", crate::web::MAX_PAGE_SIZE),
            });
        }
        validate_http_url("GRAPHQL_URL", &self.graphql_url)?;
        validate_http_url("LLM_API_URL", &self.llm_api_url)?;
        Ok(())
    }
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(parsed) => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("unsupported scheme '{}'", parsed.scheme()),
        }),
        Err(e) => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: e.to_string(),
        }),
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_non_zero_u32(name: &str, default: u32) -> Result<NonZeroU32, ConfigError> {
    let value = parse_env_u32(name, default)?;
    NonZeroU32::new(value).ok_or_else(|| ConfigError::InvalidValue {
        name: name.to_string(),
        message: "must be at least 1".to_string(),
    })
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            "DATABASE_PATH",
            "GRAPHQL_URL",
            "GRAPHQL_REFERER",
            "CRAWL_PAGE_SIZE",
            "HTTP_TIMEOUT_SECS",
            "LLM_API_URL",
            "LLM_TIMEOUT_SECS",
            "WEB_HOST",
            "WEB_PORT",
            "API_PAGE_SIZE",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        std::env::set_var("LLM_API_URL", "http://localhost:8000");

        let config = Config::from_env().unwrap();
        assert_eq!(config.graphql_url, DEFAULT_GRAPHQL_URL);
        assert_eq!(config.crawl_page_size.get(), 25);
        assert_eq!(config.api_page_size, 20);
        assert_eq!(config.llm_timeout, Duration::from_secs(200));
        assert!(config.validate().is_ok());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_llm_url() {
        clear_env();
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref name) if name == "LLM_API_URL"));
    }

    #[test]
    #[serial]
    fn test_bad_integer() {
        clear_env();
        std::env::set_var("LLM_API_URL", "http://localhost:8000");
        std::env::set_var("CRAWL_PAGE_SIZE", "twenty");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::ParseInt { ref name, .. } if name == "CRAWL_PAGE_SIZE"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_crawl_page_size_rejected() {
        clear_env();
        std::env::set_var("LLM_API_URL", "http://localhost:8000");
        std::env::set_var("CRAWL_PAGE_SIZE", "0");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref name, .. } if name == "CRAWL_PAGE_SIZE"));

        clear_env();
    }

    #[test]
    fn test_validate_rejects_zero_api_page_size() {
        let config = Config {
            api_page_size: 0,
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let config = Config {
            llm_api_url: "ftp://example.com".to_string(),
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }
}
