use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::constants::DEFAULT_SITE_BASE_URL;
use crate::filter::TitlePatterns;
use crate::models::MAX_PAGE_INDEX;

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
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Listing
    pub forum_id: String,
    pub site_base_url: String,
    pub max_page: u32,
    pub end_of_results_page: Option<u32>,
    pub probe_total_pages: bool,

    // Workers
    pub worker_count: usize,
    pub request_timeout: Duration,

    // Filtering
    /// One or more regexes joined with `;`.
    pub filter_patterns: String,

    // Detail enrichment
    pub enrich_details: bool,
    pub enrich_concurrency: usize,

    // Output
    pub output_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Listing
            forum_id: required_env("FORUM_ID")?,
            site_base_url: env_or_default("SITE_BASE_URL", DEFAULT_SITE_BASE_URL),
            max_page: parse_env_u32("MAX_PAGE", 10)?,
            end_of_results_page: parse_optional_env_u32("END_OF_RESULTS_PAGE")?,
            probe_total_pages: parse_env_bool("PROBE_TOTAL_PAGES", true)?,

            // Workers
            worker_count: parse_env_usize("WORKER_COUNT", 4)?,
            request_timeout: Duration::from_secs(parse_env_u64("REQUEST_TIMEOUT_SECS", 30)?),

            // Filtering
            filter_patterns: required_env("FILTER_PATTERNS")?,

            // Detail enrichment
            enrich_details: parse_env_bool("ENRICH_DETAILS", false)?,
            enrich_concurrency: parse_env_usize("ENRICH_CONCURRENCY", 3)?,

            // Output
            output_path: optional_env("OUTPUT_PATH").map(PathBuf::from),
        })
    }

    /// Small single-worker configuration; tests override the fields they need.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            forum_id: "testgroup".to_string(),
            site_base_url: "http://127.0.0.1:9".to_string(),
            max_page: 0,
            end_of_results_page: None,
            probe_total_pages: false,
            worker_count: 1,
            request_timeout: Duration::from_secs(5),
            filter_patterns: ".".to_string(),
            enrich_details: false,
            enrich_concurrency: 2,
            output_path: None,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forum_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "FORUM_ID".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                name: "WORKER_COUNT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.enrich_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "ENRICH_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_page > MAX_PAGE_INDEX {
            return Err(ConfigError::InvalidValue {
                name: "MAX_PAGE".to_string(),
                message: format!("must be at most {MAX_PAGE_INDEX}"),
            });
        }
        if self.end_of_results_page.is_some_and(|page| page > MAX_PAGE_INDEX) {
            return Err(ConfigError::InvalidValue {
                name: "END_OF_RESULTS_PAGE".to_string(),
                message: format!("must be at most {MAX_PAGE_INDEX}"),
            });
        }
        if let Err(e) = Url::parse(&self.site_base_url) {
            return Err(ConfigError::InvalidValue {
                name: "SITE_BASE_URL".to_string(),
                message: e.to_string(),
            });
        }
        self.title_patterns()?;
        Ok(())
    }

    /// Compile `filter_patterns`.
    ///
    /// # Errors
    ///
    /// Returns an error if no pattern is given or one fails to compile.
    pub fn title_patterns(&self) -> Result<TitlePatterns, ConfigError> {
        let patterns =
            TitlePatterns::parse(&self.filter_patterns).map_err(|e| ConfigError::InvalidValue {
                name: "FILTER_PATTERNS".to_string(),
                message: e.to_string(),
            })?;
        if patterns.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "FILTER_PATTERNS".to_string(),
                message: "at least one pattern is required".to_string(),
            });
        }
        Ok(patterns)
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    parse_optional_env(name).map(|v| v.unwrap_or(default))
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    parse_optional_env(name).map(|v| v.unwrap_or(default))
}

fn parse_optional_env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
    parse_optional_env(name)
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    parse_optional_env(name).map(|v| v.unwrap_or(default))
}

fn parse_optional_env<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => {
            val.trim()
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::ParseInt {
                    name: name.to_string(),
                    source: e,
                })
        }
        _ => Ok(None),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
