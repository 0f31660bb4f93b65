//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `CODEREV_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `CODEREV_` override YAML values
//! 3. **GEMINI_API_KEY** - Special case: overrides `provider.api_key` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `CODEREV_PROVIDER__MODEL=gemini-2.0-flash` sets the `provider.model` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! CODEREV_PORT=8080
//!
//! # Set the provider credential (preferred method)
//! GEMINI_API_KEY="..."
//!
//! # Or use CODEREV_PROVIDER__API_KEY
//! CODEREV_PROVIDER__API_KEY="..."
//!
//! # Override nested values
//! CODEREV_RATE_LIMIT__MAX_REQUESTS=100
//! CODEREV_PROVIDER__REQUEST_TIMEOUT=10s
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "CODEREV_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// AI provider configuration (endpoint, credential, model)
    pub provider: ProviderConfig,
    /// Fixed-window rate limiting applied per client
    pub rate_limit: RateLimitConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

/// AI provider configuration.
///
/// The credential should be set via environment variables for security:
/// either `GEMINI_API_KEY` or `CODEREV_PROVIDER__API_KEY`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL of the generative AI API
    pub base_url: Url,
    /// API key for the provider (read once at startup, no hot-reload)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model identifier to request reviews from
    pub model: String,
    /// Maximum time to wait for a provider response before failing the request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://generativelanguage.googleapis.com/v1beta").unwrap(),
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Fixed-window rate limiting configuration.
///
/// Each client may make at most `max_requests` requests per `window`.
/// Requests beyond the cap fail with HTTP 429.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Maximum requests per client per window. Set to 0 to disable limiting.
    pub max_requests: u32,
    /// Window duration after which per-client counters reset
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window: Duration::from_secs(60),
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            // All origins permitted by default
            allowed_origins: vec![CorsOrigin::Wildcard],
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard", serialize_with = "serialize_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn serialize_wildcard<S>(serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str("*")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            provider: ProviderConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // GEMINI_API_KEY wins over whatever the file or prefixed env set
        if let Ok(key) = std::env::var("GEMINI_API_KEY")
            && !key.is_empty()
        {
            config.provider.api_key = Some(key);
        }

        config.validate().map_err(figment::Error::from)?;
        Ok(config)
    }

    fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("CODEREV_").split("__"))
    }

    /// The address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<(), String> {
        if self.provider.model.is_empty() {
            return Err("provider.model must not be empty".to_string());
        }
        if self.provider.request_timeout.is_zero() {
            return Err("provider.request_timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}
