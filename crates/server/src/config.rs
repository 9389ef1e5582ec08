//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SITELINE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SITELINE_BASE_URL` - Public URL for the service
//! - `GETADDRESS_API_KEY` - getAddress.io API key
//!
//! ## Optional
//! - `SITELINE_HOST` - Bind address (default: 127.0.0.1)
//! - `SITELINE_PORT` - Listen port (default: 3000)
//! - `GETADDRESS_BASE_URL` - Geocoding provider base URL (default: <https://api.getaddress.io>)
//! - `GETADDRESS_TIMEOUT_SECS` - Outbound request timeout (default: 10)
//! - `AUTH_SKIP` - Serve the dashboard without an auth check (default: false)
//! - `AUTH_LOGIN_URL` - Where unauthenticated dashboard visits are sent (default: /auth/login)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default geocoding provider.
pub const DEFAULT_GEOCODING_BASE_URL: &str = "https://api.getaddress.io";

/// Default outbound geocoding timeout in seconds.
const DEFAULT_GEOCODING_TIMEOUT_SECS: u64 = 10;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
    #[error("Failed to load .env: {0}")]
    DotEnv(String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the service
    pub base_url: String,
    /// Geocoding provider configuration
    pub geocoding: GeocodingConfig,
    /// Dashboard authentication gating
    pub auth: AuthConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of error events sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions sent to Sentry
    pub sentry_traces_sample_rate: f32,
}

/// Geocoding provider (getAddress.io) configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct GeocodingConfig {
    /// Provider base URL without trailing slash
    pub base_url: String,
    /// API key sent as the `api-key` query parameter
    pub api_key: SecretString,
    /// Upper bound on a single outbound request
    pub timeout: Duration,
}

impl std::fmt::Debug for GeocodingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocodingConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Dashboard authentication gating.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// When true the dashboard is served without an auth check.
    pub skip: bool,
    /// Redirect target for unauthenticated dashboard visits.
    pub login_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            skip: false,
            login_url: "/auth/login".to_owned(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv()?;

        let database_url = get_database_url(DATABASE_URL_VAR)?;
        let host = parse_env("SITELINE_HOST", "127.0.0.1")?;
        let port = parse_env("SITELINE_PORT", "3000")?;
        let base_url = get_required_env("SITELINE_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("SITELINE_BASE_URL".to_string(), e.to_string())
        })?;

        let geocoding = GeocodingConfig::from_env()?;
        let auth = AuthConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            geocoding,
            auth,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the service is served over HTTPS (controls secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl GeocodingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_env_or_default("GETADDRESS_BASE_URL", DEFAULT_GEOCODING_BASE_URL);
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("GETADDRESS_BASE_URL".to_string(), e.to_string())
        })?;
        let timeout_secs: u64 = parse_env(
            "GETADDRESS_TIMEOUT_SECS",
            &DEFAULT_GEOCODING_TIMEOUT_SECS.to_string(),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "GETADDRESS_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: get_validated_secret("GETADDRESS_API_KEY")?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let skip = match get_optional_env("AUTH_SKIP") {
            Some(value) => parse_bool(&value)
                .ok_or_else(|| ConfigError::InvalidEnvVar("AUTH_SKIP".to_string(), value))?,
            None => false,
        };

        Ok(Self {
            skip,
            login_url: get_env_or_default("AUTH_LOGIN_URL", "/auth/login"),
        })
    }
}

/// Load only the database URL, for tools that do not serve HTTP.
///
/// Reads `SITELINE_DATABASE_URL`, falling back to `DATABASE_URL`, after
/// loading `.env` if present.
///
/// # Errors
///
/// Returns `ConfigError` if `.env` is malformed or neither variable is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    load_dotenv()?;
    get_database_url(DATABASE_URL_VAR)
}

// =============================================================================
// Helper Functions
// =============================================================================

const DATABASE_URL_VAR: &str = "SITELINE_DATABASE_URL";

/// Load `.env` if present. A missing file is fine; a malformed one is not.
fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ConfigError::DotEnv(e.to_string())),
    }
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a boolean flag. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
