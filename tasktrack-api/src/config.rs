//! API Configuration Module
//!
//! Configuration is loaded from `TASKTRACK_*` environment variables with
//! defaults for everything except the token signing key, which must be set.
//! Parsing goes through a lookup function so tests never touch the process
//! environment.

use std::str::FromStr;
use std::time::Duration;

use tasktrack_core::ConfigError;
use tasktrack_storage::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use tasktrack_storage::{CacheConfig, KeyMode};

use crate::auth::{
    JwtSecret, TokenConfig, DEFAULT_AUDIENCE, DEFAULT_ISSUER, DEFAULT_TOKEN_LIFETIME_SECS,
    MAX_LEEWAY_SECS, MAX_TOKEN_LIFETIME_SECS,
};
use crate::authorizer::MissingIdentityPolicy;
use crate::limiter::{
    LimiterConfig, DEFAULT_ANONYMOUS_PERMITS, DEFAULT_ANONYMOUS_WINDOW, DEFAULT_CAPACITY,
    DEFAULT_REFILL_PERIOD,
};
use crate::telemetry::LogFormat;

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Token issuance and validation.
    pub token: TokenConfig,

    /// Query cache.
    pub cache: CacheConfig,

    /// Admission limiter.
    pub limiter: LimiterConfig,

    /// Status used when a token carries no identity.
    pub missing_identity: MissingIdentityPolicy,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins.
    pub cors_origins: Vec<String>,

    /// Log output format.
    pub log_format: LogFormat,

    pub bind_host: String,
    pub port: u16,
}

impl ApiConfig {
    /// Defaults for everything but the signing key.
    pub fn new(token: TokenConfig) -> Self {
        Self {
            token,
            cache: CacheConfig::default(),
            limiter: LimiterConfig::default(),
            missing_identity: MissingIdentityPolicy::default(),
            cors_origins: Vec::new(),
            log_format: LogFormat::default(),
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Fails if `TASKTRACK_JWT_KEY` is missing or empty, or if any variable
    /// is set to a value that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        // Token service: the key has no default
        let secret = vars
            .get("TASKTRACK_JWT_KEY")
            .and_then(|key| JwtSecret::new(key).ok())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "TASKTRACK_JWT_KEY".to_string(),
            })?;
        let token = TokenConfig::new(secret)
            .with_issuer(vars.get("TASKTRACK_JWT_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string()))
            .with_audience(
                vars.get("TASKTRACK_JWT_AUDIENCE").unwrap_or_else(|| DEFAULT_AUDIENCE.to_string()),
            )
            .with_lifetime_secs(vars.parse("TASKTRACK_JWT_LIFETIME_SECS", DEFAULT_TOKEN_LIFETIME_SECS)?)
            .with_leeway_secs(vars.parse("TASKTRACK_JWT_LEEWAY_SECS", 0)?);
        if !(1..=MAX_TOKEN_LIFETIME_SECS).contains(&token.lifetime_secs) {
            return Err(invalid(
                "TASKTRACK_JWT_LIFETIME_SECS",
                token.lifetime_secs,
                &format!("must be between 1 and {}", MAX_TOKEN_LIFETIME_SECS),
            ));
        }
        if !(0..=MAX_LEEWAY_SECS).contains(&token.leeway_secs) {
            return Err(invalid(
                "TASKTRACK_JWT_LEEWAY_SECS",
                token.leeway_secs,
                &format!("must be between 0 and {}", MAX_LEEWAY_SECS),
            ));
        }

        // Query cache
        let ttl_secs: u64 = vars.parse("TASKTRACK_CACHE_TTL_SECS", DEFAULT_TTL.as_secs())?;
        if ttl_secs == 0 {
            return Err(invalid("TASKTRACK_CACHE_TTL_SECS", ttl_secs, "must be positive"));
        }
        let max_entries: usize = vars.parse("TASKTRACK_CACHE_MAX_ENTRIES", DEFAULT_MAX_ENTRIES)?;
        if max_entries == 0 {
            return Err(invalid("TASKTRACK_CACHE_MAX_ENTRIES", max_entries, "must be positive"));
        }
        let sweep_secs: u64 = vars.parse("TASKTRACK_CACHE_SWEEP_SECS", 0)?;
        let cache = CacheConfig::default()
            .with_ttl(Duration::from_secs(ttl_secs))
            .with_max_entries(max_entries)
            .with_key_mode(vars.parse("TASKTRACK_CACHE_KEY_MODE", KeyMode::default())?)
            .with_invalidate_on_write(vars.flag("TASKTRACK_CACHE_INVALIDATE_ON_WRITE", false)?)
            .with_sweep_interval((sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)));

        // Admission limiter
        let limiter = LimiterConfig {
            enabled: vars.flag("TASKTRACK_RATE_LIMIT_ENABLED", true)?,
            capacity: vars.parse("TASKTRACK_RATE_LIMIT_CAPACITY", DEFAULT_CAPACITY)?,
            refill_period: Duration::from_secs(
                vars.parse("TASKTRACK_RATE_LIMIT_REFILL_SECS", DEFAULT_REFILL_PERIOD.as_secs())?,
            ),
            anonymous_permits: vars.parse("TASKTRACK_RATE_LIMIT_ANON_PERMITS", DEFAULT_ANONYMOUS_PERMITS)?,
            anonymous_window: Duration::from_secs(
                vars.parse("TASKTRACK_RATE_LIMIT_ANON_WINDOW_SECS", DEFAULT_ANONYMOUS_WINDOW.as_secs())?,
            ),
        };
        if limiter.capacity == 0 {
            return Err(invalid("TASKTRACK_RATE_LIMIT_CAPACITY", 0, "must be positive"));
        }
        if limiter.refill_period.is_zero() {
            return Err(invalid("TASKTRACK_RATE_LIMIT_REFILL_SECS", 0, "must be positive"));
        }
        if limiter.anonymous_window.is_zero() {
            return Err(invalid("TASKTRACK_RATE_LIMIT_ANON_WINDOW_SECS", 0, "must be positive"));
        }

        let cors_origins = vars
            .get("TASKTRACK_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            token,
            cache,
            limiter,
            missing_identity: vars.parse("TASKTRACK_MISSING_IDENTITY_STATUS", MissingIdentityPolicy::default())?,
            cors_origins,
            log_format: vars.parse("TASKTRACK_LOG_FORMAT", LogFormat::default())?,
            bind_host: vars
                .get("TASKTRACK_API_BIND")
                .unwrap_or_else(|| DEFAULT_BIND_HOST.to_string()),
            port: vars.parse("PORT", DEFAULT_PORT)?,
        })
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }
        self.cors_origins.iter().any(|allowed| allowed == origin)
    }

    /// `host:port` to bind the HTTP listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Typed access to a variable lookup. Blank values count as unset.
struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key).map(|s| s.trim().to_ascii_lowercase()) {
            None => Ok(default),
            Some(raw) => match raw.as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(invalid(key, &raw, "expected true or false")),
            },
        }
    }
}
