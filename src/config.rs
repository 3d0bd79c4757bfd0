//! Configuration types.
//!
//! Every section is read from the environment with sensible defaults, so a
//! bare `myinfo` launch serves a local database on port 8000.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Institutional email suffix that may not be used as an alternate address.
pub const DEFAULT_EMAIL_SUFFIX: &str = "@pdx.edu";

/// The only organization accepted on the directory form by default.
pub const DEFAULT_COMPANY: &str = "Portland State University";

/// Portal (web service) configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Path of the libSQL database file.
    pub db_path: String,
    /// Institutional email suffix rejected for alternate emails.
    pub email_suffix: String,
    /// Organization values accepted on the directory form.
    pub allowed_companies: Vec<String>,
    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,
    /// Sessions older than this are rejected and swept.
    pub session_max_age: Duration,
    pub rate_limit: RateLimitConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            db_path: "./data/myinfo.db".to_string(),
            email_suffix: DEFAULT_EMAIL_SUFFIX.to_string(),
            allowed_companies: vec![DEFAULT_COMPANY.to_string()],
            secure_cookies: false,
            session_max_age: Duration::from_secs(8 * 60 * 60),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl PortalConfig {
    /// Build from `MYINFO_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let allowed_companies: Vec<String> = std::env::var("MYINFO_ALLOWED_COMPANIES")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .filter(|v: &Vec<String>| !v.is_empty())
            .unwrap_or(defaults.allowed_companies);

        Self {
            bind_addr: std::env::var("MYINFO_BIND_ADDR").unwrap_or(defaults.bind_addr),
            db_path: std::env::var("MYINFO_DB_PATH").unwrap_or(defaults.db_path),
            email_suffix: std::env::var("MYINFO_EMAIL_SUFFIX").unwrap_or(defaults.email_suffix),
            allowed_companies,
            secure_cookies: env_flag("MYINFO_SECURE_COOKIES", defaults.secure_cookies),
            session_max_age: Duration::from_secs(nonzero_or_default(
                "MYINFO_SESSION_MAX_AGE_SECS",
                std::env::var("MYINFO_SESSION_MAX_AGE_SECS").ok(),
                defaults.session_max_age.as_secs(),
            )),
            rate_limit: RateLimitConfig::from_env(),
        }
    }
}

/// Per-client request throttling.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Length of one counting window.
    pub window: Duration,
    /// Requests admitted per window for GET/HEAD.
    pub get_limit: u32,
    /// Requests admitted per window for every other verb.
    pub post_limit: u32,
    /// Use the first `X-Forwarded-For` entry as the client address.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            get_limit: 60,
            post_limit: 30,
            trust_forwarded_for: false,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. A zero window or limit
    /// would disable limiting, so those fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let nonzero = |key: &str, default: u64| nonzero_or_default(key, lookup(key), default);
        Self {
            window: Duration::from_secs(nonzero(
                "MYINFO_RATE_LIMIT_WINDOW_SECS",
                defaults.window.as_secs(),
            )),
            get_limit: u32::try_from(nonzero("MYINFO_RATE_LIMIT_GET", defaults.get_limit.into()))
                .unwrap_or(defaults.get_limit),
            post_limit: u32::try_from(nonzero(
                "MYINFO_RATE_LIMIT_POST",
                defaults.post_limit.into(),
            ))
            .unwrap_or(defaults.post_limit),
            trust_forwarded_for: lookup("MYINFO_TRUST_FORWARDED_FOR")
                .map(|v| flag_value(&v))
                .unwrap_or(defaults.trust_forwarded_for),
        }
    }
}

/// Settings for the contact import job.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Host (and optional port) of the identity resolution service.
    pub resolver_host: String,
    pub resolver_username: String,
    pub resolver_password: SecretString,
    /// Upper bound on a single resolver call.
    pub resolver_timeout: Duration,
    /// Skip TLS certificate verification for the resolver.
    pub accept_invalid_certs: bool,
    /// libSQL database file holding the source rows.
    pub source_db_path: String,
    /// Query returning `(external_id, phone, email)` rows.
    pub source_sql: String,
}

impl SyncConfig {
    /// Build from the environment. Resolver credentials and the source
    /// location are required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let resolver_host = required("SAILPOINT_SERVER_URL")?;
        let resolver_username = required("SAILPOINT_USERNAME")?;
        let resolver_password = SecretString::from(required("SAILPOINT_PASSWORD")?);
        let source_db_path = required("MYINFO_IMPORT_SOURCE_DB")?;
        let source_sql = required("MYINFO_IMPORT_SQL")?;

        let timeout_secs: u64 = match std::env::var("SAILPOINT_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SAILPOINT_TIMEOUT_SECS".to_string(),
                message: format!("expected whole seconds, got {raw:?}"),
            })?,
            Err(_) => 10,
        };

        Ok(Self {
            resolver_host,
            resolver_username,
            resolver_password,
            resolver_timeout: Duration::from_secs(timeout_secs),
            accept_invalid_certs: env_flag("SAILPOINT_ACCEPT_INVALID_CERTS", false),
            source_db_path,
            source_sql,
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse a positive integer, warning and falling back to `default` when the
/// value is missing, malformed or zero.
fn nonzero_or_default(key: &str, raw: Option<String>, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => {
            tracing::warn!(key, value = %raw, default, "Ignoring invalid setting, using default");
            default
        }
        Ok(n) => n,
    }
}

fn flag_value(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => flag_value(&v),
        Err(_) => default,
    }
}
