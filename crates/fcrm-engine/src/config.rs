//! Engine configuration.
//!
//! Defaults suit a single-node deployment. Override through environment
//! variables or explicit construction in tests.

/// Longest accepted callback SLA: one leap year.
pub const MAX_CALLBACK_SLA_HOURS: i64 = 24 * 366;

/// Runtime settings for the lifecycle engine.
///
/// Custom `Debug` redacts `database_url`, which usually embeds a password.
#[derive(Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Full create attempts before giving up on a contended scope.
    pub max_create_attempts: u32,
    /// Hours a lead may sit in `callback_requested` before it is flagged.
    pub callback_sla_hours: i64,
    /// Postgres connection string. `None` runs against the in-memory store.
    pub database_url: Option<String>,
    /// Pool size when `database_url` is set.
    pub db_max_connections: u32,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("max_create_attempts", &self.max_create_attempts)
            .field("callback_sla_hours", &self.callback_sla_hours)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("db_max_connections", &self.db_max_connections)
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_create_attempts: 3,
            callback_sla_hours: 48,
            database_url: None,
            db_max_connections: 20,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `FCRM_MAX_CREATE_ATTEMPTS` (default: 3, at least 1)
    /// - `FCRM_CALLBACK_SLA_HOURS` (default: 48, 1 to [`MAX_CALLBACK_SLA_HOURS`])
    /// - `DATABASE_URL` (optional)
    /// - `FCRM_DB_MAX_CONNECTIONS` (default: 20, at least 1)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let callback_sla_hours =
            positive(&lookup, "FCRM_CALLBACK_SLA_HOURS", defaults.callback_sla_hours)?;
        if callback_sla_hours > MAX_CALLBACK_SLA_HOURS {
            return Err(ConfigError::TooLarge {
                var: "FCRM_CALLBACK_SLA_HOURS",
                value: callback_sla_hours,
                max: MAX_CALLBACK_SLA_HOURS,
            });
        }
        Ok(Self {
            max_create_attempts: positive(
                &lookup,
                "FCRM_MAX_CREATE_ATTEMPTS",
                defaults.max_create_attempts,
            )?,
            callback_sla_hours,
            database_url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            db_max_connections: positive(
                &lookup,
                "FCRM_DB_MAX_CONNECTIONS",
                defaults.db_max_connections,
            )?,
        })
    }
}

fn positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + From<u8>,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(v) if v >= T::from(1) => Ok(v),
        _ => Err(ConfigError::Invalid { var, value: raw }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{var} must be at most {max}, got {value}")]
    TooLarge { var: &'static str, value: i64, max: i64 },
}
