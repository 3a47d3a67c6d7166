//! Reactor configuration.
//!
//! Concrete values that drive reactor behavior. Settings are resolved in
//! this order (highest priority first):
//!
//! 1. **Programmatic** — values set on [`ReactorConfig`] directly
//! 2. **Environment variables** — values from `RIPTIDE_*` env vars
//! 3. **Defaults** — built-in defaults from [`ReactorConfig::default()`]
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `max_dispatch_per_turn` | 128 (0 = unbounded) |
//! | `park_interval` | 10 ms |
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `RIPTIDE_MAX_DISPATCH_PER_TURN` | `usize` | `max_dispatch_per_turn` |
//! | `RIPTIDE_PARK_INTERVAL_MS` | `u64` (milliseconds) | `park_interval` |

use std::time::Duration;

use thiserror::Error;

/// Environment variable name for the per-turn dispatch budget.
pub const ENV_MAX_DISPATCH_PER_TURN: &str = "RIPTIDE_MAX_DISPATCH_PER_TURN";
/// Environment variable name for the idle park interval (milliseconds).
pub const ENV_PARK_INTERVAL_MS: &str = "RIPTIDE_PARK_INTERVAL_MS";

/// Error produced while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed.
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        /// The variable that failed to parse.
        var: &'static str,
        /// The offending value.
        value: String,
        /// Why parsing failed.
        reason: String,
    },
}

/// Reactor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactorConfig {
    /// Maximum continuations dispatched per reactor turn (0 = unbounded).
    ///
    /// Bounds how long a single turn can run before timers and event
    /// sources get another look.
    pub max_dispatch_per_turn: usize,
    /// Upper bound on a single idle park while event sources are
    /// registered but report nothing pending.
    pub park_interval: Duration,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            max_dispatch_per_turn: 128,
            park_interval: Duration::from_millis(10),
        }
    }
}

impl ReactorConfig {
    /// Builds a configuration from defaults plus `RIPTIDE_*` environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a recognized variable is
    /// set but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Applies `RIPTIDE_*` environment overrides to this configuration.
    ///
    /// Only variables that are set in the environment are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a recognized variable is
    /// set but unparseable.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        self.apply_overrides(vars)
    }

    /// Applies overrides from explicit key/value pairs.
    ///
    /// This is the parsing core behind
    /// [`apply_env_overrides`](Self::apply_env_overrides); unrecognized
    /// keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a recognized key carries
    /// an unparseable value.
    pub fn apply_overrides<I>(&mut self, pairs: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in pairs {
            match key.as_str() {
                k if k == ENV_MAX_DISPATCH_PER_TURN => {
                    self.max_dispatch_per_turn =
                        parse(ENV_MAX_DISPATCH_PER_TURN, &value)?;
                }
                k if k == ENV_PARK_INTERVAL_MS => {
                    let millis: u64 = parse(ENV_PARK_INTERVAL_MS, &value)?;
                    self.park_interval = Duration::from_millis(millis);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ReactorConfig::default();
        assert_eq!(config.max_dispatch_per_turn, 128);
        assert_eq!(config.park_interval, Duration::from_millis(10));
    }

    #[test]
    fn overrides_apply() {
        let mut config = ReactorConfig::default();
        config
            .apply_overrides(vec![
                (ENV_MAX_DISPATCH_PER_TURN.to_string(), "7".to_string()),
                (ENV_PARK_INTERVAL_MS.to_string(), "250".to_string()),
                ("UNRELATED".to_string(), "ignored".to_string()),
            ])
            .unwrap();
        assert_eq!(config.max_dispatch_per_turn, 7);
        assert_eq!(config.park_interval, Duration::from_millis(250));
    }

    #[test]
    fn malformed_override_is_an_error() {
        let mut config = ReactorConfig::default();
        let err = config
            .apply_overrides(vec![(
                ENV_MAX_DISPATCH_PER_TURN.to_string(),
                "lots".to_string(),
            )])
            .unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains(ENV_MAX_DISPATCH_PER_TURN));
        assert!(rendered.contains("lots"));
    }

    #[test]
    fn from_env_without_overrides_matches_defaults() {
        // None of the RIPTIDE_* variables are set in the test environment.
        let config = ReactorConfig::from_env().unwrap();
        assert_eq!(config, ReactorConfig::default());
    }
}
