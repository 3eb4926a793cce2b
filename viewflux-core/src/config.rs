//! Application configuration
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```
//! use viewflux_core::config::Config;
//! use viewflux_core::scheduler::FatalPolicy;
//!
//! let config = Config::from_json_str(r#"{ "tick_interval_ms": 50, "fatal_policy": "halt" }"#).unwrap();
//! assert_eq!(config.scheduler_config().tick_interval.as_millis(), 50);
//! assert_eq!(config.fatal_policy, FatalPolicy::Halt);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logger::{ActionLogConfig, ActionLoggerConfig};
use crate::model::ChangePolicy;
use crate::scheduler::{FatalPolicy, SchedulerConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Milliseconds between scheduler ticks; fractional values allowed
    pub tick_interval_ms: f64,
    pub fatal_policy: FatalPolicy,
    /// Equality policy for new view models
    pub change_policy: ChangePolicy,
    /// Comma-separated glob patterns of actions to log
    pub log_include: Option<String>,
    pub log_exclude: Option<String>,
    /// Entries kept by the action log; zero disables it
    pub log_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000.0 / 60.0,
            fatal_policy: FatalPolicy::default(),
            change_policy: ChangePolicy::default(),
            log_include: None,
            log_exclude: None,
            log_capacity: ActionLogConfig::default().capacity,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms <= 0.0 || !self.tick_interval_ms.is_finite() {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.tick_interval_ms / 1000.0)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: self.tick_interval(),
            fatal_policy: self.fatal_policy,
        }
    }

    pub fn logger_config(&self) -> ActionLoggerConfig {
        ActionLoggerConfig::new(self.log_include.as_deref(), self.log_exclude.as_deref())
    }

    pub fn log_config(&self) -> ActionLogConfig {
        ActionLogConfig::new(self.log_capacity, self.logger_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.fatal_policy, FatalPolicy::Resume);
        assert!(scheduler.tick_interval > Duration::from_millis(16));
        assert!(scheduler.tick_interval < Duration::from_millis(17));
        assert_eq!(config.log_config().capacity, 100);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_json_str(
            r#"{ "change_policy": "identity", "log_include": "user.*", "log_exclude": "*.poll", "log_capacity": 5 }"#,
        )
        .unwrap();
        assert_eq!(config.change_policy, ChangePolicy::Identity);
        assert!(config.logger_config().should_log("user.save"));
        assert!(!config.logger_config().should_log("user.poll"));
        assert_eq!(config.log_config().capacity, 5);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            Config::from_json_str(r#"{ "tick_interval_ms": 0 }"#),
            Err(ConfigError::ZeroTickInterval)
        ));
        assert!(matches!(
            Config::from_json_str(r#"{ "fatal_policy": "explode" }"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
