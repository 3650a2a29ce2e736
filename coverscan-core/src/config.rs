//! Configuration module
//!
//! Loads every policy knob from environment variables, falling back to the
//! built-in defaults when a variable is unset or unparsable.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::{RebuildOptions, DEFAULT_CATALOG_PATH};
use crate::error::{CoverscanError, Result};
use crate::matching::MatchPolicy;
use crate::recognition::SchedulerConfig;

/// Runtime configuration shared by the library entry points and the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverscanConfig {
    /// Catalog snapshot location (default: data/covers-database.json)
    pub catalog_path: PathBuf,
    /// Matching thresholds
    pub policy: MatchPolicy,
    /// Period between samples (default: 1500 ms)
    pub sample_interval: Duration,
    /// Time before escalation (default: 5000 ms)
    pub escalation_timeout: Duration,
    /// Consecutive confident samples required (default: 2)
    pub required_streak: u32,
    /// Rebuild pacing and checkpoints
    pub rebuild: RebuildOptions,
}

impl Default for CoverscanConfig {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        Self {
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
            policy: MatchPolicy::default(),
            sample_interval: scheduler.sample_interval,
            escalation_timeout: scheduler.escalation_timeout,
            required_streak: scheduler.required_streak,
            rebuild: RebuildOptions::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl CoverscanConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let catalog_path = std::env::var("COVERSCAN_CATALOG_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.catalog_path);

        let policy = MatchPolicy {
            match_threshold: env_or("COVERSCAN_MATCH_THRESHOLD", defaults.policy.match_threshold),
            confidence_floor: env_or(
                "COVERSCAN_CONFIDENCE_FLOOR",
                defaults.policy.confidence_floor,
            ),
            auto_accept: env_or("COVERSCAN_AUTO_ACCEPT", defaults.policy.auto_accept),
            diagnostic_threshold: env_or(
                "COVERSCAN_DIAGNOSTIC_THRESHOLD",
                defaults.policy.diagnostic_threshold,
            ),
            ..defaults.policy
        };

        let sample_interval = Duration::from_millis(env_or(
            "COVERSCAN_SAMPLE_INTERVAL_MS",
            defaults.sample_interval.as_millis() as u64,
        ));

        let escalation_timeout = Duration::from_millis(env_or(
            "COVERSCAN_ESCALATION_TIMEOUT_MS",
            defaults.escalation_timeout.as_millis() as u64,
        ));

        let required_streak = env_or("COVERSCAN_REQUIRED_STREAK", defaults.required_streak);

        let rebuild = RebuildOptions {
            pause: Duration::from_millis(env_or(
                "COVERSCAN_REBUILD_PAUSE_MS",
                defaults.rebuild.pause.as_millis() as u64,
            )),
            checkpoint_every: env_or("COVERSCAN_CHECKPOINT_EVERY", defaults.rebuild.checkpoint_every),
            ..defaults.rebuild
        };

        Self {
            catalog_path,
            policy,
            sample_interval,
            escalation_timeout,
            required_streak,
            rebuild,
        }
    }

    /// Scheduler settings derived from this configuration.
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            sample_interval: self.sample_interval,
            escalation_timeout: self.escalation_timeout,
            required_streak: self.required_streak,
            policy: self.policy,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog_path.as_os_str().is_empty() {
            return Err(CoverscanError::Config("catalog path is empty".into()));
        }
        self.scheduler().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoverscanConfig::default();
        assert_eq!(config.catalog_path, PathBuf::from("data/covers-database.json"));
        assert_eq!(config.policy.match_threshold, 15);
        assert_eq!(config.policy.confidence_floor, 0.70);
        assert_eq!(config.policy.auto_accept, 0.85);
        assert_eq!(config.policy.diagnostic_threshold, 30);
        assert_eq!(config.sample_interval, Duration::from_millis(1500));
        assert_eq!(config.escalation_timeout, Duration::from_millis(5000));
        assert_eq!(config.required_streak, 2);
        assert_eq!(config.rebuild.pause, Duration::from_secs(2));
        assert_eq!(config.rebuild.checkpoint_every, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_overrides_and_fallbacks() {
        // Only this test touches these variables.
        std::env::set_var("COVERSCAN_MATCH_THRESHOLD", "12");
        std::env::set_var("COVERSCAN_AUTO_ACCEPT", "0.9");
        std::env::set_var("COVERSCAN_REQUIRED_STREAK", "not-a-number");
        std::env::set_var("COVERSCAN_SAMPLE_INTERVAL_MS", "250");

        let config = CoverscanConfig::from_env();

        std::env::remove_var("COVERSCAN_MATCH_THRESHOLD");
        std::env::remove_var("COVERSCAN_AUTO_ACCEPT");
        std::env::remove_var("COVERSCAN_REQUIRED_STREAK");
        std::env::remove_var("COVERSCAN_SAMPLE_INTERVAL_MS");

        assert_eq!(config.policy.match_threshold, 12);
        assert_eq!(config.policy.auto_accept, 0.9);
        assert_eq!(config.required_streak, 2);
        assert_eq!(config.sample_interval, Duration::from_millis(250));
        assert_eq!(config.scheduler().sample_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_interval = CoverscanConfig {
            sample_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            zero_interval.validate(),
            Err(CoverscanError::Config(_))
        ));

        let zero_streak = CoverscanConfig {
            required_streak: 0,
            ..Default::default()
        };
        assert!(zero_streak.validate().is_err());

        let mut bad_floor = CoverscanConfig::default();
        bad_floor.policy.confidence_floor = -0.1;
        assert!(bad_floor.validate().is_err());
    }
}
