use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{Config, MAX_STEPS_HARD_CAP};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_steps: {0}. Must be between 1 and {MAX_STEPS_HARD_CAP}")]
    InvalidMaxSteps(u32),

    #[error("Invalid gamma: {0}. Must be between 0.5 and 0.99")]
    InvalidGamma(f64),

    #[error("Invalid {name}: {value}. Must be positive")]
    NonPositive { name: &'static str, value: f64 },

    #[error("Invalid {name}: {value} exceeds the emotion cap {cap}")]
    ThresholdAboveCap {
        name: &'static str,
        value: f64,
        cap: f64,
    },

    #[error("Invalid pass_threshold: {0}. Must be in (0, 1]")]
    InvalidPassThreshold(f64),

    #[error("Invalid {0}.max_attempts: must be at least 1")]
    InvalidMaxAttempts(&'static str),

    #[error("Agent endpoint cannot be empty")]
    EmptyAgentEndpoint,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid max_concurrent_runs: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .mimic/config.yaml (project config)
    /// 3. .mimic/local.yaml (project local overrides, optional)
    /// 4. Environment variables (MIMIC_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring `MIMIC_*`
    /// environment overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let path = path.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("MIMIC_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".mimic/config.yaml"))
            .merge(Yaml::file(".mimic/local.yaml"))
            .merge(Env::prefixed("MIMIC_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let max_steps = config.simulation.max_steps;
        if max_steps == 0 || max_steps > MAX_STEPS_HARD_CAP {
            return Err(ConfigError::InvalidMaxSteps(max_steps));
        }
        if config.simulation.page_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "simulation.page_size must be at least 1".to_string(),
            ));
        }

        let emotion = &config.emotion;
        if !(0.5..=0.99).contains(&emotion.gamma) {
            return Err(ConfigError::InvalidGamma(emotion.gamma));
        }
        positive("emotion.cap", emotion.cap)?;
        positive("emotion.base_positive_threshold", emotion.base_positive_threshold)?;
        positive("emotion.base_negative_threshold", emotion.base_negative_threshold)?;
        if let Some(fixed) = emotion.thresholds {
            positive("emotion.thresholds.positive_threshold", fixed.positive_threshold)?;
            positive("emotion.thresholds.negative_threshold", fixed.negative_threshold)?;
            within_cap(
                "emotion.thresholds.positive_threshold",
                fixed.positive_threshold,
                emotion.cap,
            )?;
            within_cap(
                "emotion.thresholds.negative_threshold",
                fixed.negative_threshold,
                emotion.cap,
            )?;
        }
        within_cap(
            "emotion.base_positive_threshold",
            emotion.base_positive_threshold,
            emotion.cap,
        )?;
        within_cap(
            "emotion.base_negative_threshold",
            emotion.base_negative_threshold,
            emotion.cap,
        )?;

        let pass = config.judge.pass_threshold;
        if !(pass > 0.0 && pass <= 1.0) {
            return Err(ConfigError::InvalidPassThreshold(pass));
        }

        if config.oracle.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts("oracle"));
        }
        if config.agent.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts("agent"));
        }
        if config.agent.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyAgentEndpoint);
        }

        if config.batch.max_concurrent_runs == 0 {
            return Err(ConfigError::InvalidConcurrency(config.batch.max_concurrent_runs));
        }

        if config.store.database_path.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "store.database_path cannot be empty".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

fn within_cap(name: &'static str, value: f64, cap: f64) -> Result<(), ConfigError> {
    if value <= cap {
        Ok(())
    } else {
        Err(ConfigError::ThresholdAboveCap { name, value, cap })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{LogFormat, Thresholds};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.simulation.max_steps, 8);
        assert_eq!(config.oracle.max_attempts, 2);
        assert!((config.judge.pass_threshold - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.store.database_path, ".mimic/sessions.db");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
simulation:
  max_steps: 12
emotion:
  gamma: 0.8
  thresholds:
    positive_threshold: 0.6
    negative_threshold: 1.2
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.simulation.max_steps, 12);
        assert_eq!(config.simulation.max_actions_per_turn, 5);
        assert!((config.emotion.gamma - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.emotion.thresholds, Some(Thresholds::new(0.6, 1.2)));
        assert_eq!(config.logging.format, LogFormat::Json);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_max_steps_bounds() {
        let mut config = Config::default();
        config.simulation.max_steps = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxSteps(0))
        ));

        config.simulation.max_steps = 31;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxSteps(31))
        ));

        config.simulation.max_steps = 30;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_gamma_range() {
        for gamma in [0.49, 1.0] {
            let mut config = Config::default();
            config.emotion.gamma = gamma;
            assert!(matches!(
                ConfigLoader::validate(&config),
                Err(ConfigError::InvalidGamma(_))
            ));
        }
    }

    #[test]
    fn test_validate_thresholds() {
        let mut config = Config::default();
        config.emotion.thresholds = Some(Thresholds::new(0.0, 1.0));
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::NonPositive { .. })
        ));

        config.emotion.thresholds = Some(Thresholds::new(1.0, 5.0));
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ThresholdAboveCap { value, .. }) if (value - 5.0).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn test_validate_pass_threshold() {
        let mut config = Config::default();
        config.judge.pass_threshold = 0.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPassThreshold(_))
        ));
        config.judge.pass_threshold = 1.0;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_attempts_endpoint_and_concurrency() {
        let mut config = Config::default();
        config.oracle.max_attempts = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxAttempts("oracle"))
        ));

        let mut config = Config::default();
        config.agent.endpoint = "  ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyAgentEndpoint)
        ));

        let mut config = Config::default();
        config.batch.max_concurrent_runs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "simulation:\n  max_steps: 4\nagent:\n  endpoint: http://localhost:9000/chat"
        )
        .unwrap();
        file.flush().unwrap();

        temp_env::with_vars(
            [
                ("MIMIC_SIMULATION__MAX_STEPS", Some("6")),
                ("MIMIC_JUDGE__MAX_REDRAFTS", Some("1")),
            ],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.simulation.max_steps, 6, "env should win over file");
                assert_eq!(config.judge.max_redrafts, 1);
                assert_eq!(config.agent.endpoint, "http://localhost:9000/chat");
            },
        );
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "emotion:\n  gamma: 0.2").unwrap();
        file.flush().unwrap();

        temp_env::with_var_unset("MIMIC_EMOTION__GAMMA", || {
            assert!(ConfigLoader::load_from_file(file.path()).is_err());
        });
    }

    #[test]
    fn test_hierarchical_merging() {
        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "simulation:\n  max_steps: 5\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "simulation:\n  max_steps: 15\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.simulation.max_steps, 15, "Override should win");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.format,
            LogFormat::Json,
            "Base value should persist when not overridden"
        );
    }
}
