//! Interpreter configuration
//!
//! Keys are camelCase so the same file works for TOML and JSON hosts:
//!
//! ```toml
//! maxLoopIterations = 10
//! maxInnerIterations = 100000
//! verbose = true
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Log every emitted command at debug level
    pub verbose: bool,
    /// Trace every frame the machine executes
    pub debug: bool,
    /// Pause between steps in milliseconds. A pacing hint for hosts; the
    /// interpreter itself never sleeps.
    pub step_delay: u64,
    /// Number of times `loop()` runs before the program completes
    pub max_loop_iterations: u64,
    /// Upper bound on iterations of a single `while`/`do`/`for` loop
    pub max_inner_iterations: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verbose: false,
            debug: false,
            step_delay: 0,
            max_loop_iterations: 3,
            max_inner_iterations: None,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_max_loop_iterations(mut self, iterations: u64) -> Self {
        self.max_loop_iterations = iterations;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_loop_iterations, 3);
        assert_eq!(config.max_inner_iterations, None);
    }

    #[test]
    fn test_toml_partial() {
        let config = Config::from_toml_str("maxLoopIterations = 10\nverbose = true\n").unwrap();
        assert_eq!(config.max_loop_iterations, 10);
        assert!(config.verbose);
        assert_eq!(config.step_delay, 0);
    }

    #[test]
    fn test_json() {
        let config = Config::from_json_str(r#"{"maxInnerIterations": 500, "stepDelay": 20}"#).unwrap();
        assert_eq!(config.max_inner_iterations, Some(500));
        assert_eq!(config.step_delay, 20);
        assert_eq!(config.max_loop_iterations, 3);
    }

    #[test]
    fn test_rejects_bad_types() {
        assert!(matches!(
            Config::from_toml_str("maxLoopIterations = \"many\""),
            Err(ConfigError::Toml(_))
        ));
    }
}
