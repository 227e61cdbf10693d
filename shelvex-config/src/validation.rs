//! Configuration validation.
//!
//! Validation produces warnings rather than hard failures: the engine
//! treats invalid roots as per-operation errors at execution time, so a
//! half-configured file is still loadable (and correctable) from the CLI.

use std::fmt::{self, Display};

use crate::models::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate(config: &Config) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if config.paths.source.as_os_str().is_empty() {
        warnings.push(ConfigWarning::new("paths.source", "no source root configured"));
    } else if !config.paths.source.exists() {
        warnings.push(ConfigWarning::new(
            "paths.source",
            format!("source root does not exist: {}", config.paths.source.display()),
        ));
    }

    if config.paths.movies_root.as_os_str().is_empty()
        && config.paths.shows_root.as_os_str().is_empty()
    {
        warnings.push(ConfigWarning::new(
            "paths",
            "neither movies_root nor shows_root is configured; nothing can be planned",
        ));
    }

    if config.confidence.yellow >= config.confidence.green {
        warnings.push(ConfigWarning::new(
            "confidence",
            format!(
                "yellow threshold ({}) should be below green ({})",
                config.confidence.yellow, config.confidence.green
            ),
        ));
    }

    if config.mover.concurrency_local == 0 {
        warnings.push(ConfigWarning::new(
            "mover.concurrency_local",
            "zero concurrency stalls execution; the engine clamps it to 1",
        ));
    }
    if config.mover.concurrency_network == 0 {
        warnings.push(ConfigWarning::new(
            "mover.concurrency_network",
            "zero concurrency stalls execution; the engine clamps it to 1",
        ));
    }

    if config.mover.path_length_limit < 64 {
        warnings.push(ConfigWarning::new(
            "mover.path_length_limit",
            "limit is too small for realistic library paths",
        ));
    }

    if config.extensions.video.is_empty() {
        warnings.push(ConfigWarning::new(
            "extensions.video",
            "no video extensions configured; scans will find nothing",
        ));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_warns_about_missing_roots_only() {
        let warnings = validate(&Config::default());
        assert!(warnings.iter().any(|w| w.field == "paths.source"));
        assert!(warnings.iter().any(|w| w.field == "paths"));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn inverted_thresholds_warn() {
        let mut config = Config::default();
        config.confidence.green = 40;
        config.confidence.yellow = 70;
        let warnings = validate(&config);
        assert!(warnings.iter().any(|w| w.field == "confidence"));
    }

    #[test]
    fn zero_concurrency_warns() {
        let mut config = Config::default();
        config.mover.concurrency_local = 0;
        let warnings = validate(&config);
        assert!(warnings.iter().any(|w| w.field == "mover.concurrency_local"));
    }
}
