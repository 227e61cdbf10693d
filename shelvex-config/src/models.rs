use std::collections::HashSet;
use std::path::PathBuf;
use std::{env, fs};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use shelvex_core::mover::{MoverConfig, RetryConfig};
use shelvex_core::{EngineConfig, GroupingRules, NamingRules, TitleRules};
use shelvex_model::{ConfidenceThresholds, ConflictPolicy};

/// Source that produced the loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Library roots. The source tree is scanned; movies and shows roots are
/// where planned destinations live.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub source: PathBuf,
    pub movies_root: PathBuf,
    pub shows_root: PathBuf,
}

/// Recognized extensions, lowercased without the dot.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtensionsConfig {
    pub video: Vec<String>,
    pub companion: Vec<String>,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        let defaults = GroupingRules::default();
        Self {
            video: defaults.video_extensions.iter().cloned().collect(),
            companion: defaults.companion_extensions.iter().cloned().collect(),
        }
    }
}

/// Grouping tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Folder names that never become a unit root.
    pub generic_roots: Vec<String>,
    /// Nested folders whose files count as companions.
    pub nested_companion_dirs: Vec<String>,
    /// Flag mixed-content folders instead of guessing. Turning this off
    /// enables the common-prefix heuristic for multi-video folders.
    pub strict: bool,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        let defaults = GroupingRules::default();
        Self {
            generic_roots: defaults.generic_roots.iter().cloned().collect(),
            nested_companion_dirs: defaults.nested_companion_dirs.iter().cloned().collect(),
            strict: true,
        }
    }
}

/// Confidence band boundaries.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub green: u8,
    pub yellow: u8,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            green: 70,
            yellow: 40,
        }
    }
}

/// Move execution tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MoverSection {
    /// Concurrent file operations against local destinations.
    pub concurrency_local: usize,
    /// Concurrent file operations against network destinations; shares
    /// degrade badly under parallel writes, so keep this low.
    pub concurrency_network: usize,
    /// Mount prefixes treated as network destinations.
    pub network_mounts: Vec<PathBuf>,
    pub conflict_policy: ConflictPolicy,
    pub dry_run: bool,
    /// Safety margin subtracted from destination free space.
    pub free_space_margin_bytes: u64,
    /// Destinations longer than this fail preflight.
    pub path_length_limit: usize,
    pub retry: RetryConfig,
}

impl Default for MoverSection {
    fn default() -> Self {
        Self {
            concurrency_local: 8,
            concurrency_network: 2,
            network_mounts: Vec::new(),
            conflict_policy: ConflictPolicy::Skip,
            dry_run: true,
            free_space_margin_bytes: 100 * 1024 * 1024,
            path_length_limit: 255,
            retry: RetryConfig::default(),
        }
    }
}

/// Sanitization tuning.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Replacement for characters invalid in destination names. Empty
    /// removes them.
    pub substitute: String,
}

/// Online metadata lookups.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub enabled: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub extensions: ExtensionsConfig,
    pub grouping: GroupingConfig,
    pub confidence: ConfidenceConfig,
    pub mover: MoverSection,
    pub sanitize: SanitizeConfig,
    pub providers: ProvidersConfig,
}

impl Config {
    /// Load configuration overrides from the environment. Evaluation
    /// order: `$SHELVEX_CONFIG_PATH` (TOML or JSON file), then
    /// `$SHELVEX_CONFIG_JSON` (inline JSON), then defaults.
    pub fn load_from_env() -> anyhow::Result<(Self, ConfigSource)> {
        if let Ok(path_str) = env::var("SHELVEX_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str.trim());
            let config = Self::load_from_path(&path)?;
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Ok(inline) = env::var("SHELVEX_CONFIG_JSON")
            && !inline.trim().is_empty()
        {
            let config = serde_json::from_str(&inline)
                .context("parsing $SHELVEX_CONFIG_JSON")?;
            return Ok((config, ConfigSource::EnvInline));
        }

        Ok((Self::default(), ConfigSource::Default))
    }

    /// Load a TOML or JSON config file, chosen by extension (TOML is
    /// tried first for anything that is not `.json`).
    pub fn load_from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing JSON config {}", path.display()))
        } else {
            toml::from_str(&raw)
                .map_err(|err| anyhow!("parsing TOML config {}: {err}", path.display()))
        }
    }

    /// Extensions recognized by the scanner: videos plus companions.
    pub fn scanner_extensions(&self) -> HashSet<String> {
        self.extensions
            .video
            .iter()
            .chain(self.extensions.companion.iter())
            .map(|e| e.to_lowercase())
            .collect()
    }

    /// Assemble the core engine configuration.
    pub fn engine_config(&self) -> EngineConfig {
        let mut grouping = GroupingRules::default();
        grouping.generic_roots = self
            .grouping
            .generic_roots
            .iter()
            .map(|s| s.to_lowercase())
            .collect();
        grouping.nested_companion_dirs = self
            .grouping
            .nested_companion_dirs
            .iter()
            .map(|s| s.to_lowercase())
            .collect();
        grouping.video_extensions =
            self.extensions.video.iter().map(|s| s.to_lowercase()).collect();
        grouping.companion_extensions = self
            .extensions
            .companion
            .iter()
            .map(|s| s.to_lowercase())
            .collect();

        let naming = NamingRules {
            substitute: self.sanitize.substitute.clone(),
            ..NamingRules::default()
        };

        let mover = MoverConfig {
            concurrency_local: self.mover.concurrency_local,
            concurrency_network: self.mover.concurrency_network,
            network_mounts: self.mover.network_mounts.clone(),
            free_space_margin_bytes: self.mover.free_space_margin_bytes,
            path_length_limit: self.mover.path_length_limit,
            retry: self.mover.retry,
            ..MoverConfig::default()
        };

        EngineConfig {
            source_root: self.paths.source.clone(),
            movies_root: self.paths.movies_root.clone(),
            shows_root: self.paths.shows_root.clone(),
            grouping,
            title_rules: TitleRules::default(),
            naming,
            thresholds: ConfidenceThresholds {
                green: self.confidence.green,
                yellow: self.confidence.yellow,
            },
            conflict_policy: self.mover.conflict_policy,
            dry_run: self.mover.dry_run,
            strict_grouping: self.grouping.strict,
            mover,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let config = Config::default();
        assert!(config.mover.dry_run);
        assert_eq!(config.mover.conflict_policy, ConflictPolicy::Skip);
        assert_eq!(config.confidence.green, 70);
        assert_eq!(config.confidence.yellow, 40);
        assert!(config.grouping.strict);
    }

    #[test]
    fn toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelvex.toml");
        std::fs::write(
            &path,
            r#"
[paths]
source = "/data/incoming"
movies_root = "/library/Movies"
shows_root = "/library/Shows"

[mover]
concurrency_local = 4
conflict_policy = "keep_both"
dry_run = false
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.paths.source, PathBuf::from("/data/incoming"));
        assert_eq!(config.mover.concurrency_local, 4);
        assert_eq!(config.mover.conflict_policy, ConflictPolicy::KeepBoth);
        assert!(!config.mover.dry_run);
        // Unspecified sections keep their defaults.
        assert_eq!(config.mover.concurrency_network, 2);
        assert_eq!(config.confidence.green, 70);
    }

    #[test]
    fn json_config_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelvex.json");
        std::fs::write(
            &path,
            r#"{"confidence": {"green": 80, "yellow": 50}}"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.confidence.green, 80);
        assert_eq!(config.confidence.yellow, 50);
    }

    #[test]
    fn engine_config_reflects_sections() {
        let mut config = Config::default();
        config.paths.movies_root = PathBuf::from("/library/Movies");
        config.sanitize.substitute = "_".to_string();
        config.grouping.strict = false;

        let engine = config.engine_config();
        assert_eq!(engine.movies_root, PathBuf::from("/library/Movies"));
        assert_eq!(engine.naming.substitute, "_");
        assert!(!engine.strict_grouping);
        assert!(engine.dry_run);
    }
}
