//! Engine configuration: TOML file with environment overrides
//!
//! Configuration is a plain value threaded into the kernel. A TOML document
//! (`shannon.toml` at the analysis root by default) supplies file values;
//! `SHANNON_*` environment variables override them key by key.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{InsightError, Result};
use crate::lang::Lang;

/// Language inclusion policy for the scanner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguagePolicy {
    /// Analyze every supported language found under the root
    #[default]
    Auto,
    /// Analyze only the listed languages
    Explicit(Vec<Lang>),
}

/// A user-declared module: a name plus a path glob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomModule {
    pub name: String,
    pub path: String,
}

/// Module detection sub-config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Explicitly declared modules; when non-empty, detection is skipped
    #[serde(default)]
    pub custom: Vec<CustomModule>,
}

/// Architecture analyzer sub-config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureConfig {
    /// Directory depth for module detection; None means auto
    #[serde(default)]
    pub module_depth: Option<usize>,
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        Self { module_depth: None }
    }
}

/// Temporal analyzer sub-config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Window for velocity-style metrics, in days
    #[serde(default = "default_velocity_window_days")]
    pub velocity_window_days: u32,
    /// Churn window width, in days
    #[serde(default = "default_churn_window_days")]
    pub churn_window_days: u32,
    /// Maximum commits read from git log
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,
    /// Timeout for the git subprocess, in seconds
    #[serde(default = "default_git_timeout_seconds")]
    pub git_timeout_seconds: u64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            velocity_window_days: default_velocity_window_days(),
            churn_window_days: default_churn_window_days(),
            max_commits: default_max_commits(),
            git_timeout_seconds: default_git_timeout_seconds(),
        }
    }
}

fn default_velocity_window_days() -> u32 {
    90
}
fn default_churn_window_days() -> u32 {
    28
}
fn default_max_commits() -> usize {
    5000
}
fn default_git_timeout_seconds() -> u64 {
    30
}

/// Full engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Z-score magnitude at which a signal counts as notable
    pub z_score_threshold: f64,
    /// PageRank damping factor, in [0, 1]
    pub pagerank_damping: f64,
    /// PageRank power-iteration cap
    pub pagerank_iterations: usize,
    /// PageRank convergence tolerance
    pub pagerank_tolerance: f64,
    /// Weights for the five raw-risk primitives; auto-normalized
    pub fusion_weights: [f64; 5],
    /// Per-file size limit in megabytes
    pub max_file_size_mb: f64,
    /// Maximum number of files scanned
    pub max_files: usize,
    /// Glob patterns excluded from the walk
    pub exclude_patterns: Vec<String>,
    /// Worker thread count; None lets rayon decide
    pub parallel_workers: Option<usize>,
    /// Per-phase soft timeout, in seconds
    pub timeout_seconds: u64,
    /// Whether the history database is written
    pub enable_cache: bool,
    /// History cache freshness horizon
    pub cache_ttl_hours: u64,
    /// Language inclusion policy
    pub languages: LanguagePolicy,
    pub modules: ModulesConfig,
    pub architecture: ArchitectureConfig,
    pub temporal: TemporalConfig,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            z_score_threshold: 1.5,
            pagerank_damping: 0.85,
            pagerank_iterations: 20,
            pagerank_tolerance: 1e-6,
            fusion_weights: [0.20, 0.25, 0.20, 0.15, 0.20],
            max_file_size_mb: 10.0,
            max_files: 10_000,
            exclude_patterns: Vec::new(),
            parallel_workers: None,
            timeout_seconds: 10,
            enable_cache: true,
            cache_ttl_hours: 24,
            languages: LanguagePolicy::Auto,
            modules: ModulesConfig::default(),
            architecture: ArchitectureConfig::default(),
            temporal: TemporalConfig::default(),
        }
    }
}

impl InsightConfig {
    /// Load configuration for an analysis root.
    ///
    /// Reads `shannon.toml` at the root when present, then applies
    /// `SHANNON_*` environment overrides, then validates.
    pub fn load(root: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(root.join("shannon.toml")) {
            Ok(text) => toml::from_str(&text).map_err(|e| InsightError::Config {
                message: format!("shannon.toml: {}", e),
            })?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `SHANNON_*` environment variable overrides.
    ///
    /// Unparseable values are warned about and ignored, never fatal.
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            let Some(name) = key.strip_prefix("SHANNON_") else { continue };
            match name {
                "Z_SCORE_THRESHOLD" => parse_env_into(&mut self.z_score_threshold, &key, &value),
                "PAGERANK_DAMPING" => parse_env_into(&mut self.pagerank_damping, &key, &value),
                "PAGERANK_ITERATIONS" => {
                    parse_env_into(&mut self.pagerank_iterations, &key, &value)
                }
                "PAGERANK_TOLERANCE" => parse_env_into(&mut self.pagerank_tolerance, &key, &value),
                "MAX_FILE_SIZE_MB" => parse_env_into(&mut self.max_file_size_mb, &key, &value),
                "MAX_FILES" => parse_env_into(&mut self.max_files, &key, &value),
                "TIMEOUT_SECONDS" => parse_env_into(&mut self.timeout_seconds, &key, &value),
                "ENABLE_CACHE" => parse_env_into(&mut self.enable_cache, &key, &value),
                "CACHE_TTL_HOURS" => parse_env_into(&mut self.cache_ttl_hours, &key, &value),
                "PARALLEL_WORKERS" => match value.parse() {
                    Ok(n) => self.parallel_workers = Some(n),
                    Err(_) => warn!(key, value, "ignoring unparseable env override"),
                },
                "EXCLUDE_PATTERNS" => {
                    self.exclude_patterns =
                        value.split(',').map(|s| s.trim().to_string()).collect();
                }
                _ => {}
            }
        }
    }

    /// Validate ranges and normalize the fusion weight vector
    pub fn validate(&mut self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pagerank_damping) {
            return Err(InsightError::Config {
                message: format!(
                    "pagerank_damping must be in [0, 1], got {}",
                    self.pagerank_damping
                ),
            });
        }
        if self.pagerank_tolerance <= 0.0 {
            return Err(InsightError::Config {
                message: "pagerank_tolerance must be positive".to_string(),
            });
        }
        if self.fusion_weights.iter().any(|w| *w < 0.0) {
            return Err(InsightError::Config {
                message: "fusion_weights must be non-negative".to_string(),
            });
        }
        let total: f64 = self.fusion_weights.iter().sum();
        if total <= 0.0 {
            return Err(InsightError::Config {
                message: "fusion_weights must not all be zero".to_string(),
            });
        }
        for w in &mut self.fusion_weights {
            *w /= total;
        }
        Ok(())
    }

    /// Per-file byte limit derived from `max_file_size_mb`
    pub fn max_file_bytes(&self) -> u64 {
        (self.max_file_size_mb * 1024.0 * 1024.0) as u64
    }
}

fn parse_env_into<T: std::str::FromStr>(slot: &mut T, key: &str, value: &str) {
    match value.parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!(key, value, "ignoring unparseable env override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = InsightConfig::default();
        assert_eq!(config.z_score_threshold, 1.5);
        assert_eq!(config.pagerank_damping, 0.85);
        assert_eq!(config.pagerank_iterations, 20);
        assert_eq!(config.pagerank_tolerance, 1e-6);
        assert_eq!(config.max_files, 10_000);
        assert_eq!(config.temporal.max_commits, 5000);
        assert_eq!(config.temporal.git_timeout_seconds, 30);
        assert_eq!(config.temporal.velocity_window_days, 90);
        assert!(config.enable_cache);
    }

    #[test]
    fn fusion_weights_are_normalized() {
        let mut config = InsightConfig { fusion_weights: [2.0, 0.0, 1.0, 1.0, 1.0], ..Default::default() };
        config.validate().unwrap();
        let total: f64 = config.fusion_weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(config.fusion_weights[1], 0.0);
        assert!((config.fusion_weights[0] - 0.4).abs() < 1e-9);
    }

    #[test]
    fn invalid_damping_rejected() {
        let mut config = InsightConfig { pagerank_damping: 1.2, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip() {
        let text = r#"
            z_score_threshold = 2.0
            max_files = 500

            [architecture]
            module_depth = 2

            [[modules.custom]]
            name = "core"
            path = "src/core/**"
        "#;
        let config: InsightConfig = toml::from_str(text).unwrap();
        assert_eq!(config.z_score_threshold, 2.0);
        assert_eq!(config.max_files, 500);
        assert_eq!(config.architecture.module_depth, Some(2));
        assert_eq!(config.modules.custom.len(), 1);
        assert_eq!(config.modules.custom[0].name, "core");
        // Unset keys keep defaults
        assert_eq!(config.pagerank_damping, 0.85);
    }
}
