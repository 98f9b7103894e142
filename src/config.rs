//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. User config: `~/.config/protgraph/config.toml` (XDG) or platform config dir
//! 2. Project config: `.protgraph.toml`
//! 3. Environment variables: `PROTGRAPH_<SECTION>__<KEY>`
//!
//! Every key has a default, so an empty configuration is valid.
//!
//! # Example
//!
//! ```toml
//! [neo4j]
//! uri = "bolt://neo4j:7687"
//! password = "secret"
//!
//! [similarity]
//! threshold = 0.2
//! fan_out_cap = 2000
//! fan_out_policy = "sample"
//!
//! [rebuild]
//! mode = "staged"
//! ```
//!
//! Environment keys use a double underscore between section and key because
//! the keys themselves contain underscores: `PROTGRAPH_SIMILARITY__FAN_OUT_CAP=2000`.

use std::ops::Deref;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub neo4j: Neo4jConfig,
    pub similarity: SimilarityConfig,
    pub import: ImportConfig,
    pub rebuild: RebuildConfig,
    pub export: ExportConfig,
}

/// Neo4j connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Neo4jConfig {
    /// Bolt URI, e.g. `bolt://localhost:7687`.
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Target database; the server default when unset.
    pub database: Option<String>,
    /// Connection pool size.
    pub max_connections: usize,
    /// Deadline for a single store round-trip.
    pub query_timeout_secs: u64,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            database: None,
            max_connections: 16,
            query_timeout_secs: 300,
        }
    }
}

/// What to do with a domain whose carrier set exceeds the fan-out cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOutPolicy {
    /// Leave the domain out of the pair accumulation entirely.
    Skip,
    /// Keep a deterministic, evenly strided subset of `fan_out_cap` carriers.
    Sample,
}

/// Which engine produces SIMILAR edges during a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityBackend {
    /// In-process inverted-index accumulation (exact counts).
    Native,
    /// Neo4j Graph Data Science `nodeSimilarity.write` (weights only).
    Gds,
}

/// Parameters of the similarity computation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Inclusive lower bound on the Jaccard weight of an emitted edge.
    pub threshold: f64,
    /// Largest carrier set processed as-is.
    pub fan_out_cap: usize,
    pub fan_out_policy: FanOutPolicy,
    pub engine: SimilarityBackend,
    pub gds_graph_name: String,
    pub gds_top_k: u32,
    pub gds_concurrency: u32,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            fan_out_cap: 5000,
            fan_out_policy: FanOutPolicy::Skip,
            engine: SimilarityBackend::Native,
            gds_graph_name: "protein_domain_graph".to_string(),
            gds_top_k: 10,
            gds_concurrency: 4,
        }
    }
}

/// Parameters of the entity/category import.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Rows per write transaction.
    pub batch_size: usize,
    /// Wholesale retries of a batch after a retryable failure.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: 2500,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

/// How stale SIMILAR edges are replaced during a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RebuildMode {
    /// Delete every SIMILAR edge before recomputing. Readers see an empty
    /// relation until the new generation is promoted.
    ClearFirst,
    /// Write the new generation next to the current one, promote it, then
    /// delete the old one.
    Staged,
}

/// Parameters of the similarity rebuild.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RebuildConfig {
    pub mode: RebuildMode,
    /// Relationships deleted per statement.
    pub delete_batch_size: usize,
    /// Edges written (or enriched) per statement.
    pub write_batch_size: usize,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            mode: RebuildMode::ClearFirst,
            delete_batch_size: 50_000,
            write_batch_size: 5000,
        }
    }
}

/// Parameters of the neighborhood export.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default depth when the caller does not pass one.
    pub depth: u8,
    /// Decimal places kept on exported weights.
    pub weight_precision: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            depth: 1,
            weight_precision: 2,
        }
    }
}

impl Config {
    /// Load config with layered resolution (user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    /// The layered figment, exposed so callers can add their own layers.
    pub fn figment() -> Figment {
        Figment::new()
            // Layer 1: User config (lowest priority)
            .merge(Toml::file(Self::user_config_path()))
            // Layer 2: Project config
            .merge(Toml::file(".protgraph.toml"))
            // Layer 3: Environment variables (highest priority)
            .merge(Env::prefixed("PROTGRAPH_").split("__"))
    }

    /// Reject values the components cannot work with.
    pub fn validate(&self) -> Result<(), AppError> {
        let s = &self.similarity;
        if !(0.0..=1.0).contains(&s.threshold) || s.threshold.is_nan() {
            return Err(AppError::Validation(format!(
                "similarity.threshold must be within [0, 1], got {}",
                s.threshold
            )));
        }
        if s.fan_out_cap < 2 {
            return Err(AppError::Validation(
                "similarity.fan_out_cap must be at least 2".into(),
            ));
        }
        if self.import.batch_size == 0 {
            return Err(AppError::Validation("import.batch_size must be positive".into()));
        }
        if self.rebuild.delete_batch_size == 0 || self.rebuild.write_batch_size == 0 {
            return Err(AppError::Validation(
                "rebuild batch sizes must be positive".into(),
            ));
        }
        if !matches!(self.export.depth, 1 | 2) {
            return Err(AppError::Validation(format!(
                "export.depth must be 1 or 2, got {}",
                self.export.depth
            )));
        }
        Ok(())
    }

    /// User config path: ~/.config/protgraph/config.toml (XDG) or platform config dir.
    fn user_config_path() -> std::path::PathBuf {
        // Prefer XDG config location (~/.config) on all platforms
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("protgraph").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        // Fall back to platform-specific config dir
        dirs::config_dir()
            .map(|p| p.join("protgraph").join("config.toml"))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.similarity.threshold, 0.1);
        assert_eq!(config.import.batch_size, 2500);
        assert_eq!(config.similarity.fan_out_policy, FanOutPolicy::Skip);
        assert_eq!(config.rebuild.mode, RebuildMode::ClearFirst);
    }

    #[test]
    fn test_project_file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                ".protgraph.toml",
                r#"
                [similarity]
                threshold = 0.25
                fan_out_policy = "sample"

                [rebuild]
                mode = "staged"
                "#,
            )?;
            jail.set_env("PROTGRAPH_SIMILARITY__FAN_OUT_CAP", "42");
            jail.set_env("PROTGRAPH_NEO4J__URI", "bolt://graph:7687");

            let config = Config::load().expect("config should load");
            assert_eq!(config.similarity.threshold, 0.25);
            assert_eq!(config.similarity.fan_out_cap, 42);
            assert_eq!(config.similarity.fan_out_policy, FanOutPolicy::Sample);
            assert_eq!(config.rebuild.mode, RebuildMode::Staged);
            assert_eq!(config.neo4j.uri, "bolt://graph:7687");
            // Untouched sections keep their defaults
            assert_eq!(config.import.batch_size, 2500);
            Ok(())
        });
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.similarity.threshold = 1.5;
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_bad_depth() {
        let mut config = Config::default();
        config.export.depth = 3;
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_tiny_fan_out_cap() {
        let mut config = Config::default();
        config.similarity.fan_out_cap = 1;
        assert!(config.validate().is_err());
    }
}
