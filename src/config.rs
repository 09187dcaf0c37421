//! Configuration loading and management
//!
//! Handles parsing of `planbook.toml`. The file is optional; every field has
//! a default. Resolution order for the data directory: CLI flag / `PLANBOOK_DATA`
//! env, then `[data] dir` from the config file, then the platform data
//! directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::graph::GraphSpacing;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory configuration
    #[serde(default)]
    pub data: DataConfig,

    /// Dependency graph layout configuration
    #[serde(default)]
    pub graph: GraphConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// Overrides the platform default data directory
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Graph layout units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_horizontal_spacing")]
    pub horizontal_spacing: f64,

    #[serde(default = "default_vertical_spacing")]
    pub vertical_spacing: f64,

    #[serde(default = "default_node_height")]
    pub node_height: f64,
}

fn default_horizontal_spacing() -> f64 {
    200.0
}

fn default_vertical_spacing() -> f64 {
    140.0
}

fn default_node_height() -> f64 {
    60.0
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            horizontal_spacing: default_horizontal_spacing(),
            vertical_spacing: default_vertical_spacing(),
            node_height: default_node_height(),
        }
    }
}

impl Config {
    /// Load configuration from the platform config directory, falling back
    /// to defaults when no file exists
    pub fn load_default() -> Result<Self> {
        match default_config_file() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.graph.horizontal_spacing <= 0.0
            || self.graph.vertical_spacing <= 0.0
            || self.graph.node_height <= 0.0
        {
            return Err(Error::InvalidConfig(
                "graph spacing values must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Layout units for the graph builder
    pub fn graph_spacing(&self) -> GraphSpacing {
        GraphSpacing {
            horizontal: self.graph.horizontal_spacing,
            vertical: self.graph.vertical_spacing,
            node_height: self.graph.node_height,
        }
    }

    /// Resolve the data directory, preferring the CLI/env override
    pub fn resolve_data_dir(&self, cli_override: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(dir) = cli_override {
            return Ok(dir);
        }
        if let Some(dir) = &self.data.dir {
            return Ok(dir.clone());
        }
        directories::ProjectDirs::from("org", "planbook", "planbook")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                Error::InvalidConfig(
                    "no home directory found; pass --data-dir or set [data] dir".to_string(),
                )
            })
    }
}

/// Location of the optional config file
pub fn default_config_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "planbook", "planbook")
        .map(|dirs| dirs.config_dir().join("planbook.toml"))
}
