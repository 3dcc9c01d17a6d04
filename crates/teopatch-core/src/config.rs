use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    container::{ContainerLayout, DEFAULT_ALIGNMENT, MAX_PADDING_ITERATIONS},
    segments::{MAX_GROUP_SECONDS, MIN_PATCH_SECONDS, MIN_SEGMENT_SECONDS, MapperConfig},
    time::{DEFAULT_SAMPLE_RATE, DEFAULT_UNITS_PER_SAMPLE, SlotScale},
};

pub const CONFIG_FILE_NAME: &str = "teopatch.config.toml";
pub const CONFIG_PATH_ENV: &str = "TEOPATCH_CONFIG_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub segmenting: SegmentingConfig,
    pub container: ContainerConfig,
    pub batch: BatchConfig,
    pub diagnostics: DiagnosticsConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentingConfig {
    pub min_segment_seconds: f64,
    pub max_group_seconds: f64,
    pub min_patch_seconds: f64,
    pub sample_rate: u32,
    pub units_per_sample: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContainerConfig {
    pub alignment: usize,
    pub max_padding_iterations: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchConfig {
    /// `0` runs one worker per available CPU.
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub rust_log_filter: String,
    pub trace_file_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub logs_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for SegmentingConfig {
    fn default() -> Self {
        Self {
            min_segment_seconds: MIN_SEGMENT_SECONDS,
            max_group_seconds: MAX_GROUP_SECONDS,
            min_patch_seconds: MIN_PATCH_SECONDS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            units_per_sample: DEFAULT_UNITS_PER_SAMPLE,
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            alignment: DEFAULT_ALIGNMENT,
            max_padding_iterations: MAX_PADDING_ITERATIONS,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            rust_log_filter: crate::diagnostics::DEFAULT_FILTER.to_string(),
            trace_file_prefix: crate::diagnostics::DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
            output_dir: PathBuf::from("data/patches"),
        }
    }
}

impl SegmentingConfig {
    #[must_use]
    pub fn scale(&self) -> SlotScale {
        SlotScale {
            sample_rate: self.sample_rate,
            units_per_sample: self.units_per_sample,
        }
    }

    #[must_use]
    pub fn mapper(&self) -> MapperConfig {
        MapperConfig {
            min_segment_seconds: self.min_segment_seconds,
            max_group_seconds: self.max_group_seconds,
            scale: self.scale(),
        }
    }
}

impl ContainerConfig {
    #[must_use]
    pub fn layout(&self) -> ContainerLayout {
        ContainerLayout {
            alignment: self.alignment,
            max_padding_iterations: self.max_padding_iterations,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = discover_config_path().with_context(|| {
            format!("failed to locate {CONFIG_FILE_NAME}; looked in cwd and parent directory")
        })?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file {}", config_path.display()))?;
        Self::from_toml(&content).with_context(|| {
            format!("failed to parse config TOML from {}", config_path.display())
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// An explicit path must load; otherwise a discovered file is used when present.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match discover_config_path() {
            Ok(path) => Self::load_from(&path),
            Err(error) => {
                warn!(%error, "no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
    }

    let cwd = env::current_dir().context("failed to resolve current directory")?;
    let candidates = [
        cwd.join(CONFIG_FILE_NAME),
        cwd.join("..").join(CONFIG_FILE_NAME),
    ];

    candidates
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| anyhow::anyhow!("{CONFIG_FILE_NAME} not found"))
}
