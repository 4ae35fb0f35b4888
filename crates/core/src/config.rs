// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline configuration, loaded from a TOML file with serde defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default deadline for one upload's whole pipeline: 15 minutes.
pub const DEFAULT_TIMEOUT_MS: u64 = 900_000;

/// Default sheet-name format accepted as marker cross-reference context.
pub const DEFAULT_MARKER_CONTEXT_REGEX: &str = "^[A-Za-z][0-9]+$";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Daemon and pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Deadline alarm for one upload, in milliseconds.
    pub timeout_ms: u64,
    /// Regex a sheet name must match to be offered as marker context.
    pub marker_context_regex: String,
    pub metadata_queue: String,
    pub tile_queue: String,
    pub marker_queue: String,
    /// Bounded retries for a worker's external service call.
    pub worker_attempts: u32,
    /// Queue lease (visibility timeout) in milliseconds.
    pub lease_ms: u64,
    /// Concurrent worker instances per stage.
    pub workers_per_stage: usize,
    pub listen_addr: String,
    pub data_dir: PathBuf,
    /// Base URL of the opaque rasterizer/OCR service.
    pub raster_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            marker_context_regex: DEFAULT_MARKER_CONTEXT_REGEX.to_string(),
            metadata_queue: "plan-metadata".to_string(),
            tile_queue: "plan-tiles".to_string(),
            marker_queue: "plan-markers".to_string(),
            worker_attempts: 3,
            lease_ms: 60_000,
            workers_per_stage: 4,
            listen_addr: "127.0.0.1:7180".to_string(),
            data_dir: PathBuf::from("data"),
            raster_url: "http://127.0.0.1:7190".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file. Missing keys fall back to
    /// defaults; a missing file is an error (callers decide whether to
    /// fall back to `Default`).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
