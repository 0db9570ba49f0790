//! Coordination configuration
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! `COORD_*` environment variables. CLI flags are applied last by the binary.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::bus::DEFAULT_HISTORY_LIMIT;
use crate::debate::DebateConfig;
use crate::generation::GenerationConfig;
use crate::learning::LearningConfig;
use crate::state::DEFAULT_INSIGHT_CAPACITY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Messages retained in the bus history.
    pub history_limit: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Insights retained in the ring buffer.
    pub insight_capacity: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            insight_capacity: DEFAULT_INSIGHT_CAPACITY,
        }
    }
}

/// Top-level configuration for every coordination component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    pub bus: BusConfig,
    pub state: StateConfig,
    pub learning: LearningConfig,
    pub debate: DebateConfig,
    pub generation: GenerationConfig,
}

impl CoordinationConfig {
    /// Defaults, then `path` (if given), then environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML file; missing sections and fields keep their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply `COORD_*` overrides read through `lookup`. Unparseable values
    /// are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(n) = lookup("COORD_BUS_HISTORY_LIMIT").and_then(|v| v.parse().ok()) {
            self.bus.history_limit = n;
        }
        if let Some(n) = lookup("COORD_INSIGHT_CAPACITY").and_then(|v| v.parse().ok()) {
            self.state.insight_capacity = n;
        }
        if let Some(n) = lookup("COORD_LEARNING_CAPACITY").and_then(|v| v.parse().ok()) {
            self.learning.record_capacity = n;
        }
        if let Some(n) = lookup("COORD_COACHING_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.learning.coaching_threshold = n;
        }
        if let Some(n) = lookup("COORD_MAX_ACTIVE_DEBATES").and_then(|v| v.parse().ok()) {
            self.debate.max_active_debates = n;
        }
        if let Some(n) = lookup("COORD_DEBATE_HISTORY").and_then(|v| v.parse().ok()) {
            self.debate.history_capacity = n;
        }
        if let Some(n) = lookup("COORD_MAX_QUEUE_LEN").and_then(|v| v.parse().ok()) {
            self.debate.max_queue_len = Some(n);
        }
        if let Some(flag) = lookup("COORD_ADMIT_ON_CANCEL").and_then(|v| v.parse().ok()) {
            self.debate.admit_on_cancel = flag;
        }
        if let Some(dir) = lookup("COORD_DEBATE_LOG_DIR") {
            self.debate.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = lookup("COORD_LLM_URL") {
            self.generation.endpoint_url = url;
        }
        if let Some(model) = lookup("COORD_LLM_MODEL") {
            self.generation.model = model;
        }
        if let Some(key) = lookup("COORD_LLM_API_KEY") {
            self.generation.api_key = Some(key);
        }
        if let Some(secs) = lookup("COORD_LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.generation.timeout_secs = secs;
        }
    }
}
