//! Bus configuration
//!
//! Selects the dispatch strategy and sizes the background workers of the
//! strategies that own any. Configuration can be loaded from and saved to
//! JSON or TOML files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

/// Upper bound on worker threads accepted by validation
const MAX_WORKER_THREADS: usize = 1024;

/// How handler invocations are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Invoke handlers on the publisher's thread
    #[default]
    Inline,
    /// Queue deliveries for a single background worker
    EventLoop,
    /// Per-subscriber mailboxes drained by a worker pool
    Parallel,
    /// Fan out to subscribers with data-parallel iteration
    DataParallel,
    /// Chain one async task per subscriber and message
    Task,
}

impl Strategy {
    /// Every strategy, in declaration order
    pub const ALL: [Strategy; 5] = [
        Strategy::Inline,
        Strategy::EventLoop,
        Strategy::Parallel,
        Strategy::DataParallel,
        Strategy::Task,
    ];

    /// Config/CLI name of the strategy
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::EventLoop => "event_loop",
            Self::Parallel => "parallel",
            Self::DataParallel => "data_parallel",
            Self::Task => "task",
        }
    }

    /// Whether `publish` only returns once every handler has been invoked
    pub fn is_synchronous(&self) -> bool {
        matches!(self, Self::Inline | Self::DataParallel)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownStrategy(s.to_string()))
    }
}

/// Configuration for a message bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Dispatch strategy to construct.
    pub strategy: Strategy,
    /// Worker threads for the pool-backed strategies. Zero means one per
    /// available CPU. The `parallel` strategy adds handler threads beyond
    /// this while handlers are blocked.
    pub worker_threads: usize,
    /// Prefix for the names of threads the bus spawns.
    pub thread_name: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            worker_threads: 0,
            thread_name: "rampage".to_string(),
        }
    }
}

impl BusConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration for a given strategy
    pub fn for_strategy(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Worker count after resolving the "one per CPU" default
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match extension(path) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or_default().to_string(),
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;

        let content = match extension(path) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or_default().to_string(),
                ))
            }
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "thread_name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.worker_threads > MAX_WORKER_THREADS {
            return Err(ConfigError::Invalid {
                key: "worker_threads".to_string(),
                reason: format!("must be at most {}", MAX_WORKER_THREADS),
            });
        }

        Ok(())
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}
