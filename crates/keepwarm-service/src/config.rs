use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, de};
use tracing::level_filters::LevelFilter;

/// Controls the log format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect (pretty for tty, simplified for other).
    Auto,
    /// With colors.
    Pretty,
    /// Simplified log output.
    Simplified,
    /// Dump out JSON lines.
    Json,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// The log level for the engine.
    #[serde(deserialize_with = "deserialize_level_filter")]
    pub level: LevelFilter,
    /// Controls the log format.
    pub format: LogFormat,
    /// When set to true, backtraces are forced on.
    pub enable_backtraces: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
            enable_backtraces: true,
        }
    }
}

/// Control the metrics.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// host/port of statsd instance.
    pub statsd: Option<String>,
    /// The prefix that should be added to all metrics.
    pub prefix: String,
    /// A map containing custom tags and their values.
    ///
    /// These tags will be appended to every metric.
    pub custom_tags: BTreeMap<String, String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: match env::var("STATSD_SERVER") {
                Ok(statsd) => Some(statsd),
                Err(_) => None,
            },
            prefix: "keepwarm".into(),
            custom_tags: BTreeMap::new(),
        }
    }
}

/// Default number of replay workers.
pub const DEFAULT_POOL_SIZE: usize = 2;
/// Hard cap on the number of replay workers.
const MAX_POOL_SIZE: usize = 16;
/// Default length of the replay dispatch queue.
pub const DEFAULT_QUEUE_SIZE: usize = 32;
/// Hard cap on the length of the replay dispatch queue.
const MAX_QUEUE_SIZE: usize = 1024;

/// Sizing of the bounded replay worker pool.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrent replay workers.
    pub pool_size: usize,
    /// Length of the bounded dispatch queue in front of the workers.
    pub queue_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

impl WorkerConfig {
    /// The pool size that will actually be used.
    ///
    /// Zero falls back to the default, anything above the cap is clamped.
    pub fn effective_pool_size(&self) -> usize {
        let size = if self.pool_size == 0 {
            DEFAULT_POOL_SIZE
        } else {
            self.pool_size
        };
        size.min(MAX_POOL_SIZE)
    }

    /// The queue size that will actually be used.
    ///
    /// Zero falls back to the default, anything above the cap is clamped.
    pub fn effective_queue_size(&self) -> usize {
        let size = if self.queue_size == 0 {
            DEFAULT_QUEUE_SIZE
        } else {
            self.queue_size
        };
        size.min(MAX_QUEUE_SIZE)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Optional deployment/project name.
    ///
    /// When set, it prefixes cache names and the `refresh` / `last-access`
    /// namespaces in the shared store, so multiple deployments can share one
    /// store without clashing.
    pub project: Option<String>,

    /// The period of the sweep-then-refresh trigger.
    ///
    /// When unset, no periodic task is registered at all and the engine is
    /// inert except for on-demand registration.
    #[serde(with = "humantime_serde")]
    pub schedule: Option<Duration>,

    /// Master switch for the periodic task. Defaults to `true`.
    pub task_enabled: bool,

    /// Sizing of the replay worker pool.
    pub worker: WorkerConfig,

    /// Inactivity window after which the sweep removes refresh bookkeeping
    /// for a key. Unset or zero disables the sweep entirely.
    #[serde(with = "humantime_serde")]
    pub max_unused_for: Option<Duration>,

    /// Logging configuration.
    pub logging: Logging,

    /// Metrics configuration.
    pub metrics: Metrics,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: None,
            schedule: None,
            task_enabled: true,
            worker: WorkerConfig::default(),
            max_unused_for: None,
            logging: Logging::default(),
            metrics: Metrics::default(),
        }
    }
}

impl Config {
    pub fn get(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let source = fs::read_to_string(path)
                    .with_context(|| format!("failed to open config file {}", path.display()))?;
                serde_yaml::from_str(&source)
                    .with_context(|| format!("failed to parse config file {}", path.display()))
            }
            None => Ok(Config::default()),
        }
    }
}

fn deserialize_level_filter<'de, D>(deserializer: D) -> Result<LevelFilter, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse().map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_defaults_and_caps() {
        let worker = WorkerConfig::default();
        assert_eq!(worker.effective_pool_size(), 2);
        assert_eq!(worker.effective_queue_size(), 32);

        let worker = WorkerConfig {
            pool_size: 0,
            queue_size: 0,
        };
        assert_eq!(worker.effective_pool_size(), 2);
        assert_eq!(worker.effective_queue_size(), 32);

        let worker = WorkerConfig {
            pool_size: 64,
            queue_size: 5000,
        };
        assert_eq!(worker.effective_pool_size(), 16);
        assert_eq!(worker.effective_queue_size(), 1024);
    }

    #[test]
    fn test_parse_config() {
        let config: Config = serde_yaml::from_str(
            r#"
            project: shop
            schedule: 30s
            max_unused_for: 1d
            worker:
              pool_size: 4
            "#,
        )
        .unwrap();

        assert_eq!(config.project.as_deref(), Some("shop"));
        assert_eq!(config.schedule, Some(Duration::from_secs(30)));
        assert_eq!(config.max_unused_for, Some(Duration::from_secs(86400)));
        assert_eq!(config.worker.effective_pool_size(), 4);
        assert!(config.task_enabled);
    }
}
