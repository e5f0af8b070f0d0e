//! Configuration for the load generator.
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Command line flags (see `main.rs`)
//! 2. Environment variables (prefixed with `VL__`)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! Environment variables use double underscores (`__`) to denote nested structures, for
//! example `VL__LIMITS__IODEPTH=64` or `VL__STORAGE__TYPE=memory`.
//!
//! # YAML Configuration File
//!
//! ```yaml
//! duration: 5m
//! report_interval: 1s
//! pool: test
//!
//! storage:
//!   type: filesystem
//!   path: /mnt/under-test
//!
//! limits:
//!   iodepth: 150
//!   max_backlog: 2000
//!   payload_size: 4KiB
//!
//! workloads:
//!   - "cnt=3 amp=500-1000 period=30-60 shift=0-1 supp=1"
//!   - "cnt=1 amp=2000 period=120 supp=0.3 rand=42"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use bytesize::ByteSize;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "VL__";

/// Storage backend configuration.
///
/// The `type` field selects the variant.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Storage {
    /// Writes objects as files below `path`, one directory per pool.
    FileSystem {
        /// Root directory, created if it does not exist.
        path: PathBuf,
    },

    /// Keeps objects in memory, completing every write after a fixed `latency`.
    Memory {
        /// Artificial latency of every write.
        #[serde(with = "humantime_serde", default)]
        latency: Duration,
    },
}

/// Per-workload limits and object settings.
///
/// `iodepth` and `max_backlog` can be overridden per workload with the `iodepth=` and
/// `backlog=` parameters.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of outstanding operations per workload.
    pub iodepth: u64,

    /// Number of due operations a workload may fall behind before excess is skipped.
    pub max_backlog: u64,

    /// Number of distinct objects each workload writes to, in rotation.
    pub object_count: usize,

    /// Name prefix of the written objects.
    pub object_prefix: String,

    /// Size of every written payload.
    pub payload_size: ByteSize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            iodepth: 150,
            max_backlog: 2000,
            object_count: 1000,
            object_prefix: "test_object_".to_owned(),
            payload_size: ByteSize::kib(4),
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line output with colors.
    Pretty,
    /// Compact single-line output.
    #[default]
    Simplified,
}

/// Logging configuration. Logs are always written to stderr.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// `RUST_LOG` takes precedence if set.
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Simplified,
        }
    }
}

/// Main configuration struct.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Total run time, in accelerated time for dry runs.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Accelerate time and skip all backend I/O.
    pub dry_run: bool,

    /// Cadence of the aggregate rate report.
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,

    /// Pool opened on the backend.
    pub pool: String,

    /// Storage backend under test.
    pub storage: Storage,

    /// Default limits for all workloads.
    pub limits: Limits,

    /// Workload parameter strings, one workload each.
    pub workloads: Vec<String>,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(60),
            dry_run: false,
            report_interval: Duration::from_secs(1),
            pool: "test".to_owned(),
            storage: Storage::FileSystem {
                path: PathBuf::from("data"),
            },
            limits: Limits::default(),
            workloads: vec![String::new()],
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
