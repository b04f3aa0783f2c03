//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! stream, rollover, output, store, and geometry sections. Every section
//! defaults sensibly so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// File names searched when no explicit config path is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["./vidcat.toml", "./config.toml"];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stream: StreamConfig,
    pub rollover: RolloverConfig,
    pub output: OutputConfig,
    pub store: StoreConfig,
    pub geometry: GeometryConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load and check configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&contents)?;
        config.check()?;
        Ok(config)
    }

    /// Load from `custom_path` if given, else from the first default location
    /// that exists, else return defaults.
    pub fn load_or_default(custom_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = custom_path {
            return Self::load(path);
        }

        for candidate in DEFAULT_CONFIG_PATHS {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load(path);
            }
        }

        tracing::info!("No config file found; using defaults");
        Ok(Self::default())
    }

    /// Fatal problems that make the configuration unusable.
    pub fn check(&self) -> Result<()> {
        self.stream.socket_addr()?;

        if self.stream.max_datagram_size == 0 {
            return Err(Error::Config("stream.max_datagram_size cannot be 0".into()));
        }
        if self.rollover.check_interval_ms == 0 {
            return Err(Error::Config("rollover.check_interval_ms cannot be 0".into()));
        }
        if self.rollover.elapsed_secs.is_none() && self.rollover.megabytes.is_none() {
            return Err(Error::Config(
                "rollover needs at least one of elapsed_secs or megabytes".into(),
            ));
        }
        if self.output.filename_template.trim().is_empty() {
            return Err(Error::Config("output.filename_template is empty".into()));
        }
        if let Some(tolerance) = self.geometry.simplify_tolerance {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(Error::Config(format!(
                    "geometry.simplify_tolerance must be a non-negative number, got {tolerance}"
                )));
            }
        }
        Ok(())
    }

    /// Non-fatal issues worth logging at startup.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.stream.title.trim().is_empty() {
            warnings.push("stream.title is empty; records will have a blank title".into());
        }
        if self.rollover.elapsed_secs == Some(0) {
            warnings.push("rollover.elapsed_secs is 0; every check with data will roll over".into());
        }
        if self.rollover.megabytes == Some(0) {
            warnings.push("rollover.megabytes is 0; every check with data will roll over".into());
        }
        if !self.output.filename_template.contains("%{") {
            warnings.push(
                "output.filename_template has no placeholders; segments after the first get a numeric suffix"
                    .into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Identity and transport of the monitored stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// `udp://host:port` the ingestor binds to.
    pub uri: String,
    pub title: String,
    pub max_datagram_size: usize,
}

impl StreamConfig {
    /// Socket address parsed from [`StreamConfig::uri`].
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let rest = self.uri.strip_prefix("udp://").ok_or_else(|| {
            Error::Config(format!("stream.uri must start with udp://, got {}", self.uri))
        })?;
        rest.trim_end_matches('/')
            .parse()
            .map_err(|e| Error::Config(format!("stream.uri {} is not host:port: {e}", self.uri)))
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            uri: "udp://127.0.0.1:50000".into(),
            title: "mpegts-stream".into(),
            max_datagram_size: 65_536,
        }
    }
}

/// When a segment is closed.
///
/// Thresholds combine with OR: the first one reached triggers the rollover.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloverConfig {
    pub elapsed_secs: Option<u64>,
    pub megabytes: Option<u64>,
    pub check_interval_ms: u64,
}

impl RolloverConfig {
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed_secs.map(Duration::from_secs)
    }

    pub fn byte_threshold(&self) -> Option<u64> {
        self.megabytes.map(|mb| mb.saturating_mul(1024 * 1024))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self {
            elapsed_secs: Some(60),
            megabytes: Some(10),
            check_interval_ms: 1000,
        }
    }
}

/// Where and how segment files are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub segment_dir: PathBuf,
    pub filename_template: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            segment_dir: PathBuf::from("./segments"),
            filename_template: "mpegts-stream-%{date=%Y-%m-%d_%H-%M-%S}-%{count}".into(),
        }
    }
}

/// Local record store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub record_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            record_dir: PathBuf::from("./records"),
        }
    }
}

/// Footprint post-processing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Visvalingam-Whyatt tolerance applied after envelope simplification.
    pub simplify_tolerance: Option<f64>,
}
