//! Configuration loading and typed config structures for Buswatch.
//!
//! The canonical configuration lives in `buswatch-config.yaml` at the
//! project root. Both binaries read the same file: the server uses the
//! `server` section, the simulator the `simulator` section, and both the
//! `logging` section. Every field has a default, so a missing file or an
//! empty document is a valid configuration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

/// Environment variable naming an alternative config file path.
pub const CONFIG_PATH_ENV: &str = "BUSWATCH_CONFIG";

/// Config file name looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "buswatch-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range or an override is malformed.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `buswatch-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BuswatchConfig {
    /// Ingest and viewer endpoints.
    #[serde(default)]
    pub server: ServerConfig,

    /// Simulated fleet.
    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BuswatchConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values afterwards:
    /// - `BUSWATCH_HOST` overrides `server.host`
    /// - `BUSWATCH_INGEST_PORT` overrides `server.ingest_port`
    /// - `BUSWATCH_VIEWER_PORT` overrides `server.viewer_port`
    /// - `BUSWATCH_SERVER_URL` overrides `simulator.server_url`
    /// - `BUSWATCH_ROUTES_DIR` overrides `simulator.routes_dir`
    /// - `BUSWATCH_EMULATOR_ID` overrides `simulator.emulator_id`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if an override cannot be parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from `$BUSWATCH_CONFIG`, else `buswatch-config.yaml` in the
    /// working directory, else defaults.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_file`] when a file is found.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        let path = Path::new(&path);
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Self::parse("")
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("BUSWATCH_HOST") {
            self.server.host = val;
        }
        if let Some(port) = env_parsed::<u16>("BUSWATCH_INGEST_PORT")? {
            self.server.ingest_port = port;
        }
        if let Some(port) = env_parsed::<u16>("BUSWATCH_VIEWER_PORT")? {
            self.server.viewer_port = port;
        }
        if let Ok(val) = std::env::var("BUSWATCH_SERVER_URL") {
            self.simulator.server_url = val;
        }
        if let Ok(val) = std::env::var("BUSWATCH_ROUTES_DIR") {
            self.simulator.routes_dir = val;
        }
        if let Ok(val) = std::env::var("BUSWATCH_EMULATOR_ID") {
            self.simulator.emulator_id = val;
        }
        Ok(())
    }
}

/// Read and parse an optional environment variable.
fn env_parsed<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::Invalid(format!("{name}={raw}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Ingest and viewer endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Address both listeners bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port vehicles connect to.
    #[serde(default = "default_ingest_port")]
    pub ingest_port: u16,

    /// Port viewers connect to.
    #[serde(default = "default_viewer_port")]
    pub viewer_port: u16,

    /// Milliseconds between two snapshots sent to the same viewer.
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,
}

impl ServerConfig {
    /// The broadcast period as a [`Duration`].
    pub const fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            ingest_port: default_ingest_port(),
            viewer_port: default_viewer_port(),
            broadcast_interval_ms: default_broadcast_interval_ms(),
        }
    }
}

/// How simulated buses are spread over the outbound connection pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    /// Each bus picks a connection uniformly at random, once.
    #[default]
    Random,
    /// Buses take connections in turn.
    RoundRobin,
}

/// Simulated fleet configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulatorConfig {
    /// Ingest endpoint URL, e.g. `ws://127.0.0.1:8080`.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Directory of `*.json` route files.
    #[serde(default = "default_routes_dir")]
    pub routes_dir: String,

    /// Use only the first N routes (by file name). `None` means all.
    #[serde(default)]
    pub routes_number: Option<usize>,

    /// Buses launched on every route.
    #[serde(default = "default_buses_per_route")]
    pub buses_per_route: usize,

    /// Size of the outbound connection pool.
    #[serde(default = "default_websockets_number")]
    pub websockets_number: usize,

    /// Capacity of each connection's send queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Maximum buses driving at the same time.
    #[serde(default = "default_max_active_buses")]
    pub max_active_buses: usize,

    /// Milliseconds between two reports of the same bus.
    #[serde(default = "default_refresh_timeout_ms")]
    pub refresh_timeout_ms: u64,

    /// Prefix prepended to every generated bus id.
    #[serde(default)]
    pub emulator_id: String,

    /// Connection assignment policy.
    #[serde(default)]
    pub assignment: AssignmentKind,
}

impl SimulatorConfig {
    /// Delay between two reports of the same bus.
    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Reject values the fleet cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("websockets_number", self.websockets_number),
            ("queue_capacity", self.queue_capacity),
            ("max_active_buses", self.max_active_buses),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "simulator.{field} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            routes_dir: default_routes_dir(),
            routes_number: None,
            buses_per_route: default_buses_per_route(),
            websockets_number: default_websockets_number(),
            queue_capacity: default_queue_capacity(),
            max_active_buses: default_max_active_buses(),
            refresh_timeout_ms: default_refresh_timeout_ms(),
            emulator_id: String::new(),
            assignment: AssignmentKind::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// When false, no log output is produced at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG` is
    /// unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl LoggingConfig {
    /// The `EnvFilter` directive this configuration asks for.
    pub fn filter_directive(&self) -> &str {
        if self.enabled { &self.level } else { "off" }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_ingest_port() -> u16 {
    8080
}

const fn default_viewer_port() -> u16 {
    8000
}

const fn default_broadcast_interval_ms() -> u64 {
    1_000
}

fn default_server_url() -> String {
    "ws://127.0.0.1:8080".to_owned()
}

fn default_routes_dir() -> String {
    "routes".to_owned()
}

const fn default_buses_per_route() -> usize {
    2
}

const fn default_websockets_number() -> usize {
    5
}

const fn default_queue_capacity() -> usize {
    100
}

const fn default_max_active_buses() -> usize {
    200
}

const fn default_refresh_timeout_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BuswatchConfig::default();
        assert_eq!(config.server.ingest_port, 8080);
        assert_eq!(config.server.viewer_port, 8000);
        assert_eq!(config.server.broadcast_interval(), Duration::from_secs(1));
        assert_eq!(config.simulator.websockets_number, 5);
        assert_eq!(config.simulator.assignment, AssignmentKind::Random);
        assert!(config.simulator.validate().is_ok());
        assert!(config.logging.enabled);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "0.0.0.0"
  ingest_port: 9080
  viewer_port: 9000
  broadcast_interval_ms: 500

simulator:
  server_url: "ws://bus-host:9080"
  routes_dir: "data/routes"
  routes_number: 12
  buses_per_route: 4
  websockets_number: 3
  queue_capacity: 16
  max_active_buses: 50
  refresh_timeout_ms: 250
  emulator_id: "emu1-"
  assignment: round_robin

logging:
  enabled: false
  level: "debug"
"#;

        let config = BuswatchConfig::parse(yaml);
        assert!(config.is_ok(), "{config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.server.viewer_port, 9000);
        assert_eq!(config.server.broadcast_interval(), Duration::from_millis(500));
        assert_eq!(config.simulator.routes_number, Some(12));
        assert_eq!(config.simulator.queue_capacity, 16);
        assert_eq!(config.simulator.refresh_timeout(), Duration::from_millis(250));
        assert_eq!(config.simulator.assignment, AssignmentKind::RoundRobin);
        assert_eq!(config.logging.filter_directive(), "off");
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "simulator:\n  buses_per_route: 7\n";
        let config = BuswatchConfig::parse(yaml).ok().unwrap_or_default();

        assert_eq!(config.simulator.buses_per_route, 7);
        assert_eq!(config.simulator.queue_capacity, 100);
        assert_eq!(config.logging.filter_directive(), "info");
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(BuswatchConfig::parse("").is_ok());
    }

    #[test]
    fn unknown_assignment_is_rejected() {
        let yaml = "simulator:\n  assignment: sticky\n";
        assert!(matches!(
            BuswatchConfig::parse(yaml),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn zero_pool_size_is_invalid() {
        let config = SimulatorConfig {
            websockets_number: 0,
            ..SimulatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join(DEFAULT_CONFIG_PATH);
        if path.exists() {
            let config = BuswatchConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
