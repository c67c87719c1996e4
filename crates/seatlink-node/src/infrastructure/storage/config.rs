//! TOML-based configuration for a SeatLink node.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\SeatLink\config.toml`
//! - Linux:    `~/.config/seatlink/config.toml`
//! - macOS:    `~/Library/Application Support/SeatLink/config.toml`
//!
//! or to an explicit path given on the command line.
//!
//! ```toml
//! [node]
//! name = "cabin-left"
//! debug_bypass = false
//! initial_session = -1
//!
//! [listener]
//! port = 24900
//!
//! [peer]
//! address = "192.168.1.21"
//! port = 24900
//!
//! [seat]
//! intensity = 0.8
//! reactivity = "NORMAL"
//! ```
//!
//! Every field has a `#[serde(default = "…")]` helper, so a missing file, a
//! missing section, or a missing key all fall back to working values.  The
//! loaded config is converted once into the typed settings each component
//! takes at construction ([`LinkConfig`], [`SettleTimings`],
//! [`StaticSeatConfig`]).

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use seatlink_core::{Reactivity, Session};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::seat_lifecycle::{SettleTimings, StaticSeatConfig};
use crate::application::session_coordinator::CoordinatorConfig;
use crate::infrastructure::network::{ClientConfig, ListenerConfig};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A configured address is not a valid IP address.
    #[error("invalid {field} address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    /// A polling interval is zero.
    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level node configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub listener: ListenerSection,
    #[serde(default)]
    pub peer: PeerSection,
    #[serde(default)]
    pub lifecycle: LifecycleSection,
    #[serde(default)]
    pub seat: SeatSection,
}

/// General node behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSection {
    /// Name shown in logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Keep going through lifecycle steps that return a non-zero code.
    #[serde(default)]
    pub debug_bypass: bool,
    /// Session index applied at startup (`-1` local, `0` remote).
    #[serde(default = "default_initial_session")]
    pub initial_session: i32,
}

/// Where this node accepts its peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListenerSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_listener_watchdog_ms")]
    pub watchdog_interval_ms: u64,
}

/// How this node reaches its peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerSection {
    #[serde(default = "default_peer_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_client_watchdog_ms")]
    pub watchdog_interval_ms: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    /// Upper bound on waiting for the peer when switching to the remote session.
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
    /// Upper bound on waiting for a single line (DATA replies, inbound reads).
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Settle delays, in milliseconds, observed after each lifecycle step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecycleSection {
    #[serde(default = "default_settle_ms")]
    pub initialize: u64,
    #[serde(default = "default_settle_ms")]
    pub open: u64,
    #[serde(default = "default_apply_config_ms")]
    pub apply_config: u64,
    #[serde(default = "default_settle_ms")]
    pub start: u64,
    #[serde(default = "default_settle_ms")]
    pub stop: u64,
    #[serde(default = "default_settle_ms")]
    pub close: u64,
    #[serde(default = "default_settle_ms")]
    pub terminate: u64,
    #[serde(default = "default_motion_disable_ms")]
    pub motion_disable: u64,
    #[serde(default = "default_settle_ms")]
    pub targets_zero: u64,
}

/// Static seat configuration applied during bring-up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatSection {
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default)]
    pub reactivity: Reactivity,
    #[serde(default = "default_max_angle_deg")]
    pub max_pitch_deg: f32,
    #[serde(default = "default_max_angle_deg")]
    pub max_roll_deg: f32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_name() -> String {
    "seatlink".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_initial_session() -> i32 {
    Session::LOCAL_INDEX
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_peer_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    24900
}
fn default_listener_watchdog_ms() -> u64 {
    100
}
fn default_retry_interval_ms() -> u64 {
    200
}
fn default_client_watchdog_ms() -> u64 {
    1000
}
fn default_reconnect_delay_ms() -> u64 {
    3000
}
fn default_true() -> bool {
    true
}
fn default_join_timeout_ms() -> u64 {
    10_000
}
fn default_read_timeout_ms() -> u64 {
    1000
}
fn default_settle_ms() -> u64 {
    1000
}
fn default_apply_config_ms() -> u64 {
    200
}
fn default_motion_disable_ms() -> u64 {
    500
}
fn default_intensity() -> f32 {
    1.0
}
fn default_max_angle_deg() -> f32 {
    15.0
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            debug_bypass: false,
            initial_session: default_initial_session(),
        }
    }
}

impl Default for ListenerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            watchdog_interval_ms: default_listener_watchdog_ms(),
        }
    }
}

impl Default for PeerSection {
    fn default() -> Self {
        Self {
            address: default_peer_address(),
            port: default_port(),
            retry_interval_ms: default_retry_interval_ms(),
            watchdog_interval_ms: default_client_watchdog_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            auto_reconnect: default_true(),
            join_timeout_ms: default_join_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for LifecycleSection {
    fn default() -> Self {
        Self {
            initialize: default_settle_ms(),
            open: default_settle_ms(),
            apply_config: default_apply_config_ms(),
            start: default_settle_ms(),
            stop: default_settle_ms(),
            close: default_settle_ms(),
            terminate: default_settle_ms(),
            motion_disable: default_motion_disable_ms(),
            targets_zero: default_settle_ms(),
        }
    }
}

impl Default for SeatSection {
    fn default() -> Self {
        Self {
            intensity: default_intensity(),
            reactivity: Reactivity::default(),
            max_pitch_deg: default_max_angle_deg(),
            max_roll_deg: default_max_angle_deg(),
        }
    }
}

// ── Conversion into component settings ────────────────────────────────────────

/// Everything needed to build the two endpoints and the coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    pub listener: ListenerConfig,
    pub client: ClientConfig,
    pub coordinator: CoordinatorConfig,
}

fn nonzero_ms(field: &'static str, millis: u64) -> Result<Duration, ConfigError> {
    if millis == 0 {
        return Err(ConfigError::ZeroInterval { field });
    }
    Ok(Duration::from_millis(millis))
}

fn parse_ip(field: &'static str, value: &str) -> Result<IpAddr, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

impl AppConfig {
    /// Resolves the listener, client and coordinator settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if either address is not an IP
    /// and [`ConfigError::ZeroInterval`] if a watchdog or retry interval is 0.
    pub fn link_config(&self) -> Result<LinkConfig, ConfigError> {
        let bind_ip = parse_ip("listener.bind_address", &self.listener.bind_address)?;
        let peer_ip = parse_ip("peer.address", &self.peer.address)?;
        let peer = &self.peer;

        Ok(LinkConfig {
            listener: ListenerConfig {
                bind_addr: SocketAddr::new(bind_ip, self.listener.port),
                watchdog_interval: nonzero_ms(
                    "listener.watchdog_interval_ms",
                    self.listener.watchdog_interval_ms,
                )?,
            },
            client: ClientConfig {
                remote_addr: SocketAddr::new(peer_ip, peer.port),
                retry_interval: nonzero_ms("peer.retry_interval_ms", peer.retry_interval_ms)?,
                watchdog_interval: nonzero_ms(
                    "peer.watchdog_interval_ms",
                    peer.watchdog_interval_ms,
                )?,
                reconnect_delay: Duration::from_millis(peer.reconnect_delay_ms),
                auto_reconnect: peer.auto_reconnect,
            },
            coordinator: CoordinatorConfig {
                join_timeout: Duration::from_millis(peer.join_timeout_ms),
                read_timeout: Duration::from_millis(peer.read_timeout_ms),
            },
        })
    }

    pub fn settle_timings(&self) -> SettleTimings {
        let ms = Duration::from_millis;
        let l = &self.lifecycle;
        SettleTimings {
            initialize: ms(l.initialize),
            open: ms(l.open),
            apply_config: ms(l.apply_config),
            start: ms(l.start),
            stop: ms(l.stop),
            close: ms(l.close),
            terminate: ms(l.terminate),
            motion_disable: ms(l.motion_disable),
            targets_zero: ms(l.targets_zero),
        }
    }

    pub fn static_seat_config(&self) -> StaticSeatConfig {
        StaticSeatConfig {
            intensity: self.seat.intensity,
            reactivity: self.seat.reactivity,
            max_pitch_deg: self.seat.max_pitch_deg,
            max_roll_deg: self.seat.max_roll_deg,
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Loads `AppConfig` from the platform config file.
///
/// # Errors
///
/// See [`load_config_from`] and [`config_file_path`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the `SeatLink` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("SeatLink"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("seatlink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("SeatLink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_config_path() -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("seatlink_test_{}", Uuid::new_v4()));
        let path = dir.join("nested").join("config.toml");
        (dir, path)
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_uses_documented_timings() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.listener.watchdog_interval_ms, 100);
        assert_eq!(cfg.peer.retry_interval_ms, 200);
        assert_eq!(cfg.peer.watchdog_interval_ms, 1000);
        assert_eq!(cfg.peer.reconnect_delay_ms, 3000);
        assert!(cfg.peer.auto_reconnect);
        assert_eq!(cfg.lifecycle.apply_config, 200);
        assert_eq!(cfg.lifecycle.motion_disable, 500);
    }

    #[test]
    fn test_default_settle_timings_match_lifecycle_defaults() {
        assert_eq!(AppConfig::default().settle_timings(), SettleTimings::default());
    }

    #[test]
    fn test_default_node_starts_local() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.node.initial_session, Session::LOCAL_INDEX);
        assert!(!cfg.node.debug_bypass);
        assert_eq!(cfg.node.log_level, "info");
    }

    // ── TOML parsing ─────────────────────────────────────────────────────────

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_sections_override_only_given_keys() {
        // Arrange
        let toml_str = r#"
[peer]
address = "10.0.0.7"
reconnect_delay_ms = 500

[seat]
reactivity = "HIGH"
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.peer.address, "10.0.0.7");
        assert_eq!(cfg.peer.reconnect_delay_ms, 500);
        assert_eq!(cfg.peer.retry_interval_ms, 200);
        assert_eq!(cfg.seat.reactivity, Reactivity::High);
        assert_eq!(cfg.seat.intensity, 1.0);
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let result: Result<AppConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    // ── Conversion ───────────────────────────────────────────────────────────

    #[test]
    fn test_link_config_resolves_addresses_and_durations() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.listener.port = 25000;
        cfg.peer.address = "192.168.1.21".to_string();
        cfg.peer.join_timeout_ms = 2500;

        // Act
        let link = cfg.link_config().expect("valid addresses");

        // Assert
        assert_eq!(link.listener.bind_addr, "0.0.0.0:25000".parse().unwrap());
        assert_eq!(link.listener.watchdog_interval, Duration::from_millis(100));
        assert_eq!(link.client.remote_addr, "192.168.1.21:24900".parse().unwrap());
        assert_eq!(link.client.reconnect_delay, Duration::from_secs(3));
        assert_eq!(link.coordinator.join_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_link_config_rejects_hostname() {
        let mut cfg = AppConfig::default();
        cfg.peer.address = "cabin-right.local".to_string();

        let result = cfg.link_config();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidAddress {
                field: "peer.address",
                ..
            })
        ));
    }

    #[test]
    fn test_link_config_rejects_zero_watchdog_interval() {
        // Arrange
        let toml_str = r#"
[listener]
watchdog_interval_ms = 0
"#;
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize");

        // Act
        let result = cfg.link_config();

        // Assert
        assert!(matches!(
            result,
            Err(ConfigError::ZeroInterval {
                field: "listener.watchdog_interval_ms"
            })
        ));
    }

    #[test]
    fn test_link_config_rejects_zero_peer_intervals() {
        let mut cfg = AppConfig::default();
        cfg.peer.watchdog_interval_ms = 0;
        assert!(matches!(
            cfg.link_config(),
            Err(ConfigError::ZeroInterval {
                field: "peer.watchdog_interval_ms"
            })
        ));

        let mut cfg = AppConfig::default();
        cfg.peer.retry_interval_ms = 0;
        assert!(matches!(
            cfg.link_config(),
            Err(ConfigError::ZeroInterval {
                field: "peer.retry_interval_ms"
            })
        ));
    }

    #[test]
    fn test_static_seat_config_copies_seat_section() {
        let mut cfg = AppConfig::default();
        cfg.seat.intensity = 0.6;
        cfg.seat.max_roll_deg = 9.0;

        let seat = cfg.static_seat_config();

        assert_eq!(seat.intensity, 0.6);
        assert_eq!(seat.max_roll_deg, 9.0);
        assert_eq!(seat.reactivity, Reactivity::Secure);
    }

    // ── File repository ──────────────────────────────────────────────────────

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let (dir, path) = temp_config_path();

        let cfg = load_config_from(&path).expect("missing file is not an error");

        assert_eq!(cfg, AppConfig::default());
        assert!(!dir.exists());
    }

    #[test]
    fn test_save_then_load_config_via_temp_dir() {
        // Arrange
        let (dir, path) = temp_config_path();
        let mut cfg = AppConfig::default();
        cfg.node.name = "cabin-left".to_string();
        cfg.node.debug_bypass = true;
        cfg.listener.port = 12345;

        // Act
        save_config_to(&path, &cfg).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_from_malformed_file_returns_parse_error() {
        let (dir, path) = temp_config_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[node\nname = 1").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("config.toml"),
                "config file must be named config.toml, got {path:?}"
            );
        }
        // NoPlatformConfigDir in a stripped CI environment is also acceptable.
    }
}
