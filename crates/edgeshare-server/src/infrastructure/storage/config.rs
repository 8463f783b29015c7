//! TOML-based configuration persistence for the server.
//!
//! The file lives at `$EDGESHARE_CONFIG` when that variable is set, otherwise
//! in the platform config directory:
//! - Linux:    `~/.config/edgeshare/config.toml`
//! - macOS:    `~/Library/Application Support/Edgeshare/config.toml`
//! - Windows:  `%APPDATA%\Edgeshare\config.toml`
//!
//! # File layout (for beginners)
//!
//! ```toml
//! [server]
//! name = "desk"            # the primary screen; must appear in [[screens]]
//! port = 24800
//!
//! [options]
//! heartbeat_ms = 3000
//! switch_delay_ms = 250
//! switch_corners = ["top-left", "top-right"]
//!
//! [[screens]]
//! name = "desk"
//! width = 1920
//! height = 1080
//! right = "laptop"
//!
//! [[screens]]
//! name = "laptop"
//! width = 1280
//! height = 800
//! left = "desk"
//! ```
//!
//! Each `[[screens]]` table is one screen.  `left`, `right`, `top` and
//! `bottom` name the neighbor the cursor reaches by leaving that side.  Links
//! are one-way: to come back, the neighbor needs the opposite link too.
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file, so a file that
//! only lists screens is valid.

use std::path::{Path, PathBuf};

use edgeshare_core::protocol::DEFAULT_PORT;
use edgeshare_core::Corner;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "EDGESHARE_CONFIG";

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
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub options: OptionsConfig,
    #[serde(default)]
    pub screens: Vec<ScreenEntry>,
}

/// Listener and process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Name of the primary screen, i.e. the machine the server runs on.
    #[serde(default = "default_screen_name")]
    pub name: String,
    /// IP address to listen on.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Time a client has to finish the handshake.  `0` disables the limit.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

/// Global switching and session options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionsConfig {
    /// Heartbeat period.  `0` disables heartbeats.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    /// Silent periods before a client is dropped.
    #[serde(default = "default_beats_until_death")]
    pub beats_until_death: u32,
    #[serde(default)]
    pub switch_delay_ms: u64,
    #[serde(default)]
    pub switch_double_tap_ms: u64,
    /// Modifier names that must be held to switch, e.g. `["control"]`.
    #[serde(default)]
    pub switch_modifiers: Vec<String>,
    /// Corners in which switching is refused.
    #[serde(default)]
    pub switch_corners: Vec<Corner>,
    #[serde(default)]
    pub switch_corner_size: i32,
    #[serde(default)]
    pub relative_mouse_moves: bool,
    #[serde(default = "default_true")]
    pub screensaver_sync: bool,
}

/// One screen and its outgoing links.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreenEntry {
    pub name: String,
    #[serde(default = "default_width")]
    pub width: i32,
    #[serde(default = "default_height")]
    pub height: i32,
    #[serde(default = "default_jump_zone")]
    pub jump_zone: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<String>,
    /// Overrides `options.switch_corners` for this screen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_corners: Option<Vec<Corner>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_corner_size: Option<i32>,
}

impl ScreenEntry {
    /// A screen with default size and no links.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            width: default_width(),
            height: default_height(),
            jump_zone: default_jump_zone(),
            left: None,
            right: None,
            top: None,
            bottom: None,
            switch_corners: None,
            switch_corner_size: None,
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_screen_name() -> String {
    "primary".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_handshake_timeout_ms() -> u64 {
    30_000
}
fn default_heartbeat_ms() -> u64 {
    3_000
}
fn default_beats_until_death() -> u32 {
    3
}
fn default_true() -> bool {
    true
}
fn default_width() -> i32 {
    1920
}
fn default_height() -> i32 {
    1080
}
fn default_jump_zone() -> i32 {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        let server = ServerConfig::default();
        let screens = vec![ScreenEntry::new(&server.name)];
        Self {
            server,
            options: OptionsConfig::default(),
            screens,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_screen_name(),
            bind_address: default_bind_address(),
            port: default_port(),
            log_level: default_log_level(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            heartbeat_ms: default_heartbeat_ms(),
            beats_until_death: default_beats_until_death(),
            switch_delay_ms: 0,
            switch_double_tap_ms: 0,
            switch_modifiers: Vec::new(),
            switch_corners: Vec::new(),
            switch_corner_size: 0,
            relative_mouse_moves: false,
            screensaver_sync: default_true(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the config file, honouring [`CONFIG_ENV`].
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if neither the override nor
/// the platform base directory is available.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let dir = platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)?;
    Ok(dir.join("config.toml"))
}

/// Reads and parses the config at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read (including when it
/// does not exist) and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Writes `config` to `path`, creating parent directories as needed.
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

/// Loads the config at `path`, writing [`AppConfig::default()`] there first
/// if the file does not exist yet.
///
/// # Errors
///
/// See [`load_config_from`] and [`save_config_to`].
pub fn load_or_create(path: &Path) -> Result<AppConfig, ConfigError> {
    match load_config_from(path) {
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            let config = AppConfig::default();
            save_config_to(path, &config)?;
            info!(path = %path.display(), "wrote default configuration");
            Ok(config)
        }
        other => other,
    }
}

/// Loads the config from [`config_file_path`], creating it on first run.
///
/// # Errors
///
/// See [`config_file_path`] and [`load_or_create`].
pub fn load_config() -> Result<(PathBuf, AppConfig), ConfigError> {
    let path = config_file_path()?;
    let config = load_or_create(&path)?;
    Ok((path, config))
}

/// Resolves the platform config directory, including the `edgeshare` folder.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Edgeshare"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("edgeshare"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("Edgeshare"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
