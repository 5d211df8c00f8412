use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level relay config, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Local server identity overrides.
    pub server: Option<ServerIdentityConfig>,
    /// Per-workspace webhook signing secret. Absent means verification is
    /// skipped (logged per request).
    pub signing_secret: Option<String>,
    /// Bot credential for authenticated attachment downloads.
    pub bot_token: Option<String>,
    /// Control endpoint of the desktop peer, for GUI-bound work arriving
    /// at a headless host.
    pub peer_control_url: Option<String>,
    /// Where the record stores live. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    /// Force GUI capability on or off; unset means autodetect.
    pub gui: Option<bool>,
    /// External program invoked with an encoded address to focus a window.
    pub activate_command: Option<PathBuf>,
}

/// Server identity section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerIdentityConfig {
    /// Override system hostname.
    pub hostname: Option<String>,
}

impl RelayConfig {
    /// Load config from a TOML file path. Returns None if file doesn't exist.
    ///
    /// Checks file permissions and warns if world-readable.
    pub fn load(path: &std::path::Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        // Warn if the config file is world-readable (holds secrets).
        check_config_permissions(path);

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?;
        Ok(Some(config))
    }

    /// Save config to a TOML file path.
    pub fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let contents =
            toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("focusd")
            .join("config.toml")
    }

    /// Resolve the record store directory.
    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("focusd")
        })
    }

    /// Resolve GUI capability: explicit setting wins, then environment
    /// autodetection.
    pub fn resolve_gui(&self) -> bool {
        self.gui.unwrap_or_else(detect_gui)
    }
}

/// A desktop session is assumed wherever a display server is reachable;
/// macOS always has one.
fn detect_gui() -> bool {
    cfg!(target_os = "macos")
        || std::env::var_os("DISPLAY").is_some()
        || std::env::var_os("WAYLAND_DISPLAY").is_some()
}

/// Errors that can occur when loading or saving config.
#[derive(Debug)]
pub enum ConfigError {
    ReadFailed(std::path::PathBuf, std::io::Error),
    ParseFailed(std::path::PathBuf, toml::de::Error),
    WriteFailed(std::path::PathBuf, std::io::Error),
    SerializeFailed(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed(path, e) => {
                write!(f, "Failed to read config {}: {}", path.display(), e)
            }
            Self::ParseFailed(path, e) => {
                write!(f, "Failed to parse config {}: {}", path.display(), e)
            }
            Self::WriteFailed(path, e) => {
                write!(f, "Failed to write config {}: {}", path.display(), e)
            }
            Self::SerializeFailed(e) => write!(f, "Failed to serialize config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Check file permissions on a config file and warn if world-readable.
///
/// On Unix, checks `st_mode & 0o004` (world-readable bit). If set, logs a
/// warning because the config file holds the signing secret and bot token.
#[cfg(unix)]
pub fn check_config_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return, // File doesn't exist or can't be read; nothing to warn about.
    };

    let mode = metadata.permissions().mode();
    if mode & 0o004 != 0 {
        tracing::warn!(
            "Relay config file {} is world-readable (mode {:o}). \
             It holds secrets -- consider restricting permissions to 600.",
            path.display(),
            mode & 0o7777,
        );
    }
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn check_config_permissions(_path: &std::path::Path) {}

/// Returns true if the given file mode has the world-readable bit set.
///
/// This is a pure helper for testing; it does NOT read the filesystem.
#[cfg(unix)]
pub fn is_world_readable(mode: u32) -> bool {
    mode & 0o004 != 0
}

/// Resolve the server's hostname. Uses config override if present,
/// otherwise falls back to system hostname.
pub fn resolve_hostname(server_config: Option<&ServerIdentityConfig>) -> String {
    if let Some(config) = server_config {
        if let Some(hostname) = &config.hostname {
            return hostname.clone();
        }
    }
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
