//! Default paths for regrouper components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/regrouper/config.yaml` or `~/.config/regrouper/config.yaml`
//! - Audit log: `$XDG_STATE_HOME/regrouper/moves.csv` or `~/.local/state/regrouper/moves.csv`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const REGROUPER_CONFIG_ENV: &str = "REGROUPER_CONFIG";

/// Application subdirectory name
const APP_DIR: &str = "regrouper";

const CONFIG_FILENAME: &str = "config.yaml";

const AUDIT_FILENAME: &str = "moves.csv";

/// Get the default configuration file path.
///
/// Order of precedence:
/// 1. `$XDG_CONFIG_HOME/regrouper/config.yaml` (if XDG_CONFIG_HOME is set)
/// 2. `~/.config/regrouper/config.yaml`
/// 3. `/etc/regrouper/config.yaml` (no home directory)
///
/// `$REGROUPER_CONFIG` is handled by the CLI layer.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default state directory (where the audit log lives).
///
/// Order of precedence:
/// 1. `$XDG_STATE_HOME/regrouper` (if XDG_STATE_HOME is set)
/// 2. `~/.local/state/regrouper` (fallback)
pub fn default_state_dir() -> PathBuf {
    if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(state_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR)
}

/// Default audit log path inside the state directory
pub fn default_audit_log_path() -> PathBuf {
    default_state_dir().join(AUDIT_FILENAME)
}
