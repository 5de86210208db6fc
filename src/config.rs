//! Bridge configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! start_window_ms = 1000
//! score_heartbeat_ms = 2000
//! checkpoint_heartbeat_ms = 2000
//! forward_checkpoints = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default minimum spacing between two `RUN_START` messages.
pub const DEFAULT_START_WINDOW_MS: u64 = 1_000;
/// Default interval after which an unchanged score is re-sent.
pub const DEFAULT_SCORE_HEARTBEAT_MS: u64 = 2_000;

/// Tunables for the rate policy and hook selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// At most one `RUN_START` per this many milliseconds.
    pub start_window_ms: u64,
    /// An unchanged score is suppressed until this many milliseconds pass.
    pub score_heartbeat_ms: u64,
    /// Same as `score_heartbeat_ms`, for `SCORE_TICK`.
    pub checkpoint_heartbeat_ms: u64,
    /// When `false`, `notify_checkpoint` is left unobserved.
    pub forward_checkpoints: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            start_window_ms: DEFAULT_START_WINDOW_MS,
            score_heartbeat_ms: DEFAULT_SCORE_HEARTBEAT_MS,
            checkpoint_heartbeat_ms: DEFAULT_SCORE_HEARTBEAT_MS,
            forward_checkpoints: true,
        }
    }
}

impl BridgeConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_windows() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.start_window_ms, 1_000);
        assert_eq!(cfg.score_heartbeat_ms, 2_000);
        assert_eq!(cfg.checkpoint_heartbeat_ms, 2_000);
        assert!(cfg.forward_checkpoints);
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let cfg = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, BridgeConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_only_given_fields() {
        let cfg = BridgeConfig::from_toml_str("score_heartbeat_ms = 500\n").unwrap();
        assert_eq!(cfg.score_heartbeat_ms, 500);
        assert_eq!(cfg.start_window_ms, DEFAULT_START_WINDOW_MS);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = BridgeConfig::from_toml_str("start_window = 10\n").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_wrong_type_rejected() {
        assert!(BridgeConfig::from_toml_str("start_window_ms = \"soon\"\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "start_window_ms = 250").unwrap();
        writeln!(file, "forward_checkpoints = false").unwrap();
        let cfg = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(cfg.start_window_ms, 250);
        assert!(!cfg.forward_checkpoints);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = BridgeConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let cfg = BridgeConfig { start_window_ms: 10, ..BridgeConfig::default() };
        let text = toml::to_string(&cfg).unwrap();
        assert_eq!(BridgeConfig::from_toml_str(&text).unwrap(), cfg);
    }
}
