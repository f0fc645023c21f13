use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_FF_SPEED_MS: u64 = 300;

/// Replay settings that survive restarts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayPrefs {
    pub ff_speed_ms: u64,
    pub obfuscate: bool,
}

impl Default for ReplayPrefs {
    fn default() -> Self {
        Self {
            ff_speed_ms: DEFAULT_FF_SPEED_MS,
            obfuscate: true,
        }
    }
}

impl ReplayPrefs {
    /// `<config dir>/candle-replay/prefs.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("candle-replay").join("prefs.json"))
    }

    /// Parse stored prefs; each missing, zero or malformed field falls back to its default.
    pub fn from_json(json: &str) -> Self {
        let defaults = Self::default();
        let value: serde_json::Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Ignoring unreadable replay prefs: {}", e);
                return defaults;
            }
        };

        Self {
            ff_speed_ms: value
                .get("ff_speed_ms")
                .and_then(|v| v.as_u64())
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.ff_speed_ms),
            obfuscate: value
                .get("obfuscate")
                .and_then(|v| v.as_bool())
                .unwrap_or(defaults.obfuscate),
        }
    }

    /// Defaults when the file does not exist or cannot be read.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to read {}: {}", path.display(), e);
                }
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Zero is treated as unset.
    pub fn set_ff_speed_ms(&mut self, ms: u64) {
        self.ff_speed_ms = if ms == 0 { DEFAULT_FF_SPEED_MS } else { ms };
    }

    pub fn ff_speed(&self) -> Duration {
        Duration::from_millis(self.ff_speed_ms)
    }
}
