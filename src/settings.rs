use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};

use crate::collector::DEFAULT_JOIN_EMOJI;
use crate::gate::AccessGate;
use crate::session::Pacing;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub gateway_url: String,
    pub ledger_path: PathBuf,
    pub allowed_user_ids: Vec<String>,
    pub allowed_role_ids: Vec<String>,
    pub round_delay_secs: u64,
    pub reminder_interval_secs: u64,
    pub join_emoji: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway_url: "ws://127.0.0.1:8765/gateway".to_string(),
            ledger_path: PathBuf::from("points.json"),
            allowed_user_ids: Vec::new(),
            allowed_role_ids: Vec::new(),
            round_delay_secs: 6,
            reminder_interval_secs: 30,
            join_emoji: DEFAULT_JOIN_EMOJI.to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .context("Failed to parse settings JSON")?;
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("[Settings] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn gate(&self) -> AccessGate {
        AccessGate::new(
            self.allowed_user_ids.iter().cloned(),
            self.allowed_role_ids.iter().cloned(),
        )
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            round_delay: Duration::from_secs(self.round_delay_secs),
            reminder_every: Duration::from_secs(self.reminder_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;

    #[test]
    fn default_settings_have_reasonable_values() {
        let settings = Settings::default();
        assert_eq!(settings.ledger_path, PathBuf::from("points.json"));
        assert_eq!(settings.round_delay_secs, 6);
        assert_eq!(settings.reminder_interval_secs, 30);
        assert_eq!(settings.join_emoji, DEFAULT_JOIN_EMOJI);
        assert!(settings.allowed_user_ids.is_empty());
    }

    #[test]
    fn load_reads_every_field() {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(err) => panic!("tempdir failed: {err}"),
        };
        let path = dir.path().join("rumble.json");

        let settings = Settings {
            gateway_url: "wss://relay.example.com/gateway".to_string(),
            ledger_path: PathBuf::from("/var/lib/rumble/points.json"),
            allowed_user_ids: vec!["123456789012345678".to_string()],
            allowed_role_ids: vec!["112233445566778899".to_string()],
            round_delay_secs: 3,
            reminder_interval_secs: 15,
            join_emoji: "🥊".to_string(),
        };

        let content = serde_json::to_string_pretty(&settings).unwrap();
        assert!(fs::write(&path, content).is_ok());
        let loaded = Settings::load(&path);
        match loaded {
            Ok(loaded) => assert_eq!(loaded, settings),
            Err(err) => panic!("load failed: {err}"),
        }
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(err) => panic!("tempdir failed: {err}"),
        };
        let path = dir.path().join("rumble.json");
        assert!(fs::write(&path, r#"{ "allowed_role_ids": ["9"] }"#).is_ok());

        let loaded = match Settings::load(&path) {
            Ok(loaded) => loaded,
            Err(err) => panic!("load failed: {err}"),
        };
        assert_eq!(loaded.allowed_role_ids, vec!["9".to_string()]);
        assert_eq!(loaded.round_delay_secs, 6);
    }

    #[test]
    fn load_fails_when_file_missing() {
        let path = PathBuf::from("/tmp/nonexistent_rumble_test/rumble.json");
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let path = PathBuf::from("/tmp/nonexistent_rumble_test/rumble.json");
        match Settings::load_or_default(&path) {
            Ok(settings) => assert_eq!(settings, Settings::default()),
            Err(err) => panic!("load failed: {err}"),
        }
    }

    #[test]
    fn load_fails_when_file_is_invalid_json() {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(err) => panic!("tempdir failed: {err}"),
        };
        let path = dir.path().join("rumble.json");
        assert!(fs::write(&path, "not json").is_ok());

        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn gate_uses_allow_lists() {
        let settings = Settings {
            allowed_user_ids: vec!["U1".to_string()],
            allowed_role_ids: vec!["R9".to_string()],
            ..Settings::default()
        };
        let gate = settings.gate();
        assert!(gate.admits("U1", &HashSet::new()));
        assert!(gate.admits("U2", &HashSet::from(["R9".to_string()])));
        assert!(!gate.admits("U3", &HashSet::new()));
    }
}
