use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::categorize::ConsensusPolicy;
use crate::models::CategoryRule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) import_undo_window_minutes: i64,
    pub(crate) import_history_max_entries: usize,
    pub(crate) import_history_max_age_days: i64,
    pub(crate) staged_auto_expire_days: i64,
    pub(crate) stream_auto_line_threshold: usize,
    pub(crate) stream_auto_byte_threshold: usize,
    pub(crate) stream_chunk_bytes: usize,
    pub(crate) duplicate_error_cap: usize,
    pub(crate) duplicate_sample_size: usize,
    pub(crate) consensus_min_labeled: usize,
    pub(crate) consensus_min_share: f64,
    pub(crate) apply_batch_months: usize,
    pub(crate) rules: Vec<CategoryRule>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            import_undo_window_minutes: 30,
            import_history_max_entries: 200,
            import_history_max_age_days: 365,
            staged_auto_expire_days: 14,
            stream_auto_line_threshold: 5_000,
            stream_auto_byte_threshold: 512 * 1024,
            stream_chunk_bytes: 64 * 1024,
            duplicate_error_cap: 200,
            duplicate_sample_size: 25,
            consensus_min_labeled: 1,
            consensus_min_share: 0.5,
            apply_batch_months: 3,
            rules: Vec::new(),
        }
    }
}

impl Settings {
    pub(crate) fn consensus_policy(&self) -> ConsensusPolicy {
        ConsensusPolicy {
            min_labeled: self.consensus_min_labeled,
            min_share: self.consensus_min_share,
        }
    }
}

pub(crate) fn settings_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "stagebook", "Stagebook")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(proj_dirs.config_dir().join("settings.json"))
}

/// Load settings from `path`. A missing file means defaults; a file that
/// exists but does not parse is an error.
pub(crate) fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Reading settings file: {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing settings JSON in {}", path.display()))?;
    Ok(settings)
}

pub(crate) fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Creating config dir: {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, format!("{json}\n"))
        .with_context(|| format!("Writing settings file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::models::RuleKind;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.import_undo_window_minutes, 30);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"import_undo_window_minutes": 5,
                "rules": [{"pattern": "^acme", "category": "Income", "kind": "regex"}]}"#,
        )
        .unwrap();
        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.import_undo_window_minutes, 5);
        assert_eq!(settings.staged_auto_expire_days, 14);
        assert_eq!(settings.rules.len(), 1);
        assert_eq!(settings.rules[0].kind, RuleKind::Regex);
        assert_eq!(settings.rules[0].priority, 0);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_settings(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Parsing settings JSON"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            staged_auto_expire_days: 3,
            ..Settings::default()
        };
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }
}
