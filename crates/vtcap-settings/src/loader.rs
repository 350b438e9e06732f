//! Settings file loading and atomic persistence.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::schema::ExecutionSettings;

/// The per-user vtcap configuration directory, e.g. `~/.config/vtcap`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vtcap"))
}

/// Path to the settings file inside [`config_dir`].
pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("settings.toml"))
}

impl ExecutionSettings {
    /// Load settings from the default location.
    ///
    /// A missing file yields defaults; malformed TOML is an error.
    pub fn load() -> Result<Self> {
        match settings_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::warn!("no config directory available, using default settings");
                Ok(Self::default())
            }
        }
    }

    /// Load settings from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file absent, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse settings from {}", path.display()))
    }

    /// Save settings to an explicit path with an atomic temp + rename write.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize settings")?;
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, contents)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to rename {} into place", tmp.display()))?;
        tracing::debug!(path = %path.display(), "settings saved");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ExecutionSettings;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ExecutionSettings::load_from(&dir.path().join("nope.toml")).unwrap();
        assert!(settings.interactive.never.is_empty());
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "not [valid").unwrap();
        assert!(ExecutionSettings::load_from(&path).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("settings.toml");
        let mut settings = ExecutionSettings::default();
        settings.interactive.always.push("htop".to_string());
        settings.save_to(&path).unwrap();
        let back = ExecutionSettings::load_from(&path).unwrap();
        assert_eq!(back.interactive.always, vec!["htop"]);
        // No temp file left behind.
        assert!(!path.with_extension("toml.tmp").exists());
    }
}
