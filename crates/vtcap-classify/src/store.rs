//! Persisted learned-command store.
//!
//! A newline-delimited `name:bool` file in the per-user configuration
//! directory, fully rewritten on each update. Entries are only written after
//! an execution confirmed the observed behavior, so they load at confidence
//! 1.0; the read side still applies the documented >= 0.9 trust threshold.
//!
//! All I/O failures here are non-fatal: classification proceeds without the
//! store, and failed writes are logged and dropped.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Confidence assigned to every loaded entry (see module docs).
pub(crate) const STORED_CONFIDENCE: f64 = 1.0;

const STORE_FILE: &str = "learned_commands";

/// In-memory view of the learned-command file.
#[derive(Debug, Default)]
pub struct LearnedStore {
    path: Option<PathBuf>,
    entries: HashMap<String, bool>,
}

impl LearnedStore {
    /// Load from the default per-user location. Missing or unreadable files
    /// yield an empty store.
    pub fn load() -> Self {
        match vtcap_settings::config_dir() {
            Some(dir) => Self::load_from(dir.join(STORE_FILE)),
            None => {
                tracing::debug!("no config directory, learned store disabled");
                LearnedStore::default()
            }
        }
    }

    /// Load from an explicit path.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut entries = HashMap::new();
        match fs::read_to_string(&path) {
            Ok(contents) => {
                for line in contents.lines() {
                    match parse_line(line) {
                        Some((name, value)) => {
                            entries.insert(name.to_string(), value);
                        }
                        None if line.trim().is_empty() => {}
                        None => {
                            tracing::debug!(line, "skipping malformed learned-store line");
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read learned store");
            }
        }
        LearnedStore {
            path: Some(path),
            entries,
        }
    }

    /// An in-memory store that never persists. Used by tests.
    pub fn ephemeral() -> Self {
        LearnedStore::default()
    }

    /// Look up the stored interactivity for a base command name, together
    /// with the confidence it is trusted at.
    pub fn get(&self, base_command: &str) -> Option<(bool, f64)> {
        self.entries
            .get(base_command)
            .map(|&v| (v, STORED_CONFIDENCE))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record an observed outcome, overwriting any prior entry, and rewrite
    /// the backing file. Write failures are logged and swallowed.
    pub fn record(&mut self, base_command: &str, was_interactive: bool) {
        self.entries
            .insert(base_command.to_string(), was_interactive);
        tracing::debug!(
            command = base_command,
            interactive = was_interactive,
            "learned command behavior"
        );
        if let Some(path) = self.path.clone() {
            if let Err(e) = self.save(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to save learned store");
            }
        }
    }

    fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut lines: Vec<String> = self
            .entries
            .iter()
            .map(|(name, value)| format!("{name}:{value}"))
            .collect();
        lines.sort();
        let mut contents = lines.join("\n");
        contents.push('\n');
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)
    }
}

fn parse_line(line: &str) -> Option<(&str, bool)> {
    let (name, value) = line.trim().rsplit_once(':')?;
    if name.is_empty() {
        return None;
    }
    match value {
        "true" => Some((name, true)),
        "false" => Some((name, false)),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
