//! Settings schema with serde defaults.
//!
//! Every field has a default so a partial (or absent) settings file still
//! yields a usable configuration.

use serde::{Deserialize, Serialize};

/// Top-level settings for command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Interactivity classification lists.
    #[serde(default)]
    pub interactive: InteractiveSettings,

    /// Whether capturing modes should retain the last drawn frame by default.
    #[serde(default = "default_capture_last_frame")]
    pub capture_last_frame: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        ExecutionSettings {
            interactive: InteractiveSettings::default(),
            capture_last_frame: default_capture_last_frame(),
        }
    }
}

fn default_capture_last_frame() -> bool {
    true
}

/// User-maintained command lists for the interactive classifier.
///
/// `never` is consulted before `always`, so an explicit denial overrides a
/// broader allow pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractiveSettings {
    /// Commands that must never get a PTY (exact match on the command string).
    #[serde(default)]
    pub never: Vec<String>,

    /// Commands that always get a PTY (exact match).
    #[serde(default)]
    pub always: Vec<String>,

    /// Glob-style patterns (`*sub*`, `*suffix`, `prefix*`, or exact) that
    /// force a PTY when matched.
    #[serde(default)]
    pub patterns: Vec<String>,
}

// ============================================================================
// Tests
// ============================================================================
