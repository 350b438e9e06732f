//! TOML-based settings for vtcap.
//!
//! This crate provides configuration management for interactive execution:
//! - Loading settings from `~/.config/vtcap/settings.toml`
//! - Never/always/pattern command lists consumed by the classifier
//! - Atomic file writes with temp file + rename
//! - Type-safe settings schema with serde defaults
//!
//! # Usage
//!
//! ```rust,ignore
//! use vtcap_settings::ExecutionSettings;
//!
//! let settings = ExecutionSettings::load()?;
//! if settings.interactive.never.iter().any(|c| c == "ls") {
//!     // ...
//! }
//! ```

pub mod loader;
pub mod schema;

pub use loader::{config_dir, settings_path};
pub use schema::{ExecutionSettings, InteractiveSettings};
