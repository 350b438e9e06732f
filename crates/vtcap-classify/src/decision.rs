//! The classification result type.

use std::fmt;

/// Which stage of the cascade produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionMethod {
    /// Explicit caller override.
    Flag,
    /// User configuration list or pattern.
    Config,
    /// Learned-command store.
    Learned,
    /// Hardcoded table of known programs.
    Hardcoded,
    /// Dynamic probe (heuristics or trial spawn).
    Probe,
    /// Nothing matched; the conservative default.
    Default,
}

impl fmt::Display for DecisionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecisionMethod::Flag => "flag",
            DecisionMethod::Config => "config",
            DecisionMethod::Learned => "learned",
            DecisionMethod::Hardcoded => "hardcoded",
            DecisionMethod::Probe => "probe",
            DecisionMethod::Default => "default",
        };
        f.write_str(name)
    }
}

/// An interactivity decision. Produced fresh per classification call and
/// immutable once returned.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveDecision {
    pub is_interactive: bool,
    /// How sure the producing stage is, in `0.0..=1.0`.
    pub confidence: f64,
    pub reason: String,
    pub method: DecisionMethod,
}

impl InteractiveDecision {
    pub fn new(
        is_interactive: bool,
        confidence: f64,
        reason: impl Into<String>,
        method: DecisionMethod,
    ) -> Self {
        InteractiveDecision {
            is_interactive,
            confidence,
            reason: reason.into(),
            method,
        }
    }
}
