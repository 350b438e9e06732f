//! Interactivity classification for vtcap.
//!
//! This crate decides whether a shell command needs a real interactive
//! terminal (a PTY with passthrough I/O) or can run as a plain captured
//! subprocess. The decision is a confidence-ranked cascade:
//!
//! 1. Explicit caller override
//! 2. User configuration (never / always / pattern lists)
//! 3. Learned-command store (previously observed behavior)
//! 4. Hardcoded table of well-known full-screen programs and REPLs
//! 5. Dynamic probe (quick heuristics, then a brief trial spawn under a PTY)
//! 6. Default: non-interactive
//!
//! Every decision records its confidence, a human-readable reason, and which
//! stage produced it, so callers can display or log the rationale.

mod classifier;
mod decision;
mod probe;
mod store;

pub use classifier::{base_command, classify, classify_with_probe, Classifier};
pub use decision::{DecisionMethod, InteractiveDecision};
pub use probe::{InteractiveProbe, PtyProbe};
pub use store::LearnedStore;
