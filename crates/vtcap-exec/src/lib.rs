//! PTY-backed process execution for vtcap.
//!
//! This crate spawns commands under a pseudo-terminal and relays I/O, with
//! three modes layered over one spawn/relay/cleanup routine:
//! - Passthrough: raw local terminal, resize propagation, bidirectional relay
//! - Passthrough with capture: same, plus every output chunk feeds the
//!   screen model so the last full-screen frame survives program exit
//! - Bounded timeout: headless run raced against a timer, with
//!   program-specific quit keystrokes, a grace period, and a force kill
//!
//! Plain (non-PTY) execution for commands the classifier deems
//! non-interactive also lives here.
//!
//! Cleanup is scoped: raw mode is restored and signal subscriptions torn
//! down on every exit path, including errors.

mod error;
mod plain;
mod pty;
mod quit;
mod term;

pub use error::{ExecError, Result};
pub use plain::{execute_plain, PlainOutcome};
pub use pty::{
    execute_interactive, execute_interactive_with_capture, execute_with_timeout, ExecOutcome,
};
pub use quit::quit_sequences;
pub use term::{terminal_size, RawModeGuard};
