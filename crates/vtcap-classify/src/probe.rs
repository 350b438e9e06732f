//! Dynamic interactivity probing.
//!
//! Fast string heuristics run first. Only when they are inconclusive does the
//! probe briefly spawn the command under a throwaway PTY, read whatever
//! arrives within a short deadline, and classify the output. The trial spawn
//! is always killed afterwards regardless of outcome.

use std::io::Read;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, CommandBuilder, PtySize};

use crate::classifier::KNOWN_TUIS;
use crate::decision::{DecisionMethod, InteractiveDecision};

/// How long the trial spawn is allowed to produce output.
const PROBE_DEADLINE: Duration = Duration::from_millis(100);

/// Cap on collected probe output; enough to classify anything.
const PROBE_OUTPUT_CAP: usize = 8192;

/// Output shorter than this within the deadline means the program is most
/// likely sitting there waiting for input.
const NEAR_SILENCE_LEN: usize = 10;

/// Seam for the probe stage, so the cascade can be tested without spawning.
pub trait InteractiveProbe {
    fn probe(&self, command: &str) -> InteractiveDecision;
}

/// The real probe: quick heuristics, then a PTY trial spawn.
#[derive(Debug, Clone)]
pub struct PtyProbe {
    pub deadline: Duration,
}

impl Default for PtyProbe {
    fn default() -> Self {
        PtyProbe {
            deadline: PROBE_DEADLINE,
        }
    }
}

impl InteractiveProbe for PtyProbe {
    fn probe(&self, command: &str) -> InteractiveDecision {
        if let Some(decision) = quick_probe(command) {
            return decision;
        }
        match self.trial_spawn(command) {
            Ok(output) => analyze_probe_output(&output),
            Err(e) => {
                tracing::debug!(command, error = %e, "probe spawn failed");
                InteractiveDecision::new(
                    false,
                    0.3,
                    "probe could not start the command",
                    DecisionMethod::Probe,
                )
            }
        }
    }
}

impl PtyProbe {
    /// Run the command under a disposable PTY and collect whatever output
    /// arrives before the deadline. The child is killed unconditionally.
    fn trial_spawn(&self, command: &str) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let pty = native_pty_system().openpty(PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        })?;

        let mut cmd = CommandBuilder::new("sh");
        cmd.arg("-c");
        cmd.arg(command);
        cmd.env("TERM", "xterm-256color");
        let mut child = pty.slave.spawn_command(cmd)?;
        drop(pty.slave);

        let mut reader = pty.master.try_clone_reader()?;
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let deadline = Instant::now() + self.deadline;
        let mut output = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || output.len() >= PROBE_OUTPUT_CAP {
                break;
            }
            match rx.recv_timeout(remaining) {
                Ok(chunk) => output.extend(chunk),
                Err(_) => break,
            }
        }

        let _ = child.kill();
        let _ = child.wait();
        Ok(output)
    }
}

/// Fast heuristics that avoid a trial spawn entirely.
pub(crate) fn quick_probe(command: &str) -> Option<InteractiveDecision> {
    let trimmed = command.trim();
    if trimmed.ends_with('&') {
        return Some(InteractiveDecision::new(
            false,
            1.0,
            "backgrounded command cannot be interactive",
            DecisionMethod::Probe,
        ));
    }
    if has_top_level_meta(trimmed, &['|', '>', '<']) {
        return Some(InteractiveDecision::new(
            false,
            0.95,
            "pipes or redirects imply non-interactive use",
            DecisionMethod::Probe,
        ));
    }
    let first = trimmed.split_whitespace().next().unwrap_or("");
    // Short names like "vi" only match exactly; substrings would be noise.
    if KNOWN_TUIS
        .iter()
        .any(|tui| first == *tui || (tui.len() >= 3 && first.contains(tui)))
    {
        return Some(InteractiveDecision::new(
            true,
            0.9,
            format!("command name resembles a known full-screen program: {first}"),
            DecisionMethod::Probe,
        ));
    }
    None
}

/// Shell metacharacter scan that ignores quoted regions, backticks, and
/// `$(...)` subshells.
fn has_top_level_meta(s: &str, meta: &[char]) -> bool {
    let mut in_single = false;
    let mut in_double = false;
    let mut in_backticks = false;
    let mut escape = false;
    let mut subshell_depth = 0usize;
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if escape {
            escape = false;
            continue;
        }
        if ch == '$' && !in_single && !in_backticks && chars.peek() == Some(&'(') {
            chars.next();
            subshell_depth += 1;
            continue;
        }
        match ch {
            '\\' if !in_single => escape = true,
            '`' if !in_single && !in_double && subshell_depth == 0 => in_backticks = !in_backticks,
            '\'' if !in_double && !in_backticks && subshell_depth == 0 => in_single = !in_single,
            '"' if !in_single && !in_backticks && subshell_depth == 0 => in_double = !in_double,
            '(' if !in_single && !in_double && !in_backticks && subshell_depth > 0 => {
                subshell_depth += 1;
            }
            ')' if !in_single && !in_double && !in_backticks && subshell_depth > 0 => {
                subshell_depth -= 1;
            }
            c if meta.contains(&c)
                && !in_single
                && !in_double
                && !in_backticks
                && subshell_depth == 0 =>
            {
                return true;
            }
            _ => {}
        }
    }
    false
}

/// Terminal-control markers that only full-screen programs emit.
const TUI_MARKERS: &[&str] = &[
    "\x1b[2J",    // clear screen
    "\x1b[H",     // cursor home
    "\x1b[?1049", // alternate screen
    "\x1b[?25l",  // hide cursor
    "\x1b[?1000", // mouse tracking
    "\x1b]0;",    // title set
];

const PROMPT_SUFFIXES: &[&str] = &[">>>", "=>", "irb>", "$", "#", ">", "%"];

/// Classify collected trial-spawn output.
pub(crate) fn analyze_probe_output(output: &[u8]) -> InteractiveDecision {
    let text = String::from_utf8_lossy(output);

    if output.len() < NEAR_SILENCE_LEN {
        return InteractiveDecision::new(
            true,
            0.9,
            "near-silent within the deadline, likely awaiting input",
            DecisionMethod::Probe,
        );
    }

    if TUI_MARKERS.iter().any(|m| text.contains(m)) {
        return InteractiveDecision::new(
            true,
            0.95,
            "output contains full-screen control sequences",
            DecisionMethod::Probe,
        );
    }

    let escape_count = text.matches("\x1b[").count();
    if escape_count > 5 {
        return InteractiveDecision::new(
            true,
            0.9,
            format!("dense ANSI output ({escape_count} sequences)"),
            DecisionMethod::Probe,
        );
    }

    let tail = text.trim_end();
    if PROMPT_SUFFIXES.iter().any(|p| tail.ends_with(p)) {
        return InteractiveDecision::new(
            true,
            0.9,
            "output ends in a prompt",
            DecisionMethod::Probe,
        );
    }

    InteractiveDecision::new(
        false,
        0.6,
        "plain streaming output",
        DecisionMethod::Probe,
    )
}

// ============================================================================
// Tests
// ============================================================================
