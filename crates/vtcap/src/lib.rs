//! vtcap: run arbitrary commands, full-screen terminal UIs included, and
//! keep a textual snapshot of whatever they last drew.
//!
//! This facade wires the pieces together:
//! - [`vtcap_classify`] decides whether a command needs a real terminal
//! - [`vtcap_exec`] runs it, under a PTY or as a plain captured subprocess
//! - [`vtcap_screen`] models the virtual terminal behind frame capture
//! - [`vtcap_settings`] supplies the user's never/always/pattern lists
//!
//! The executor kind is selected once, at construction, from the
//! classification; nothing re-probes capabilities per call. All per-request
//! state lives in [`ExecutionContext`], so concurrent executions are fully
//! independent.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vtcap::{CommandRunner, ExecutionContext};
//! use vtcap_settings::ExecutionSettings;
//!
//! let ctx = ExecutionContext::new(ExecutionSettings::load()?);
//! let mut runner = CommandRunner::new(ctx);
//! let outcome = runner.run("htop").await?;
//! if let Some(frame) = outcome.last_frame {
//!     println!("{frame}");
//! }
//! ```

use std::time::Duration;

use anyhow::Result;

use vtcap_classify::{base_command, classify, InteractiveDecision, LearnedStore};
use vtcap_exec::{
    execute_interactive, execute_interactive_with_capture, execute_plain, execute_with_timeout,
};
use vtcap_settings::ExecutionSettings;

pub use vtcap_classify::DecisionMethod;
pub use vtcap_screen::TerminalCapture;

/// Decisions below this confidence get their observed outcome written back
/// to the learned-command store after a successful execution.
const LEARNING_THRESHOLD: f64 = 0.8;

/// Everything that shapes one execution request. Explicit fields, no
/// process-wide flags: each request carries its own copy.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub settings: ExecutionSettings,
    /// Caller override: force interactive (true) or plain (false).
    pub force_interactive: Option<bool>,
    /// Capture the last frame during interactive execution.
    pub capture: bool,
    /// Bound the execution; interactive commands get the quit-keystroke
    /// cascade, plain ones are killed outright.
    pub timeout: Option<Duration>,
}

impl ExecutionContext {
    pub fn new(settings: ExecutionSettings) -> Self {
        let capture = settings.capture_last_frame;
        ExecutionContext {
            settings,
            force_interactive: None,
            capture,
            timeout: None,
        }
    }

    pub fn with_override(mut self, force_interactive: Option<bool>) -> Self {
        self.force_interactive = force_interactive;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The executor kind, chosen once from a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Executor {
    /// Captured subprocess without a terminal.
    Plain,
    /// PTY-backed passthrough, optionally capturing, optionally bounded.
    Interactive {
        capture: bool,
        bounded: bool,
    },
}

impl Executor {
    pub fn select(decision: &InteractiveDecision, ctx: &ExecutionContext) -> Self {
        if decision.is_interactive {
            Executor::Interactive {
                capture: ctx.capture,
                bounded: ctx.timeout.is_some(),
            }
        } else {
            Executor::Plain
        }
    }
}

/// Result of running one command, whichever executor handled it.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Captured output for plain execution; empty for interactive runs,
    /// whose output went to the live terminal.
    pub output: String,
    /// Captured frame from an interactive run, when capture was on.
    pub last_frame: Option<String>,
    pub exit_code: i32,
    pub duration: Duration,
    pub timed_out: bool,
    /// Why this command ran the way it did.
    pub decision: InteractiveDecision,
}

/// Classifies and runs commands, feeding observed outcomes back into the
/// learned-command store.
pub struct CommandRunner {
    ctx: ExecutionContext,
    store: LearnedStore,
}

impl CommandRunner {
    pub fn new(ctx: ExecutionContext) -> Self {
        CommandRunner {
            ctx,
            store: LearnedStore::load(),
        }
    }

    /// Use an explicit store; tests pass an ephemeral one.
    pub fn with_store(ctx: ExecutionContext, store: LearnedStore) -> Self {
        CommandRunner { ctx, store }
    }

    /// Classify without executing.
    pub fn classify(&self, command: &str) -> InteractiveDecision {
        classify(
            command,
            &self.ctx.settings.interactive,
            self.ctx.force_interactive,
            &self.store,
        )
    }

    /// Classify, dispatch to the right executor, and learn from the result.
    pub async fn run(&mut self, command: &str) -> Result<CommandOutcome> {
        let decision = self.classify(command);
        let executor = Executor::select(&decision, &self.ctx);
        tracing::debug!(
            command,
            interactive = decision.is_interactive,
            confidence = decision.confidence,
            method = %decision.method,
            "dispatching command"
        );

        let outcome = match executor {
            Executor::Plain => {
                let r = execute_plain(command, self.ctx.timeout).await?;
                CommandOutcome {
                    output: r.output,
                    last_frame: None,
                    exit_code: r.exit_code,
                    duration: r.duration,
                    timed_out: r.timed_out,
                    decision: decision.clone(),
                }
            }
            Executor::Interactive { capture, bounded } => {
                let r = if bounded {
                    // select() only sets `bounded` when a timeout exists.
                    let timeout = self.ctx.timeout.unwrap_or(Duration::from_secs(120));
                    execute_with_timeout(command, timeout, capture).await?
                } else if capture {
                    execute_interactive_with_capture(command).await?
                } else {
                    execute_interactive(command).await?
                };
                CommandOutcome {
                    output: String::new(),
                    last_frame: r.last_frame,
                    exit_code: r.exit_code,
                    duration: r.duration,
                    timed_out: r.timed_out,
                    decision: decision.clone(),
                }
            }
        };

        let succeeded = outcome.exit_code == 0 && !outcome.timed_out;
        maybe_learn(&mut self.store, &decision, command, succeeded);

        Ok(outcome)
    }
}

/// Write the observed behavior back when the decision was uncertain and the
/// execution confirmed it.
fn maybe_learn(
    store: &mut LearnedStore,
    decision: &InteractiveDecision,
    command: &str,
    succeeded: bool,
) {
    if decision.confidence >= LEARNING_THRESHOLD || !succeeded {
        return;
    }
    let base = base_command(command);
    if base.is_empty() {
        return;
    }
    store.record(&base, decision.is_interactive);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use vtcap_classify::DecisionMethod;

    fn ctx_with_never(never: &[&str]) -> ExecutionContext {
        let mut settings = ExecutionSettings::default();
        settings.interactive.never = never.iter().map(|s| s.to_string()).collect();
        ExecutionContext::new(settings)
    }

    fn decision(confidence: f64, interactive: bool) -> InteractiveDecision {
        InteractiveDecision::new(interactive, confidence, "test", DecisionMethod::Default)
    }

    // ========================================================================
    // Executor selection
    // ========================================================================

    #[test]
    fn test_non_interactive_selects_plain() {
        let ctx = ExecutionContext::new(ExecutionSettings::default());
        let executor = Executor::select(&decision(1.0, false), &ctx);
        assert_eq!(executor, Executor::Plain);
    }

    #[test]
    fn test_interactive_selects_capture_by_default() {
        let ctx = ExecutionContext::new(ExecutionSettings::default());
        let executor = Executor::select(&decision(1.0, true), &ctx);
        assert_eq!(
            executor,
            Executor::Interactive {
                capture: true,
                bounded: false
            }
        );
    }

    #[test]
    fn test_timeout_makes_interactive_bounded() {
        let ctx = ExecutionContext::new(ExecutionSettings::default())
            .with_timeout(Some(Duration::from_secs(1)));
        let executor = Executor::select(&decision(1.0, true), &ctx);
        assert_eq!(
            executor,
            Executor::Interactive {
                capture: true,
                bounded: true
            }
        );
    }

    #[test]
    fn test_capture_default_follows_settings() {
        let mut settings = ExecutionSettings::default();
        settings.capture_last_frame = false;
        let ctx = ExecutionContext::new(settings);
        let executor = Executor::select(&decision(1.0, true), &ctx);
        assert_eq!(
            executor,
            Executor::Interactive {
                capture: false,
                bounded: false
            }
        );
    }

    // ========================================================================
    // Learning feedback
    // ========================================================================

    #[test]
    fn test_uncertain_success_is_learned() {
        let mut store = LearnedStore::ephemeral();
        maybe_learn(&mut store, &decision(0.5, false), "mystery-tool --x", true);
        assert_eq!(store.get("mystery-tool"), Some((false, 1.0)));
    }

    #[test]
    fn test_confident_decision_is_not_learned() {
        let mut store = LearnedStore::ephemeral();
        maybe_learn(&mut store, &decision(0.95, true), "htop", true);
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_execution_is_not_learned() {
        let mut store = LearnedStore::ephemeral();
        maybe_learn(&mut store, &decision(0.5, false), "mystery-tool", false);
        assert!(store.is_empty());
    }

    // ========================================================================
    // End-to-end plain dispatch
    // ========================================================================

    #[tokio::test]
    async fn test_never_listed_command_runs_plain() {
        let ctx = ctx_with_never(&["echo"]);
        let mut runner = CommandRunner::with_store(ctx, LearnedStore::ephemeral());
        let outcome = runner.run("echo via-plain").await.unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.output.contains("via-plain"));
        assert!(outcome.last_frame.is_none());
        assert_eq!(outcome.decision.method, DecisionMethod::Config);
    }

    #[tokio::test]
    async fn test_forced_plain_override() {
        let ctx = ExecutionContext::new(ExecutionSettings::default())
            .with_override(Some(false));
        let mut runner = CommandRunner::with_store(ctx, LearnedStore::ephemeral());
        let outcome = runner.run("echo forced").await.unwrap();
        assert_eq!(outcome.decision.method, DecisionMethod::Flag);
        assert!(outcome.output.contains("forced"));
    }

    #[tokio::test]
    async fn test_classification_query_does_not_execute() {
        let ctx = ctx_with_never(&["rm"]);
        let runner = CommandRunner::with_store(ctx, LearnedStore::ephemeral());
        let d = runner.classify("rm -rf /tmp/scratch");
        assert!(!d.is_interactive);
        assert_eq!(d.confidence, 1.0);
    }
}
