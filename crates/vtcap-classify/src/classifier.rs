//! The classification cascade.

use std::path::Path;

use vtcap_settings::InteractiveSettings;

use crate::decision::{DecisionMethod, InteractiveDecision};
use crate::probe::{InteractiveProbe, PtyProbe};
use crate::store::LearnedStore;

/// Full-screen programs that always want a real terminal. Matched by exact
/// command or "name followed by whitespace".
pub(crate) const KNOWN_TUIS: &[&str] = &[
    "vim", "vi", "nvim", "nano", "emacs", // editors
    "less", "more", "most", // pagers
    "top", "htop", "btop", "btm", "glances", "watch", // monitors
    "tmux", "screen", "zellij", // multiplexers
    "fzf", "lazygit", "gitui", "tig", "ranger", "mc", "k9s", // pickers and browsers
    "mysql", "psql", "sqlite3", "redis-cli", "mongo", // database shells
    "ssh", "telnet", "ftp", "sftp", // network sessions
];

/// Language REPLs: interactive only when invoked with no arguments.
const KNOWN_REPLS: &[&str] = &[
    "python", "python3", "ipython", "bpython", "node", "irb", "pry", "ruby", "ghci", "erl",
    "iex", "lua", "R",
];

/// Leading wrappers to strip before consulting the hardcoded table.
const WRAPPERS: &[&str] = &["env", "sudo", "doas", "nice", "stdbuf", "timeout", "nohup"];

/// Probe decisions are only accepted above this confidence.
const PROBE_ACCEPT_THRESHOLD: f64 = 0.85;

/// Learned entries are only trusted at or above this confidence.
const LEARNED_TRUST_THRESHOLD: f64 = 0.9;

/// Base name of the command's first token, with any path prefix stripped.
pub fn base_command(command: &str) -> String {
    let first = command.split_whitespace().next().unwrap_or("");
    Path::new(first)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(first)
        .to_string()
}

/// Classify with the default PTY-backed probe.
pub fn classify(
    command: &str,
    settings: &InteractiveSettings,
    override_flag: Option<bool>,
    store: &LearnedStore,
) -> InteractiveDecision {
    classify_with_probe(command, settings, override_flag, store, &PtyProbe::default())
}

/// Classify with an explicit probe implementation.
///
/// Stages short-circuit in strict priority order; the first definitive
/// answer wins.
pub fn classify_with_probe(
    command: &str,
    settings: &InteractiveSettings,
    override_flag: Option<bool>,
    store: &LearnedStore,
    probe: &dyn InteractiveProbe,
) -> InteractiveDecision {
    // 1. Explicit caller override.
    if let Some(forced) = override_flag {
        return InteractiveDecision::new(
            forced,
            1.0,
            if forced {
                "forced interactive by caller"
            } else {
                "forced non-interactive by caller"
            },
            DecisionMethod::Flag,
        );
    }

    // 2. User configuration. "Never" wins over any allow rule.
    if let Some(decision) = config_decision(command, settings) {
        return decision;
    }

    // 3. Learned store, keyed by base command name.
    let base = base_command(command);
    if let Some((learned, confidence)) = store.get(&base) {
        if confidence >= LEARNED_TRUST_THRESHOLD {
            return InteractiveDecision::new(
                learned,
                confidence,
                format!("previously observed behavior of '{base}'"),
                DecisionMethod::Learned,
            );
        }
    }

    // 4. Hardcoded table.
    if let Some(decision) = hardcoded_decision(command) {
        return decision;
    }

    // 5. Dynamic probe, accepted only when confident.
    let probed = probe.probe(command);
    if probed.confidence > PROBE_ACCEPT_THRESHOLD {
        return probed;
    }
    tracing::debug!(
        command,
        confidence = probed.confidence,
        "probe inconclusive, falling back to default"
    );

    // 6. Conservative default.
    InteractiveDecision::new(
        false,
        0.5,
        "no signal matched; assuming non-interactive",
        DecisionMethod::Default,
    )
}

fn config_decision(command: &str, settings: &InteractiveSettings) -> Option<InteractiveDecision> {
    let base = base_command(command);
    let matches_entry = |entry: &String| entry.as_str() == command || entry.as_str() == base;

    if settings.never.iter().any(matches_entry) {
        return Some(InteractiveDecision::new(
            false,
            1.0,
            "matched configured never-interactive list",
            DecisionMethod::Config,
        ));
    }
    if settings.always.iter().any(matches_entry) {
        return Some(InteractiveDecision::new(
            true,
            1.0,
            "matched configured always-interactive list",
            DecisionMethod::Config,
        ));
    }
    if let Some(pattern) = settings
        .patterns
        .iter()
        .find(|p| glob_match(p, command))
    {
        return Some(InteractiveDecision::new(
            true,
            1.0,
            format!("matched configured pattern '{pattern}'"),
            DecisionMethod::Config,
        ));
    }
    None
}

/// Glob-style matching over the four supported pattern shapes:
/// `*substring*`, `*suffix`, `prefix*`, and exact.
fn glob_match(pattern: &str, command: &str) -> bool {
    match (pattern.strip_prefix('*'), pattern.strip_suffix('*')) {
        (Some(rest), _) if rest.ends_with('*') => {
            command.contains(rest.trim_end_matches('*'))
        }
        (Some(suffix), None) => command.ends_with(suffix),
        (None, Some(prefix)) => command.starts_with(prefix),
        _ => command == pattern,
    }
}

fn hardcoded_decision(command: &str) -> Option<InteractiveDecision> {
    let tokens = shell_words::split(command).unwrap_or_default();
    if tokens.is_empty() {
        return None;
    }
    let tokens = peel_wrappers(&tokens);
    let first = tokens.first().map(String::as_str).unwrap_or("");
    let base = Path::new(first)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(first);
    let base_lower = base.to_lowercase();

    // Known full-screen programs: exact invocation is surest.
    if KNOWN_TUIS.contains(&base_lower.as_str()) {
        let confidence = if tokens.len() == 1 { 0.95 } else { 0.9 };
        return Some(InteractiveDecision::new(
            true,
            confidence,
            format!("'{base_lower}' is a known full-screen program"),
            DecisionMethod::Hardcoded,
        ));
    }

    // REPLs only count when invoked bare; `node app.js` is a script run.
    if KNOWN_REPLS.contains(&base) && tokens.len() == 1 {
        return Some(InteractiveDecision::new(
            true,
            0.95,
            format!("'{base}' with no arguments starts a REPL"),
            DecisionMethod::Hardcoded,
        ));
    }

    // Container tools get their own flag scan; trailing -it belongs to the
    // in-container command and must not trip the generic check below.
    if matches!(base_lower.as_str(), "docker" | "podman" | "kubectl") {
        return container_decision(&base_lower, &tokens);
    }

    // Generic -it style flags on anything else.
    if has_it_flags(&tokens) {
        return Some(InteractiveDecision::new(
            true,
            0.85,
            "command requests an interactive TTY (-i -t)",
            DecisionMethod::Hardcoded,
        ));
    }

    None
}

/// Scan container run/exec flags up to the image or container name.
fn container_decision(base: &str, tokens: &[String]) -> Option<InteractiveDecision> {
    let subcmd_idx = tokens.iter().position(|t| t == "run" || t == "exec")?;
    let mut has_i = false;
    let mut has_t = false;
    for token in tokens.iter().skip(subcmd_idx + 1) {
        if token == "--" {
            break;
        }
        if let Some(stripped) = token.strip_prefix('-') {
            if token == "-it" || token == "-ti" {
                return Some(InteractiveDecision::new(
                    true,
                    0.95,
                    format!("{base} {} with -it", tokens[subcmd_idx]),
                    DecisionMethod::Hardcoded,
                ));
            }
            match token.as_str() {
                "-i" | "--interactive" | "--stdin" => has_i = true,
                "-t" | "--tty" => has_t = true,
                _ if !token.starts_with("--") => {
                    // Clustered single-letter flags.
                    has_i |= stripped.contains('i');
                    has_t |= stripped.contains('t');
                }
                _ => {}
            }
        } else {
            // First non-option is the image/container; the rest belongs to
            // the in-container command.
            break;
        }
    }
    (has_i && has_t).then(|| {
        InteractiveDecision::new(
            true,
            0.95,
            format!("{base} with both -i and -t"),
            DecisionMethod::Hardcoded,
        )
    })
}

fn has_it_flags(tokens: &[String]) -> bool {
    if tokens.iter().any(|t| t == "-it" || t == "-ti") {
        return true;
    }
    let has_i = tokens.iter().any(|t| t == "-i" || t == "--interactive");
    let has_t = tokens.iter().any(|t| t == "-t" || t == "--tty");
    has_i && has_t
}

/// Strip leading wrapper commands (and their own arguments) to find the
/// command actually being run.
fn peel_wrappers(tokens: &[String]) -> Vec<String> {
    let mut rest = tokens;
    loop {
        let Some(first) = rest.first() else {
            return rest.to_vec();
        };
        let base = Path::new(first.as_str())
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(first);
        if !WRAPPERS.contains(&base) {
            return rest.to_vec();
        }
        let mut j = 1;
        // Skip the wrapper's options and, for env, VAR=value assignments.
        while j < rest.len() && (rest[j].starts_with('-') || rest[j].contains('=')) {
            j += 1;
        }
        // timeout takes a duration argument before the command.
        if base == "timeout" && j < rest.len() {
            j += 1;
        }
        if j >= rest.len() {
            return rest.to_vec();
        }
        rest = &rest[j..];
    }
}

/// A classifier bound to its configuration and store, convenient for callers
/// that classify repeatedly.
pub struct Classifier<'a> {
    settings: &'a InteractiveSettings,
    store: &'a LearnedStore,
    probe: PtyProbe,
}

impl<'a> Classifier<'a> {
    pub fn new(settings: &'a InteractiveSettings, store: &'a LearnedStore) -> Self {
        Classifier {
            settings,
            store,
            probe: PtyProbe::default(),
        }
    }

    pub fn classify(&self, command: &str, override_flag: Option<bool>) -> InteractiveDecision {
        classify_with_probe(command, self.settings, override_flag, self.store, &self.probe)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Probe stub that never spawns anything.
    struct StubProbe(InteractiveDecision);

    impl InteractiveProbe for StubProbe {
        fn probe(&self, _command: &str) -> InteractiveDecision {
            self.0.clone()
        }
    }

    fn inconclusive_probe() -> StubProbe {
        StubProbe(InteractiveDecision::new(
            false,
            0.6,
            "stub",
            DecisionMethod::Probe,
        ))
    }

    fn run(
        command: &str,
        settings: &InteractiveSettings,
        override_flag: Option<bool>,
        store: &LearnedStore,
    ) -> InteractiveDecision {
        classify_with_probe(command, settings, override_flag, store, &inconclusive_probe())
    }

    // ========================================================================
    // Cascade priority
    // ========================================================================

    #[test]
    fn test_flag_override_beats_everything() {
        let mut settings = InteractiveSettings::default();
        settings.never.push("htop".to_string());
        let d = run("htop", &settings, Some(true), &LearnedStore::ephemeral());
        assert!(d.is_interactive);
        assert_eq!(d.confidence, 1.0);
        assert_eq!(d.method, DecisionMethod::Flag);
    }

    #[test]
    fn test_never_list_matches_base_command() {
        let mut settings = InteractiveSettings::default();
        settings.never.push("ls".to_string());
        let d = run("ls -la", &settings, None, &LearnedStore::ephemeral());
        assert!(!d.is_interactive);
        assert_eq!(d.confidence, 1.0);
        assert_eq!(d.method, DecisionMethod::Config);
    }

    #[test]
    fn test_never_overrides_always() {
        let mut settings = InteractiveSettings::default();
        settings.never.push("mytool".to_string());
        settings.always.push("mytool".to_string());
        let d = run("mytool", &settings, None, &LearnedStore::ephemeral());
        assert!(!d.is_interactive);
    }

    #[test]
    fn test_never_overrides_pattern() {
        let mut settings = InteractiveSettings::default();
        settings.never.push("ssh-audit".to_string());
        settings.patterns.push("ssh*".to_string());
        let d = run("ssh-audit", &settings, None, &LearnedStore::ephemeral());
        assert!(!d.is_interactive);
        assert_eq!(d.method, DecisionMethod::Config);
    }

    #[test]
    fn test_always_list_forces_interactive() {
        let mut settings = InteractiveSettings::default();
        settings.always.push("my-repl".to_string());
        let d = run("my-repl", &settings, None, &LearnedStore::ephemeral());
        assert!(d.is_interactive);
        assert_eq!(d.method, DecisionMethod::Config);
    }

    #[test]
    fn test_learned_entry_beats_hardcoded_table() {
        let mut store = LearnedStore::ephemeral();
        store.record("htop", false);
        let d = run("htop", &InteractiveSettings::default(), None, &store);
        assert!(!d.is_interactive);
        assert_eq!(d.method, DecisionMethod::Learned);
    }

    #[test]
    fn test_default_when_nothing_matches() {
        let d = run(
            "my-custom-tool --flag",
            &InteractiveSettings::default(),
            None,
            &LearnedStore::ephemeral(),
        );
        assert!(!d.is_interactive);
        assert_eq!(d.confidence, 0.5);
        assert_eq!(d.method, DecisionMethod::Default);
    }

    #[test]
    fn test_confident_probe_is_accepted() {
        let probe = StubProbe(InteractiveDecision::new(
            true,
            0.9,
            "stub sure",
            DecisionMethod::Probe,
        ));
        let d = classify_with_probe(
            "mystery-tool",
            &InteractiveSettings::default(),
            None,
            &LearnedStore::ephemeral(),
            &probe,
        );
        assert!(d.is_interactive);
        assert_eq!(d.method, DecisionMethod::Probe);
    }

    #[test]
    fn test_pipe_quick_check_through_real_probe() {
        // The real probe short-circuits on the pipe without spawning.
        let d = classify(
            "echo hi | cat",
            &InteractiveSettings::default(),
            None,
            &LearnedStore::ephemeral(),
        );
        assert!(!d.is_interactive);
        assert_eq!(d.confidence, 0.95);
        assert_eq!(d.method, DecisionMethod::Probe);
    }

    // ========================================================================
    // Patterns
    // ========================================================================

    #[test]
    fn test_glob_pattern_shapes() {
        assert!(glob_match("ssh*", "ssh user@host"));
        assert!(glob_match("*--interactive", "tool --interactive"));
        assert!(glob_match("*menu*", "show-menu-now"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("ssh*", "mosh host"));
        assert!(!glob_match("*menu*", "plain"));
    }

    #[test]
    fn test_pattern_list_matches_full_command() {
        let mut settings = InteractiveSettings::default();
        settings.patterns.push("* --tui".to_string());
        let d = run("sometool --tui", &settings, None, &LearnedStore::ephemeral());
        assert!(d.is_interactive);
        assert_eq!(d.method, DecisionMethod::Config);
    }

    // ========================================================================
    // Hardcoded table
    // ========================================================================

    #[test]
    fn test_known_tui_exact() {
        let d = run("htop", &InteractiveSettings::default(), None, &LearnedStore::ephemeral());
        assert!(d.is_interactive);
        assert!(d.confidence >= 0.9);
        assert_eq!(d.method, DecisionMethod::Hardcoded);
    }

    #[test]
    fn test_known_tui_with_arguments() {
        let d = run(
            "vim notes.txt",
            &InteractiveSettings::default(),
            None,
            &LearnedStore::ephemeral(),
        );
        assert!(d.is_interactive);
        assert_eq!(d.method, DecisionMethod::Hardcoded);
    }

    #[test]
    fn test_tui_matched_through_path_prefix() {
        let d = run(
            "/usr/bin/less README.md",
            &InteractiveSettings::default(),
            None,
            &LearnedStore::ephemeral(),
        );
        assert!(d.is_interactive);
    }

    #[test]
    fn test_bare_repl_is_interactive() {
        let d = run("node", &InteractiveSettings::default(), None, &LearnedStore::ephemeral());
        assert!(d.is_interactive);
        assert_eq!(d.confidence, 0.95);
        assert_eq!(d.method, DecisionMethod::Hardcoded);
    }

    #[test]
    fn test_repl_with_script_falls_through() {
        let d = run(
            "node app.js",
            &InteractiveSettings::default(),
            None,
            &LearnedStore::ephemeral(),
        );
        assert_ne!(d.method, DecisionMethod::Hardcoded);
    }

    #[test]
    fn test_docker_exec_it() {
        let d = run(
            "docker exec -it mycontainer bash",
            &InteractiveSettings::default(),
            None,
            &LearnedStore::ephemeral(),
        );
        assert!(d.is_interactive);
        assert_eq!(d.confidence, 0.95);
        assert_eq!(d.method, DecisionMethod::Hardcoded);
    }

    #[test]
    fn test_docker_exec_separate_i_and_t() {
        let d = run(
            "docker exec -i -t box sh",
            &InteractiveSettings::default(),
            None,
            &LearnedStore::ephemeral(),
        );
        assert!(d.is_interactive);
    }

    #[test]
    fn test_docker_flags_after_container_are_ignored() {
        // -it here belongs to the in-container command, not docker.
        let d = run(
            "docker exec box sometool -it",
            &InteractiveSettings::default(),
            None,
            &LearnedStore::ephemeral(),
        );
        assert_ne!(d.method, DecisionMethod::Hardcoded);
    }

    #[test]
    fn test_generic_it_flags() {
        let d = run(
            "some-shell --tty -i",
            &InteractiveSettings::default(),
            None,
            &LearnedStore::ephemeral(),
        );
        assert!(d.is_interactive);
        assert_eq!(d.confidence, 0.85);
    }

    #[test]
    fn test_wrappers_are_peeled() {
        let d = run(
            "sudo htop",
            &InteractiveSettings::default(),
            None,
            &LearnedStore::ephemeral(),
        );
        assert!(d.is_interactive);
        assert_eq!(d.method, DecisionMethod::Hardcoded);

        let d = run(
            "env FOO=bar timeout 30 vim x",
            &InteractiveSettings::default(),
            None,
            &LearnedStore::ephemeral(),
        );
        assert!(d.is_interactive);
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    #[test]
    fn test_base_command_strips_path_and_args() {
        assert_eq!(base_command("/usr/local/bin/htop -d 5"), "htop");
        assert_eq!(base_command("ls"), "ls");
        assert_eq!(base_command(""), "");
    }
}
