//! PTY spawn, relay, and the three execution modes.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, ExitStatus, MasterPty, PtySize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::time::Instant;

use vtcap_screen::{TerminalCapture, DEFAULT_COLS, DEFAULT_ROWS};

use crate::error::{ExecError, Result};
use crate::quit::quit_sequences;
use crate::term::{terminal_size, RawModeGuard};

const READ_BUF_SIZE: usize = 4096;
/// Bounded poll so timeout handling is never starved by a quiet child.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Delay between successive quit keystrokes.
const KEY_DELAY: Duration = Duration::from_millis(50);
/// How long a child gets to exit after the quit keystrokes.
const GRACE_PERIOD: Duration = Duration::from_millis(500);
/// Bounded wait for the exit status after the relay ends.
const EXIT_WAIT: Duration = Duration::from_secs(2);
/// Conventional exit code for a force-killed timeout.
const TIMEOUT_EXIT_CODE: i32 = 124;

/// Outcome of a PTY-backed execution.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub exit_code: i32,
    pub duration: Duration,
    /// Captured frame, present in capturing modes: the alternate-screen exit
    /// snapshot if one occurred, otherwise the final screen content.
    pub last_frame: Option<String>,
    /// True only when force-kill was required to end the command.
    pub timed_out: bool,
}

#[derive(Debug, Clone, Copy)]
struct RunSpec {
    /// Raw local terminal, stdin relay, resize propagation, live forwarding.
    raw: bool,
    capture: bool,
    timeout: Option<Duration>,
}

/// Run a command interactively: raw local terminal, bidirectional relay,
/// resize propagation. Bounded only by the child's own lifetime.
pub async fn execute_interactive(command: &str) -> Result<ExecOutcome> {
    run(
        command,
        RunSpec {
            raw: true,
            capture: false,
            timeout: None,
        },
    )
    .await
}

/// Like [`execute_interactive`], but every output chunk also feeds the
/// screen model so the last full-screen frame survives the program.
pub async fn execute_interactive_with_capture(command: &str) -> Result<ExecOutcome> {
    run(
        command,
        RunSpec {
            raw: true,
            capture: true,
            timeout: None,
        },
    )
    .await
}

/// Run a command under a PTY without touching the local terminal, racing it
/// against `timeout`. On expiry, program-specific quit keystrokes are sent,
/// a grace period elapses, and only then is the child force-killed.
pub async fn execute_with_timeout(
    command: &str,
    timeout: Duration,
    capture: bool,
) -> Result<ExecOutcome> {
    run(
        command,
        RunSpec {
            raw: false,
            capture,
            timeout: Some(timeout),
        },
    )
    .await
}

enum OutputEvent {
    Data(Vec<u8>),
    Eof,
    Error(String),
}

async fn run(command: &str, spec: RunSpec) -> Result<ExecOutcome> {
    let start = std::time::Instant::now();
    let (cols, rows) = terminal_size().unwrap_or((DEFAULT_COLS, DEFAULT_ROWS));

    // Raw mode first: if anything below fails, the guard restores the
    // terminal on the error return.
    let _raw_guard = if spec.raw { Some(RawModeGuard::new()?) } else { None };

    let pty = native_pty_system()
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| ExecError::Spawn(format!("openpty failed: {e}")))?;

    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    let mut builder = CommandBuilder::new(&shell);
    builder.arg("-c");
    builder.arg(command);
    builder.env("TERM", "xterm-256color");
    if let Ok(cwd) = std::env::current_dir() {
        builder.cwd(cwd);
    }

    let mut child = pty
        .slave
        .spawn_command(builder)
        .map_err(|e| ExecError::Spawn(format!("failed to spawn '{command}': {e}")))?;
    drop(pty.slave);

    let mut reader = pty
        .master
        .try_clone_reader()
        .map_err(|e| ExecError::Spawn(format!("failed to clone reader: {e}")))?;
    let writer = pty
        .master
        .take_writer()
        .map_err(|e| ExecError::Spawn(format!("failed to take writer: {e}")))?;
    let writer = Arc::new(Mutex::new(writer));
    let mut killer = child.clone_killer();
    let master: Arc<Mutex<Box<dyn MasterPty + Send>>> = Arc::new(Mutex::new(pty.master));

    tracing::debug!(
        command,
        cols,
        rows,
        raw = spec.raw,
        capture = spec.capture,
        "spawned command under pty"
    );

    // Exactly one reader preserves byte ordering into the screen model.
    let should_stop = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::channel::<OutputEvent>(256);
    {
        let stop = should_stop.clone();
        std::thread::spawn(move || {
            let mut buf = [0u8; READ_BUF_SIZE];
            loop {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                match reader.read(&mut buf) {
                    Ok(0) => {
                        let _ = tx.blocking_send(OutputEvent::Eof);
                        break;
                    }
                    Ok(n) => {
                        if tx.blocking_send(OutputEvent::Data(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.blocking_send(OutputEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        });
    }

    let stdin_task = spec.raw.then(|| {
        let writer = writer.clone();
        tokio::spawn(async move {
            let mut stdin = tokio::io::stdin();
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let data = buf[..n].to_vec();
                        let writer = writer.clone();
                        let res = tokio::task::spawn_blocking(move || {
                            let mut w = writer.lock();
                            w.write_all(&data).and_then(|_| w.flush())
                        })
                        .await;
                        if !matches!(res, Ok(Ok(()))) {
                            break;
                        }
                    }
                }
            }
        })
    });

    let resize_task = spec.raw.then(|| {
        let master = master.clone();
        tokio::spawn(async move {
            let Ok(mut winch) = signal(SignalKind::window_change()) else {
                return;
            };
            while winch.recv().await.is_some() {
                if let Some((cols, rows)) = terminal_size() {
                    let _ = master.lock().resize(PtySize {
                        rows,
                        cols,
                        pixel_width: 0,
                        pixel_height: 0,
                    });
                }
            }
        })
    });

    let mut capture = spec.capture.then(|| TerminalCapture::new(cols, rows));
    let mut stdout = tokio::io::stdout();
    let mut exit_code: Option<i32> = None;
    let mut timed_out = false;
    let deadline = spec.timeout.map(|t| Instant::now() + t);
    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    'relay: loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(OutputEvent::Data(data)) => {
                        if let Some(cap) = capture.as_mut() {
                            cap.process(&data);
                        }
                        if spec.raw {
                            if stdout.write_all(&data).await.is_err()
                                || stdout.flush().await.is_err()
                            {
                                break 'relay;
                            }
                        }
                    }
                    Some(OutputEvent::Error(e)) => {
                        tracing::debug!(error = %e, "pty reader ended");
                        break 'relay;
                    }
                    Some(OutputEvent::Eof) | None => break 'relay,
                }
            }
            _ = poll.tick() => {
                if let Ok(Some(status)) = child.try_wait() {
                    exit_code = Some(status_code(&status));
                    drain_output(&mut rx, &mut capture, spec.raw, &mut stdout).await;
                    break 'relay;
                }
                if let Some(d) = deadline {
                    if Instant::now() >= d {
                        let (code, forced) =
                            wind_down(command, &writer, &mut child, &mut killer, &mut rx, &mut capture)
                                .await;
                        exit_code = Some(code);
                        timed_out = forced;
                        break 'relay;
                    }
                }
            }
        }
    }

    should_stop.store(true, Ordering::Relaxed);
    if let Some(task) = stdin_task {
        task.abort();
    }
    if let Some(task) = resize_task {
        task.abort();
    }

    let exit_code = match exit_code {
        Some(code) => code,
        None => wait_bounded(child, &mut killer).await,
    };

    let last_frame = capture.map(|mut cap| {
        cap.take_last_frame()
            .unwrap_or_else(|| cap.capture_frame())
    });

    let duration = start.elapsed();
    tracing::debug!(
        exit_code,
        timed_out,
        duration_ms = duration.as_millis() as u64,
        "command finished"
    );

    Ok(ExecOutcome {
        exit_code,
        duration,
        last_frame,
        timed_out,
    })
}

/// Pull any output still in flight after the child exited.
async fn drain_output(
    rx: &mut mpsc::Receiver<OutputEvent>,
    capture: &mut Option<TerminalCapture>,
    forward: bool,
    stdout: &mut tokio::io::Stdout,
) {
    loop {
        match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            Ok(Some(OutputEvent::Data(data))) => {
                if let Some(cap) = capture.as_mut() {
                    cap.process(&data);
                }
                if forward {
                    let _ = stdout.write_all(&data).await;
                    let _ = stdout.flush().await;
                }
            }
            _ => break,
        }
    }
}

/// The timeout cascade: quit keystrokes, grace period, force kill.
///
/// Output keeps flowing into the capture while this runs; a TUI reacting to
/// its quit key typically tears down the alternate screen here, which is
/// exactly the moment the frame snapshot is taken.
async fn wind_down(
    command: &str,
    writer: &Arc<Mutex<Box<dyn Write + Send>>>,
    child: &mut Box<dyn Child + Send + Sync>,
    killer: &mut Box<dyn ChildKiller + Send + Sync>,
    rx: &mut mpsc::Receiver<OutputEvent>,
    capture: &mut Option<TerminalCapture>,
) -> (i32, bool) {
    tracing::debug!(command, "timeout reached, sending quit sequences");
    for seq in quit_sequences(command) {
        let writer = writer.clone();
        let _ = tokio::task::spawn_blocking(move || {
            let mut w = writer.lock();
            w.write_all(&seq).and_then(|_| w.flush())
        })
        .await;
        tokio::time::sleep(KEY_DELAY).await;
        if let Ok(Some(status)) = child.try_wait() {
            drain_into_capture(rx, capture).await;
            return (status_code(&status), false);
        }
    }

    let grace_deadline = Instant::now() + GRACE_PERIOD;
    while Instant::now() < grace_deadline {
        if let Ok(Some(OutputEvent::Data(data))) =
            tokio::time::timeout(POLL_INTERVAL, rx.recv()).await
        {
            if let Some(cap) = capture.as_mut() {
                cap.process(&data);
            }
        }
        if let Ok(Some(status)) = child.try_wait() {
            drain_into_capture(rx, capture).await;
            return (status_code(&status), false);
        }
    }

    tracing::warn!(command, "grace period expired, force killing");
    let _ = killer.kill();
    for _ in 0..10 {
        if let Ok(Some(_)) = child.try_wait() {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    drain_into_capture(rx, capture).await;
    (TIMEOUT_EXIT_CODE, true)
}

async fn drain_into_capture(
    rx: &mut mpsc::Receiver<OutputEvent>,
    capture: &mut Option<TerminalCapture>,
) {
    while let Ok(Some(OutputEvent::Data(data))) =
        tokio::time::timeout(Duration::from_millis(100), rx.recv()).await
    {
        if let Some(cap) = capture.as_mut() {
            cap.process(&data);
        }
    }
}

/// Wait for the exit status with a bound; kill and give up if it never comes.
async fn wait_bounded(
    mut child: Box<dyn Child + Send + Sync>,
    killer: &mut Box<dyn ChildKiller + Send + Sync>,
) -> i32 {
    let wait = tokio::task::spawn_blocking(move || child.wait());
    match tokio::time::timeout(EXIT_WAIT, wait).await {
        Ok(Ok(Ok(status))) => status_code(&status),
        _ => {
            let _ = killer.kill();
            -1
        }
    }
}

fn status_code(status: &ExitStatus) -> i32 {
    if status.success() {
        0
    } else {
        let code = status.exit_code();
        // A zero code on an unsuccessful exit means a signal took it down.
        if code == 0 {
            -1
        } else {
            code as i32
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // The bounded-timeout mode never touches the local terminal, so these
    // run headless.

    #[tokio::test]
    async fn test_natural_completion_with_capture() {
        let outcome = execute_with_timeout("echo done", Duration::from_secs(5), true)
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(!outcome.timed_out);
        assert!(outcome.last_frame.unwrap().contains("done"));
        assert!(outcome.duration < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_exit_code_is_propagated() {
        let outcome = execute_with_timeout("exit 3", Duration::from_secs(5), false)
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert!(outcome.last_frame.is_none());
    }

    #[tokio::test]
    async fn test_fallback_snapshot_without_alt_screen() {
        let outcome = execute_with_timeout(
            "printf 'plain frame content'",
            Duration::from_secs(5),
            true,
        )
        .await
        .unwrap();
        assert!(outcome
            .last_frame
            .unwrap()
            .contains("plain frame content"));
    }

    #[tokio::test]
    async fn test_alt_screen_exit_snapshot_survives() {
        // The content only ever exists on the alternate screen; the
        // exit-time snapshot is the only way to observe it.
        let outcome = execute_with_timeout(
            "printf '\\033[?1049hSECRET\\033[?1049l'",
            Duration::from_secs(5),
            true,
        )
        .await
        .unwrap();
        assert_eq!(outcome.last_frame.as_deref(), Some("SECRET"));
    }

    #[tokio::test]
    async fn test_force_kill_after_grace_reports_timeout() {
        // The child ignores SIGINT, so the quit keystrokes cannot stop it.
        let start = std::time::Instant::now();
        let outcome = execute_with_timeout(
            "trap '' INT; sleep 30",
            Duration::from_millis(200),
            false,
        )
        .await
        .unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, 124);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_interruptible_child_ends_without_force_kill() {
        // Ctrl-C from the quit cascade reaches the child through the pty
        // line discipline, so force kill is never needed.
        let outcome = execute_with_timeout("sleep 30", Duration::from_millis(200), false)
            .await
            .unwrap();
        assert!(!outcome.timed_out);
        assert_ne!(outcome.exit_code, 0);
    }
}
