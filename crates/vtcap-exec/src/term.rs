//! Local terminal control: size queries and scoped raw mode.

use std::io::Write;

use nix::sys::termios::{self, SetArg, Termios};

use crate::error::{ExecError, Result};

/// Query the controlling terminal's size as `(cols, rows)`.
pub fn terminal_size() -> Option<(u16, u16)> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };
    if ret == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some((ws.ws_col, ws.ws_row))
    } else {
        None
    }
}

/// Puts the local terminal into raw mode for the lifetime of the guard.
///
/// Raw mode is a process-wide resource: the original attributes are restored
/// unconditionally on drop, and a reset sequence is written so a program
/// that died mid-draw cannot leave the terminal hidden-cursor or styled.
pub struct RawModeGuard {
    original: Termios,
}

impl RawModeGuard {
    pub fn new() -> Result<Self> {
        let stdin = std::io::stdin();
        let original = termios::tcgetattr(&stdin)
            .map_err(|e| ExecError::Terminal(format!("tcgetattr failed: {e}")))?;
        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(&stdin, SetArg::TCSANOW, &raw)
            .map_err(|e| ExecError::Terminal(format!("tcsetattr failed: {e}")))?;
        Ok(RawModeGuard { original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let stdin = std::io::stdin();
        let _ = termios::tcsetattr(&stdin, SetArg::TCSANOW, &self.original);
        // Undo anything a full-screen program left behind: style, hidden
        // cursor, alternate screen.
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(b"\x1b[0m\x1b[?25h");
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_size_is_sane_when_available() {
        // Headless environments return None; a real terminal never reports
        // zero in either dimension.
        if let Some((cols, rows)) = terminal_size() {
            assert!(cols > 0);
            assert!(rows > 0);
        }
    }
}
