//! Program-specific quit keystrokes for the bounded-timeout mode.

const ESC: &[u8] = b"\x1b";
const CTRL_C: &[u8] = b"\x03";
const CTRL_D: &[u8] = b"\x04";
const CTRL_X: &[u8] = b"\x18";

/// Ordered quit keystrokes for a command, keyed by its first token
/// (case-insensitive). Each entry is written into the PTY with a small
/// delay before the next, mildest first.
pub fn quit_sequences(command: &str) -> Vec<Vec<u8>> {
    let first = command
        .split_whitespace()
        .next()
        .unwrap_or("")
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_lowercase();

    let seqs: &[&[u8]] = match first.as_str() {
        // Pagers and monitors all honor a bare "q".
        "top" | "htop" | "btop" | "btm" | "less" | "more" | "watch" => &[b"q", CTRL_C],
        "vim" | "vi" | "nvim" => &[ESC, b":q!\r", CTRL_C],
        "nano" => &[CTRL_C, CTRL_X],
        "emacs" => &[b"\x03\x03"],
        "tail" => &[CTRL_C],
        // "~." is the SSH connection escape; telnet honors it too via its
        // escape prompt falling through to Ctrl-C.
        "ssh" | "telnet" => &[b"~.", CTRL_C],
        "docker" => {
            if command.contains("attach") {
                // Ctrl-P Ctrl-Q detaches without stopping the container.
                &[b"\x10\x11", CTRL_C]
            } else {
                &[CTRL_C]
            }
        }
        "mysql" | "redis-cli" | "mongo" => &[b"exit\r", CTRL_D, CTRL_C],
        "psql" => &[b"\\q\r", CTRL_D, CTRL_C],
        "python" | "python3" => &[b"exit()\r", CTRL_D, CTRL_C],
        "node" => &[b".exit\r", CTRL_D, CTRL_C],
        "ruby" | "irb" => &[b"exit\r", CTRL_D, CTRL_C],
        _ => &[b"q", ESC, CTRL_C],
    };
    seqs.iter().map(|s| s.to_vec()).collect()
}

// ============================================================================
// Tests
// ============================================================================
