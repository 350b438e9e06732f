//! Virtual terminal screen model for vtcap.
//!
//! This crate provides a capture-oriented terminal emulator, including:
//! - A fixed-size cell grid with primary and alternate buffers
//! - Incremental escape-sequence parsing (CSI, OSC, ESC) via `vte`
//! - SGR color/attribute tracking (16-color, 256-color, truecolor)
//! - Alternate screen buffer detection with exit-time frame snapshots
//!
//! # Architecture
//!
//! This is a **Layer 1 (Foundation)** crate:
//! - Depends on: nothing internal
//! - Used by: vtcap-exec (output capture), vtcap (frame display)
//!
//! It is a *capture* emulator, not a user-facing terminal: no glyph-width
//! layout, no mouse protocol, no scrollback beyond the visible grid.
//!
//! # Usage
//!
//! ```rust
//! use vtcap_screen::TerminalCapture;
//!
//! let mut capture = TerminalCapture::new(80, 24);
//! capture.process(b"\x1b[2Jhello \x1b[1mworld\x1b[0m");
//! let frame = capture.capture_frame();
//! assert!(frame.contains("hello"));
//! ```

mod screen;
mod style;

pub use screen::{Screen, TerminalCapture, DEFAULT_COLS, DEFAULT_ROWS};
pub use style::{Attrs, Cell, Color, Style};
