//! The screen model: fixed-size cell grids driven by escape-sequence dispatch.
//!
//! `Screen` implements `vte::Perform` and holds all terminal state: primary
//! and alternate buffers, cursor, scroll region, and the current SGR style.
//! `TerminalCapture` pairs a `Screen` with a `vte::Parser` so callers can
//! feed raw output chunks without worrying about sequences split across
//! chunk boundaries (the parser buffers incomplete sequences internally).

use vte::{Params, Parser, Perform};

use crate::style::{Cell, Color, Style};

/// Fallback grid width when the real terminal size is unknown.
pub const DEFAULT_COLS: u16 = 80;
/// Fallback grid height when the real terminal size is unknown.
pub const DEFAULT_ROWS: u16 = 24;

#[derive(Debug, Clone, Copy)]
struct Cursor {
    x: usize,
    y: usize,
    saved: Option<(usize, usize)>,
    visible: bool,
    autowrap: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor {
            x: 0,
            y: 0,
            saved: None,
            visible: true,
            autowrap: true,
        }
    }
}

/// Virtual terminal screen with primary and alternate buffers.
///
/// Dimensions are fixed at creation; a resize means creating a new `Screen`.
pub struct Screen {
    cols: usize,
    rows: usize,
    primary: Vec<Vec<Cell>>,
    alternate: Vec<Vec<Cell>>,
    in_alt_screen: bool,
    cursor: Cursor,
    // Inclusive (top, bottom) row indices.
    scroll_region: (usize, usize),
    style: Style,
    last_frame: Option<String>,
    alt_exit_pending: bool,
}

fn blank_row(cols: usize) -> Vec<Cell> {
    vec![Cell::default(); cols]
}

fn blank_grid(cols: usize, rows: usize) -> Vec<Vec<Cell>> {
    vec![blank_row(cols); rows]
}

impl Screen {
    pub fn new(cols: u16, rows: u16) -> Self {
        let cols = cols.max(1) as usize;
        let rows = rows.max(1) as usize;
        Screen {
            cols,
            rows,
            primary: blank_grid(cols, rows),
            alternate: blank_grid(cols, rows),
            in_alt_screen: false,
            cursor: Cursor::default(),
            scroll_region: (0, rows - 1),
            style: Style::default(),
            last_frame: None,
            alt_exit_pending: false,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn in_alt_screen(&self) -> bool {
        self.in_alt_screen
    }

    /// Cursor position, for assertions in tests and diagnostics.
    pub fn cursor_position(&self) -> (usize, usize) {
        (self.cursor.x, self.cursor.y)
    }

    /// True at most once per alternate-screen exit event.
    pub fn alt_screen_exited(&mut self) -> bool {
        std::mem::take(&mut self.alt_exit_pending)
    }

    /// The frame snapshotted at the most recent alternate-screen exit.
    ///
    /// Taking the frame also clears the exit-pending flag.
    pub fn take_last_frame(&mut self) -> Option<String> {
        self.alt_exit_pending = false;
        self.last_frame.take()
    }

    fn active(&self) -> &Vec<Vec<Cell>> {
        if self.in_alt_screen {
            &self.alternate
        } else {
            &self.primary
        }
    }

    fn active_mut(&mut self) -> &mut Vec<Vec<Cell>> {
        if self.in_alt_screen {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    /// Serialize the active buffer: rows joined by `\n`, trailing blank rows
    /// dropped, minimal SGR fragments re-emitted at style-run boundaries.
    pub fn capture_frame(&self) -> String {
        let buf = self.active();
        let last_row = buf
            .iter()
            .rposition(|row| row.iter().any(|c| !c.is_blank()))
            .map(|i| i + 1)
            .unwrap_or(0);

        let mut out = String::new();
        for (i, row) in buf[..last_row].iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let end = row
                .iter()
                .rposition(|c| !c.is_blank())
                .map(|i| i + 1)
                .unwrap_or(0);
            let mut current = Style::default();
            for cell in &row[..end] {
                if cell.style != current {
                    if !current.is_default() {
                        out.push_str("\x1b[0m");
                    }
                    out.push_str(&cell.style.to_escape());
                    current = cell.style;
                }
                out.push(cell.ch);
            }
            if !current.is_default() {
                out.push_str("\x1b[0m");
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Cursor and scrolling primitives
    // ------------------------------------------------------------------

    fn clamp_cursor(&mut self) {
        self.cursor.x = self.cursor.x.min(self.cols - 1);
        self.cursor.y = self.cursor.y.min(self.rows - 1);
    }

    fn linefeed(&mut self) {
        let (_, bottom) = self.scroll_region;
        if self.cursor.y == bottom {
            self.scroll_up(1);
        } else if self.cursor.y + 1 < self.rows {
            self.cursor.y += 1;
        }
    }

    fn reverse_index(&mut self) {
        let (top, _) = self.scroll_region;
        if self.cursor.y == top {
            self.scroll_down(1);
        } else if self.cursor.y > 0 {
            self.cursor.y -= 1;
        }
    }

    fn scroll_up(&mut self, n: usize) {
        let (top, bottom) = self.scroll_region;
        let cols = self.cols;
        let n = n.min(bottom - top + 1);
        let buf = self.active_mut();
        for _ in 0..n {
            buf.remove(top);
            buf.insert(bottom, blank_row(cols));
        }
    }

    fn scroll_down(&mut self, n: usize) {
        let (top, bottom) = self.scroll_region;
        let cols = self.cols;
        let n = n.min(bottom - top + 1);
        let buf = self.active_mut();
        for _ in 0..n {
            buf.remove(bottom);
            buf.insert(top, blank_row(cols));
        }
    }

    fn save_cursor(&mut self) {
        self.cursor.saved = Some((self.cursor.x, self.cursor.y));
    }

    fn restore_cursor(&mut self) {
        if let Some((x, y)) = self.cursor.saved {
            self.cursor.x = x;
            self.cursor.y = y;
            self.clamp_cursor();
        }
    }

    fn reset(&mut self) {
        self.primary = blank_grid(self.cols, self.rows);
        self.alternate = blank_grid(self.cols, self.rows);
        self.in_alt_screen = false;
        self.cursor = Cursor::default();
        self.scroll_region = (0, self.rows - 1);
        self.style = Style::default();
    }

    // ------------------------------------------------------------------
    // Alternate screen
    // ------------------------------------------------------------------

    fn enter_alt_screen(&mut self) {
        if self.in_alt_screen {
            return;
        }
        // Fresh buffer every time: no bleed-through from an earlier session.
        self.alternate = blank_grid(self.cols, self.rows);
        self.in_alt_screen = true;
        tracing::debug!("entered alternate screen");
    }

    fn exit_alt_screen(&mut self) {
        if !self.in_alt_screen {
            return;
        }
        // Snapshot before switching; the content vanishes with the switch.
        self.last_frame = Some(self.capture_frame());
        self.in_alt_screen = false;
        self.alt_exit_pending = true;
        tracing::debug!("exited alternate screen, frame snapshotted");
    }

    // ------------------------------------------------------------------
    // Erase / edit operations
    // ------------------------------------------------------------------

    fn erase_in_display(&mut self, mode: u16) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let (cols, rows) = (self.cols, self.rows);
        let buf = self.active_mut();
        match mode {
            0 => {
                for cell in &mut buf[y][x..] {
                    *cell = Cell::default();
                }
                for row in &mut buf[y + 1..] {
                    *row = blank_row(cols);
                }
            }
            1 => {
                for row in &mut buf[..y] {
                    *row = blank_row(cols);
                }
                for cell in &mut buf[y][..=x.min(cols - 1)] {
                    *cell = Cell::default();
                }
            }
            2 | 3 => {
                *buf = blank_grid(cols, rows);
            }
            _ => {}
        }
    }

    fn erase_in_line(&mut self, mode: u16) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let cols = self.cols;
        let row = &mut self.active_mut()[y];
        match mode {
            0 => {
                for cell in &mut row[x..] {
                    *cell = Cell::default();
                }
            }
            1 => {
                for cell in &mut row[..=x.min(cols - 1)] {
                    *cell = Cell::default();
                }
            }
            2 => {
                *row = blank_row(cols);
            }
            _ => {}
        }
    }

    fn insert_lines(&mut self, n: usize) {
        let (top, bottom) = self.scroll_region;
        let y = self.cursor.y;
        if y < top || y > bottom {
            return;
        }
        let cols = self.cols;
        let n = n.min(bottom - y + 1);
        let buf = self.active_mut();
        for _ in 0..n {
            buf.remove(bottom);
            buf.insert(y, blank_row(cols));
        }
    }

    fn delete_lines(&mut self, n: usize) {
        let (top, bottom) = self.scroll_region;
        let y = self.cursor.y;
        if y < top || y > bottom {
            return;
        }
        let cols = self.cols;
        let n = n.min(bottom - y + 1);
        let buf = self.active_mut();
        for _ in 0..n {
            buf.remove(y);
            buf.insert(bottom, blank_row(cols));
        }
    }

    fn insert_chars(&mut self, n: usize) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let cols = self.cols;
        let n = n.min(cols - x);
        let row = &mut self.active_mut()[y];
        for _ in 0..n {
            row.insert(x, Cell::default());
            row.pop();
        }
    }

    fn delete_chars(&mut self, n: usize) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let cols = self.cols;
        let n = n.min(cols - x);
        let row = &mut self.active_mut()[y];
        row.drain(x..x + n);
        row.resize(cols, Cell::default());
    }

    fn erase_chars(&mut self, n: usize) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let end = (x + n).min(self.cols);
        for cell in &mut self.active_mut()[y][x..end] {
            *cell = Cell::default();
        }
    }

    // ------------------------------------------------------------------
    // SGR
    // ------------------------------------------------------------------

    fn set_graphics_rendition(&mut self, params: &Params) {
        if params.is_empty() {
            self.style = Style::default();
            return;
        }
        let mut iter = params.iter();
        while let Some(p) = iter.next() {
            match p[0] {
                0 => self.style = Style::default(),
                1 => self.style.attrs.bold = true,
                2 => self.style.attrs.dim = true,
                3 => self.style.attrs.italic = true,
                4 => self.style.attrs.underline = true,
                5 => self.style.attrs.blink = true,
                7 => self.style.attrs.reverse = true,
                9 => self.style.attrs.strikethrough = true,
                22 => {
                    self.style.attrs.bold = false;
                    self.style.attrs.dim = false;
                }
                23 => self.style.attrs.italic = false,
                24 => self.style.attrs.underline = false,
                25 => self.style.attrs.blink = false,
                27 => self.style.attrs.reverse = false,
                29 => self.style.attrs.strikethrough = false,
                30..=37 => self.style.fg = Some(Color::Indexed((p[0] - 30) as u8)),
                38 => self.style.fg = extended_color(p, &mut iter),
                39 => self.style.fg = None,
                40..=47 => self.style.bg = Some(Color::Indexed((p[0] - 40) as u8)),
                48 => self.style.bg = extended_color(p, &mut iter),
                49 => self.style.bg = None,
                90..=97 => self.style.fg = Some(Color::Indexed((p[0] - 90 + 8) as u8)),
                100..=107 => self.style.bg = Some(Color::Indexed((p[0] - 100 + 8) as u8)),
                _ => {}
            }
        }
    }
}

/// Parse a `38`/`48` extended color, handling both colon subparameters
/// (`38:5:196` arrives as one slice) and semicolon parameters (`38;5;196`
/// arrives as three, pulled from the iterator).
fn extended_color<'a>(p: &[u16], iter: &mut impl Iterator<Item = &'a [u16]>) -> Option<Color> {
    if p.len() >= 2 {
        match p[1] {
            5 if p.len() >= 3 => return Some(Color::Palette(p[2] as u8)),
            2 if p.len() >= 5 => {
                return Some(Color::Rgb(p[2] as u8, p[3] as u8, p[4] as u8));
            }
            _ => return None,
        }
    }
    match iter.next().map(|p| p[0]) {
        Some(5) => iter.next().map(|p| Color::Palette(p[0] as u8)),
        Some(2) => {
            let r = iter.next().map(|p| p[0])?;
            let g = iter.next().map(|p| p[0])?;
            let b = iter.next().map(|p| p[0])?;
            Some(Color::Rgb(r as u8, g as u8, b as u8))
        }
        _ => None,
    }
}

fn first_param(params: &Params) -> u16 {
    params.iter().next().map(|p| p[0]).unwrap_or(0)
}

fn nth_param(params: &Params, idx: usize) -> u16 {
    params.iter().nth(idx).map(|p| p[0]).unwrap_or(0)
}

/// First parameter with the "missing or zero means one" movement convention.
fn count_param(params: &Params) -> usize {
    first_param(params).max(1) as usize
}

impl Perform for Screen {
    fn print(&mut self, c: char) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let style = self.style;
        self.active_mut()[y][x] = Cell { ch: c, style };
        self.cursor.x += 1;
        if self.cursor.x >= self.cols {
            if self.cursor.autowrap {
                self.cursor.x = 0;
                self.linefeed();
            } else {
                self.cursor.x = self.cols - 1;
            }
        }
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\r' => self.cursor.x = 0,
            b'\n' | 0x0b | 0x0c => self.linefeed(),
            0x08 => self.cursor.x = self.cursor.x.saturating_sub(1),
            b'\t' => {
                let next = (self.cursor.x / 8 + 1) * 8;
                self.cursor.x = next.min(self.cols - 1);
            }
            // BEL and everything else: no effect on captured content.
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        let private = intermediates.first() == Some(&b'?');
        match action {
            'A' => self.cursor.y = self.cursor.y.saturating_sub(count_param(params)),
            'B' | 'e' => self.cursor.y = (self.cursor.y + count_param(params)).min(self.rows - 1),
            'C' | 'a' => self.cursor.x = (self.cursor.x + count_param(params)).min(self.cols - 1),
            'D' => self.cursor.x = self.cursor.x.saturating_sub(count_param(params)),
            'E' => {
                self.cursor.x = 0;
                self.cursor.y = (self.cursor.y + count_param(params)).min(self.rows - 1);
            }
            'F' => {
                self.cursor.x = 0;
                self.cursor.y = self.cursor.y.saturating_sub(count_param(params));
            }
            'G' | '`' => self.cursor.x = (count_param(params) - 1).min(self.cols - 1),
            'd' => self.cursor.y = (count_param(params) - 1).min(self.rows - 1),
            'H' | 'f' => {
                let row = nth_param(params, 0).max(1) as usize;
                let col = nth_param(params, 1).max(1) as usize;
                self.cursor.y = (row - 1).min(self.rows - 1);
                self.cursor.x = (col - 1).min(self.cols - 1);
            }
            'J' => self.erase_in_display(first_param(params)),
            'K' => self.erase_in_line(first_param(params)),
            'L' => self.insert_lines(count_param(params)),
            'M' => self.delete_lines(count_param(params)),
            '@' => self.insert_chars(count_param(params)),
            'P' => self.delete_chars(count_param(params)),
            'X' => self.erase_chars(count_param(params)),
            'S' => self.scroll_up(count_param(params)),
            'T' => self.scroll_down(count_param(params)),
            'm' => self.set_graphics_rendition(params),
            'r' => {
                let top = nth_param(params, 0).max(1) as usize - 1;
                let bottom = match nth_param(params, 1) as usize {
                    0 => self.rows - 1,
                    b => (b - 1).min(self.rows - 1),
                };
                if top < bottom {
                    self.scroll_region = (top, bottom);
                    self.cursor.x = 0;
                    self.cursor.y = 0;
                }
            }
            's' => self.save_cursor(),
            'u' => self.restore_cursor(),
            'h' | 'l' if private => {
                let enable = action == 'h';
                for p in params.iter() {
                    match p[0] {
                        25 => self.cursor.visible = enable,
                        7 => self.cursor.autowrap = enable,
                        47 | 1047 => {
                            if enable {
                                self.enter_alt_screen();
                            } else {
                                self.exit_alt_screen();
                            }
                        }
                        1049 => {
                            if enable {
                                self.save_cursor();
                                self.enter_alt_screen();
                                self.cursor.x = 0;
                                self.cursor.y = 0;
                            } else {
                                self.exit_alt_screen();
                                self.restore_cursor();
                            }
                        }
                        _ => {}
                    }
                }
            }
            'h' | 'l' => {}
            _ => {
                tracing::trace!(action = %action, "unhandled CSI action");
            }
        }
        self.clamp_cursor();
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        if !intermediates.is_empty() {
            // Charset selection (ESC ( x and friends): accepted, ignored.
            return;
        }
        match byte {
            b'c' => self.reset(),
            b'D' => self.linefeed(),
            b'E' => {
                self.cursor.x = 0;
                self.linefeed();
            }
            b'M' => self.reverse_index(),
            b'7' => self.save_cursor(),
            b'8' => self.restore_cursor(),
            // Tab set, keypad modes: accepted, no effect on captured text.
            b'H' | b'=' | b'>' => {}
            _ => {}
        }
    }

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {
        // Title setting and friends carry no captured content.
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}
}

/// A `Screen` paired with its incremental parser.
///
/// This is the stable capture interface: `process` accepts arbitrary byte
/// chunks from a live stream; sequences split across chunks are buffered by
/// the parser and replayed once complete.
pub struct TerminalCapture {
    parser: Parser,
    screen: Screen,
}

impl TerminalCapture {
    pub fn new(cols: u16, rows: u16) -> Self {
        TerminalCapture {
            parser: Parser::new(),
            screen: Screen::new(cols, rows),
        }
    }

    /// Feed a chunk of raw program output into the screen model.
    pub fn process(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.parser.advance(&mut self.screen, byte);
        }
    }

    pub fn capture_frame(&self) -> String {
        self.screen.capture_frame()
    }

    pub fn alt_screen_exited(&mut self) -> bool {
        self.screen.alt_screen_exited()
    }

    pub fn take_last_frame(&mut self) -> Option<String> {
        self.screen.take_last_frame()
    }

    pub fn in_alt_screen(&self) -> bool {
        self.screen.in_alt_screen()
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }
}

// ============================================================================
// Tests
// ============================================================================
