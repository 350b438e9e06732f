//! Cell and SGR style types.

/// A color as selected by an SGR sequence.
///
/// The variant records exactly what the sequence said, so a captured frame
/// can re-emit the same fragment it was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Basic 16-color palette index (0-7 normal, 8-15 bright).
    Indexed(u8),
    /// 256-color palette index, from `38;5;N` / `48;5;N`.
    Palette(u8),
    /// 24-bit color, from `38;2;R;G;B` / `48;2;R;G;B`.
    Rgb(u8, u8, u8),
}

impl Color {
    /// SGR parameter fragment selecting this color as a foreground.
    fn fg_params(&self, out: &mut Vec<String>) {
        match *self {
            Color::Indexed(i) if i < 8 => out.push((30 + i as u16).to_string()),
            Color::Indexed(i) => out.push((90 + (i as u16 - 8)).to_string()),
            Color::Palette(n) => out.push(format!("38;5;{n}")),
            Color::Rgb(r, g, b) => out.push(format!("38;2;{r};{g};{b}")),
        }
    }

    /// SGR parameter fragment selecting this color as a background.
    fn bg_params(&self, out: &mut Vec<String>) {
        match *self {
            Color::Indexed(i) if i < 8 => out.push((40 + i as u16).to_string()),
            Color::Indexed(i) => out.push((100 + (i as u16 - 8)).to_string()),
            Color::Palette(n) => out.push(format!("48;5;{n}")),
            Color::Rgb(r, g, b) => out.push(format!("48;2;{r};{g};{b}")),
        }
    }
}

/// Text attributes as independently toggleable flags.
///
/// SGR "un-set" codes (22, 23, 24, 25, 27, 29) clear the corresponding flag
/// rather than being ignored, so `1` followed by `22` yields plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attrs {
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub blink: bool,
    pub reverse: bool,
    pub strikethrough: bool,
}

impl Attrs {
    pub fn is_empty(&self) -> bool {
        *self == Attrs::default()
    }

    fn params(&self, out: &mut Vec<String>) {
        if self.bold {
            out.push("1".into());
        }
        if self.dim {
            out.push("2".into());
        }
        if self.italic {
            out.push("3".into());
        }
        if self.underline {
            out.push("4".into());
        }
        if self.blink {
            out.push("5".into());
        }
        if self.reverse {
            out.push("7".into());
        }
        if self.strikethrough {
            out.push("9".into());
        }
    }
}

/// The rendition applied to printed cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub attrs: Attrs,
}

impl Style {
    pub fn is_default(&self) -> bool {
        *self == Style::default()
    }

    /// The escape sequence that reproduces this style from a reset state,
    /// or an empty string for the default style.
    pub fn to_escape(&self) -> String {
        if self.is_default() {
            return String::new();
        }
        let mut params = Vec::new();
        self.attrs.params(&mut params);
        if let Some(fg) = self.fg {
            fg.fg_params(&mut params);
        }
        if let Some(bg) = self.bg {
            bg.bg_params(&mut params);
        }
        format!("\x1b[{}m", params.join(";"))
    }
}

/// One grid cell: a character plus the style it was printed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            ch: ' ',
            style: Style::default(),
        }
    }
}

impl Cell {
    /// A cell that contributes nothing to a captured frame.
    pub fn is_blank(&self) -> bool {
        self.ch == ' ' && self.style.is_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cell_renders_as_space() {
        let cell = Cell::default();
        assert_eq!(cell.ch, ' ');
        assert!(cell.is_blank());
    }

    #[test]
    fn test_basic_color_escape_roundtrip() {
        let style = Style {
            fg: Some(Color::Indexed(1)),
            bg: Some(Color::Indexed(12)),
            attrs: Attrs::default(),
        };
        assert_eq!(style.to_escape(), "\x1b[31;104m");
    }

    #[test]
    fn test_palette_color_emitted_verbatim() {
        let style = Style {
            fg: Some(Color::Palette(196)),
            ..Style::default()
        };
        assert_eq!(style.to_escape(), "\x1b[38;5;196m");
    }

    #[test]
    fn test_truecolor_emitted_verbatim() {
        let style = Style {
            fg: Some(Color::Rgb(255, 0, 0)),
            ..Style::default()
        };
        assert_eq!(style.to_escape(), "\x1b[38;2;255;0;0m");
    }

    #[test]
    fn test_attr_ordering_is_stable() {
        let style = Style {
            attrs: Attrs {
                bold: true,
                underline: true,
                reverse: true,
                ..Attrs::default()
            },
            ..Style::default()
        };
        assert_eq!(style.to_escape(), "\x1b[1;4;7m");
    }

    #[test]
    fn test_default_style_produces_no_escape() {
        assert_eq!(Style::default().to_escape(), "");
    }
}
