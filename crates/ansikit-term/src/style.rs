// SPDX-License-Identifier: MIT
//
// SGR styling: the attribute table, stateful setters and string helpers.
//
// Two halves share the session's `AttributeState`:
//
// - The setters (`set_style`, `set_color`, `set_colors_256`, `set_default`)
//   write a control sequence to a sink and record that a style or color is
//   now open (or closed again).
// - The string helpers (`paint`, `stylize`, `fore_color_256`, …) wrap text
//   in a prefix and, normally, a reset suffix. While the matching flag is
//   open the suffix is left off, so helper output placed inside a region
//   opened with a setter doesn't cancel it halfway.
//
// `strip_attributes` and `visible_width` undo the styling for layout.

use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::LazyLock;

use regex::Regex;
use unicode_width::UnicodeWidthStr;

use crate::ansi::CSI;
use crate::state::AttributeState;

// ─── Attribute table ────────────────────────────────────────────────────────

/// An SGR (Select Graphic Rendition) code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Attr {
    // Text styles.
    #[default]
    Normal = 0,
    Bold = 1,
    Dim = 2,
    Italic = 3,
    Underline = 4,
    Blink = 5,
    Overline = 6,
    Inverse = 7,
    Hidden = 8,
    Strike = 9,
    NoBold = 21,
    NoDim = 22,
    NoItalic = 23,
    NoUnderline = 24,
    NoBlink = 25,
    NoOverline = 26,
    NoInverse = 27,
    NoHidden = 28,
    NoStrike = 29,

    // Foreground colors.
    Black = 30,
    Red = 31,
    Green = 32,
    Brown = 33,
    Blue = 34,
    Magenta = 35,
    Cyan = 36,
    Gray = 37,
    /// Introducer for an extended (`38;5;n`) foreground.
    Fore256 = 38,
    Default = 39,
    DarkGray = 90,
    LightRed = 91,
    LightGreen = 92,
    Yellow = 93,
    LightBlue = 94,
    LightMagenta = 95,
    LightCyan = 96,
    White = 97,

    // Background colors.
    OnBlack = 40,
    OnRed = 41,
    OnGreen = 42,
    OnBrown = 43,
    OnBlue = 44,
    OnMagenta = 45,
    OnCyan = 46,
    OnGray = 47,
    /// Introducer for an extended (`48;5;n`) background.
    Back256 = 48,
    OnDefault = 49,
    OnDarkGray = 100,
    OnLightRed = 101,
    OnLightGreen = 102,
    OnYellow = 103,
    OnLightBlue = 104,
    OnLightMagenta = 105,
    OnLightCyan = 106,
    OnWhite = 107,
}

/// Every attribute, in code order within each group.
pub const ALL_ATTRS: [Attr; 55] = [
    Attr::Normal,
    Attr::Bold,
    Attr::Dim,
    Attr::Italic,
    Attr::Underline,
    Attr::Blink,
    Attr::Overline,
    Attr::Inverse,
    Attr::Hidden,
    Attr::Strike,
    Attr::NoBold,
    Attr::NoDim,
    Attr::NoItalic,
    Attr::NoUnderline,
    Attr::NoBlink,
    Attr::NoOverline,
    Attr::NoInverse,
    Attr::NoHidden,
    Attr::NoStrike,
    Attr::Black,
    Attr::Red,
    Attr::Green,
    Attr::Brown,
    Attr::Blue,
    Attr::Magenta,
    Attr::Cyan,
    Attr::Gray,
    Attr::Fore256,
    Attr::Default,
    Attr::DarkGray,
    Attr::LightRed,
    Attr::LightGreen,
    Attr::Yellow,
    Attr::LightBlue,
    Attr::LightMagenta,
    Attr::LightCyan,
    Attr::White,
    Attr::OnBlack,
    Attr::OnRed,
    Attr::OnGreen,
    Attr::OnBrown,
    Attr::OnBlue,
    Attr::OnMagenta,
    Attr::OnCyan,
    Attr::OnGray,
    Attr::Back256,
    Attr::OnDefault,
    Attr::OnDarkGray,
    Attr::OnLightRed,
    Attr::OnLightGreen,
    Attr::OnYellow,
    Attr::OnLightBlue,
    Attr::OnLightMagenta,
    Attr::OnLightCyan,
    Attr::OnWhite,
];

impl Attr {
    /// The numeric SGR code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Look up an attribute by its SGR code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        ALL_ATTRS.iter().copied().find(|a| a.code() == code)
    }

    /// A text style that can be opened: 1–9 or 21–29. `Normal` is a reset,
    /// not a style.
    #[must_use]
    pub const fn is_style(self) -> bool {
        matches!(self.code(), 1..=9 | 21..=29)
    }

    /// One of the sixteen foreground colors.
    #[must_use]
    pub const fn is_fore_color(self) -> bool {
        matches!(self.code(), 30..=37 | 90..=97)
    }

    /// One of the sixteen background colors.
    #[must_use]
    pub const fn is_back_color(self) -> bool {
        matches!(self.code(), 40..=47 | 100..=107)
    }

    #[must_use]
    pub const fn is_color(self) -> bool {
        self.is_fore_color() || self.is_back_color()
    }

    /// The background counterpart of a foreground color. Anything else,
    /// including the 256-color introducer, is returned unchanged.
    #[must_use]
    pub fn to_back(self) -> Self {
        if self.is_fore_color() || self == Self::Default {
            Self::from_code(self.code() + 10).unwrap_or(self)
        } else {
            self
        }
    }

    /// The foreground counterpart of a background color.
    #[must_use]
    pub fn to_fore(self) -> Self {
        if self.is_back_color() || self == Self::OnDefault {
            Self::from_code(self.code() - 10).unwrap_or(self)
        } else {
            self
        }
    }
}

// ─── Setters ────────────────────────────────────────────────────────────────

/// Open a text style. Codes that aren't styles are ignored.
pub fn set_style(w: &mut impl Write, state: &mut AttributeState, style: Attr) -> io::Result<()> {
    if !style.is_style() {
        return Ok(());
    }
    write!(w, "{CSI}{}m", style.code())?;
    state.set_style_open(true);
    Ok(())
}

/// Open a foreground and/or background color.
///
/// Each half is written only if it is a color of the right kind (or the
/// matching default). The color flag is opened regardless.
pub fn set_color(
    w: &mut impl Write,
    state: &mut AttributeState,
    fore: Attr,
    back: Attr,
) -> io::Result<()> {
    if fore.is_fore_color() || fore == Attr::Default {
        write!(w, "{CSI}{}m", fore.code())?;
    }
    if back.is_back_color() || back == Attr::OnDefault {
        write!(w, "{CSI}{}m", back.code())?;
    }
    state.set_color_open(true);
    Ok(())
}

/// Open a 256-palette color pair. Palette index 0 is rejected, as is
/// either half alone; nothing is written in that case.
pub fn set_colors_256(
    w: &mut impl Write,
    state: &mut AttributeState,
    fore: u8,
    back: u8,
) -> io::Result<()> {
    if fore == 0 || back == 0 {
        return Ok(());
    }
    write!(w, "{CSI}38;5;{fore}m{CSI}48;5;{back}m")?;
    state.set_color_open(true);
    Ok(())
}

/// Reset colors, styles, or both, and close the matching flags.
pub fn set_default(
    w: &mut impl Write,
    state: &mut AttributeState,
    color: bool,
    style: bool,
) -> io::Result<()> {
    if color {
        write!(w, "{CSI}39;49m")?;
        state.set_color_open(false);
    }
    if style {
        write!(w, "{CSI}0m")?;
        state.set_style_open(false);
    }
    Ok(())
}

// ─── String helpers ─────────────────────────────────────────────────────────

/// Wrap `text` in a color. The `39;49` reset is appended unless a color
/// is open.
#[must_use]
pub fn paint(state: &AttributeState, text: &str, attr: Attr) -> String {
    if text.is_empty() {
        return String::new();
    }
    let reset = if state.color_open() { "" } else { "\x1b[39;49m" };
    format!("{CSI}{}m{text}{reset}", attr.code())
}

/// Wrap `text` in a style. The `0` reset is appended unless a style is
/// open; `Normal` never gets one.
#[must_use]
pub fn stylize(state: &AttributeState, text: &str, attr: Attr) -> String {
    if text.is_empty() {
        return String::new();
    }
    let reset = if attr == Attr::Normal || state.style_open() {
        ""
    } else {
        "\x1b[0m"
    };
    format!("{CSI}{}m{text}{reset}", attr.code())
}

/// Wrap `text` in a 256-palette foreground. Index 0 leaves `text` as is.
#[must_use]
pub fn fore_color_256(state: &AttributeState, text: &str, color: u8) -> String {
    if text.is_empty() || color == 0 {
        return text.to_owned();
    }
    let reset = if state.color_open() { "" } else { "\x1b[39m" };
    format!("{CSI}38;5;{color}m{text}{reset}")
}

/// Wrap `text` in a 256-palette background. Index 0 leaves `text` as is.
#[must_use]
pub fn back_color_256(state: &AttributeState, text: &str, color: u8) -> String {
    if text.is_empty() || color == 0 {
        return text.to_owned();
    }
    let reset = if state.color_open() { "" } else { "\x1b[49m" };
    format!("{CSI}48;5;{color}m{text}{reset}")
}

/// Wrap `text` in a 256-palette color pair.
#[must_use]
pub fn colors_256(state: &AttributeState, text: &str, fore: u8, back: u8) -> String {
    if text.is_empty() || fore == 0 || back == 0 {
        return text.to_owned();
    }
    let reset = if state.color_open() { "" } else { "\x1b[39;49m" };
    format!("{CSI}38;5;{fore}m{CSI}48;5;{back}m{text}{reset}")
}

// ─── Stripping ──────────────────────────────────────────────────────────────

static SGR_SEQUENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").ok());

/// Remove SGR sequences from `text`. Other control sequences are kept.
#[must_use]
pub fn strip_attributes(text: &str) -> Cow<'_, str> {
    match SGR_SEQUENCE.as_ref() {
        Some(re) => re.replace_all(text, ""),
        None => Cow::Borrowed(text),
    }
}

/// Columns `text` occupies once its SGR sequences are removed.
#[must_use]
pub fn visible_width(text: &str) -> usize {
    strip_attributes(text).width()
}

// ─── Tests ──────────────────────────────────────────────────────────────────
