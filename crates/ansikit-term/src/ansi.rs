// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write control sequences to any `impl Write`. No state
// and no buffering decisions: callers pick the sink and decide when to flush.
//
// Positions and counts are passed through as-is. Rows and columns are
// 1-based, as the terminal sees them.
//
// Reference: https://invisible-island.net/xterm/ctlseqs/ctlseqs.html
use std::io::{self, Write};

/// Escape.
pub const ESC: &str = "\x1b";
/// Single Shift Select of G2 charset.
pub const SS2: &str = "\x1bN";
/// Single Shift Select of G3 charset.
pub const SS3: &str = "\x1bO";
/// Device Control String.
pub const DCS: &str = "\x1bP";
/// Control Sequence Introducer.
pub const CSI: &str = "\x1b[";
/// Operating System Command.
pub const OSC: &str = "\x1b]";

// Powerline separator glyphs (Private Use Area; need a patched font).

/// Solid right-pointing triangle.
pub const RIGHT_TRIANGLE: char = '\u{e0b0}';
/// Solid left-pointing triangle.
pub const LEFT_TRIANGLE: char = '\u{e0b2}';
/// Thin right-pointing angle.
pub const RIGHT_ANGLE: char = '\u{e0b1}';
/// Thin left-pointing angle.
pub const LEFT_ANGLE: char = '\u{e0b3}';

// ─── Cursor movement ────────────────────────────────────────────────────────

/// Move the cursor up `n` rows (CUU).
#[inline]
pub fn move_up(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "{CSI}{n}A")
}

/// Move the cursor down `n` rows (CUD).
#[inline]
pub fn move_down(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "{CSI}{n}B")
}

/// Move the cursor right `n` columns (CUF).
#[inline]
pub fn move_right(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "{CSI}{n}C")
}

/// Move the cursor left `n` columns (CUB).
#[inline]
pub fn move_left(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "{CSI}{n}D")
}

/// Move to the start of the line `n` rows down (CNL).
#[inline]
pub fn move_line_down(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "{CSI}{n}E")
}

/// Move to the start of the line `n` rows up (CPL).
#[inline]
pub fn move_line_up(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "{CSI}{n}F")
}

/// Move to column `col` of the current row (CHA).
#[inline]
pub fn move_to_column(w: &mut impl Write, col: u16) -> io::Result<()> {
    write!(w, "{CSI}{col}G")
}

/// Move the cursor to `(row, col)` (CUP).
#[inline]
pub fn move_to(w: &mut impl Write, row: u16, col: u16) -> io::Result<()> {
    write!(w, "{CSI}{row};{col}H")
}

// ─── Cursor state ───────────────────────────────────────────────────────────

/// Save the cursor position.
///
/// `ansi` selects the SCO form `CSI s`; otherwise the DEC form `ESC 7`,
/// which also saves attributes and is the one macOS Terminal honours.
#[inline]
pub fn store_cursor(w: &mut impl Write, ansi: bool) -> io::Result<()> {
    if ansi {
        write!(w, "{CSI}s")
    } else {
        write!(w, "{ESC}7")
    }
}

/// Restore the position saved by [`store_cursor`] with the same `ansi` flag.
#[inline]
pub fn restore_cursor(w: &mut impl Write, ansi: bool) -> io::Result<()> {
    if ansi {
        write!(w, "{CSI}u")
    } else {
        write!(w, "{ESC}8")
    }
}

/// Whether [`store_cursor`]/[`restore_cursor`] should use the SCO form on
/// this platform.
#[must_use]
pub const fn prefers_ansi_cursor_save() -> bool {
    !cfg!(target_os = "macos")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_on(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_off(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Cursor shape for [`set_cursor_style`].
///
/// The discriminant is the blinking DECSCUSR code; the steady variant is
/// one higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CursorStyle {
    #[default]
    Block = 1,
    /// Underline.
    Line = 3,
    /// I-beam.
    Bar = 5,
}

/// Set the cursor shape (DECSCUSR).
#[inline]
pub fn set_cursor_style(w: &mut impl Write, style: CursorStyle, blinking: bool) -> io::Result<()> {
    let n = style as u8 + u8::from(!blinking);
    write!(w, "{CSI}{n} q")
}

// ─── Erasing ────────────────────────────────────────────────────────────────

/// Clear from the cursor to the end of the screen (ED 0).
#[inline]
pub fn clear_below(w: &mut impl Write) -> io::Result<()> {
    write!(w, "{CSI}0J")
}

/// Clear from the start of the screen to the cursor (ED 1).
#[inline]
pub fn clear_above(w: &mut impl Write) -> io::Result<()> {
    write!(w, "{CSI}1J")
}

/// Clear the whole screen (ED 2) and home the cursor.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    write!(w, "{CSI}2J{CSI}H")
}

/// Clear from the cursor to the end of the line (EL 0).
#[inline]
pub fn clear_to_end_of_line(w: &mut impl Write) -> io::Result<()> {
    write!(w, "{CSI}0K")
}

/// Clear from the start of the line to the cursor (EL 1).
#[inline]
pub fn clear_to_start_of_line(w: &mut impl Write) -> io::Result<()> {
    write!(w, "{CSI}1K")
}

/// Clear the current line (EL 2).
#[inline]
pub fn clear_line(w: &mut impl Write) -> io::Result<()> {
    write!(w, "{CSI}2K")
}

// ─── Editing ────────────────────────────────────────────────────────────────

/// Insert `n` blank lines at the cursor (IL).
#[inline]
pub fn insert_line(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "{CSI}{n}L")
}

/// Delete `n` lines at the cursor (DL).
#[inline]
pub fn delete_line(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "{CSI}{n}M")
}

/// Delete `n` characters at the cursor (DCH).
#[inline]
pub fn delete_char(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "{CSI}{n}P")
}

/// Typed characters overwrite (IRM reset).
#[inline]
pub fn enable_replace_mode(w: &mut impl Write) -> io::Result<()> {
    write!(w, "{CSI}4l")
}

/// Typed characters are inserted (IRM set).
#[inline]
pub fn disable_replace_mode(w: &mut impl Write) -> io::Result<()> {
    write!(w, "{CSI}4h")
}

/// Restrict scrolling to rows `top..=bottom` (DECSTBM).
#[inline]
pub fn scroll_region(w: &mut impl Write, top: u16, bottom: u16) -> io::Result<()> {
    write!(w, "{CSI}{top};{bottom}r")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
