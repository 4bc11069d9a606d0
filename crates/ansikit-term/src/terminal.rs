// SPDX-License-Identifier: MIT
//
// Terminal facade: a session, an input source and an output sink together.
//
// Safety: the window-size query uses `ioctl(TIOCGWINSZ)`, the standard
// POSIX interface for it.
#![allow(unsafe_code)]
//
// `Terminal` is what most programs want: one value that owns the session,
// reads keys from stdin and writes to stdout. Every operation forwards to
// the free functions in `decoder`, `query` and `style`, which remain
// available for callers that manage the pieces themselves.
//
// Dropping a `Terminal` flushes the sink and restores the terminal if raw
// mode is still on.

use std::io::{self, Write};
use std::time::Duration;

use crate::ansi;
use crate::decoder;
use crate::device::{TerminalDevice, TtyDevice};
use crate::error::Result;
use crate::key::KeyEvent;
use crate::options::SessionOptions;
use crate::query::{self, Position};
use crate::session::Session;
use crate::source::{ByteSource, StdinSource};
use crate::style::{self, Attr};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

impl Size {
    /// Total number of cells (`cols × rows`).
    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.cols as u32 * self.rows as u32
    }
}

/// Query the window size of stdout via `ioctl(TIOCGWINSZ)`.
///
/// Returns `None` if stdout is not a terminal or reports a zero size.
/// Unlike [`query::screen_size`] this needs no reply from the terminal.
#[cfg(unix)]
#[must_use]
pub fn window_size() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &raw mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    } else {
        None
    }
}

#[cfg(not(unix))]
#[must_use]
pub fn window_size() -> Option<Size> {
    None
}

// ─── Terminal ───────────────────────────────────────────────────────────────

/// A terminal session with its input and output.
///
/// ```no_run
/// use ansikit_term::terminal::Terminal;
///
/// let mut term = Terminal::new();
/// loop {
///     let key = term.read_key();
///     if !key.is_none() {
///         println!("{key}");
///     }
/// #   break;
/// }
/// ```
pub struct Terminal<D = TtyDevice, S = StdinSource, W = io::Stdout>
where
    D: TerminalDevice,
    S: ByteSource,
    W: Write,
{
    session: Session<D>,
    source: S,
    out: W,
}

impl Terminal {
    /// The terminal on stdin/stdout with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(SessionOptions::default())
    }

    /// The terminal on stdin/stdout.
    #[must_use]
    pub fn with_options(options: SessionOptions) -> Self {
        Self::with_parts(TtyDevice::stdin(), StdinSource::new(), io::stdout(), options)
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: TerminalDevice, S: ByteSource, W: Write> Terminal<D, S, W> {
    /// Assemble a terminal from its parts.
    pub fn with_parts(device: D, source: S, out: W, options: SessionOptions) -> Self {
        Self {
            session: Session::with_device(device, options),
            source,
            out,
        }
    }

    #[inline]
    #[must_use]
    pub const fn session(&self) -> &Session<D> {
        &self.session
    }

    #[inline]
    #[must_use]
    pub const fn session_mut(&mut self) -> &mut Session<D> {
        &mut self.session
    }

    #[inline]
    #[must_use]
    pub const fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    #[inline]
    #[must_use]
    pub const fn output(&self) -> &W {
        &self.out
    }

    #[inline]
    #[must_use]
    pub const fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    // ── Mode ────────────────────────────────────────────────────────────

    pub fn enable(&mut self) {
        self.session.enable();
    }

    pub fn disable(&mut self) {
        self.session.disable();
    }

    #[inline]
    #[must_use]
    pub const fn is_raw_mode_active(&self) -> bool {
        self.session.is_active()
    }

    // ── Input ───────────────────────────────────────────────────────────

    /// See [`decoder::read_key`].
    pub fn read_key(&mut self) -> KeyEvent {
        decoder::read_key(&mut self.session, &mut self.source)
    }

    /// See [`decoder::decode_escape`].
    pub fn decode_escape(&mut self) -> KeyEvent {
        decoder::decode_escape(&mut self.source)
    }

    /// See [`decoder::key_pressed`].
    pub fn key_pressed(&mut self) -> bool {
        decoder::key_pressed(&mut self.session, &mut self.source)
    }

    pub fn read_code(&mut self) -> Option<u8> {
        decoder::read_code(&mut self.source)
    }

    pub fn read_char(&mut self) -> Option<char> {
        decoder::read_char(&mut self.source)
    }

    pub fn discard_pending(&mut self) -> usize {
        decoder::discard_pending(&mut self.source)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn cursor_position(&mut self) -> Option<Position> {
        query::cursor_position(&mut self.session, &mut self.source, &mut self.out)
    }

    pub fn screen_size(&mut self) -> Option<Size> {
        query::screen_size(&mut self.session, &mut self.source, &mut self.out)
    }

    // ── Output ──────────────────────────────────────────────────────────

    /// Write `text` and flush.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the sink fails.
    pub fn write(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    /// Write `text`, a newline, and flush.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the sink fails.
    pub fn writeln(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }

    /// Write `text`, flush, then block for `pause`. Used to pace output
    /// such as splash screens and demos.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the sink fails;
    /// the pause is skipped then.
    pub fn write_then_pause(&mut self, text: &str, pause: Duration) -> Result<()> {
        self.write(text)?;
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
        Ok(())
    }

    /// Drop unread input and/or flush pending output. Returns the number
    /// of input bytes discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the flush fails.
    pub fn clear_buffer(&mut self, input: bool, output: bool) -> Result<usize> {
        let discarded = if input { self.discard_pending() } else { 0 };
        if output {
            self.out.flush()?;
        }
        Ok(discarded)
    }

    /// Run an [`ansi`](crate::ansi) command against the sink and flush.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the sink fails.
    pub fn command<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut W) -> io::Result<()>,
    {
        f(&mut self.out)?;
        self.out.flush()?;
        Ok(())
    }

    // ── Screen modes ────────────────────────────────────────────────────

    /// Show the cursor and remember that it is visible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the sink fails;
    /// the flag is left unchanged then.
    pub fn cursor_on(&mut self) -> Result<()> {
        self.command(|w| ansi::cursor_on(w))?;
        self.session.screen_mut().set_cursor_visible(true);
        Ok(())
    }

    /// Hide the cursor and remember that it is hidden.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the sink fails.
    pub fn cursor_off(&mut self) -> Result<()> {
        self.command(|w| ansi::cursor_off(w))?;
        self.session.screen_mut().set_cursor_visible(false);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the sink fails.
    pub fn enable_replace_mode(&mut self) -> Result<()> {
        self.command(|w| ansi::enable_replace_mode(w))?;
        self.session.screen_mut().set_replacing(true);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the sink fails.
    pub fn disable_replace_mode(&mut self) -> Result<()> {
        self.command(|w| ansi::disable_replace_mode(w))?;
        self.session.screen_mut().set_replacing(false);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub const fn is_cursor_visible(&self) -> bool {
        self.session.cursor_visible()
    }

    #[inline]
    #[must_use]
    pub const fn is_replacing(&self) -> bool {
        self.session.replacing()
    }

    // ── Styling ─────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn color_open(&self) -> bool {
        self.session.color_open()
    }

    #[inline]
    pub const fn set_color_open(&mut self, open: bool) {
        self.session.set_color_open(open);
    }

    #[inline]
    #[must_use]
    pub const fn style_open(&self) -> bool {
        self.session.style_open()
    }

    #[inline]
    pub const fn set_style_open(&mut self, open: bool) {
        self.session.set_style_open(open);
    }

    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the sink fails.
    pub fn set_style(&mut self, attr: Attr) -> Result<()> {
        style::set_style(&mut self.out, self.session.attributes_mut(), attr)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the sink fails.
    pub fn set_color(&mut self, fore: Attr, back: Attr) -> Result<()> {
        style::set_color(&mut self.out, self.session.attributes_mut(), fore, back)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the sink fails.
    pub fn set_colors_256(&mut self, fore: u8, back: u8) -> Result<()> {
        style::set_colors_256(&mut self.out, self.session.attributes_mut(), fore, back)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the sink fails.
    pub fn set_default(&mut self, color: bool, style: bool) -> Result<()> {
        style::set_default(&mut self.out, self.session.attributes_mut(), color, style)?;
        Ok(())
    }

    /// See [`style::paint`].
    #[must_use]
    pub fn paint(&self, text: &str, attr: Attr) -> String {
        style::paint(self.session.attributes(), text, attr)
    }

    /// See [`style::stylize`].
    #[must_use]
    pub fn stylize(&self, text: &str, attr: Attr) -> String {
        style::stylize(self.session.attributes(), text, attr)
    }
}

impl<D: TerminalDevice, S: ByteSource, W: Write> Drop for Terminal<D, S, W> {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
