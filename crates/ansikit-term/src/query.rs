// SPDX-License-Identifier: MIT
//
// Request/response queries.
//
// Some facts about the terminal are only available by asking it: write a
// control sequence, then read the terminal's reply from the input stream.
// Both sides share the stream with the user's keystrokes, so the reply is
// read in raw mode (otherwise it would sit in the line buffer and be echoed
// onto the screen) and each byte is awaited for a bounded time. A terminal
// that doesn't answer costs `query_timeout`, not a hang.
//
// Keystrokes that arrive before the reply are read along with it. The
// reply starts at the last ESC; everything before that is handed back to
// the source so the decoder still sees it.

use std::io::Write;

use tracing::trace;

use crate::device::TerminalDevice;
use crate::key::ESCAPE;
use crate::session::Session;
use crate::source::ByteSource;
use crate::terminal::Size;

/// Device Status Report: cursor position. Reply `ESC [ row ; col R`.
pub const CURSOR_POSITION_REQUEST: &[u8] = b"\x1b[6n";

/// Text area size in characters. Reply `ESC [ 8 ; rows ; cols t`.
pub const SCREEN_SIZE_REQUEST: &[u8] = b"\x1b[18t";

/// A 1-based cursor position as reported by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub row: u16,
    pub col: u16,
}

/// Write `command` to `out` and read the reply up to and including `end`.
///
/// The reply runs from the last ESC to `end`. Bytes read before it are
/// returned to `source` with [`ByteSource::unread`], on success and
/// failure alike, and an `end` byte seen before any ESC is taken for a
/// keystroke.
///
/// Raw mode is held for the duration of the exchange and restored to
/// whatever it was before. Returns `None` if raw mode cannot be entered,
/// the write fails, the terminal stops answering for longer than the
/// session's `query_timeout`, input ends, or the reply grows beyond
/// `max_response_len` without `end`.
pub fn request<D, S, W>(
    session: &mut Session<D>,
    source: &mut S,
    out: &mut W,
    command: &[u8],
    end: u8,
) -> Option<Vec<u8>>
where
    D: TerminalDevice,
    S: ByteSource + ?Sized,
    W: Write + ?Sized,
{
    let guard = session.raw_mode();
    if !guard.is_active() {
        return None;
    }
    let timeout = guard.options().query_timeout();
    let limit = guard.options().max_response_len();

    if let Err(err) = out.write_all(command).and_then(|()| out.flush()) {
        trace!(%err, "query write failed");
        return None;
    }

    let mut response = Vec::with_capacity(limit);
    while response.len() < limit {
        if !source.wait_readable(timeout) {
            trace!(read = response.len(), "query timed out");
            hand_back_typeahead(source, &mut response);
            return None;
        }
        let Some(byte) = source.read_byte() else {
            hand_back_typeahead(source, &mut response);
            return None;
        };
        response.push(byte);
        if byte == end && response.contains(&ESCAPE) {
            hand_back_typeahead(source, &mut response);
            trace!(?response, "query answered");
            return Some(response);
        }
    }

    trace!(limit, "query response too long");
    hand_back_typeahead(source, &mut response);
    None
}

/// Return everything before the last ESC in `response` to `source`,
/// leaving only the reply (or a partial one) in `response`.
fn hand_back_typeahead<S: ByteSource + ?Sized>(source: &mut S, response: &mut Vec<u8>) {
    let start = response
        .iter()
        .rposition(|&b| b == ESCAPE)
        .unwrap_or(response.len());
    if start == 0 {
        return;
    }
    let reply = response.split_off(start);
    trace!(typeahead = ?response, "keystrokes ahead of the reply handed back");
    source.unread(response.as_slice());
    *response = reply;
}

/// Ask the terminal where the cursor is.
pub fn cursor_position<D, S, W>(
    session: &mut Session<D>,
    source: &mut S,
    out: &mut W,
) -> Option<Position>
where
    D: TerminalDevice,
    S: ByteSource + ?Sized,
    W: Write + ?Sized,
{
    let response = request(session, source, out, CURSOR_POSITION_REQUEST, b'R')?;
    parse_cursor_position(&response)
}

/// Ask the terminal for the size of its text area.
pub fn screen_size<D, S, W>(session: &mut Session<D>, source: &mut S, out: &mut W) -> Option<Size>
where
    D: TerminalDevice,
    S: ByteSource + ?Sized,
    W: Write + ?Sized,
{
    let response = request(session, source, out, SCREEN_SIZE_REQUEST, b't')?;
    parse_screen_size(&response)
}

/// Parse `ESC [ row ; col R`.
#[must_use]
pub fn parse_cursor_position(response: &[u8]) -> Option<Position> {
    match csi_params(response, b'R')?.as_slice() {
        &[row, col] => Some(Position { row, col }),
        _ => None,
    }
}

/// Parse `ESC [ 8 ; rows ; cols t`.
#[must_use]
pub fn parse_screen_size(response: &[u8]) -> Option<Size> {
    match csi_params(response, b't')?.as_slice() {
        &[8, rows, cols] => Some(Size { cols, rows }),
        _ => None,
    }
}

/// The numeric parameters of the last `ESC [ … <end>` in `response`.
fn csi_params(response: &[u8], end: u8) -> Option<Vec<u16>> {
    let start = response.iter().rposition(|&b| b == ESCAPE)?;
    let body = response[start + 1..]
        .strip_prefix(b"[")?
        .strip_suffix(&[end])?;

    body.split(|&b| b == b';')
        .map(|param| {
            if param.is_empty() || !param.iter().all(u8::is_ascii_digit) {
                return None;
            }
            std::str::from_utf8(param).ok()?.parse().ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDevice;
    use crate::options::SessionOptions;
    use crate::source::SliceSource;
    use pretty_assertions::assert_eq;

    fn session() -> Session<MemoryDevice> {
        Session::with_device(MemoryDevice::default(), SessionOptions::default())
    }

    #[test]
    fn cursor_position_round_trip() {
        let mut s = session();
        let mut src = SliceSource::new(b"\x1b[12;40R");
        let mut out = Vec::new();
        let pos = cursor_position(&mut s, &mut src, &mut out);
        assert_eq!(pos, Some(Position { row: 12, col: 40 }));
        assert_eq!(out, CURSOR_POSITION_REQUEST);
        assert!(!s.is_active());
    }

    #[test]
    fn screen_size_round_trip() {
        let mut s = session();
        let mut src = SliceSource::new(b"\x1b[8;24;80t");
        let mut out = Vec::new();
        let size = screen_size(&mut s, &mut src, &mut out);
        assert_eq!(size, Some(Size { cols: 80, rows: 24 }));
        assert_eq!(out, SCREEN_SIZE_REQUEST);
    }

    #[test]
    fn request_stops_at_end_byte() {
        let mut s = session();
        let mut src = SliceSource::new(b"\x1b[1;1Rextra");
        let mut out = Vec::new();
        let reply = request(&mut s, &mut src, &mut out, b"?", b'R');
        assert_eq!(reply.as_deref(), Some(&b"\x1b[1;1R"[..]));
        assert_eq!(src.remaining(), b"extra");
    }

    #[test]
    fn no_answer_is_none() {
        let mut s = session();
        let mut src = SliceSource::new(b"");
        let mut out = Vec::new();
        assert_eq!(cursor_position(&mut s, &mut src, &mut out), None);
        assert!(!s.is_active());
    }

    #[test]
    fn truncated_answer_is_none() {
        let mut s = session();
        let mut src = SliceSource::new(b"\x1b[12;4");
        let mut out = Vec::new();
        assert_eq!(cursor_position(&mut s, &mut src, &mut out), None);
    }

    #[test]
    fn oversize_answer_is_abandoned() {
        let mut s = Session::with_device(
            MemoryDevice::default(),
            SessionOptions::builder().max_response_len(8).build(),
        );
        let mut src = SliceSource::new(b"\x1b[123456789;1R");
        let mut out = Vec::new();
        assert_eq!(cursor_position(&mut s, &mut src, &mut out), None);
        assert_eq!(src.consumed(), 8);
    }

    #[test]
    fn failing_device_sends_nothing() {
        let mut s = Session::with_device(MemoryDevice::failing(), SessionOptions::default());
        let mut src = SliceSource::new(b"\x1b[1;1R");
        let mut out = Vec::new();
        assert_eq!(cursor_position(&mut s, &mut src, &mut out), None);
        assert!(out.is_empty());
        assert_eq!(src.consumed(), 0);
    }

    #[test]
    fn active_session_stays_active() {
        let mut s = session();
        s.enable();
        let mut src = SliceSource::new(b"\x1b[3;7R");
        let mut out = Vec::new();
        assert_eq!(
            cursor_position(&mut s, &mut src, &mut out),
            Some(Position { row: 3, col: 7 })
        );
        assert!(s.is_active());
    }

    #[test]
    fn typeahead_is_handed_back_to_the_source() {
        let mut s = session();
        let mut src = SliceSource::new(b"ab\x1b[5;6Rrest");
        let mut out = Vec::new();
        assert_eq!(
            cursor_position(&mut s, &mut src, &mut out),
            Some(Position { row: 5, col: 6 })
        );
        assert_eq!(src.remaining(), b"abrest");
    }

    #[test]
    fn end_byte_typed_before_reply_is_a_keystroke() {
        let mut s = session();
        let mut src = SliceSource::new(b"R\x1b[2;3R");
        let mut out = Vec::new();
        let reply = request(&mut s, &mut src, &mut out, CURSOR_POSITION_REQUEST, b'R');
        assert_eq!(reply.as_deref(), Some(&b"\x1b[2;3R"[..]));
        assert_eq!(src.remaining(), b"R");
    }

    #[test]
    fn typeahead_survives_a_missing_reply() {
        let mut s = session();
        let mut src = SliceSource::new(b"xy\x1b[1");
        let mut out = Vec::new();
        assert_eq!(cursor_position(&mut s, &mut src, &mut out), None);
        assert_eq!(src.remaining(), b"xy");
    }

    #[test]
    fn parse_starts_at_last_escape() {
        assert_eq!(
            parse_cursor_position(b"ab\x1b[A\x1b[5;6R"),
            Some(Position { row: 5, col: 6 })
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(parse_cursor_position(b"\x1b[5R"), None);
        assert_eq!(parse_cursor_position(b"\x1b[5;R"), None);
        assert_eq!(parse_cursor_position(b"\x1b[5;xR"), None);
        assert_eq!(parse_cursor_position(b"\x1b5;6R"), None);
        assert_eq!(parse_cursor_position(b"5;6R"), None);
        assert_eq!(parse_screen_size(b"\x1b[4;24;80t"), None);
        assert_eq!(parse_screen_size(b"\x1b[8;24t"), None);
    }

    #[test]
    fn parse_overflow_is_none() {
        assert_eq!(parse_cursor_position(b"\x1b[70000;1R"), None);
    }

    #[test]
    fn failing_writer_is_none() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut s = session();
        let mut src = SliceSource::new(b"\x1b[1;1R");
        assert_eq!(cursor_position(&mut s, &mut src, &mut Broken), None);
        assert_eq!(src.consumed(), 0);
        assert!(!s.is_active());
    }
}
