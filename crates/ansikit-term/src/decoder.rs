// SPDX-License-Identifier: MIT
//
// Escape-sequence decoder.
//
// Pulls bytes one at a time from a `ByteSource` and resolves them into a
// `KeyEvent`. The grammar is the legacy VT100/xterm subset:
//
//   ESC [ <letter>                 arrows, Home, End, F1–F4
//   ESC O <letter>                 F1–F4 (SS3 form)
//   ESC [ <n> ~                    editing keys, F1–F12
//   ESC [ <n> ; <mod> ~            the same with modifiers
//   ESC [ 1 ; <mod> <letter>       arrows / Home / End / F1–F4 with modifiers
//
// # Consumption
//
// The decoder reads exactly the bytes its grammar asks for and no more.
// On a mismatch it stops where it is: the bytes read so far are gone,
// nothing after them has been touched. This is a best-effort decoder over
// a live stream, not a validator.
//
// # Blocking
//
// `read_key` never waits for a *first* byte. It checks readiness and
// returns `KeyEvent::NONE` when nothing is pending. Once it has seen ESC
// it does read the rest of the sequence with plain reads, which may wait
// briefly; a terminal that sends ESC sends the rest right after.
//
// End of input mid-sequence ends the decode with whatever was resolved.

use tracing::trace;

use crate::device::TerminalDevice;
use crate::key::{self, CSI_INTRODUCER, ESCAPE, KeyCode, KeyEvent, Meta, SS3_INTRODUCER};
use crate::session::Session;
use crate::source::{ByteSource, CHUNK_SIZE};

/// Decode one key from `source`.
///
/// Raw mode is enabled for the duration of the call if it wasn't already,
/// then restored. Returns [`KeyEvent::NONE`] when no input is pending,
/// when the first byte isn't ESC (that byte is consumed), when the
/// sequence isn't recognized, or when raw mode cannot be entered.
pub fn read_key<D, S>(session: &mut Session<D>, source: &mut S) -> KeyEvent
where
    D: TerminalDevice,
    S: ByteSource + ?Sized,
{
    let guard = session.raw_mode();
    if !guard.is_active() {
        return KeyEvent::NONE;
    }

    if !source.poll_readable() {
        return KeyEvent::NONE;
    }

    match source.read_byte() {
        Some(ESCAPE) => decode_escape(source),
        _ => KeyEvent::NONE,
    }
}

/// Decode the rest of an escape sequence whose ESC byte has already been
/// consumed by the caller.
pub fn decode_escape<S: ByteSource + ?Sized>(source: &mut S) -> KeyEvent {
    let event = match source.read_byte() {
        Some(CSI_INTRODUCER) => decode_csi(source),
        Some(SS3_INTRODUCER) => decode_ss3(source),
        Some(other) => {
            trace!(byte = other, "unrecognized escape introducer");
            KeyEvent::NONE
        }
        None => KeyEvent::NONE,
    };

    if event.is_none() {
        trace!("escape sequence rejected");
    }
    event
}

/// `ESC O <letter>`: exactly three bytes, never modifiers.
fn decode_ss3<S: ByteSource + ?Sized>(source: &mut S) -> KeyEvent {
    match source.read_byte() {
        Some(b) if b.is_ascii_uppercase() => KeyEvent::new(key::ss3_letter(b)),
        _ => KeyEvent::NONE,
    }
}

/// Everything after `ESC [`.
fn decode_csi<S: ByteSource + ?Sized>(source: &mut S) -> KeyEvent {
    match source.read_byte() {
        Some(b) if b.is_ascii_uppercase() => KeyEvent::new(key::csi_letter(b)),
        Some(b) if b.is_ascii_digit() => decode_csi_number(source, b),
        _ => KeyEvent::NONE,
    }
}

/// `ESC [ <digits> …`, where `first` is the first digit, already consumed.
fn decode_csi_number<S: ByteSource + ?Sized>(source: &mut S, first: u8) -> KeyEvent {
    let mut n = u16::from(first - b'0');
    let terminator = loop {
        match source.read_byte() {
            Some(b) if b.is_ascii_digit() => {
                n = n.saturating_mul(10).saturating_add(u16::from(b - b'0'));
            }
            Some(b) => break b,
            None => return KeyEvent::NONE,
        }
    };

    if terminator != b';' {
        // Usually `~`; consumed without further checks.
        return KeyEvent::new(key::csi_number(n));
    }

    let meta = match source.read_byte() {
        Some(b) if b.is_ascii_digit() => key::meta_digit(b),
        Some(_) => Meta::empty(),
        None => return KeyEvent::NONE,
    };

    let code = if n == 1 {
        // `ESC [ 1 ; <mod> <letter>`
        match source.read_byte() {
            Some(b) if b.is_ascii_uppercase() => key::csi_letter(b),
            _ => KeyCode::None,
        }
    } else {
        // `ESC [ <n> ; <mod> ~`: the key is known before the `~` arrives.
        let code = key::csi_number(n);
        let _ = source.read_byte();
        code
    };

    if code.is_none() {
        KeyEvent::NONE
    } else {
        KeyEvent::with_meta(code, meta)
    }
}

// ─── Plain primitives ───────────────────────────────────────────────────────

/// Whether input is pending.
///
/// Enables raw mode first if needed and leaves it on: in canonical mode
/// nothing becomes readable until Enter is pressed, so a caller polling
/// for keystrokes needs the session to stay raw between polls.
pub fn key_pressed<D, S>(session: &mut Session<D>, source: &mut S) -> bool
where
    D: TerminalDevice,
    S: ByteSource + ?Sized,
{
    if !session.is_active() {
        session.enable();
    }
    source.poll_readable()
}

/// Read one raw byte.
pub fn read_code<S: ByteSource + ?Sized>(source: &mut S) -> Option<u8> {
    source.read_byte()
}

/// Read one UTF-8 encoded character.
///
/// Returns `None` at end of input or when the bytes don't form a valid
/// character; the bytes read are consumed either way.
pub fn read_char<S: ByteSource + ?Sized>(source: &mut S) -> Option<char> {
    let lead = source.read_byte()?;
    let len = utf8_char_len(lead);
    if len == 0 {
        return None;
    }

    let mut buf = [lead, 0, 0, 0];
    for slot in buf.iter_mut().take(len).skip(1) {
        *slot = source.read_byte()?;
    }
    std::str::from_utf8(&buf[..len]).ok()?.chars().next()
}

/// Drop all pending input. Returns the number of bytes discarded.
pub fn discard_pending<S: ByteSource + ?Sized>(source: &mut S) -> usize {
    let mut total = 0;
    while source.poll_readable() {
        let chunk = source.read_bytes(CHUNK_SIZE);
        if chunk.is_empty() {
            break;
        }
        total += chunk.len();
    }
    total
}

/// Expected byte length of a UTF-8 character from its lead byte.
/// Returns 0 for invalid lead bytes (continuation bytes, 0xF8..).
const fn utf8_char_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 0,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDevice;
    use crate::key::CSI_NUMBERS;
    use crate::options::SessionOptions;
    use crate::source::SliceSource;
    use pretty_assertions::assert_eq;

    fn session() -> Session<MemoryDevice> {
        Session::with_device(MemoryDevice::default(), SessionOptions::default())
    }

    /// Decode `data` with a fresh session, returning the event and source.
    fn decode(data: &[u8]) -> (KeyEvent, SliceSource) {
        let mut s = session();
        let mut src = SliceSource::new(data);
        let ev = read_key(&mut s, &mut src);
        (ev, src)
    }

    /// Decode `data`, asserting the whole input was consumed.
    fn decode_all(data: &[u8]) -> KeyEvent {
        let (ev, src) = decode(data);
        assert_eq!(src.remaining(), b"", "unconsumed input after {data:?}");
        ev
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code)
    }

    fn key_mod(code: KeyCode, meta: Meta) -> KeyEvent {
        KeyEvent::with_meta(code, meta)
    }

    // ── Non-escape input ────────────────────────────────────────────

    #[test]
    fn empty_input_is_none() {
        let (ev, src) = decode(b"");
        assert_eq!(ev, KeyEvent::NONE);
        assert_eq!(src.byte_reads(), 0);
    }

    #[test]
    fn plain_byte_consumes_exactly_one() {
        for data in [&b"a"[..], b"abc", b"[A", b"\r\n", b"\x7f"] {
            let (ev, src) = decode(data);
            assert_eq!(ev, KeyEvent::NONE, "{data:?}");
            assert_eq!(src.consumed(), 1, "{data:?}");
            assert_eq!(src.byte_reads(), 1, "{data:?}");
        }
    }

    // ── CSI letters ─────────────────────────────────────────────────

    #[test]
    fn arrows() {
        assert_eq!(decode_all(b"\x1b[A"), key(KeyCode::Up));
        assert_eq!(decode_all(b"\x1b[B"), key(KeyCode::Down));
        assert_eq!(decode_all(b"\x1b[C"), key(KeyCode::Right));
        assert_eq!(decode_all(b"\x1b[D"), key(KeyCode::Left));
    }

    #[test]
    fn home_end_letters() {
        assert_eq!(decode_all(b"\x1b[H"), key(KeyCode::Home));
        assert_eq!(decode_all(b"\x1b[F"), key(KeyCode::End));
    }

    #[test]
    fn csi_function_letters() {
        assert_eq!(decode_all(b"\x1b[P"), key(KeyCode::F1));
        assert_eq!(decode_all(b"\x1b[S"), key(KeyCode::F4));
    }

    #[test]
    fn unknown_csi_letter_is_none() {
        assert_eq!(decode_all(b"\x1b[Z"), KeyEvent::NONE);
    }

    #[test]
    fn arrow_reads_three_bytes() {
        let (ev, src) = decode(b"\x1b[Axyz");
        assert_eq!(ev, key(KeyCode::Up));
        assert_eq!(src.byte_reads(), 3);
        assert_eq!(src.remaining(), b"xyz");
    }

    // ── SS3 ─────────────────────────────────────────────────────────

    #[test]
    fn ss3_function_keys() {
        assert_eq!(decode_all(b"\x1bOP"), key(KeyCode::F1));
        assert_eq!(decode_all(b"\x1bOQ"), key(KeyCode::F2));
        assert_eq!(decode_all(b"\x1bOR"), key(KeyCode::F3));
        assert_eq!(decode_all(b"\x1bOS"), key(KeyCode::F4));
    }

    #[test]
    fn ss3_unmapped_letter() {
        let (ev, src) = decode(b"\x1bOZ!");
        assert_eq!(ev, KeyEvent::NONE);
        assert_eq!(src.consumed(), 3);
    }

    #[test]
    fn ss3_lowercase_is_none() {
        assert_eq!(decode_all(b"\x1bOp"), KeyEvent::NONE);
    }

    #[test]
    fn ss3_never_reads_past_three_bytes() {
        let (_, src) = decode(b"\x1bOP;5");
        assert_eq!(src.byte_reads(), 3);
        assert_eq!(src.remaining(), b";5");
    }

    // ── CSI numbers ─────────────────────────────────────────────────

    #[test]
    fn editing_keys() {
        assert_eq!(decode_all(b"\x1b[1~"), key(KeyCode::Home));
        assert_eq!(decode_all(b"\x1b[2~"), key(KeyCode::Insert));
        assert_eq!(decode_all(b"\x1b[3~"), key(KeyCode::Delete));
        assert_eq!(decode_all(b"\x1b[4~"), key(KeyCode::End));
        assert_eq!(decode_all(b"\x1b[5~"), key(KeyCode::PageUp));
        assert_eq!(decode_all(b"\x1b[6~"), key(KeyCode::PageDown));
    }

    #[test]
    fn two_digit_function_keys() {
        assert_eq!(decode_all(b"\x1b[15~"), key(KeyCode::F5));
        assert_eq!(decode_all(b"\x1b[21~"), key(KeyCode::F10));
        assert_eq!(decode_all(b"\x1b[24~"), key(KeyCode::F12));
    }

    #[test]
    fn every_numeric_code_round_trips() {
        for &(n, code) in &CSI_NUMBERS {
            let seq = format!("\x1b[{n}~");
            let (ev, src) = decode(seq.as_bytes());
            assert_eq!(ev, key(code), "CSI {n} ~");
            assert_eq!(src.remaining(), b"", "CSI {n} ~");
            assert_eq!(code.csi_number(), Some(n));
        }
    }

    #[test]
    fn numeric_gap_is_none_but_consumed() {
        let (ev, src) = decode(b"\x1b[16~x");
        assert_eq!(ev, KeyEvent::NONE);
        assert_eq!(src.remaining(), b"x");
    }

    #[test]
    fn terminator_is_not_validated() {
        assert_eq!(decode_all(b"\x1b[3$"), key(KeyCode::Delete));
    }

    #[test]
    fn delete_reads_four_bytes() {
        let (_, src) = decode(b"\x1b[3~\x1b[A");
        assert_eq!(src.byte_reads(), 4);
        assert_eq!(src.remaining(), b"\x1b[A");
    }

    #[test]
    fn huge_number_saturates() {
        assert_eq!(decode_all(b"\x1b[99999999~"), KeyEvent::NONE);
    }

    // ── Modifiers ───────────────────────────────────────────────────

    #[test]
    fn ctrl_up() {
        assert_eq!(decode_all(b"\x1b[1;5A"), key_mod(KeyCode::Up, Meta::CONTROL));
    }

    #[test]
    fn modified_letters() {
        assert_eq!(decode_all(b"\x1b[1;2B"), key_mod(KeyCode::Down, Meta::SHIFT));
        assert_eq!(decode_all(b"\x1b[1;3C"), key_mod(KeyCode::Right, Meta::ALT));
        assert_eq!(
            decode_all(b"\x1b[1;4D"),
            key_mod(KeyCode::Left, Meta::SHIFT | Meta::ALT)
        );
        assert_eq!(
            decode_all(b"\x1b[1;6H"),
            key_mod(KeyCode::Home, Meta::SHIFT | Meta::CONTROL)
        );
        assert_eq!(
            decode_all(b"\x1b[1;7F"),
            key_mod(KeyCode::End, Meta::ALT | Meta::CONTROL)
        );
        assert_eq!(decode_all(b"\x1b[1;8P"), key_mod(KeyCode::F1, Meta::all()));
    }

    #[test]
    fn modified_numeric_keys() {
        assert_eq!(decode_all(b"\x1b[3;5~"), key_mod(KeyCode::Delete, Meta::CONTROL));
        assert_eq!(decode_all(b"\x1b[2;2~"), key_mod(KeyCode::Insert, Meta::SHIFT));
        assert_eq!(decode_all(b"\x1b[15;2~"), key_mod(KeyCode::F5, Meta::SHIFT));
        assert_eq!(decode_all(b"\x1b[24;5~"), key_mod(KeyCode::F12, Meta::CONTROL));
    }

    #[test]
    fn modifier_digits_do_not_become_keys() {
        // 5 is PageUp as a key number but Control as a modifier.
        assert_eq!(decode_all(b"\x1b[6;5~"), key_mod(KeyCode::PageDown, Meta::CONTROL));
    }

    #[test]
    fn ctrl_up_reads_six_bytes() {
        let (_, src) = decode(b"\x1b[1;5Arest");
        assert_eq!(src.byte_reads(), 6);
        assert_eq!(src.remaining(), b"rest");
    }

    #[test]
    fn unknown_modifier_digit_has_no_meta() {
        assert_eq!(decode_all(b"\x1b[1;9A"), key(KeyCode::Up));
    }

    #[test]
    fn modified_unknown_letter_is_none() {
        assert_eq!(decode_all(b"\x1b[1;5Z"), KeyEvent::NONE);
    }

    // ── Malformed and truncated ─────────────────────────────────────

    #[test]
    fn unknown_introducer() {
        let (ev, src) = decode(b"\x1bxyz");
        assert_eq!(ev, KeyEvent::NONE);
        assert_eq!(src.consumed(), 2);
    }

    #[test]
    fn lone_escape() {
        let (ev, src) = decode(b"\x1b");
        assert_eq!(ev, KeyEvent::NONE);
        assert_eq!(src.consumed(), 1);
    }

    #[test]
    fn csi_with_punctuation() {
        let (ev, src) = decode(b"\x1b[<0;1;1M");
        assert_eq!(ev, KeyEvent::NONE);
        assert_eq!(src.consumed(), 3);
    }

    #[test]
    fn truncated_sequences_do_not_hang() {
        for data in [
            &b"\x1b["[..],
            b"\x1bO",
            b"\x1b[1",
            b"\x1b[15",
            b"\x1b[1;",
            b"\x1b[1;5",
        ] {
            assert_eq!(decode_all(data), KeyEvent::NONE, "{data:?}");
        }
    }

    #[test]
    fn missing_tilde_after_modifier_keeps_key() {
        assert_eq!(decode_all(b"\x1b[3;5"), key_mod(KeyCode::Delete, Meta::CONTROL));
    }

    // ── Session interaction ─────────────────────────────────────────

    #[test]
    fn restores_mode_it_found() {
        let mut s = session();
        let mut src = SliceSource::new(b"\x1b[A");
        assert_eq!(read_key(&mut s, &mut src), key(KeyCode::Up));
        assert!(!s.is_active());
        assert_eq!(*s.device().current(), crate::config::TerminalConfig::cooked());
    }

    #[test]
    fn leaves_active_session_active() {
        let mut s = session();
        s.enable();
        let mut src = SliceSource::new(b"\x1b[B");
        assert_eq!(read_key(&mut s, &mut src), key(KeyCode::Down));
        assert!(s.is_active());
    }

    #[test]
    fn failing_device_reads_nothing() {
        let mut s = Session::with_device(MemoryDevice::failing(), SessionOptions::default());
        let mut src = SliceSource::new(b"\x1b[A");
        assert_eq!(read_key(&mut s, &mut src), KeyEvent::NONE);
        assert_eq!(src.polls(), 0);
        assert_eq!(src.consumed(), 0);
    }

    #[test]
    fn consecutive_keys() {
        let mut s = session();
        let mut src = SliceSource::new(b"\x1b[A\x1bOP\x1b[15~\x1b[1;5C");
        assert_eq!(read_key(&mut s, &mut src), key(KeyCode::Up));
        assert_eq!(read_key(&mut s, &mut src), key(KeyCode::F1));
        assert_eq!(read_key(&mut s, &mut src), key(KeyCode::F5));
        assert_eq!(read_key(&mut s, &mut src), key_mod(KeyCode::Right, Meta::CONTROL));
        assert_eq!(read_key(&mut s, &mut src), KeyEvent::NONE);
    }

    // ── Plain primitives ────────────────────────────────────────────

    #[test]
    fn decode_escape_after_caller_read() {
        let mut src = SliceSource::new(b"\x1b[3~");
        assert_eq!(read_code(&mut src), Some(ESCAPE));
        assert_eq!(decode_escape(&mut src), key(KeyCode::Delete));
    }

    #[test]
    fn key_pressed_leaves_raw_mode_on() {
        let mut s = session();
        let mut src = SliceSource::new(b"x");
        assert!(key_pressed(&mut s, &mut src));
        assert!(s.is_active());
        let mut empty = SliceSource::new(b"");
        assert!(!key_pressed(&mut s, &mut empty));
    }

    #[test]
    fn read_char_ascii_and_utf8() {
        let mut src = SliceSource::new("aé日🦀".as_bytes());
        assert_eq!(read_char(&mut src), Some('a'));
        assert_eq!(read_char(&mut src), Some('é'));
        assert_eq!(read_char(&mut src), Some('日'));
        assert_eq!(read_char(&mut src), Some('🦀'));
        assert_eq!(read_char(&mut src), None);
    }

    #[test]
    fn read_char_rejects_invalid() {
        let mut src = SliceSource::new(&[0x80, b'a']);
        assert_eq!(read_char(&mut src), None);
        assert_eq!(read_char(&mut src), Some('a'));
    }

    #[test]
    fn read_char_truncated() {
        let mut src = SliceSource::new(&[0xE6, 0x97]);
        assert_eq!(read_char(&mut src), None);
        assert_eq!(src.consumed(), 2);
    }

    #[test]
    fn discard_pending_drains_everything() {
        let data = vec![b'x'; CHUNK_SIZE * 2 + 5];
        let mut src = SliceSource::new(&data);
        assert_eq!(discard_pending(&mut src), data.len());
        assert_eq!(src.chunk_reads(), 3);
        assert!(!src.poll_readable());
    }

    #[test]
    fn utf8_lengths() {
        assert_eq!(utf8_char_len(b'a'), 1);
        assert_eq!(utf8_char_len(0xC3), 2);
        assert_eq!(utf8_char_len(0xE6), 3);
        assert_eq!(utf8_char_len(0xF0), 4);
        assert_eq!(utf8_char_len(0x80), 0);
        assert_eq!(utf8_char_len(0xFF), 0);
    }
}
