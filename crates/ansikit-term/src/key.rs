// SPDX-License-Identifier: MIT
//
// Key events and the dispatch tables behind the escape-sequence decoder.
//
// The decoder consults four tables, each in a different branch of its
// state machine:
//
//   CSI letter   ESC [ A          → arrows, Home/End, F1–F4
//   SS3 letter   ESC O P          → F1–F4
//   CSI number   ESC [ 15 ~       → editing keys, F1–F12
//   modifier     ESC [ 1 ; 5 A    → Shift / Alt / Control combinations
//
// The CSI number table and the modifier table share digits (2, 3, 5, 6
// mean Insert/Delete/PageUp/PageDown in one and Shift/Alt/Control in the
// other). They stay separate tables so a lookup can never cross over.

use std::fmt;

use bitflags::bitflags;

/// The escape byte (0x1B) that opens every key sequence.
pub const ESCAPE: u8 = 0x1B;

/// The byte that follows ESC in a Control Sequence Introducer.
pub const CSI_INTRODUCER: u8 = b'[';

/// The byte that follows ESC in a Single Shift 3 sequence.
pub const SS3_INTRODUCER: u8 = b'O';

// ─── Key codes ──────────────────────────────────────────────────────────────

/// Identity of a special key.
///
/// [`None`](KeyCode::None) is both the initial value of a decode and
/// the result for input that isn't a recognizable key sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyCode {
    #[default]
    None,
    // ── Navigation ──────────────────────────────────────────────
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    // ── Editing ─────────────────────────────────────────────────
    Insert,
    Delete,
    // ── Function keys ───────────────────────────────────────────
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl KeyCode {
    /// Whether this is the "no key" value.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }

    /// The number used for this key in `CSI N ~` form, if it has one.
    ///
    /// Arrows have no numeric form.
    #[must_use]
    pub fn csi_number(self) -> Option<u16> {
        CSI_NUMBERS
            .iter()
            .find(|&&(_, code)| code == self)
            .map(|&(n, _)| n)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Up => "Up",
            Self::Down => "Down",
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Home => "Home",
            Self::End => "End",
            Self::PageUp => "PageUp",
            Self::PageDown => "PageDown",
            Self::Insert => "Insert",
            Self::Delete => "Delete",
            Self::F1 => "F1",
            Self::F2 => "F2",
            Self::F3 => "F3",
            Self::F4 => "F4",
            Self::F5 => "F5",
            Self::F6 => "F6",
            Self::F7 => "F7",
            Self::F8 => "F8",
            Self::F9 => "F9",
            Self::F10 => "F10",
            Self::F11 => "F11",
            Self::F12 => "F12",
        };
        f.write_str(name)
    }
}

// ─── Modifiers ──────────────────────────────────────────────────────────────

/// A single modifier key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaCode {
    Control,
    Shift,
    Alt,
}

bitflags! {
    /// A set of modifier keys.
    ///
    /// Bit layout follows the xterm encoding, where the on-the-wire
    /// parameter is `1 + bits`. Decoding still goes through the explicit
    /// modifier table rather than this arithmetic.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Meta: u8 {
        const SHIFT   = 0b0000_0001;
        const ALT     = 0b0000_0010;
        const CONTROL = 0b0000_0100;
    }
}

impl From<MetaCode> for Meta {
    fn from(code: MetaCode) -> Self {
        match code {
            MetaCode::Control => Self::CONTROL,
            MetaCode::Shift => Self::SHIFT,
            MetaCode::Alt => Self::ALT,
        }
    }
}

impl Meta {
    /// Whether `code` is part of this set.
    #[inline]
    #[must_use]
    pub fn has(self, code: MetaCode) -> bool {
        self.contains(code.into())
    }

    /// The members of this set, in Control / Shift / Alt order.
    pub fn codes(self) -> impl Iterator<Item = MetaCode> {
        [MetaCode::Control, MetaCode::Shift, MetaCode::Alt]
            .into_iter()
            .filter(move |&code| self.has(code))
    }
}

// ─── Key event ──────────────────────────────────────────────────────────────

/// A decoded key: code plus modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub meta: Meta,
}

impl KeyEvent {
    /// `(None, {})`: no input, or input that wasn't a key sequence.
    pub const NONE: Self = Self {
        code: KeyCode::None,
        meta: Meta::empty(),
    };

    /// A key without modifiers.
    #[inline]
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            meta: Meta::empty(),
        }
    }

    /// A key with modifiers.
    #[inline]
    #[must_use]
    pub const fn with_meta(code: KeyCode, meta: Meta) -> Self {
        Self { code, meta }
    }

    #[inline]
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.code.is_none()
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for code in self.meta.codes() {
            let name = match code {
                MetaCode::Control => "Ctrl",
                MetaCode::Shift => "Shift",
                MetaCode::Alt => "Alt",
            };
            write!(f, "{name}+")?;
        }
        write!(f, "{}", self.code)
    }
}

// ─── Dispatch tables ────────────────────────────────────────────────────────

/// Final letters of `ESC [ <letter>` and `ESC [ 1 ; <mod> <letter>`.
const CSI_LETTERS: [(u8, KeyCode); 10] = [
    (b'A', KeyCode::Up),
    (b'B', KeyCode::Down),
    (b'C', KeyCode::Right),
    (b'D', KeyCode::Left),
    (b'F', KeyCode::End),
    (b'H', KeyCode::Home),
    (b'P', KeyCode::F1),
    (b'Q', KeyCode::F2),
    (b'R', KeyCode::F3),
    (b'S', KeyCode::F4),
];

/// Final letters of `ESC O <letter>`.
const SS3_LETTERS: [(u8, KeyCode); 4] = [
    (b'P', KeyCode::F1),
    (b'Q', KeyCode::F2),
    (b'R', KeyCode::F3),
    (b'S', KeyCode::F4),
];

/// Parameters of `ESC [ <n> ~`.
pub(crate) const CSI_NUMBERS: [(u16, KeyCode); 18] = [
    (1, KeyCode::Home),
    (2, KeyCode::Insert),
    (3, KeyCode::Delete),
    (4, KeyCode::End),
    (5, KeyCode::PageUp),
    (6, KeyCode::PageDown),
    (11, KeyCode::F1),
    (12, KeyCode::F2),
    (13, KeyCode::F3),
    (14, KeyCode::F4),
    (15, KeyCode::F5),
    (17, KeyCode::F6),
    (18, KeyCode::F7),
    (19, KeyCode::F8),
    (20, KeyCode::F9),
    (21, KeyCode::F10),
    (23, KeyCode::F11),
    (24, KeyCode::F12),
];

/// Modifier digit of `ESC [ n ; <digit> …`.
const META_DIGITS: [(u8, Meta); 7] = [
    (b'2', Meta::SHIFT),
    (b'3', Meta::ALT),
    (b'4', Meta::SHIFT.union(Meta::ALT)),
    (b'5', Meta::CONTROL),
    (b'6', Meta::SHIFT.union(Meta::CONTROL)),
    (b'7', Meta::ALT.union(Meta::CONTROL)),
    (b'8', Meta::SHIFT.union(Meta::ALT).union(Meta::CONTROL)),
];

fn lookup<K: PartialEq + Copy, V: Copy>(table: &[(K, V)], key: K) -> Option<V> {
    table.iter().find(|&&(k, _)| k == key).map(|&(_, v)| v)
}

/// Resolve the final letter of a CSI sequence.
pub(crate) fn csi_letter(byte: u8) -> KeyCode {
    lookup(&CSI_LETTERS, byte).unwrap_or_default()
}

/// Resolve the final letter of an SS3 sequence.
pub(crate) fn ss3_letter(byte: u8) -> KeyCode {
    lookup(&SS3_LETTERS, byte).unwrap_or_default()
}

/// Resolve the numeric parameter of a `CSI n ~` sequence.
pub(crate) fn csi_number(n: u16) -> KeyCode {
    lookup(&CSI_NUMBERS, n).unwrap_or_default()
}

/// Resolve a modifier digit. Unknown digits carry no modifiers.
pub(crate) fn meta_digit(byte: u8) -> Meta {
    lookup(&META_DIGITS, byte).unwrap_or_default()
}

// ─── Byte classes ───────────────────────────────────────────────────────────

/// Control characters (below space) and DEL.
#[inline]
#[must_use]
pub const fn is_non_printable(byte: u8) -> bool {
    byte < b' ' || byte == 0x7F
}

// ─── Tests ──────────────────────────────────────────────────────────────────
