// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Terminal line-discipline snapshots.
//
// `TerminalConfig` wraps the platform's termios structure. It is captured
// once when a session enables raw mode and written back verbatim when the
// session disables it, so the wrapper never edits a snapshot in place;
// the two derivations (`minimal`, `raw`) return new values.

use std::fmt;

use crate::options::Mode;

/// An opaque snapshot of terminal line-discipline settings.
#[derive(Clone, Copy)]
pub struct TerminalConfig {
    #[cfg(unix)]
    termios: libc::termios,
}

#[cfg(unix)]
impl TerminalConfig {
    /// Wrap a termios structure read from the device.
    #[must_use]
    pub const fn from_termios(termios: libc::termios) -> Self {
        Self { termios }
    }

    /// The wrapped termios structure.
    #[must_use]
    pub const fn termios(&self) -> &libc::termios {
        &self.termios
    }

    /// A typical interactive configuration: canonical input, echo, and
    /// CR→NL translation. Useful as the starting state of in-memory
    /// devices.
    #[must_use]
    pub fn cooked() -> Self {
        let mut config = Self::default();
        config.termios.c_lflag |= libc::ICANON | libc::ECHO | libc::ISIG;
        config.termios.c_iflag |= libc::ICRNL | libc::IXON;
        #[cfg(any(target_os = "linux", target_os = "android", target_vendor = "apple"))]
        {
            config.termios.c_iflag |= libc::IUTF8;
        }
        config.termios.c_oflag |= libc::OPOST;
        config.termios.c_cc[libc::VMIN] = 1;
        config.termios.c_cc[libc::VTIME] = 0;
        config
    }

    /// Line buffering on (`ICANON`).
    #[must_use]
    pub const fn is_canonical(&self) -> bool {
        self.termios.c_lflag & libc::ICANON != 0
    }

    /// Input echo on (`ECHO`).
    #[must_use]
    pub const fn echoes(&self) -> bool {
        self.termios.c_lflag & libc::ECHO != 0
    }

    /// CR→NL input translation on (`ICRNL`).
    #[must_use]
    pub const fn translates_cr(&self) -> bool {
        self.termios.c_iflag & libc::ICRNL != 0
    }

    /// Derive the minimal non-blocking mode: no line buffering, no echo,
    /// no CR→NL translation, no UTF-8 input coalescing.
    #[must_use]
    pub const fn minimal(&self) -> Self {
        let mut termios = self.termios;
        termios.c_lflag &= !(libc::ICANON | libc::ECHO);
        termios.c_iflag &= !(libc::ICRNL | utf8_flag());
        Self { termios }
    }

    /// Derive the platform's fully raw mode (`cfmakeraw`).
    #[must_use]
    pub fn raw(&self) -> Self {
        let mut termios = self.termios;
        unsafe { libc::cfmakeraw(&raw mut termios) };
        Self { termios }
    }
}

#[cfg(all(
    unix,
    any(target_os = "linux", target_os = "android", target_vendor = "apple")
))]
const fn utf8_flag() -> libc::tcflag_t {
    libc::IUTF8
}

#[cfg(all(
    unix,
    not(any(target_os = "linux", target_os = "android", target_vendor = "apple"))
))]
const fn utf8_flag() -> libc::tcflag_t {
    0
}

#[cfg(not(unix))]
impl TerminalConfig {
    #[must_use]
    pub const fn cooked() -> Self {
        Self {}
    }

    #[must_use]
    pub const fn is_canonical(&self) -> bool {
        true
    }

    #[must_use]
    pub const fn echoes(&self) -> bool {
        true
    }

    #[must_use]
    pub const fn translates_cr(&self) -> bool {
        true
    }

    #[must_use]
    pub const fn minimal(&self) -> Self {
        *self
    }

    #[must_use]
    pub const fn raw(&self) -> Self {
        *self
    }
}

impl TerminalConfig {
    /// Derive the configuration for `mode`.
    #[must_use]
    pub fn apply(&self, mode: Mode) -> Self {
        match mode {
            Mode::Minimal => self.minimal(),
            Mode::Raw => self.raw(),
        }
    }
}

/// The zero-value configuration, used when restoring a snapshot that was
/// never captured.
impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            #[cfg(unix)]
            termios: unsafe { std::mem::zeroed() },
        }
    }
}

#[cfg(unix)]
impl PartialEq for TerminalConfig {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.termios, &other.termios);
        a.c_iflag == b.c_iflag
            && a.c_oflag == b.c_oflag
            && a.c_cflag == b.c_cflag
            && a.c_lflag == b.c_lflag
            && a.c_cc == b.c_cc
    }
}

#[cfg(not(unix))]
impl PartialEq for TerminalConfig {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for TerminalConfig {}

#[cfg(unix)]
impl fmt::Debug for TerminalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        for (name, set) in [
            ("ICANON", self.termios.c_lflag & libc::ICANON != 0),
            ("ECHO", self.termios.c_lflag & libc::ECHO != 0),
            ("ISIG", self.termios.c_lflag & libc::ISIG != 0),
            ("IEXTEN", self.termios.c_lflag & libc::IEXTEN != 0),
            ("ICRNL", self.termios.c_iflag & libc::ICRNL != 0),
            ("IXON", self.termios.c_iflag & libc::IXON != 0),
            ("OPOST", self.termios.c_oflag & libc::OPOST != 0),
        ] {
            if set {
                flags.push(name);
            }
        }
        f.debug_struct("TerminalConfig")
            .field("flags", &flags)
            .field("vmin", &self.termios.c_cc[libc::VMIN])
            .field("vtime", &self.termios.c_cc[libc::VTIME])
            .finish()
    }
}

#[cfg(not(unix))]
impl fmt::Debug for TerminalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TerminalConfig")
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
