// SPDX-License-Identifier: MIT
//
// ansikit-term: terminal input core for ansikit.
//
// Puts the terminal into a character-at-a-time mode and back, decodes the
// escape sequences that arrow, function and editing keys send into typed
// key events, and writes the ANSI control and SGR sequences a line-oriented
// text UI needs. No TUI framework underneath, only termios and the byte
// stream.
//
//   device   → read/write termios (TTY or in-memory)
//   session  → enable/disable with snapshot and exact restore
//   source   → non-blocking byte input (stdin or a slice)
//   decoder  → bytes to `KeyEvent`
//   query    → ask the terminal, read its reply
//   ansi     → cursor/screen commands
//   style    → SGR colors and styles
//   terminal → all of the above behind one value

pub mod ansi;
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod key;
pub mod options;
pub mod query;
pub mod session;
pub mod source;
pub mod state;
pub mod style;
pub mod terminal;

pub use error::{Error, Result};
pub use key::{KeyCode, KeyEvent, Meta, MetaCode};
pub use options::{Mode, Reentry, SessionOptions};
pub use session::Session;
pub use terminal::Terminal;
