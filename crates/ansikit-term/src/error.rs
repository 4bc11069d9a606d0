// SPDX-License-Identifier: MIT
//
// Error type for the fallible terminal plumbing.
//
// Only the low-level layers return these: terminal devices and the
// `try_*` session operations. Everything a caller sees at the decode
// level is a plain value (a key event, an `Option`) because a stuck
// terminal must never abort the host program.

use std::io;

use thiserror::Error;

/// Failure while reading or changing terminal attributes.
#[derive(Error, Debug)]
pub enum Error {
    /// The input descriptor is not connected to a terminal.
    #[error("standard input is not a terminal")]
    NotATerminal,

    /// `tcgetattr` (or the device's equivalent) failed.
    #[error("failed to read terminal attributes: {0}")]
    GetAttributes(#[source] io::Error),

    /// `tcsetattr` (or the device's equivalent) failed.
    #[error("failed to apply terminal attributes: {0}")]
    SetAttributes(#[source] io::Error),

    /// Writing to the output sink failed.
    #[error("terminal output failed: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
