// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Byte sources: where the decoder gets its input.
//
// The decoder needs three things from its input: a non-blocking "is a
// byte waiting?" check, a single-byte read, and a chunked read. The
// `ByteSource` trait captures that, plus a way to hand bytes back. `StdinSource` implements it
// over the process's standard input with `poll(2)` and `read(2)`;
// `SliceSource` replays a fixed byte string and counts every call, so
// decoder behavior (including how many bytes a sequence consumes) can
// be checked without a terminal.
//
// Reads go straight to the file descriptor, bypassing Rust's buffered
// `io::stdin()`. A buffered reader would pull pending bytes into user
// space where `poll()` can no longer see them. The one exception is
// input handed back with `unread`: it is held in the source and served
// before anything new from the descriptor.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::trace;

/// Chunk size used when draining pending input.
pub const CHUNK_SIZE: usize = 64;

/// The read primitive the decoder consumes.
pub trait ByteSource {
    /// Whether a byte can be read right now without blocking.
    fn poll_readable(&mut self) -> bool;

    /// Wait up to `timeout` for a byte to become readable.
    ///
    /// The default only performs the immediate check.
    fn wait_readable(&mut self, _timeout: Duration) -> bool {
        self.poll_readable()
    }

    /// Read one byte. `None` on end of input or error.
    fn read_byte(&mut self) -> Option<u8>;

    /// Read up to `n` bytes. May return fewer on end of input or error.
    fn read_bytes(&mut self, n: usize) -> Vec<u8>;

    /// Hand `bytes` back so the next reads return them first, in order.
    ///
    /// Sources that cannot hold input back drop it; the default does.
    fn unread(&mut self, bytes: &[u8]) {
        trace!(len = bytes.len(), "source cannot hold input back, dropped");
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn poll_readable(&mut self) -> bool {
        (**self).poll_readable()
    }

    fn wait_readable(&mut self, timeout: Duration) -> bool {
        (**self).wait_readable(timeout)
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn read_bytes(&mut self, n: usize) -> Vec<u8> {
        (**self).read_bytes(n)
    }

    fn unread(&mut self, bytes: &[u8]) {
        (**self).unread(bytes);
    }
}

// ─── Stdin ──────────────────────────────────────────────────────────────────

/// Standard input as a byte source.
#[derive(Debug, Default, Clone)]
pub struct StdinSource {
    /// Input handed back with `unread`, served first.
    held: VecDeque<u8>,
}

impl StdinSource {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: VecDeque::new(),
        }
    }

    /// Take up to `n` held-back bytes.
    fn take_held(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.held.len());
        self.held.drain(..n).collect()
    }

    fn hold(&mut self, bytes: &[u8]) {
        for &byte in bytes.iter().rev() {
            self.held.push_front(byte);
        }
    }
}

#[cfg(unix)]
impl StdinSource {
    /// `poll()` stdin for readability. Negative timeout blocks.
    fn poll_ms(timeout_ms: i32) -> bool {
        let ready = unsafe {
            let mut pfd = libc::pollfd {
                fd: libc::STDIN_FILENO,
                events: libc::POLLIN,
                revents: 0,
            };
            libc::poll(&raw mut pfd, 1, timeout_ms)
        };
        ready > 0
    }

    /// `read()` into `buf`, retrying on `EINTR`. Returns bytes read.
    fn read_into(buf: &mut [u8]) -> usize {
        loop {
            let n = unsafe {
                libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len())
            };
            if n >= 0 {
                #[allow(clippy::cast_sign_loss)] // n >= 0 checked above.
                return n as usize;
            }
            if std::io::Error::last_os_error().kind() != std::io::ErrorKind::Interrupted {
                return 0;
            }
        }
    }
}

#[cfg(unix)]
impl ByteSource for StdinSource {
    fn poll_readable(&mut self) -> bool {
        !self.held.is_empty() || Self::poll_ms(0)
    }

    fn wait_readable(&mut self, timeout: Duration) -> bool {
        if !self.held.is_empty() {
            return true;
        }
        let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        Self::poll_ms(ms)
    }

    fn read_byte(&mut self) -> Option<u8> {
        if let Some(byte) = self.held.pop_front() {
            return Some(byte);
        }
        let mut byte = [0u8; 1];
        (Self::read_into(&mut byte) == 1).then_some(byte[0])
    }

    fn read_bytes(&mut self, n: usize) -> Vec<u8> {
        if !self.held.is_empty() {
            return self.take_held(n);
        }
        let mut buf = vec![0u8; n];
        let got = if n == 0 { 0 } else { Self::read_into(&mut buf) };
        buf.truncate(got);
        buf
    }

    fn unread(&mut self, bytes: &[u8]) {
        self.hold(bytes);
    }
}

/// Non-unix fallback: no readiness polling is available, so nothing is
/// ever reported as pending and the decoder returns `None` keys.
#[cfg(not(unix))]
impl ByteSource for StdinSource {
    fn poll_readable(&mut self) -> bool {
        !self.held.is_empty()
    }

    fn read_byte(&mut self) -> Option<u8> {
        use std::io::Read;
        if let Some(byte) = self.held.pop_front() {
            return Some(byte);
        }
        let mut byte = [0u8; 1];
        match std::io::stdin().lock().read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn read_bytes(&mut self, n: usize) -> Vec<u8> {
        use std::io::Read;
        if !self.held.is_empty() {
            return self.take_held(n);
        }
        let mut buf = vec![0u8; n];
        let got = std::io::stdin().lock().read(&mut buf).unwrap_or(0);
        buf.truncate(got);
        buf
    }

    fn unread(&mut self, bytes: &[u8]) {
        self.hold(bytes);
    }
}

// ─── In-memory ──────────────────────────────────────────────────────────────

/// A byte source over a fixed byte string.
///
/// Every byte is "available" until the slice is exhausted. Read calls
/// are counted so callers can verify how much input a decode consumed.
///
/// # Example
///
/// ```
/// use ansikit_term::source::{ByteSource, SliceSource};
///
/// let mut src = SliceSource::new(b"\x1b[A");
/// assert_eq!(src.read_byte(), Some(0x1b));
/// assert_eq!(src.consumed(), 1);
/// assert_eq!(src.remaining(), b"[A");
/// ```
#[derive(Debug, Clone)]
pub struct SliceSource {
    data: Vec<u8>,
    pos: usize,
    byte_reads: usize,
    chunk_reads: usize,
    polls: usize,
}

impl SliceSource {
    #[must_use]
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
            byte_reads: 0,
            chunk_reads: 0,
            polls: 0,
        }
    }

    /// Bytes consumed so far.
    #[inline]
    #[must_use]
    pub const fn consumed(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Number of `read_byte` calls, including ones that hit the end.
    #[inline]
    #[must_use]
    pub const fn byte_reads(&self) -> usize {
        self.byte_reads
    }

    /// Number of `read_bytes` calls.
    #[inline]
    #[must_use]
    pub const fn chunk_reads(&self) -> usize {
        self.chunk_reads
    }

    /// Number of readiness checks (`poll_readable` and `wait_readable`).
    #[inline]
    #[must_use]
    pub const fn polls(&self) -> usize {
        self.polls
    }
}

impl ByteSource for SliceSource {
    fn poll_readable(&mut self) -> bool {
        self.polls += 1;
        self.pos < self.data.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.byte_reads += 1;
        let byte = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    fn read_bytes(&mut self, n: usize) -> Vec<u8> {
        self.chunk_reads += 1;
        let end = self.pos.saturating_add(n).min(self.data.len());
        let chunk = self.data[self.pos..end].to_vec();
        self.pos = end;
        chunk
    }

    fn unread(&mut self, bytes: &[u8]) {
        self.data.splice(self.pos..self.pos, bytes.iter().copied());
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
