// SPDX-License-Identifier: MIT
//
// Session options and their builder.
//
// ```
// # use ansikit_term::options::{Mode, Reentry, SessionOptions};
// let options = SessionOptions::builder()
//     .mode(Mode::Raw)
//     .reentry(Reentry::Resnapshot)
//     .build();
//
// assert_eq!(options.mode(), Mode::Raw);
// ```

use std::time::Duration;

/// How far a session departs from the terminal's normal settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Disable line buffering, echo, CR→NL translation and UTF-8 input
    /// coalescing. Signals (control-c) keep working.
    #[default]
    Minimal,
    /// The platform's fully raw mode (`cfmakeraw`): no input or output
    /// processing at all.
    Raw,
}

/// What `enable()` does when the session is already active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reentry {
    /// Do nothing. The snapshot from the first `enable()` stays in place.
    #[default]
    Idempotent,
    /// Capture a fresh snapshot on every call, even while active. A
    /// second `enable()` then saves the already-raw settings and the next
    /// `disable()` restores raw mode. Kept for exact legacy parity.
    Resnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OptionData {
    mode: Mode,
    reentry: Reentry,
    query_timeout: Duration,
    max_response_len: usize,
}

impl OptionData {
    const fn new() -> Self {
        Self {
            mode: Mode::Minimal,
            reentry: Reentry::Idempotent,
            query_timeout: Duration::from_millis(100),
            max_response_len: 32,
        }
    }
}

/// Builder for [`SessionOptions`].
#[derive(Debug)]
pub struct OptionBuilder(OptionData);

impl OptionBuilder {
    /// Set the terminal mode used by `enable()`.
    pub const fn mode(&mut self, mode: Mode) -> &mut Self {
        self.0.mode = mode;
        self
    }

    /// Set the re-entry policy.
    pub const fn reentry(&mut self, reentry: Reentry) -> &mut Self {
        self.0.reentry = reentry;
        self
    }

    /// Set how long a query waits for each byte of the terminal's reply.
    pub const fn query_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.0.query_timeout = timeout;
        self
    }

    /// Set the longest query reply accepted before giving up.
    ///
    /// Clamped to at least 8 bytes, enough for the shortest reply.
    pub fn max_response_len(&mut self, len: usize) -> &mut Self {
        self.0.max_response_len = len.max(8);
        self
    }

    /// Build the options.
    #[must_use]
    pub fn build(&self) -> SessionOptions {
        SessionOptions(self.0.clone())
    }
}

/// Options for a terminal session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions(OptionData);

impl SessionOptions {
    /// Start building options from the defaults.
    #[must_use]
    pub const fn builder() -> OptionBuilder {
        OptionBuilder(OptionData::new())
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.0.mode
    }

    #[must_use]
    pub const fn reentry(&self) -> Reentry {
        self.0.reentry
    }

    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        self.0.query_timeout
    }

    #[must_use]
    pub const fn max_response_len(&self) -> usize {
        self.0.max_response_len
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self(OptionData::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let o = SessionOptions::default();
        assert_eq!(o.mode(), Mode::Minimal);
        assert_eq!(o.reentry(), Reentry::Idempotent);
        assert_eq!(o.query_timeout(), Duration::from_millis(100));
        assert_eq!(o.max_response_len(), 32);
    }

    #[test]
    fn builder_sets_fields() {
        let o = SessionOptions::builder()
            .mode(Mode::Raw)
            .reentry(Reentry::Resnapshot)
            .query_timeout(Duration::from_millis(250))
            .max_response_len(64)
            .build();
        assert_eq!(o.mode(), Mode::Raw);
        assert_eq!(o.reentry(), Reentry::Resnapshot);
        assert_eq!(o.query_timeout(), Duration::from_millis(250));
        assert_eq!(o.max_response_len(), 64);
    }

    #[test]
    fn response_len_is_clamped() {
        let o = SessionOptions::builder().max_response_len(1).build();
        assert_eq!(o.max_response_len(), 8);
    }

    #[test]
    fn builder_from_defaults_equals_default() {
        assert_eq!(SessionOptions::builder().build(), SessionOptions::default());
    }
}
