// SPDX-License-Identifier: MIT
//
// Terminal session controller: raw-mode enable/disable with guaranteed
// restoration.
//
// A `Session` owns the state that the rest of the crate treats as
// shared: the saved terminal configuration, the "raw mode is active"
// flag, the attribute open-state flags and the screen-mode flags.
// Keeping them on an explicit object rather than in globals means two
// sessions never interfere, and a test can build an isolated one around
// a `MemoryDevice`.
//
// Restoration happens on three paths:
//
//   1. `disable()`, explicit.
//   2. `Drop`, normal scope exit, including unwinding.
//   3. The device's exit guard, for `process::exit`, panics and
//      terminating signals that never reach our destructor (see
//      `device.rs`).
//
// `RawModeGuard` is the scoped form used by the decoder and by queries:
// it enables raw mode only if it wasn't already on, and on drop puts
// back exactly the mode it found.

use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::config::TerminalConfig;
use crate::device::{TerminalDevice, TtyDevice};
use crate::error::Result;
use crate::options::{Mode, Reentry, SessionOptions};
use crate::state::{AttributeState, ScreenState};

/// A terminal session: raw-mode state plus attribute open-state.
///
/// # Example
///
/// ```
/// use ansikit_term::device::MemoryDevice;
/// use ansikit_term::options::SessionOptions;
/// use ansikit_term::session::Session;
///
/// let mut session = Session::with_device(MemoryDevice::default(), SessionOptions::default());
/// session.enable();
/// assert!(session.is_active());
/// session.disable();
/// assert!(!session.is_active());
/// ```
pub struct Session<D: TerminalDevice = TtyDevice> {
    device: D,
    options: SessionOptions,
    /// Settings captured by the last effective `enable()`.
    saved: Option<TerminalConfig>,
    active: bool,
    attributes: AttributeState,
    screen: ScreenState,
}

impl Session<TtyDevice> {
    /// A session on standard input's terminal with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_device(TtyDevice::stdin(), SessionOptions::default())
    }
}

impl Default for Session<TtyDevice> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: TerminalDevice> Session<D> {
    /// A session on `device`. Does not touch the terminal yet.
    #[must_use]
    pub fn with_device(device: D, options: SessionOptions) -> Self {
        Self {
            device,
            options,
            saved: None,
            active: false,
            attributes: AttributeState::new(),
            screen: ScreenState::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn options(&self) -> &SessionOptions {
        &self.options
    }

    #[inline]
    #[must_use]
    pub const fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub const fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Whether raw mode is currently in effect.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// The snapshot the next `disable()` restores, if any.
    #[inline]
    #[must_use]
    pub const fn saved_config(&self) -> Option<&TerminalConfig> {
        self.saved.as_ref()
    }

    // ── Raw mode ────────────────────────────────────────────────────

    /// Enter the configured mode. Failures are logged, never raised; on
    /// failure the session stays inactive.
    pub fn enable(&mut self) {
        self.enable_with(self.options.mode());
    }

    /// Enter `mode`, logging failures.
    pub fn enable_with(&mut self, mode: Mode) {
        if let Err(err) = self.try_enable(mode) {
            warn!(%err, "could not enable raw mode");
        }
    }

    /// Enter `mode`.
    ///
    /// While active, this is a no-op under [`Reentry::Idempotent`]; under
    /// [`Reentry::Resnapshot`] the current (already modified) settings
    /// replace the saved snapshot. The exit guard is taken once per
    /// activation and keeps the settings found by the first enable.
    ///
    /// # Errors
    ///
    /// Fails if the device cannot read or apply settings. The session is
    /// left unchanged.
    pub fn try_enable(&mut self, mode: Mode) -> Result<()> {
        if self.active && self.options.reentry() == Reentry::Idempotent {
            return Ok(());
        }

        let original = self.device.read_config()?;
        self.device.write_config(&original.apply(mode))?;
        if !self.active {
            self.device.guard_exit(&original);
        }

        self.saved = Some(original);
        self.active = true;
        debug!(?mode, "raw mode enabled");
        Ok(())
    }

    /// Restore the saved settings. Failures are logged, never raised.
    pub fn disable(&mut self) {
        if let Err(err) = self.try_disable() {
            warn!(%err, "could not restore terminal settings");
        }
    }

    /// Restore the saved settings.
    ///
    /// A no-op when raw mode isn't active, so calling it twice, or
    /// without a prior `enable()`, is harmless.
    ///
    /// # Errors
    ///
    /// Fails if the device rejects the restore; the session then still
    /// reports itself active, since the terminal is still modified.
    pub fn try_disable(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }

        let saved = self.saved.unwrap_or_default();
        self.device.write_config(&saved)?;
        self.device.release_exit();

        self.active = false;
        debug!("raw mode disabled");
        Ok(())
    }

    /// Scoped raw mode: enabled now if needed, restored on drop.
    pub fn raw_mode(&mut self) -> RawModeGuard<'_, D> {
        RawModeGuard::acquire(self)
    }

    // ── Attribute open-state ────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn attributes(&self) -> &AttributeState {
        &self.attributes
    }

    #[inline]
    pub const fn attributes_mut(&mut self) -> &mut AttributeState {
        &mut self.attributes
    }

    #[inline]
    #[must_use]
    pub const fn color_open(&self) -> bool {
        self.attributes.color_open()
    }

    #[inline]
    pub const fn set_color_open(&mut self, open: bool) {
        self.attributes.set_color_open(open);
    }

    #[inline]
    #[must_use]
    pub const fn style_open(&self) -> bool {
        self.attributes.style_open()
    }

    #[inline]
    pub const fn set_style_open(&mut self, open: bool) {
        self.attributes.set_style_open(open);
    }

    // ── Screen modes ────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn screen(&self) -> &ScreenState {
        &self.screen
    }

    #[inline]
    pub const fn screen_mut(&mut self) -> &mut ScreenState {
        &mut self.screen
    }

    /// Whether the cursor was last shown (the default) or hidden.
    #[inline]
    #[must_use]
    pub const fn cursor_visible(&self) -> bool {
        self.screen.cursor_visible()
    }

    /// Whether replace (overtype) mode was last turned on.
    #[inline]
    #[must_use]
    pub const fn replacing(&self) -> bool {
        self.screen.replacing()
    }
}

impl<D: TerminalDevice> Drop for Session<D> {
    fn drop(&mut self) {
        if self.active {
            self.disable();
        }
    }
}

// ─── Scoped acquisition ─────────────────────────────────────────────────────

/// Raw mode for the lifetime of the guard.
///
/// If the session was inactive, the guard enables it and disables it
/// again on drop. If it was already active, the guard leaves it alone in
/// both directions. Derefs to the session.
pub struct RawModeGuard<'a, D: TerminalDevice> {
    session: &'a mut Session<D>,
    activated: bool,
}

impl<'a, D: TerminalDevice> RawModeGuard<'a, D> {
    fn acquire(session: &'a mut Session<D>) -> Self {
        let activated = if session.is_active() {
            false
        } else {
            session.enable();
            session.is_active()
        };
        Self { session, activated }
    }

    /// Whether this guard turned raw mode on (and will turn it off).
    #[inline]
    #[must_use]
    pub const fn activated(&self) -> bool {
        self.activated
    }
}

impl<D: TerminalDevice> Deref for RawModeGuard<'_, D> {
    type Target = Session<D>;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl<D: TerminalDevice> DerefMut for RawModeGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl<D: TerminalDevice> Drop for RawModeGuard<'_, D> {
    fn drop(&mut self) {
        if self.activated {
            self.session.disable();
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
