// SPDX-License-Identifier: MIT
//
// Attribute open-state and screen-mode tracking.
//
// Setting a color or a text style leaves it "open" until something resets
// it. The string helpers in `style` check these flags: while a color is
// open they leave the reset suffix off, so text painted inside an
// explicitly opened region keeps the surrounding color.
//
// `ScreenState` records the two terminal modes the terminal cannot be
// asked about afterwards: cursor visibility and replace (overtype) mode.
// They change only through the `Terminal` methods that emit the matching
// sequence.
//
// The flags live on the session, not in process globals, so independent
// sessions (tests in particular) never see each other's state.

/// Whether a color and/or a text style is currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeState {
    color_open: bool,
    style_open: bool,
}

impl AttributeState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            color_open: false,
            style_open: false,
        }
    }

    /// A foreground or background color has been set and not reset.
    #[inline]
    #[must_use]
    pub const fn color_open(&self) -> bool {
        self.color_open
    }

    #[inline]
    pub const fn set_color_open(&mut self, open: bool) {
        self.color_open = open;
    }

    /// A text style has been set and not reset.
    #[inline]
    #[must_use]
    pub const fn style_open(&self) -> bool {
        self.style_open
    }

    #[inline]
    pub const fn set_style_open(&mut self, open: bool) {
        self.style_open = open;
    }
}

/// Cursor visibility and replace mode as last set through the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenState {
    cursor_visible: bool,
    replacing: bool,
}

impl ScreenState {
    /// A fresh terminal: cursor shown, insert mode.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cursor_visible: true,
            replacing: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    #[inline]
    pub const fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor_visible = visible;
    }

    /// Typed characters overwrite instead of inserting.
    #[inline]
    #[must_use]
    pub const fn replacing(&self) -> bool {
        self.replacing
    }

    #[inline]
    pub const fn set_replacing(&mut self, replacing: bool) {
        self.replacing = replacing;
    }
}

impl Default for ScreenState {
    fn default() -> Self {
        Self::new()
    }
}
