// SPDX-License-Identifier: MIT
//
// Terminal devices: where line-discipline settings are read and written.
//
// Safety: the TTY device necessarily uses `unsafe` for termios
// (tcgetattr, tcsetattr), atexit and sigaction. These are the standard POSIX
// interfaces for terminal control. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// A session never touches termios directly; it goes through a
// `TerminalDevice`. `TtyDevice` is the real thing, bound to standard
// input. `MemoryDevice` holds a configuration in memory and counts
// writes, which is all a session test needs.
//
// Exit restoration: the session's own `Drop` covers normal scope exit,
// but `process::exit` skips destructors, a panic may unwind past the
// session or abort, and SIGINT/SIGTERM/SIGHUP end the process without
// unwinding at all. `TtyDevice` therefore keeps a process-wide backup of
// the original settings and installs, once per process, an `atexit`
// handler, a panic hook and handlers for those three signals, all of
// which write the backup back to the terminal.
//
// The backup is counted: the first armed session stores the settings it
// found, later sessions only add a guard, and the backup is cleared when
// the last one releases. A second session therefore never replaces the
// true original with settings the first one already modified.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, Once, PoisonError};

use tracing::debug;

use crate::config::TerminalConfig;
use crate::error::{Error, Result};

/// Read and write access to a terminal's line-discipline settings.
pub trait TerminalDevice {
    /// Capture the current settings.
    ///
    /// # Errors
    ///
    /// Fails if the device is not a terminal or the query fails.
    fn read_config(&mut self) -> Result<TerminalConfig>;

    /// Apply `config` immediately.
    ///
    /// # Errors
    ///
    /// Fails if the device is not a terminal or the update fails.
    fn write_config(&mut self, config: &TerminalConfig) -> Result<()>;

    /// Arrange for `original` to be restored if the process exits while
    /// the modified settings are still active. Called once per enable.
    fn guard_exit(&mut self, _original: &TerminalConfig) {}

    /// The original settings are back in place; drop the exit guard.
    fn release_exit(&mut self) {}
}

// ─── Exit restoration ───────────────────────────────────────────────────────

/// Reference-counted original settings.
#[derive(Debug, Default)]
struct ExitBackup {
    original: Option<TerminalConfig>,
    guards: usize,
}

impl ExitBackup {
    const fn new() -> Self {
        Self {
            original: None,
            guards: 0,
        }
    }

    /// Add a guard. Only the first one stores `original`; returns whether
    /// this call did.
    fn arm(&mut self, original: &TerminalConfig) -> bool {
        self.guards += 1;
        if self.original.is_some() {
            return false;
        }
        self.original = Some(*original);
        true
    }

    /// Drop a guard. Returns whether it was the last one, in which case
    /// the backup is cleared.
    fn release(&mut self) -> bool {
        if self.guards == 0 {
            return false;
        }
        self.guards -= 1;
        if self.guards > 0 {
            return false;
        }
        self.original = None;
        true
    }

    const fn original(&self) -> Option<&TerminalConfig> {
        self.original.as_ref()
    }

    const fn guards(&self) -> usize {
        self.guards
    }
}

/// Settings to restore on process exit or panic.
static EXIT_BACKUP: Mutex<ExitBackup> = Mutex::new(ExitBackup::new());

/// Ensures the hooks are installed at most once per process.
static EXIT_HOOKS_INSTALLED: Once = Once::new();

/// Set while [`SIGNAL_BACKUP`] holds settings a signal handler may write.
static SIGNAL_BACKUP_ARMED: AtomicBool = AtomicBool::new(false);

/// Copy of the backup for signal handlers, which must not lock.
///
/// Written only under the [`EXIT_BACKUP`] lock while
/// [`SIGNAL_BACKUP_ARMED`] is clear.
#[cfg(unix)]
struct SignalBackup(std::cell::UnsafeCell<std::mem::MaybeUninit<libc::termios>>);

#[cfg(unix)]
unsafe impl Sync for SignalBackup {}

#[cfg(unix)]
static SIGNAL_BACKUP: SignalBackup =
    SignalBackup(std::cell::UnsafeCell::new(std::mem::MaybeUninit::uninit()));

/// Signals whose default action ends the process with the terminal
/// still modified.
#[cfg(unix)]
const RESTORED_SIGNALS: [libc::c_int; 3] = [libc::SIGINT, libc::SIGTERM, libc::SIGHUP];

fn lock_backup() -> MutexGuard<'static, ExitBackup> {
    EXIT_BACKUP.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(unix)]
fn publish_signal_backup(original: &TerminalConfig) {
    unsafe {
        SIGNAL_BACKUP
            .0
            .get()
            .write(std::mem::MaybeUninit::new(*original.termios()));
    }
    SIGNAL_BACKUP_ARMED.store(true, Ordering::Release);
}

#[cfg(not(unix))]
fn publish_signal_backup(_original: &TerminalConfig) {
    SIGNAL_BACKUP_ARMED.store(true, Ordering::Release);
}

/// Take a guard on the process-wide backup, installing the hooks first.
fn arm_exit_backup(original: &TerminalConfig) {
    install_exit_hooks();
    let mut backup = lock_backup();
    if backup.arm(original) {
        publish_signal_backup(original);
        debug!("exit restoration armed");
    } else {
        debug!(guards = backup.guards(), "exit restoration already armed");
    }
}

/// Give back a guard; the last one disarms every hook.
fn release_exit_backup() {
    let mut backup = lock_backup();
    if backup.release() {
        SIGNAL_BACKUP_ARMED.store(false, Ordering::Release);
        debug!("exit restoration disarmed");
    }
}

/// Write the backup to stdin's terminal. Best-effort, ignores errors.
#[cfg(unix)]
fn restore_from_backup() {
    let backup = lock_backup();
    if let Some(original) = backup.original() {
        unsafe {
            let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, original.termios());
        }
    }
}

#[cfg(not(unix))]
fn restore_from_backup() {}

#[cfg(unix)]
extern "C" fn restore_at_exit() {
    restore_from_backup();
}

/// Restore from the lock-free copy, then deliver `sig` again. The
/// handler is installed with `SA_RESETHAND`, so the second delivery takes
/// the default action.
#[cfg(unix)]
extern "C" fn restore_on_signal(sig: libc::c_int) {
    if SIGNAL_BACKUP_ARMED.load(Ordering::Acquire) {
        unsafe {
            let _ = libc::tcsetattr(
                libc::STDIN_FILENO,
                libc::TCSANOW,
                SIGNAL_BACKUP.0.get().cast::<libc::termios>(),
            );
        }
    }
    unsafe {
        libc::raise(sig);
    }
}

/// Install the signal handlers. A signal the host already handles or
/// ignores is left alone.
#[cfg(unix)]
fn install_signal_handlers() {
    for sig in RESTORED_SIGNALS {
        unsafe {
            let mut previous: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(sig, std::ptr::null(), &raw mut previous) != 0 {
                continue;
            }
            if previous.sa_sigaction != libc::SIG_DFL {
                debug!(sig, "signal disposition already set, not intercepting");
                continue;
            }

            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = restore_on_signal as *const () as usize;
            sa.sa_flags = libc::SA_RESETHAND;
            libc::sigemptyset(&raw mut sa.sa_mask);
            libc::sigaction(sig, &raw const sa, std::ptr::null_mut());
        }
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}

/// Install the `atexit` handler, the panic hook and the signal handlers.
fn install_exit_hooks() {
    EXIT_HOOKS_INSTALLED.call_once(|| {
        #[cfg(unix)]
        unsafe {
            let _ = libc::atexit(restore_at_exit);
        }
        install_signal_handlers();

        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_from_backup();
            original(info);
        }));
    });
}

// ─── TTY ────────────────────────────────────────────────────────────────────

/// The terminal attached to standard input.
#[derive(Debug, Default, Clone, Copy)]
pub struct TtyDevice;

impl TtyDevice {
    #[must_use]
    pub const fn stdin() -> Self {
        Self
    }
}

/// Check whether stdin is connected to a terminal (TTY).
#[must_use]
pub fn is_tty() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal()
}

#[cfg(unix)]
impl TerminalDevice for TtyDevice {
    fn read_config(&mut self) -> Result<TerminalConfig> {
        if !is_tty() {
            return Err(Error::NotATerminal);
        }

        let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();
        if unsafe { libc::tcgetattr(libc::STDIN_FILENO, termios.as_mut_ptr()) } != 0 {
            return Err(Error::GetAttributes(std::io::Error::last_os_error()));
        }
        Ok(TerminalConfig::from_termios(unsafe { termios.assume_init() }))
    }

    fn write_config(&mut self, config: &TerminalConfig) -> Result<()> {
        if !is_tty() {
            return Err(Error::NotATerminal);
        }

        if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, config.termios()) } != 0 {
            return Err(Error::SetAttributes(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    fn guard_exit(&mut self, original: &TerminalConfig) {
        arm_exit_backup(original);
    }

    fn release_exit(&mut self) {
        release_exit_backup();
    }
}

#[cfg(not(unix))]
impl TerminalDevice for TtyDevice {
    fn read_config(&mut self) -> Result<TerminalConfig> {
        Err(Error::NotATerminal)
    }

    fn write_config(&mut self, _config: &TerminalConfig) -> Result<()> {
        Err(Error::NotATerminal)
    }

    fn guard_exit(&mut self, original: &TerminalConfig) {
        arm_exit_backup(original);
    }

    fn release_exit(&mut self) {
        release_exit_backup();
    }
}

// ─── In-memory ──────────────────────────────────────────────────────────────

/// A terminal device that exists only in memory.
///
/// Starts from a given configuration (by default
/// [`TerminalConfig::cooked`]) and records every write. A failing device
/// rejects every call, like stdin redirected from a file.
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    current: TerminalConfig,
    writes: usize,
    failing: bool,
    guards: usize,
}

impl MemoryDevice {
    #[must_use]
    pub const fn new(initial: TerminalConfig) -> Self {
        Self {
            current: initial,
            writes: 0,
            failing: false,
            guards: 0,
        }
    }

    /// A device whose every operation fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// The settings currently in effect.
    #[inline]
    #[must_use]
    pub const fn current(&self) -> &TerminalConfig {
        &self.current
    }

    /// Number of successful `write_config` calls.
    #[inline]
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }

    /// Whether an exit guard is currently armed.
    #[inline]
    #[must_use]
    pub const fn exit_guarded(&self) -> bool {
        self.guards > 0
    }

    /// Number of exit guards taken and not yet released.
    #[inline]
    #[must_use]
    pub const fn exit_guards(&self) -> usize {
        self.guards
    }
}

impl Default for MemoryDevice {
    fn default() -> Self {
        Self::new(TerminalConfig::cooked())
    }
}

impl TerminalDevice for MemoryDevice {
    fn read_config(&mut self) -> Result<TerminalConfig> {
        if self.failing {
            return Err(Error::NotATerminal);
        }
        Ok(self.current)
    }

    fn write_config(&mut self, config: &TerminalConfig) -> Result<()> {
        if self.failing {
            return Err(Error::NotATerminal);
        }
        self.current = *config;
        self.writes += 1;
        Ok(())
    }

    fn guard_exit(&mut self, _original: &TerminalConfig) {
        self.guards += 1;
    }

    fn release_exit(&mut self) {
        self.guards = self.guards.saturating_sub(1);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_round_trip() {
        let mut dev = MemoryDevice::default();
        let original = dev.read_config().unwrap();
        let minimal = original.minimal();
        dev.write_config(&minimal).unwrap();
        assert_eq!(*dev.current(), minimal);
        assert_eq!(dev.writes(), 1);
    }

    #[test]
    fn failing_device_rejects_everything() {
        let mut dev = MemoryDevice::failing();
        assert!(matches!(dev.read_config(), Err(Error::NotATerminal)));
        assert!(dev.write_config(&TerminalConfig::default()).is_err());
        assert_eq!(dev.writes(), 0);
    }

    #[test]
    fn memory_exit_guard_toggles() {
        let mut dev = MemoryDevice::default();
        dev.guard_exit(&TerminalConfig::cooked());
        assert!(dev.exit_guarded());
        dev.release_exit();
        assert!(!dev.exit_guarded());
    }

    #[test]
    fn is_tty_does_not_panic() {
        let _ = is_tty();
    }

    #[test]
    fn tty_read_without_terminal_fails_cleanly() {
        // Under a test harness stdin is usually not a terminal; either
        // outcome is fine as long as nothing panics.
        let _ = TtyDevice::stdin().read_config();
    }

    #[test]
    fn restore_without_backup_is_noop() {
        restore_from_backup();
    }

    // ── Backup bookkeeping ──────────────────────────────────────────

    #[test]
    fn first_guard_stores_original() {
        let mut backup = ExitBackup::new();
        let original = TerminalConfig::cooked();
        assert!(backup.arm(&original));
        assert_eq!(backup.original(), Some(&original));
        assert_eq!(backup.guards(), 1);
    }

    #[test]
    fn second_guard_keeps_first_original() {
        let mut backup = ExitBackup::new();
        let original = TerminalConfig::cooked();
        backup.arm(&original);
        // The second session finds the terminal already modified.
        assert!(!backup.arm(&original.minimal()));
        assert_eq!(backup.original(), Some(&original));
        assert_eq!(backup.guards(), 2);
    }

    #[test]
    fn backup_survives_until_last_release() {
        let mut backup = ExitBackup::new();
        let original = TerminalConfig::cooked();
        backup.arm(&original);
        backup.arm(&original.minimal());

        assert!(!backup.release());
        assert_eq!(backup.original(), Some(&original));
        assert_eq!(backup.guards(), 1);

        assert!(backup.release());
        assert_eq!(backup.original(), None);
        assert_eq!(backup.guards(), 0);
    }

    #[test]
    fn release_without_guard_is_noop() {
        let mut backup = ExitBackup::new();
        assert!(!backup.release());
        assert_eq!(backup.guards(), 0);
    }

    #[test]
    fn rearm_after_release_takes_new_original() {
        let mut backup = ExitBackup::new();
        backup.arm(&TerminalConfig::cooked());
        backup.release();
        let raw = TerminalConfig::cooked().raw();
        assert!(backup.arm(&raw));
        assert_eq!(backup.original(), Some(&raw));
    }

    #[test]
    fn memory_guards_are_counted() {
        let mut dev = MemoryDevice::default();
        dev.guard_exit(&TerminalConfig::cooked());
        dev.guard_exit(&TerminalConfig::cooked());
        assert_eq!(dev.exit_guards(), 2);
        dev.release_exit();
        assert!(dev.exit_guarded());
        dev.release_exit();
        dev.release_exit();
        assert_eq!(dev.exit_guards(), 0);
    }

    // ── Exit paths on a real terminal ───────────────────────────────
    //
    // Each scenario runs `exit_restoration_child` in a child process whose
    // stdin is the slave side of a fresh pseudo-terminal, then checks the
    // terminal settings after the child is gone.

    #[cfg(target_os = "linux")]
    mod exit_paths {
        use std::ffi::CStr;
        use std::fs::{File, OpenOptions};
        use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::process::ExitStatusExt;
        use std::process::{Command, ExitStatus, Stdio};

        use pretty_assertions::assert_eq;

        use crate::config::TerminalConfig;
        use crate::device::{TerminalDevice, TtyDevice, lock_backup};
        use crate::session::Session;

        const SCENARIO_VAR: &str = "ANSIKIT_EXIT_SCENARIO";

        /// A pseudo-terminal pair, or `None` where the system can't open one.
        fn open_pty() -> Option<(OwnedFd, File)> {
            let fd = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
            if fd < 0 {
                return None;
            }
            let master = unsafe { OwnedFd::from_raw_fd(fd) };
            let mut name = [0 as libc::c_char; 128];
            unsafe {
                if libc::grantpt(master.as_raw_fd()) != 0
                    || libc::unlockpt(master.as_raw_fd()) != 0
                    || libc::ptsname_r(master.as_raw_fd(), name.as_mut_ptr(), name.len()) != 0
                {
                    return None;
                }
            }
            let path = unsafe { CStr::from_ptr(name.as_ptr()) }.to_str().ok()?.to_owned();
            let slave = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_NOCTTY)
                .open(path)
                .ok()?;
            Some((master, slave))
        }

        fn config_of(slave: &File) -> TerminalConfig {
            let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();
            assert_eq!(unsafe { libc::tcgetattr(slave.as_raw_fd(), termios.as_mut_ptr()) }, 0);
            TerminalConfig::from_termios(unsafe { termios.assume_init() })
        }

        /// Run `scenario` on a pty; returns the child's status and the
        /// settings before and after.
        fn run_scenario(scenario: &str) -> Option<(ExitStatus, TerminalConfig, TerminalConfig)> {
            let (_master, slave) = open_pty()?;
            let before = config_of(&slave);
            let status = Command::new(std::env::current_exe().ok()?)
                .args([
                    "--exact",
                    "device::tests::exit_paths::exit_restoration_child",
                    "--test-threads=1",
                ])
                .env(SCENARIO_VAR, scenario)
                .stdin(Stdio::from(slave.try_clone().ok()?))
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .ok()?;
            Some((status, before, config_of(&slave)))
        }

        /// Whether `sig` still has its default action here; a child
        /// inherits an ignored signal and would not be able to intercept it.
        fn has_default_action(sig: libc::c_int) -> bool {
            unsafe {
                let mut current: libc::sigaction = std::mem::zeroed();
                libc::sigaction(sig, std::ptr::null(), &raw mut current) == 0
                    && current.sa_sigaction != libc::SIG_IGN
            }
        }

        fn exit_backup_state() -> (Option<TerminalConfig>, usize) {
            let backup = lock_backup();
            (backup.original().copied(), backup.guards())
        }

        /// Does nothing unless started by `run_scenario`.
        #[test]
        fn exit_restoration_child() {
            let Some(scenario) = std::env::var_os(SCENARIO_VAR) else {
                return;
            };
            let mut first = Session::new();
            first.enable();
            assert!(first.is_active());
            let original = first.saved_config().copied();

            match scenario.to_str() {
                Some("signal") => unsafe {
                    libc::raise(libc::SIGTERM);
                },
                Some("second-session") => {
                    let mut second = Session::new();
                    second.enable();
                    assert_eq!(exit_backup_state(), (original, 2));
                    second.disable();
                    assert_eq!(exit_backup_state(), (original, 1));
                    assert!(first.is_active());
                    unsafe {
                        libc::raise(libc::SIGINT);
                    }
                }
                Some("panic") => {
                    std::mem::forget(first);
                    let _ = std::panic::catch_unwind(|| panic!("unwinding with raw mode on"));
                    let restored = TtyDevice::stdin()
                        .read_config()
                        .is_ok_and(|config| Some(config) == original);
                    // `_exit` skips the atexit handler, so only the panic
                    // hook can have restored the terminal.
                    unsafe { libc::_exit(if restored { 0 } else { 4 }) };
                }
                Some("exit") => {
                    std::mem::forget(first);
                    std::process::exit(0);
                }
                _ => {}
            }
            std::process::exit(3);
        }

        #[test]
        fn sigterm_restores_terminal() {
            if !has_default_action(libc::SIGTERM) {
                return;
            }
            let Some((status, before, after)) = run_scenario("signal") else {
                return;
            };
            assert!(before.is_canonical());
            assert_eq!(status.signal(), Some(libc::SIGTERM));
            assert_eq!(after, before);
        }

        #[test]
        fn second_session_keeps_first_original() {
            if !has_default_action(libc::SIGINT) {
                return;
            }
            let Some((status, before, after)) = run_scenario("second-session") else {
                return;
            };
            assert_eq!(status.signal(), Some(libc::SIGINT));
            assert_eq!(after, before);
        }

        #[test]
        fn panic_hook_restores_terminal() {
            let Some((status, before, after)) = run_scenario("panic") else {
                return;
            };
            assert_eq!(status.code(), Some(0));
            assert_eq!(after, before);
        }

        #[test]
        fn process_exit_restores_terminal() {
            let Some((status, before, after)) = run_scenario("exit") else {
                return;
            };
            assert!(status.success());
            assert_eq!(after, before);
        }
    }
}
