// SPDX-License-Identifier: MIT
//
// ansikit: interactive key viewer.
//
// Puts the terminal into character-at-a-time mode and prints every key it
// receives, decoded. Useful for checking what a terminal actually sends
// for Ctrl+Left or F5, and as a smoke test for ansikit-term on a real TTY.
//
//   stdin → read_code ─┬─ ESC → decode_escape → KeyEvent → "Ctrl+Up"
//                      └─ other byte          → char / ^X
//
// Flags:
//
//   --raw     fully raw mode (cfmakeraw) instead of the minimal mode
//   --legacy  re-snapshot on every enable (legacy re-entry behavior)
//   --query   ask the terminal for cursor position and size first
//
// `q` or Ctrl-C (in raw mode) quits. Set ANSIKIT_LOG=<file> to write a
// trace log; RUST_LOG controls the filter.

use std::env;
use std::fs::OpenOptions;
use std::process;
use std::sync::Mutex;
use std::time::Duration;

use ansikit_term::key::{self, ESCAPE};
use ansikit_term::source::ByteSource;
use ansikit_term::style::Attr;
use ansikit_term::terminal::{self, Terminal};
use ansikit_term::{KeyEvent, Mode, Reentry, SessionOptions};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// How long a lone ESC waits for the rest of a sequence.
const ESCAPE_TIMEOUT: Duration = Duration::from_millis(25);

/// How long the main loop waits for input before checking again.
const IDLE_TIMEOUT: Duration = Duration::from_millis(200);

const ETX: u8 = 0x03;

// ─── Arguments ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Args {
    mode: Mode,
    reentry: Reentry,
    query: bool,
    help: bool,
}

impl Args {
    fn parse<I, S>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Self::default();
        for arg in args {
            match arg.as_ref() {
                "--raw" => parsed.mode = Mode::Raw,
                "--legacy" => parsed.reentry = Reentry::Resnapshot,
                "--query" => parsed.query = true,
                "-h" | "--help" => parsed.help = true,
                other => return Err(format!("unknown argument: {other}")),
            }
        }
        Ok(parsed)
    }

    fn options(self) -> SessionOptions {
        SessionOptions::builder()
            .mode(self.mode)
            .reentry(self.reentry)
            .build()
    }
}

const USAGE: &str = "usage: ansikit [--raw] [--legacy] [--query]";

// ─── Logging ────────────────────────────────────────────────────────────────

/// Install a file subscriber if `ANSIKIT_LOG` names a file. The terminal
/// itself is never written to.
fn init_logging() {
    let Some(path) = env::var_os("ANSIKIT_LOG") else {
        return;
    };

    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        eprintln!("ansikit: cannot open log file {}", path.to_string_lossy());
        return;
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

// ─── Formatting ─────────────────────────────────────────────────────────────

/// Caret notation for control bytes (`^C`, `^?`), the character otherwise.
fn describe_byte(byte: u8) -> String {
    if key::is_non_printable(byte) {
        format!("^{}", char::from(byte ^ 0x40))
    } else {
        char::from(byte).to_string()
    }
}

fn describe_event(event: KeyEvent) -> String {
    if event.is_none() {
        "unrecognized sequence".to_owned()
    } else {
        event.to_string()
    }
}

// ─── Main loop ──────────────────────────────────────────────────────────────

fn run(term: &mut Terminal, args: Args) -> ansikit_term::Result<()> {
    term.write("ansikit key viewer. Press keys to decode them, q to quit.\r\n")?;

    if args.query {
        report_geometry(term)?;
    }

    term.enable();
    if !term.is_raw_mode_active() {
        term.write("stdin is not a terminal.\r\n")?;
        return Ok(());
    }

    loop {
        if !term.source_mut().wait_readable(IDLE_TIMEOUT) {
            continue;
        }
        let Some(byte) = term.read_code() else {
            break;
        };

        let line = match byte {
            b'q' => break,
            ETX if args.mode == Mode::Raw => break,
            ESCAPE if term.source_mut().wait_readable(ESCAPE_TIMEOUT) => {
                let event = term.decode_escape();
                debug!(%event, "decoded");
                let painted = term.paint(&describe_event(event), Attr::Cyan);
                format!("key  {painted}")
            }
            ESCAPE => "byte Esc".to_owned(),
            _ => format!("byte {}  (0x{byte:02x})", describe_byte(byte)),
        };
        term.write(&line)?;
        term.write("\r\n")?;
    }

    term.disable();
    Ok(())
}

fn report_geometry(term: &mut Terminal) -> ansikit_term::Result<()> {
    let position = term.cursor_position();
    let reported = term.screen_size();
    let window = terminal::window_size();
    info!(?position, ?reported, ?window, "geometry");

    let line = format!(
        "cursor {}  screen {}  window {}\r\n",
        position.map_or_else(|| "?".to_owned(), |p| format!("{};{}", p.row, p.col)),
        reported.map_or_else(|| "?".to_owned(), |s| format!("{}x{}", s.cols, s.rows)),
        window.map_or_else(|| "?".to_owned(), |s| format!("{}x{}", s.cols, s.rows)),
    );
    term.write(&line)
}

fn main() {
    let args = Args::parse(env::args().skip(1)).unwrap_or_else(|e| {
        eprintln!("ansikit: {e}\n{USAGE}");
        process::exit(2);
    });
    if args.help {
        println!("{USAGE}");
        return;
    }

    init_logging();
    info!(?args, "ansikit starting");

    let mut term = Terminal::with_options(args.options());
    if let Err(e) = run(&mut term, args) {
        term.disable();
        eprintln!("ansikit: {e}");
        process::exit(1);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
