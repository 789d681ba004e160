//! Operator-facing output that stays readable while the terminal is in raw mode.

use std::borrow::Cow;
use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::terminal;
use tracing::warn;
use tracing_subscriber::fmt::MakeWriter;

// Raw mode is a property of the process's terminal, so the flag is process-wide too.
static RAW_MODE: AtomicBool = AtomicBool::new(false);

/// Holds the terminal in raw mode so single keys arrive without Enter. Restores it on drop.
pub struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    /// Enables raw mode when stdin is a terminal; otherwise a no-op guard.
    pub fn enter() -> Self {
        if !io::stdin().is_terminal() {
            return Self { enabled: false };
        }
        match terminal::enable_raw_mode() {
            Ok(()) => {
                RAW_MODE.store(true, Ordering::SeqCst);
                Self { enabled: true }
            }
            Err(e) => {
                warn!("Unable to enable raw mode: {e}");
                Self { enabled: false }
            }
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            RAW_MODE.store(false, Ordering::SeqCst);
            let _ = terminal::disable_raw_mode();
        }
    }
}

/// Raw mode turns off output post-processing, so a bare `\n` no longer returns the carriage.
fn translate(buf: &[u8], raw: bool) -> Cow<'_, [u8]> {
    if !raw || !buf.contains(&b'\n') {
        return Cow::Borrowed(buf);
    }
    let mut out = Vec::with_capacity(buf.len() + 8);
    let mut previous = 0_u8;
    for &byte in buf {
        if byte == b'\n' && previous != b'\r' {
            out.push(b'\r');
        }
        out.push(byte);
        previous = byte;
    }
    Cow::Owned(out)
}

fn write_line<W: Write>(out: &mut W, line: impl Display, raw: bool) -> io::Result<()> {
    let text = format!("{line}\n");
    out.write_all(&translate(text.as_bytes(), raw))?;
    out.flush()
}

/// Prints one line to stdout.
pub fn say(line: impl Display) {
    let _ = write_line(&mut io::stdout().lock(), line, RAW_MODE.load(Ordering::SeqCst));
}

/// Stdout writer for the tracing layer.
pub struct ConsoleWriter;

impl Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout()
            .lock()
            .write_all(&translate(buf, RAW_MODE.load(Ordering::SeqCst)))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

impl<'a> MakeWriter<'a> for ConsoleWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooked_output_is_untouched() {
        assert_eq!(translate(b"12 items submitted.\n", false).as_ref(), b"12 items submitted.\n");
    }

    #[test]
    fn raw_output_returns_the_carriage() {
        assert_eq!(translate(b"a\nb\n", true).as_ref(), b"a\r\nb\r\n");
        assert_eq!(translate(b"a\r\n", true).as_ref(), b"a\r\n");
        assert!(matches!(translate(b"no newline", true), Cow::Borrowed(_)));
    }

    #[test]
    fn lines_end_for_the_terminal_mode() {
        let mut out = Vec::new();
        write_line(&mut out, "Waiting for tasks to end.", true).unwrap();
        assert_eq!(out, b"Waiting for tasks to end.\r\n");

        let mut out = Vec::new();
        write_line(&mut out, format_args!("{} items submitted.", 42), false).unwrap();
        assert_eq!(out, b"42 items submitted.\n");
    }
}
