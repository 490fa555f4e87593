//! Console I/O for the machine.
//!
//! The keyboard device registers and the I/O traps never touch a terminal
//! directly; they go through a [`Console`] supplied by the host.
//!
//! - [`BufferedConsole`]: scripted input and captured output, for tests,
//!   the debugger and WebAssembly.
//! - [`TerminalConsole`]: the real terminal, in raw mode (feature `terminal`).

use std::collections::VecDeque;
use thiserror::Error;

/// Host console seen by the machine.
pub trait Console {
    /// Report whether a character is waiting. Must not block.
    fn poll(&mut self) -> Result<bool, ConsoleError>;

    /// Return the next character, blocking until one is available.
    fn read_char(&mut self) -> Result<u8, ConsoleError>;

    /// Queue one character for output.
    fn write_char(&mut self, ch: u8) -> Result<(), ConsoleError>;

    /// Push queued output to the host.
    fn flush(&mut self) -> Result<(), ConsoleError>;

    /// Queue every byte of `s` for output.
    fn write_str(&mut self, s: &str) -> Result<(), ConsoleError> {
        for b in s.bytes() {
            self.write_char(b)?;
        }
        Ok(())
    }
}
impl dyn Console {} // assert Console is dyn safe

/// Errors raised by a console.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    /// The user asked to stop (Ctrl-C).
    #[error("interrupted")]
    Interrupted,

    /// A read was requested but a scripted console has no input left.
    #[error("console input exhausted")]
    InputExhausted,

    #[error("console I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ConsoleError {
    fn from(e: std::io::Error) -> Self {
        ConsoleError::Io(e.to_string())
    }
}

/// Console that reads from an input queue and writes to an output buffer.
///
/// Reading with an empty queue fails with [`ConsoleError::InputExhausted`]
/// instead of blocking.
#[derive(Debug, Clone, Default)]
pub struct BufferedConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
    flushes: usize,
}

impl BufferedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a console with `input` already queued.
    pub fn with_input(input: &str) -> Self {
        let mut console = Self::new();
        console.push_input(input);
        console
    }

    /// Append characters to the input queue.
    pub fn push_input(&mut self, input: &str) {
        self.input.extend(input.bytes());
    }

    /// Characters not yet consumed by the machine.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Everything written so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output decoded lossily as UTF-8.
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Drain the output buffer.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Number of times the machine flushed output.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl Console for BufferedConsole {
    fn poll(&mut self) -> Result<bool, ConsoleError> {
        Ok(!self.input.is_empty())
    }

    fn read_char(&mut self) -> Result<u8, ConsoleError> {
        self.input.pop_front().ok_or(ConsoleError::InputExhausted)
    }

    fn write_char(&mut self, ch: u8) -> Result<(), ConsoleError> {
        self.output.push(ch);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConsoleError> {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(feature = "terminal")]
pub use terminal::{RawModeGuard, TerminalConsole};

#[cfg(feature = "terminal")]
mod terminal {
    use super::{Console, ConsoleError};
    use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
    use crossterm::terminal;
    use std::collections::VecDeque;
    use std::io::{self, Stdout, Write};
    use std::time::Duration;

    /// Keeps the terminal in raw (unbuffered, unechoed) mode while alive.
    ///
    /// The previous mode is restored on drop, including when an
    /// interrupt unwinds out of the run loop.
    ///
    /// Only a Ctrl-C typed at the terminal is seen, as a key event. A
    /// SIGINT sent from elsewhere (`kill -INT`) terminates the process
    /// without running `Drop`, leaving the tty raw; `stty sane` repairs it.
    pub struct RawModeGuard {
        _private: (),
    }

    impl RawModeGuard {
        pub fn enable() -> io::Result<Self> {
            terminal::enable_raw_mode()?;
            log::debug!("terminal raw mode enabled");
            Ok(Self { _private: () })
        }
    }

    impl Drop for RawModeGuard {
        fn drop(&mut self) {
            if let Err(e) = terminal::disable_raw_mode() {
                log::error!("failed to restore terminal mode: {}", e);
            }
        }
    }

    /// Console backed by the process terminal.
    ///
    /// Expects a [`RawModeGuard`] to be held by the caller. Ctrl-C arrives
    /// as a key in raw mode and is reported as [`ConsoleError::Interrupted`].
    pub struct TerminalConsole<W: Write = Stdout> {
        pending: VecDeque<u8>,
        out: W,
    }

    impl TerminalConsole {
        pub fn new() -> Self {
            Self::with_writer(io::stdout())
        }
    }

    impl<W: Write> TerminalConsole<W> {
        /// Keyboard from the terminal, output to `out`.
        pub fn with_writer(out: W) -> Self {
            Self {
                pending: VecDeque::new(),
                out,
            }
        }

        /// Move every key event that is already waiting into `pending`.
        ///
        /// Fails with `Interrupted` if one of them was Ctrl-C.
        pub fn drain_events(&mut self) -> Result<(), ConsoleError> {
            while event::poll(Duration::ZERO)? {
                self.accept(event::read()?)?;
            }
            Ok(())
        }

        fn accept(&mut self, ev: Event) -> Result<(), ConsoleError> {
            if let Event::Key(key) = ev {
                if key.kind != KeyEventKind::Release {
                    if let Some(b) = key_to_byte(key)? {
                        self.pending.push_back(b);
                    }
                }
            }
            Ok(())
        }
    }

    impl Default for TerminalConsole {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<W: Write> Console for TerminalConsole<W> {
        fn poll(&mut self) -> Result<bool, ConsoleError> {
            self.drain_events()?;
            Ok(!self.pending.is_empty())
        }

        fn read_char(&mut self) -> Result<u8, ConsoleError> {
            loop {
                if let Some(b) = self.pending.pop_front() {
                    return Ok(b);
                }
                let ev = event::read()?;
                self.accept(ev)?;
            }
        }

        fn write_char(&mut self, ch: u8) -> Result<(), ConsoleError> {
            // Raw mode disables output post-processing.
            if ch == b'\n' {
                self.out.write_all(b"\r\n")?;
            } else {
                self.out.write_all(&[ch])?;
            }
            Ok(())
        }

        fn flush(&mut self) -> Result<(), ConsoleError> {
            self.out.flush()?;
            Ok(())
        }
    }

    /// Translate a key press into the ASCII byte a cooked-less tty would send.
    fn key_to_byte(key: KeyEvent) -> Result<Option<u8>, ConsoleError> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let byte = match key.code {
            KeyCode::Char('c') | KeyCode::Char('C') if ctrl => {
                return Err(ConsoleError::Interrupted);
            }
            KeyCode::Char(c) if c.is_ascii() => {
                if ctrl && c.is_ascii_alphabetic() {
                    (c.to_ascii_lowercase() as u8) & 0x1F
                } else {
                    c as u8
                }
            }
            KeyCode::Enter => b'\n',
            KeyCode::Tab => b'\t',
            KeyCode::Backspace => 0x08,
            KeyCode::Esc => 0x1B,
            _ => return Ok(None),
        };
        Ok(Some(byte))
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_input_order() {
        let mut console = BufferedConsole::with_input("ab");

        assert!(console.poll().unwrap());
        assert_eq!(console.read_char().unwrap(), b'a');
        assert_eq!(console.read_char().unwrap(), b'b');
        assert!(!console.poll().unwrap());
    }

    #[test]
    fn test_buffered_read_fails_fast() {
        let mut console = BufferedConsole::new();
        assert_eq!(console.read_char(), Err(ConsoleError::InputExhausted));
    }

    #[test]
    fn test_buffered_output() {
        let mut console = BufferedConsole::new();
        console.write_str("Hi").unwrap();
        console.flush().unwrap();

        assert_eq!(console.output_string(), "Hi");
        assert_eq!(console.flush_count(), 1);
        assert_eq!(console.take_output(), b"Hi".to_vec());
        assert!(console.output().is_empty());
    }
}
