//! Byte-at-a-time line editor: echo, backspace, Tab completion and
//! Up/Down history navigation.
//!
//! The editor knows nothing about terminals. Raw mode is the caller's
//! business (see [`crate::terminal::RawMode`]); here input is any [`Read`]
//! and the screen is any [`Write`], which keeps the key handling testable.

use crate::completion::{Completer, Completion};
use crate::history::HistoryLog;
use std::io::{self, ErrorKind, Read, Write};
use tracing::trace;

const BELL: u8 = 0x07;
const BACKSPACE: u8 = 0x08;
const TAB: u8 = b'\t';
const EOT: u8 = 0x04;
const ESC: u8 = 0x1b;
const DELETE: u8 = 0x7f;

/// How a call to [`Editor::read_line`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Ctrl-D on an empty line, or end of input.
    Quit,
    /// Enter on an empty line.
    Empty,
    /// Enter with content.
    Line(String),
}

/// Per-line editing state.
#[derive(Debug, Default)]
struct LineState {
    buffer: String,
    /// Set by the first Tab that found several candidates; a second Tab in a
    /// row lists them.
    bell_rang: bool,
    /// Index into the history; `history.len()` is the fresh line.
    history_cursor: usize,
}

pub struct Editor<R, W> {
    input: R,
    output: W,
    prompt: String,
    echo: bool,
}

impl<R: Read, W: Write> Editor<R, W> {
    /// An editor that prints `prompt` and echoes what is typed.
    pub fn new(input: R, output: W, prompt: impl Into<String>) -> Self {
        Self {
            input,
            output,
            prompt: prompt.into(),
            echo: true,
        }
    }

    /// An editor for non-terminal input: nothing is written, Tab is kept as a
    /// blank and escape sequences are not interpreted.
    pub fn quiet(input: R, output: W) -> Self {
        Self {
            input,
            output,
            prompt: String::new(),
            echo: false,
        }
    }

    /// Reads one line, printing the prompt first.
    pub fn read_line(
        &mut self,
        history: &HistoryLog,
        completer: &Completer<'_>,
    ) -> io::Result<ReadOutcome> {
        let mut line = LineState {
            history_cursor: history.len(),
            ..LineState::default()
        };
        let prompt = self.prompt.clone();
        self.emit(prompt.as_bytes())?;

        loop {
            let Some(byte) = self.read_byte()? else {
                trace!("end of input");
                return Ok(if line.buffer.is_empty() {
                    ReadOutcome::Quit
                } else {
                    self.emit(b"\n")?;
                    ReadOutcome::Line(line.buffer)
                });
            };

            if byte != TAB {
                line.bell_rang = false;
            }

            match byte {
                b'\n' | b'\r' => {
                    self.emit(b"\n")?;
                    return Ok(if line.buffer.is_empty() {
                        ReadOutcome::Empty
                    } else {
                        ReadOutcome::Line(line.buffer)
                    });
                }
                EOT => {
                    if line.buffer.is_empty() {
                        self.emit(b"\n")?;
                        return Ok(ReadOutcome::Quit);
                    }
                }
                DELETE | BACKSPACE => {
                    if line.buffer.pop().is_some() {
                        self.emit(b"\x08 \x08")?;
                    }
                }
                TAB if !self.echo => line.buffer.push('\t'),
                TAB => self.complete(&mut line, completer)?,
                ESC if self.echo => self.escape_sequence(&mut line, history)?,
                0x20..=0x7e => {
                    line.buffer.push(char::from(byte));
                    self.emit(&[byte])?;
                }
                other => trace!(byte = other, "ignoring control byte"),
            }
        }
    }

    fn complete(&mut self, line: &mut LineState, completer: &Completer<'_>) -> io::Result<()> {
        match completer.complete(&line.buffer) {
            Completion::None => {
                line.bell_rang = false;
                self.emit(&[BELL])
            }
            Completion::Found(text) => {
                line.buffer.push_str(&text);
                line.bell_rang = false;
                self.emit(text.as_bytes())
            }
            Completion::More(_) if !line.bell_rang => {
                line.bell_rang = true;
                self.emit(&[BELL])
            }
            Completion::More(candidates) => {
                line.bell_rang = false;
                let listing = format!(
                    "\n{}\n{}{}",
                    candidates.join("  "),
                    self.prompt,
                    line.buffer
                );
                self.emit(listing.as_bytes())
            }
        }
    }

    /// Consumes the two bytes after ESC. Only `[A` (Up) and `[B` (Down) do
    /// anything.
    fn escape_sequence(&mut self, line: &mut LineState, history: &HistoryLog) -> io::Result<()> {
        let (Some(first), Some(second)) = (self.read_byte()?, self.read_byte()?) else {
            return Ok(());
        };
        if first != b'[' {
            return Ok(());
        }

        let cursor = match second {
            b'A' => line.history_cursor.saturating_sub(1),
            b'B' => (line.history_cursor + 1).min(history.len()),
            _ => return Ok(()),
        };
        if cursor == line.history_cursor {
            return Ok(());
        }
        line.history_cursor = cursor;

        let replacement = history.get(cursor).unwrap_or_default().to_string();
        self.redraw(&line.buffer, &replacement)?;
        line.buffer = replacement;
        Ok(())
    }

    /// Erases `old` from the screen and prints `new` in its place.
    fn redraw(&mut self, old: &str, new: &str) -> io::Result<()> {
        let width = old.chars().count();
        let mut frame = Vec::with_capacity(width * 3 + new.len());
        frame.extend(std::iter::repeat_n(BACKSPACE, width));
        frame.extend(std::iter::repeat_n(b' ', width));
        frame.extend(std::iter::repeat_n(BACKSPACE, width));
        frame.extend_from_slice(new.as_bytes());
        self.emit(&frame)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn emit(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.echo {
            return Ok(());
        }
        self.output.write_all(bytes)?;
        self.output.flush()
    }
}
