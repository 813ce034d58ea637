//! Terminal line-discipline control for the interactive editor.

use anyhow::{Context, Result};
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::os::fd::AsFd;
use tracing::{debug, warn};

/// Whether standard input is attached to a terminal.
pub fn is_interactive() -> bool {
    io::stdin().is_terminal()
}

/// An unbuffered reader over a duplicate of standard input.
///
/// `io::Stdin` buffers internally, which would swallow bytes meant for a
/// child process spawned after the current line.
pub fn stdin_reader() -> io::Result<File> {
    let fd = io::stdin().as_fd().try_clone_to_owned()?;
    Ok(File::from(fd))
}

/// Puts the terminal on stdin into non-canonical, no-echo mode for as long
/// as the guard lives. The attributes saved on entry are restored on drop,
/// including during unwinding.
pub struct RawMode {
    saved: Termios,
}

impl RawMode {
    pub fn enable() -> Result<Self> {
        let stdin = io::stdin();
        let saved = termios::tcgetattr(stdin.as_fd()).context("can't read terminal attributes")?;

        let mut raw = saved.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &raw)
            .context("can't switch terminal to raw mode")?;

        debug!("terminal in raw mode");
        Ok(Self { saved })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let stdin = io::stdin();
        match termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &self.saved) {
            Ok(()) => debug!("terminal attributes restored"),
            Err(e) => warn!(error = %e, "failed to restore terminal attributes"),
        }
    }
}
