use crate::parser::{RedirectTarget, Redirection};
use nix::errno::Errno;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::process::Stdio;
use tracing::debug;

/// Output and error destinations of a single stage.
///
/// Holds at most one open file per stream. A stream without a redirection
/// falls back to the process's own stdout/stderr. Files are released by
/// [`RedirectedStreams::close`] or, failing that, on drop.
pub struct RedirectedStreams {
    output: Option<File>,
    error: Option<File>,
    valid: bool,
    stdout: io::Stdout,
    stderr: io::Stderr,
}

impl RedirectedStreams {
    /// Streams with no redirections: both point at the inherited descriptors.
    pub fn inherited() -> Self {
        Self {
            output: None,
            error: None,
            valid: true,
            stdout: io::stdout(),
            stderr: io::stderr(),
        }
    }

    /// Opens every redirection in order. A later redirection of the same
    /// stream replaces (and closes) the earlier one.
    ///
    /// The first path that can't be opened is reported on stderr and marks
    /// the streams invalid; the remaining redirections are not attempted.
    pub fn open(redirections: &[Redirection]) -> Self {
        let mut streams = Self::inherited();

        for redirection in redirections {
            let slot = match redirection.target {
                RedirectTarget::Output => &mut streams.output,
                RedirectTarget::Error => &mut streams.error,
                RedirectTarget::Unknown => {
                    debug!(path = %redirection.path, "skipping redirection of unknown descriptor");
                    continue;
                }
            };

            match open_target(redirection) {
                Ok(file) => {
                    drop(slot.take());
                    *slot = Some(file);
                }
                Err(e) => {
                    let _ = writeln!(streams.stderr, "{}: {}", redirection.path, describe(&e));
                    streams.valid = false;
                    break;
                }
            }
        }

        streams
    }

    /// False when one of the redirections could not be opened.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_output_redirected(&self) -> bool {
        self.output.is_some()
    }

    pub fn is_error_redirected(&self) -> bool {
        self.error.is_some()
    }

    /// Writer for the stage's standard output.
    pub fn output(&mut self) -> &mut dyn Write {
        match self.output.as_mut() {
            Some(file) => file,
            None => &mut self.stdout,
        }
    }

    /// Writer for the stage's standard error.
    pub fn error(&mut self) -> &mut dyn Write {
        match self.error.as_mut() {
            Some(file) => file,
            None => &mut self.stderr,
        }
    }

    /// A [`Stdio`] for a child's stdout: a duplicate of the redirected file,
    /// or the inherited descriptor.
    pub fn output_stdio(&self) -> io::Result<Stdio> {
        stdio_for(self.output.as_ref())
    }

    /// A [`Stdio`] for a child's stderr.
    pub fn error_stdio(&self) -> io::Result<Stdio> {
        stdio_for(self.error.as_ref())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.output().flush()?;
        self.error().flush()
    }

    /// Releases any redirected files. Calling it again does nothing.
    pub fn close(&mut self) {
        self.output = None;
        self.error = None;
    }
}

impl Drop for RedirectedStreams {
    fn drop(&mut self) {
        let _ = self.stdout.flush();
        self.close();
    }
}

fn open_target(redirection: &Redirection) -> io::Result<File> {
    let mut options = OpenOptions::new();
    if redirection.append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.create(true).mode(0o644).open(&redirection.path)
}

fn stdio_for(file: Option<&File>) -> io::Result<Stdio> {
    match file {
        Some(file) => Ok(Stdio::from(file.try_clone()?)),
        None => Ok(Stdio::inherit()),
    }
}

/// The bare system message for an I/O error, e.g. "No such file or directory".
pub(crate) fn describe(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => Errno::from_raw(code).desc().to_string(),
        None => err.to_string(),
    }
}
