use crate::command::{BuiltinRegistry, ExitCode, ShellState};
use crate::completion::Completer;
use crate::config::Config;
use crate::editor::{Editor, ReadOutcome};
use crate::env::Environment;
use crate::executor;
use crate::parser;
use crate::terminal::{self, RawMode};
use anyhow::{Context, Result};
use std::io::{self, ErrorKind, Read, Write};
use tracing::{debug, info, warn};

/// A shell session: the read-eval loop around the parser and the executor.
///
/// The interpreter owns the [`ShellState`] (environment and history) and the
/// [`BuiltinRegistry`] and lends them to the components that need them.
///
/// Example
/// ```
/// use tinysh::{Config, Environment, Interpreter};
/// let env = Environment::new();
/// let config = Config::from_env(&env, false);
/// let mut sh = Interpreter::new(env, config);
/// assert_eq!(sh.eval("echo hello world"), 0);
/// ```
pub struct Interpreter {
    state: ShellState,
    registry: BuiltinRegistry,
    config: Config,
    /// Whether the history file was read at startup, in which case it is
    /// rewritten rather than appended to on exit.
    history_loaded: bool,
}

impl Interpreter {
    /// Create an interpreter with the default builtins.
    pub fn new(env: Environment, config: Config) -> Self {
        Self {
            state: ShellState::new(env),
            registry: BuiltinRegistry::with_defaults(),
            config,
            history_loaded: false,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    /// True once `exit` has run.
    pub fn should_exit(&self) -> bool {
        self.state.env.should_exit
    }

    /// Parses and runs one line, returning the status of its last stage.
    /// The line is not added to the history.
    pub fn eval(&mut self, line: &str) -> ExitCode {
        let stages = parser::parse(line);
        debug!(?stages, "parsed line");
        let code = executor::run(&stages, &self.registry, &mut self.state);
        debug!(code, "line finished");
        code
    }

    /// Loads the configured history file, if there is one.
    pub fn load_history(&mut self) {
        let Some(path) = self.config.histfile.as_deref() else {
            return;
        };
        if !path.exists() {
            debug!(path = %path.display(), "no history file yet");
            return;
        }
        match self.state.history.read(path) {
            Ok(count) => {
                info!(path = %path.display(), count, "history loaded");
                self.history_loaded = true;
            }
            Err(e) => warn!(error = format!("{e:#}"), "history not loaded"),
        }
    }

    /// Saves the history to the configured file. A file read at startup is
    /// rewritten with the whole log; otherwise only new entries are appended.
    pub fn flush_history(&mut self) -> Result<()> {
        let Some(path) = self.config.histfile.clone() else {
            return Ok(());
        };
        if self.history_loaded {
            self.state.history.write(&path)?;
        } else {
            let count = self.state.history.append(&path)?;
            debug!(path = %path.display(), count, "history appended");
        }
        Ok(())
    }

    /// Interactive loop over the process's stdin and stdout. Loads the
    /// history first and saves it on the way out, even after a read error.
    pub fn repl(&mut self) -> Result<()> {
        self.load_history();

        let input = terminal::stdin_reader().context("can't open standard input")?;
        let mut editor = if self.config.interactive {
            Editor::new(input, io::stdout(), self.config.prompt.clone())
        } else {
            Editor::quiet(input, io::stdout())
        };
        let result = self.run_editor(&mut editor);

        if let Err(e) = self.flush_history() {
            warn!(error = format!("{e:#}"), "history not saved");
        }
        result
    }

    /// Reads and evaluates lines from `editor` until `exit`, Ctrl-D or end
    /// of input. Non-empty lines go into the history before they run.
    pub fn run_editor<R: Read, W: Write>(&mut self, editor: &mut Editor<R, W>) -> Result<()> {
        while !self.should_exit() {
            let outcome = {
                let _raw = self.raw_mode();
                let completer = Completer::new(&self.registry, &self.state.env);
                match editor.read_line(&self.state.history, &completer) {
                    Ok(outcome) => outcome,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e).context("can't read input"),
                }
            };

            match outcome {
                ReadOutcome::Quit => break,
                ReadOutcome::Empty => continue,
                ReadOutcome::Line(line) => {
                    self.state.history.add(line.as_str());
                    self.eval(&line);
                }
            }
        }
        Ok(())
    }

    /// Raw mode for the duration of one line. Only on a terminal; if the
    /// switch fails the line is read in cooked mode.
    fn raw_mode(&self) -> Option<RawMode> {
        if !self.config.interactive {
            return None;
        }
        RawMode::enable()
            .inspect_err(|e| warn!(error = format!("{e:#}"), "staying in cooked mode"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;

    fn interpreter(histfile: Option<&Path>) -> Interpreter {
        let env = Environment::new();
        let config = Config {
            prompt: "$ ".to_string(),
            histfile: histfile.map(Path::to_path_buf),
            interactive: false,
        };
        Interpreter::new(env, config)
    }

    fn feed(sh: &mut Interpreter, input: &str) {
        let mut sink = Vec::new();
        let mut editor = Editor::quiet(Cursor::new(input.as_bytes().to_vec()), &mut sink);
        sh.run_editor(&mut editor).unwrap();
    }

    #[test]
    fn test_eval_returns_last_status() {
        let mut sh = interpreter(None);
        assert_eq!(sh.eval("true"), 0);
        assert_eq!(sh.eval("false"), 1);
        assert_eq!(sh.eval("   "), 0);
        assert_eq!(sh.eval("definitely_not_a_command_42"), 127);
    }

    #[test]
    fn test_loop_stops_at_exit() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let before = dir.path().join("before");
        let after = dir.path().join("after");
        let input = format!(
            "echo one > {}\n\nexit\necho two > {}\n",
            before.display(),
            after.display()
        );

        let mut sh = interpreter(None);
        feed(&mut sh, &input);

        assert!(sh.should_exit());
        assert_eq!(fs::read_to_string(&before)?, "one\n");
        assert!(!after.exists());
        assert_eq!(sh.state().history.len(), 2);
        assert_eq!(sh.state().history.get(1), Some("exit"));
        Ok(())
    }

    #[test]
    fn test_loop_stops_at_end_of_input() {
        let mut sh = interpreter(None);
        feed(&mut sh, "true\nfalse");
        assert!(!sh.should_exit());
        assert_eq!(sh.state().history.entries(), ["true", "false"]);
    }

    #[test]
    fn test_history_appended_when_file_is_new() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let histfile = dir.path().join("history");

        let mut sh = interpreter(Some(&histfile));
        sh.load_history();
        feed(&mut sh, "true\n\nfalse\n");
        sh.flush_history()?;

        assert_eq!(fs::read_to_string(&histfile)?, "true\nfalse\n");
        Ok(())
    }

    #[test]
    fn test_history_survives_sessions_without_duplicates() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let histfile = dir.path().join("history");
        fs::write(&histfile, "old one\nold two\n")?;

        let mut sh = interpreter(Some(&histfile));
        sh.load_history();
        assert_eq!(sh.state().history.len(), 2);
        feed(&mut sh, "true\n");
        sh.flush_history()?;
        assert_eq!(fs::read_to_string(&histfile)?, "old one\nold two\ntrue\n");

        let mut next = interpreter(Some(&histfile));
        next.load_history();
        feed(&mut next, "false\n");
        next.flush_history()?;
        assert_eq!(
            fs::read_to_string(&histfile)?,
            "old one\nold two\ntrue\nfalse\n"
        );
        Ok(())
    }

    #[test]
    fn test_no_histfile_is_a_no_op() -> Result<()> {
        let mut sh = interpreter(None);
        sh.load_history();
        feed(&mut sh, "true\n");
        sh.flush_history()?;
        Ok(())
    }
}
