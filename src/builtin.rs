use crate::command::{Builtin, BuiltinCommand, ExitCode, Invocation};
use crate::external;
use crate::streams::describe;
use anyhow::{Context, Result, anyhow};
use argh::FromArgs;
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Write the arguments to standard output, separated by single spaces and
/// followed by a newline.
///
/// Unlike the other builtins `echo` takes its arguments verbatim: `echo --help`
/// prints `--help`.
pub struct Echo;

impl Builtin for Echo {
    fn invoke(&self, args: &[String], ctx: &mut Invocation<'_>) -> Option<ExitCode> {
        let line = args.get(1..).unwrap_or_default().join(" ");
        let out = ctx.streams.output();
        let written = writeln!(out, "{line}").and_then(|()| out.flush());
        Some(if written.is_ok() { 0 } else { 1 })
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, ctx: &mut Invocation<'_>) -> Result<ExitCode> {
        let cwd = ctx.state.env.current_dir.to_string_lossy().to_string();
        writeln!(ctx.streams.output(), "{cwd}")?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute, relative to the current directory, or starting with ~. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl Cd {
    fn home(ctx: &Invocation<'_>) -> Result<PathBuf> {
        ctx.state
            .env
            .get_var("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("cd: $HOME is not set"))
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, ctx: &mut Invocation<'_>) -> Result<ExitCode> {
        let shown = self.target.clone().unwrap_or_else(|| "~".to_string());
        let target = match self.target.as_deref() {
            None | Some("") | Some("~") => Self::home(ctx)?,
            Some(t) => match t.strip_prefix("~/") {
                Some(rest) => Self::home(ctx)?.join(rest),
                None => PathBuf::from(t),
            },
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            ctx.state.env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .and_then(|dir| env::set_current_dir(&dir).map(|()| dir))
            .map_err(|e| anyhow!("cd: {}: {}", shown, describe(&e)))?;
        ctx.state.env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Leave the shell once the current line has finished.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; the shell always exits with status 0.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, ctx: &mut Invocation<'_>) -> Result<ExitCode> {
        ctx.state.env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Describe how each name would be interpreted as a command.
pub struct Type {
    #[argh(positional, greedy)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(self, ctx: &mut Invocation<'_>) -> Result<ExitCode> {
        let mut code = 0;
        for name in &self.names {
            if ctx.registry.contains(name) {
                writeln!(ctx.streams.output(), "{name} is a shell builtin")?;
            } else if let Some(path) = external::resolve(&ctx.state.env, name) {
                writeln!(ctx.streams.output(), "{name} is {}", path.display())?;
            } else {
                writeln!(ctx.streams.error(), "{name}: not found")?;
                code = 1;
            }
        }
        Ok(code)
    }
}

#[derive(FromArgs)]
/// Display the command history, or load it from and save it to files.
pub struct History {
    #[argh(option, short = 'r')]
    /// append the lines of the given file to the history list.
    pub read: Option<PathBuf>,

    #[argh(option, short = 'w')]
    /// overwrite the given file with the whole history list.
    pub write: Option<PathBuf>,

    #[argh(option, short = 'a')]
    /// append entries added since the last append to the given file.
    pub append: Option<PathBuf>,

    #[argh(positional)]
    /// show only the last N entries.
    pub count: Option<usize>,
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, ctx: &mut Invocation<'_>) -> Result<ExitCode> {
        let history = &mut ctx.state.history;
        let mut touched_files = false;

        if let Some(path) = &self.read {
            history.read(path).context("history")?;
            touched_files = true;
        }
        if let Some(path) = &self.write {
            history.write(path).context("history")?;
            touched_files = true;
        }
        if let Some(path) = &self.append {
            history.append(path).context("history")?;
            touched_files = true;
        }
        if touched_files {
            return Ok(0);
        }

        let entries = history.entries();
        let skip = self
            .count
            .map_or(0, |count| entries.len().saturating_sub(count));
        let out = ctx.streams.output();
        for (index, line) in entries.iter().enumerate().skip(skip) {
            writeln!(out, "{:>5}  {}", index + 1, line)?;
        }
        Ok(0)
    }
}
