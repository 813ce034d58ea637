use crate::env::Environment;
use crate::history::HistoryLog;
use crate::streams::RedirectedStreams;
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use std::collections::BTreeMap;
use std::io::Write;
use std::marker::PhantomData;
use tracing::warn;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Everything a command may read or change that outlives a single line.
#[derive(Debug, Default)]
pub struct ShellState {
    pub env: Environment,
    pub history: HistoryLog,
}

impl ShellState {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            history: HistoryLog::new(),
        }
    }
}

/// What a builtin gets to work with while it runs: the streams of its stage,
/// the shell state and the registry it was found in (`type` needs the latter).
pub struct Invocation<'a> {
    pub streams: &'a mut RedirectedStreams,
    pub state: &'a mut ShellState,
    pub registry: &'a BuiltinRegistry,
}

/// Object-safe handler stored in the [`BuiltinRegistry`].
///
/// `args[0]` is the name the command was invoked by. Returns the status of
/// the command, or `None` when it has nothing to report (treated as success).
pub trait Builtin {
    fn invoke(&self, args: &[String], ctx: &mut Invocation<'_>) -> Option<ExitCode>;
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "pwd" or "cd".
    fn name() -> &'static str;

    /// Executes the command against the stage's streams and the shell state.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    /// An `Err` is printed to the error stream and becomes status 1.
    fn execute(self, ctx: &mut Invocation<'_>) -> Result<ExitCode>;
}

/// Adapts a [`BuiltinCommand`] to the registry's [`Builtin`] interface.
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinCommand> Builtin for Factory<T> {
    fn invoke(&self, args: &[String], ctx: &mut Invocation<'_>) -> Option<ExitCode> {
        let rest: Vec<&str> = args.iter().skip(1).map(String::as_str).collect();

        let code = match T::from_args(&[T::name()], &rest) {
            Ok(cmd) => match cmd.execute(ctx) {
                Ok(code) => code,
                Err(e) => {
                    let _ = writeln!(ctx.streams.error(), "{e:#}");
                    1
                }
            },
            Err(EarlyExit { output, status }) => match status {
                Ok(()) => {
                    let _ = writeln!(ctx.streams.output(), "{}", output.trim_end());
                    0
                }
                Err(()) => {
                    let _ = writeln!(ctx.streams.error(), "{}", output.trim_end());
                    1
                }
            },
        };

        if let Err(e) = ctx.streams.flush() {
            warn!(command = T::name(), error = %e, "failed to flush builtin output");
        }
        Some(code)
    }
}

/// Name → handler table consulted before the path resolver.
///
/// Filled once at startup and only read afterwards. Names are kept sorted so
/// completion and listings come out in a stable order.
#[derive(Default)]
pub struct BuiltinRegistry {
    handlers: BTreeMap<String, Box<dyn Builtin>>,
}

impl BuiltinRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every builtin this shell ships with.
    pub fn with_defaults() -> Self {
        use crate::builtin::{Cd, Echo, Exit, History, Pwd, Type};

        let mut registry = Self::new();
        registry.register("echo", Box::new(Echo));
        registry.register_command::<Exit>();
        registry.register_command::<Type>();
        registry.register_command::<Pwd>();
        registry.register_command::<Cd>();
        registry.register_command::<History>();
        registry
    }

    /// Registers `handler` under `name`, returning the handler it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Box<dyn Builtin>,
    ) -> Option<Box<dyn Builtin>> {
        self.handlers.insert(name.into(), handler)
    }

    pub(crate) fn register_command<T: BuiltinCommand + 'static>(&mut self) {
        self.register(T::name(), Box::new(Factory::<T>::default()));
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn Builtin> {
        self.handlers.get(name).map(Box::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}
