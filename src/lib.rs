//! A small interactive shell.
//!
//! A line typed at the prompt goes through three stages. The [`editor`]
//! collects it in raw terminal mode, with Tab completion from [`completion`]
//! and Up/Down recall from [`history`]. The [`parser`] splits it into
//! pipeline stages, honoring quotes, escapes and `>`/`>>`/`2>` redirections.
//! The [`executor`] runs the stages, builtins in-process and everything else
//! through fork and exec, wiring pipes between them.
//!
//! The main entry point is [`Interpreter`], which owns the session state and
//! drives that loop. The public modules expose the pieces for use on their own.

mod builtin;
pub mod command;
pub mod completion;
pub mod config;
pub mod editor;
pub mod env;
pub mod executor;
mod external;
pub mod history;
mod interpreter;
pub mod parser;
pub mod streams;
pub mod terminal;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;

pub use command::{Builtin, BuiltinRegistry, ExitCode, Invocation, ShellState};
pub use config::Config;
pub use env::Environment;
pub use parser::{Redirection, RedirectTarget, Stage, parse};
