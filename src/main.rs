use argh::FromArgs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use tinysh::terminal;
use tinysh::{Config, Environment, Interpreter};
use tracing_subscriber::EnvFilter;

/// Variable holding the log filter, e.g. `TINYSH_LOG=tinysh=trace`.
const LOG_VAR: &str = "TINYSH_LOG";

#[derive(FromArgs)]
/// A small interactive shell with pipelines, redirections, history and tab completion.
struct Args {
    #[argh(option, short = 'c')]
    /// run the given line, then exit with its status.
    command: Option<String>,

    #[argh(option)]
    /// history file to load at startup and save at exit; overrides $HISTFILE.
    histfile: Option<PathBuf>,

    #[argh(option)]
    /// prompt printed before each line when reading from a terminal.
    prompt: Option<String>,

    #[argh(switch, short = 'v')]
    /// log debugging details to standard error.
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    init_logging(args.verbose);

    let env = Environment::new();
    let interactive = args.command.is_none() && terminal::is_interactive();
    let mut config = Config::from_env(&env, interactive);
    if let Some(histfile) = args.histfile {
        config.histfile = Some(histfile);
    }
    if let Some(prompt) = args.prompt {
        config.prompt = prompt;
    }

    let mut shell = Interpreter::new(env, config);
    if let Some(line) = args.command {
        let code = shell.eval(&line);
        io::stdout().flush()?;
        process::exit(code);
    }

    shell.repl()
}
