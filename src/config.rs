use crate::env::Environment;
use std::path::PathBuf;

/// Prompt printed before each line in interactive mode.
pub const DEFAULT_PROMPT: &str = "$ ";

/// Variable naming the history file.
pub const HISTFILE_VAR: &str = "HISTFILE";

/// Settings for one shell session, assembled from the command line and the
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub prompt: String,
    /// Loaded at startup and flushed at exit; `None` disables persistence.
    pub histfile: Option<PathBuf>,
    /// Whether stdin is a terminal. Controls raw mode, echo and the prompt.
    pub interactive: bool,
}

impl Config {
    /// Defaults derived from `env`: `$HISTFILE` (ignored when empty) and the
    /// standard prompt.
    pub fn from_env(env: &Environment, interactive: bool) -> Self {
        let histfile = env
            .get_var(HISTFILE_VAR)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            histfile,
            interactive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histfile_from_env() {
        let env = Environment::with_vars([(HISTFILE_VAR, "/tmp/history")]);
        let config = Config::from_env(&env, true);
        assert_eq!(config.histfile, Some(PathBuf::from("/tmp/history")));
        assert_eq!(config.prompt, DEFAULT_PROMPT);
        assert!(config.interactive);
    }

    #[test]
    fn test_empty_histfile_disables_history() {
        let env = Environment::with_vars([(HISTFILE_VAR, "")]);
        assert_eq!(Config::from_env(&env, false).histfile, None);

        let env = Environment::with_vars(Vec::<(String, String)>::new());
        assert_eq!(Config::from_env(&env, false).histfile, None);
    }
}
