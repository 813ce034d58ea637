use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// The shell's view of its process environment.
///
/// Variables are captured once at startup; builtins and the path resolver
/// read them from here rather than from the live process environment.
///
/// - `vars`: environment variables (`PATH`, `HOME`, `HISTFILE`, ...).
/// - `current_dir`: the working directory, kept in sync by `cd`.
/// - `should_exit`: set by `exit`; the read loop stops once it sees it.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            should_exit: false,
        }
    }

    /// An environment with the given variables and the process's current directory.
    pub fn with_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            current_dir: stdenv::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            should_exit: false,
        }
    }

    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The colon-separated command search path; empty when `PATH` is unset.
    pub fn search_path(&self) -> String {
        self.get_var("PATH").unwrap_or_default()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
