//! Command-name completion over builtins and executables on the search path.

use crate::command::BuiltinRegistry;
use crate::env::Environment;
use crate::external::is_executable;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::trace;

/// Result of completing the current line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Nothing starts with the prefix.
    None,
    /// Text to append to the line: a unique candidate's remainder plus a
    /// trailing space, or the longest remainder all candidates share.
    Found(String),
    /// Several candidates with no common remainder. Full names, shortest first.
    More(Vec<String>),
}

/// A suffix beyond the prefix. Ordered by length, then lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    len: usize,
    suffix: String,
}

impl Candidate {
    fn new(suffix: &str) -> Self {
        Self {
            len: suffix.len(),
            suffix: suffix.to_string(),
        }
    }
}

/// Completes command names against a registry and a colon-separated search path.
pub struct Completer<'a> {
    registry: &'a BuiltinRegistry,
    search_path: String,
}

impl<'a> Completer<'a> {
    pub fn new(registry: &'a BuiltinRegistry, env: &Environment) -> Self {
        Self::with_search_path(registry, &env.search_path())
    }

    pub fn with_search_path(registry: &'a BuiltinRegistry, search_path: &str) -> Self {
        Self {
            registry,
            search_path: search_path.to_string(),
        }
    }

    /// Completes `prefix`. An empty prefix never matches.
    pub fn complete(&self, prefix: &str) -> Completion {
        if prefix.is_empty() {
            return Completion::None;
        }

        let candidates = self.candidates(prefix);
        trace!(prefix, count = candidates.len(), "completion candidates");

        let mut iter = candidates.iter();
        match (iter.next(), iter.next()) {
            (None, _) => Completion::None,
            (Some(only), None) => Completion::Found(format!("{} ", only.suffix)),
            _ => {
                let common = common_prefix(candidates.iter().map(|c| c.suffix.as_str()));
                if common.is_empty() {
                    Completion::More(
                        candidates
                            .iter()
                            .map(|c| format!("{prefix}{}", c.suffix))
                            .collect(),
                    )
                } else {
                    Completion::Found(common)
                }
            }
        }
    }

    fn candidates(&self, prefix: &str) -> BTreeSet<Candidate> {
        let mut found: BTreeSet<Candidate> = self
            .registry
            .names()
            .filter_map(|name| name.strip_prefix(prefix))
            .map(Candidate::new)
            .collect();

        for dir in std::env::split_paths(&self.search_path) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            executables_in(&dir, prefix, &mut found);
        }
        found
    }
}

/// Adds the executables in `dir` whose names start with `prefix`.
/// Unreadable directories are skipped.
fn executables_in(dir: &Path, prefix: &str, found: &mut BTreeSet<Candidate>) {
    let Ok(entries) = fs::read_dir(dir) else {
        trace!(dir = %dir.display(), "skipping unreadable search directory");
        return;
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some(suffix) = name.strip_prefix(prefix) {
            if is_executable(&entry.path()) {
                found.insert(Candidate::new(suffix));
            }
        }
    }
}

/// The longest string every item starts with.
fn common_prefix<'s>(mut items: impl Iterator<Item = &'s str>) -> String {
    let Some(first) = items.next() else {
        return String::new();
    };

    let mut len = first.len();
    for item in items {
        len = first[..len]
            .char_indices()
            .zip(item.chars())
            .find(|((_, a), b)| a != b)
            .map_or(len.min(item.len()), |((index, _), _)| index);
    }
    // `item.len()` may cut through a multi-byte character of `first`.
    while !first.is_char_boundary(len) {
        len -= 1;
    }
    first[..len].to_string()
}
