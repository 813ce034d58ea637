use crate::command::ExitCode;
use crate::env::Environment;
use std::borrow::Cow;
use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Resolve a program name to an executable the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returned if it is an executable file.
/// - Relative with a separator (`./a.out`, `bin/tool`): tested against the
///   current directory.
/// - Single component: each directory of `search_paths` (colon-separated) is
///   tried in order and the first executable match wins.
/// - Empty name: `None`.
///
/// Returns the provided `path` itself when it resolves directly, or an owned
/// `PathBuf` when found through the search path.
pub fn locate<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(name), None) if !path.starts_with(".") => {
            find_in_path(search_paths, name.as_os_str()).map(Cow::Owned)
        }
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

/// [`locate`] against the `PATH` of `env`.
pub fn resolve(env: &Environment, program: &str) -> Option<PathBuf> {
    let search_paths = env.search_path();
    locate(OsStr::new(&search_paths), Path::new(program)).map(Cow::into_owned)
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(cmd))
        .find(|candidate| is_executable(candidate))
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if is_executable(path) { Some(path) } else { None }
}

/// A regular file (after following symlinks) with at least one execute bit.
pub fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// A command running `path` with `arguments[0]` as its visible name and the
/// rest as its arguments. The environment is inherited unchanged.
pub fn command(path: &Path, arguments: &[String]) -> Command {
    let mut cmd = Command::new(path);
    if let Some((name, args)) = arguments.split_first() {
        cmd.arg0(name).args(args);
    }
    cmd
}

/// Shell-style status of a finished child: its exit code, or 128 + signal.
pub fn exit_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(code) => code,
        None => terminated_by_signal(exit_status),
    }
}

fn terminated_by_signal(exit_status: ExitStatus) -> ExitCode {
    if let Some(signal) = exit_status.signal() {
        128 + signal
    } else if exit_status.core_dumped() {
        255
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::fs::File;

    fn osstr(s: &str) -> &OsStr {
        OsStr::new(s)
    }

    fn make_executable(path: &Path) {
        File::create(path).expect("touch");
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    #[test]
    fn absolute_existing_true() {
        let path = Path::new("/bin/sh");
        let res = locate(osstr("/bin"), path);
        assert!(res.is_some(), "Expected to find /bin/sh via absolute path");
        assert_eq!(res.unwrap().as_ref(), path);
    }

    #[test]
    fn absolute_nonexisting() {
        let path = Path::new("/bin/nonexisting");
        assert!(locate(osstr("/bin"), path).is_none());
    }

    #[test]
    fn single_component_found_in_path() {
        let res = locate(osstr("/nonexistent_dir:/bin"), Path::new("sh"));
        let found = res.expect("Expected to find 'sh' in /bin via PATH search");
        assert_eq!(found.as_ref(), Path::new("/bin/sh"));
    }

    #[test]
    fn single_component_not_found_in_path() {
        assert!(locate(osstr("/bin"), Path::new("nonexisting")).is_none());
    }

    #[test]
    fn first_match_in_path_order_wins() {
        let first = tempfile::tempdir().expect("tempdir");
        let second = tempfile::tempdir().expect("tempdir");
        make_executable(&first.path().join("tool"));
        make_executable(&second.path().join("tool"));

        let search = format!("{}:{}", first.path().display(), second.path().display());
        let found = locate(osstr(&search), Path::new("tool")).expect("tool in PATH");
        assert_eq!(found.as_ref(), first.path().join("tool"));

        let search = format!("{}:{}", second.path().display(), first.path().display());
        let found = locate(osstr(&search), Path::new("tool")).expect("tool in PATH");
        assert_eq!(found.as_ref(), second.path().join("tool"));
    }

    #[test]
    fn non_executable_files_are_skipped() {
        let plain = tempfile::tempdir().expect("tempdir");
        let exec = tempfile::tempdir().expect("tempdir");
        File::create(plain.path().join("tool")).expect("touch");
        make_executable(&exec.path().join("tool"));

        let search = format!("{}:{}", plain.path().display(), exec.path().display());
        let found = locate(osstr(&search), Path::new("tool")).expect("tool in PATH");
        assert_eq!(found.as_ref(), exec.path().join("tool"));
    }

    #[test]
    fn directories_are_not_executables() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("tool")).expect("mkdir");
        let search = dir.path().to_string_lossy().to_string();
        assert!(locate(osstr(&search), Path::new("tool")).is_none());
    }

    #[test]
    fn relative_path_with_separator_is_not_searched() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("bin")).expect("mkdir");
        make_executable(&dir.path().join("bin").join("tool"));

        // A name with a slash never goes through the search path.
        let search = dir.path().to_string_lossy().to_string();
        assert!(locate(osstr(&search), Path::new("bin/tool")).is_none());
        assert!(locate(osstr(&search), Path::new("./tool")).is_none());
    }

    #[test]
    fn empty_path_is_none() {
        assert!(locate(osstr("/bin"), Path::new("")).is_none());
    }

    #[test]
    fn resolve_uses_environment_path() {
        let env = Environment::with_vars([("PATH", "/bin")]);
        assert_eq!(resolve(&env, "sh"), Some(PathBuf::from("/bin/sh")));

        let env = Environment::with_vars(Vec::<(String, String)>::new());
        assert_eq!(resolve(&env, "sh"), None);
        assert_eq!(resolve(&env, "/bin/sh"), Some(PathBuf::from("/bin/sh")));
    }

    #[test]
    fn exit_code_of_finished_children() {
        let ok = Command::new("/bin/sh").args(["-c", "exit 0"]).status().unwrap();
        let failed = Command::new("/bin/sh").args(["-c", "exit 3"]).status().unwrap();
        let killed = Command::new("/bin/sh").args(["-c", "kill -9 $$"]).status().unwrap();
        assert_eq!(exit_code(ok), 0);
        assert_eq!(exit_code(failed), 3);
        assert_eq!(exit_code(killed), 128 + 9);
    }

    #[test]
    fn command_keeps_program_name_as_arg0() {
        let output = command(Path::new("/bin/sh"), &["sh".to_string(), "-c".to_string(), "echo $0".to_string()])
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "sh\n");
    }
}
