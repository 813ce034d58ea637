//! Runs parsed stages: a single stage in the shell process, two or more as a
//! chain of forked children connected by pipes.

use crate::command::{BuiltinRegistry, ExitCode, Invocation, ShellState};
use crate::external;
use crate::parser::Stage;
use crate::streams::{RedirectedStreams, describe};
use nix::errno::Errno;
use nix::libc;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use tracing::{debug, trace, warn};

/// Status reported when a command name can't be resolved.
pub const NOT_FOUND: ExitCode = 127;
/// Status reported when a resolved program can't be started.
pub const CANNOT_EXECUTE: ExitCode = 126;

/// How an external stage is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Launch {
    /// Spawn a child and wait for it; used from the shell process.
    Spawn,
    /// Replace the current process image; used inside a pipeline child.
    Replace,
}

/// Runs `stages` and returns the status of the last one.
pub fn run(stages: &[Stage], registry: &BuiltinRegistry, state: &mut ShellState) -> ExitCode {
    match stages {
        [] => 0,
        [stage] => run_stage(stage, registry, state, Launch::Spawn),
        _ => run_pipeline(stages, registry, state),
    }
}

fn run_stage(
    stage: &Stage,
    registry: &BuiltinRegistry,
    state: &mut ShellState,
    launch: Launch,
) -> ExitCode {
    let mut streams = RedirectedStreams::open(&stage.redirections);
    if !streams.is_valid() {
        return 1;
    }

    let program = stage.program();
    if let Some(builtin) = registry.lookup(program) {
        trace!(program, "running builtin");
        let mut ctx = Invocation {
            streams: &mut streams,
            state: &mut *state,
            registry,
        };
        return builtin.invoke(&stage.arguments, &mut ctx).unwrap_or(0);
    }

    let Some(path) = external::resolve(&state.env, program) else {
        let _ = writeln!(streams.output(), "{program}: command not found");
        let _ = streams.flush();
        return NOT_FOUND;
    };
    launch_external(&path, stage, streams, launch)
}

fn launch_external(
    path: &Path,
    stage: &Stage,
    mut streams: RedirectedStreams,
    launch: Launch,
) -> ExitCode {
    let program = stage.program();
    let mut cmd = external::command(path, &stage.arguments);
    match (streams.output_stdio(), streams.error_stdio()) {
        (Ok(output), Ok(error)) => {
            cmd.stdout(output).stderr(error);
        }
        (Err(e), _) | (_, Err(e)) => {
            let _ = writeln!(streams.error(), "{program}: {}", describe(&e));
            return 1;
        }
    }
    // The child holds its own duplicates from here on.
    streams.close();
    flush_std();

    debug!(program, path = %path.display(), ?launch, "starting external command");
    match launch {
        Launch::Spawn => match cmd.spawn() {
            Ok(mut child) => match child.wait() {
                Ok(status) => external::exit_code(status),
                Err(e) => {
                    warn!(program, error = %e, "failed to wait for child");
                    1
                }
            },
            Err(e) => {
                let _ = writeln!(io::stderr(), "{program}: {}", describe(&e));
                CANNOT_EXECUTE
            }
        },
        Launch::Replace => {
            // Only returns on failure.
            let e = cmd.exec();
            let _ = writeln!(io::stderr(), "{program}: {}", describe(&e));
            CANNOT_EXECUTE
        }
    }
}

/// Forks one child that builds and waits for the whole chain, and waits for it.
fn run_pipeline(stages: &[Stage], registry: &BuiltinRegistry, state: &mut ShellState) -> ExitCode {
    flush_std();
    // SAFETY: the shell is single-threaded, and the child only runs the
    // pipeline and leaves through `_exit`.
    match unsafe { unistd::fork() } {
        Ok(ForkResult::Child) => {
            let code = drive_pipeline(stages, registry, state);
            terminate(code)
        }
        Ok(ForkResult::Parent { child }) => {
            debug!(pid = %child, stages = stages.len(), "pipeline started");
            wait_for(child)
        }
        Err(e) => {
            report("fork", e);
            1
        }
    }
}

/// Body of the pipeline process: one child per stage, stage `i`'s stdout
/// wired to stage `i + 1`'s stdin. Waits for the children in stage order and
/// returns the last stage's status.
fn drive_pipeline(stages: &[Stage], registry: &BuiltinRegistry, state: &mut ShellState) -> ExitCode {
    let last = stages.len().saturating_sub(1);
    let mut upstream: Option<OwnedFd> = None;
    let mut children: Vec<(usize, Pid)> = Vec::with_capacity(stages.len());

    for (index, stage) in stages.iter().enumerate() {
        let (reader, writer) = if index < last {
            match unistd::pipe() {
                Ok((reader, writer)) => (Some(reader), Some(writer)),
                Err(e) => {
                    report("pipe", e);
                    break;
                }
            }
        } else {
            (None, None)
        };

        flush_std();
        // SAFETY: see `run_pipeline`.
        match unsafe { unistd::fork() } {
            Ok(ForkResult::Child) => {
                drop(reader);
                let code = match wire_stage(upstream.take(), writer) {
                    Ok(()) => run_stage(stage, registry, state, Launch::Replace),
                    Err(e) => {
                        report("dup2", e);
                        1
                    }
                };
                terminate(code)
            }
            Ok(ForkResult::Parent { child }) => {
                trace!(pid = %child, index, program = stage.program(), "stage started");
                children.push((index, child));
            }
            Err(e) => {
                report("fork", e);
                break;
            }
        }

        // Our copies of the write end and the consumed read end close here,
        // so each reader sees EOF once its producer exits.
        drop(writer);
        upstream = reader;
    }
    drop(upstream);

    let mut status = 1;
    for (index, pid) in children {
        let code = wait_for(pid);
        trace!(pid = %pid, index, code, "stage finished");
        if index == last {
            status = code;
        }
    }
    status
}

/// Moves the pipe ends onto stdin/stdout of the current process.
fn wire_stage(input: Option<OwnedFd>, output: Option<OwnedFd>) -> nix::Result<()> {
    if let Some(fd) = input {
        unistd::dup2(fd.as_raw_fd(), libc::STDIN_FILENO)?;
    }
    if let Some(fd) = output {
        unistd::dup2(fd.as_raw_fd(), libc::STDOUT_FILENO)?;
    }
    Ok(())
}

/// Blocks until `pid` exits. Signals map to `128 + signo`.
fn wait_for(pid: Pid) -> ExitCode {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return code,
            Ok(WaitStatus::Signaled(_, signal, _)) => return 128 + signal as i32,
            Ok(other) => trace!(?other, "still waiting"),
            Err(Errno::EINTR) => continue,
            Err(e) => {
                warn!(pid = %pid, error = %e, "waitpid failed");
                return 1;
            }
        }
    }
}

fn report(what: &str, err: Errno) {
    let _ = writeln!(io::stderr(), "{what}: {}", err.desc());
}

/// Pending output would otherwise be written twice, once by each process.
fn flush_std() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

/// Ends a forked child without running the parent's destructors or exit hooks.
fn terminate(code: ExitCode) -> ! {
    flush_std();
    // SAFETY: `_exit` only ends the process; nothing runs after it.
    unsafe { libc::_exit(code) }
}
