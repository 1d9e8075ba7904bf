// Search backend that shells out to `grep -r` and `find`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use super::{PathSearch, SearchError, TextSearch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub code: Option<i32>,
    pub stdout: String,
}

/// Runs an external program with a deadline.
pub trait CommandExecutor: Send + Sync {
    /// Run `program` to completion or until `timeout` elapses. On timeout the
    /// child is killed and `SearchError::TimedOut` is returned for `root`.
    fn execute(
        &self,
        program: &str,
        args: &[String],
        root: &Path,
        timeout: Duration,
    ) -> Result<CommandResult, SearchError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl CommandExecutor for ProcessCommandExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        root: &Path,
        timeout: Duration,
    ) -> Result<CommandResult, SearchError> {
        let command = format!("{program} {}", args.join(" "));
        let spawn_failed =
            |message: String| SearchError::SpawnFailed { command: command.clone(), message };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|error| spawn_failed(error.to_string()))?;

        let mut stdout =
            child.stdout.take().ok_or_else(|| spawn_failed("stdout was not captured".into()))?;

        // Drain stdout on a helper thread so a chatty child cannot block on a
        // full pipe while we wait on the deadline.
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });

        match rx.recv_timeout(timeout) {
            Ok(buf) => {
                let status = child.wait().map_err(|error| spawn_failed(error.to_string()))?;
                Ok(CommandResult {
                    code: status.code(),
                    stdout: String::from_utf8_lossy(&buf).into_owned(),
                })
            }
            Err(RecvTimeoutError::Timeout) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(SearchError::TimedOut { root: root.to_path_buf(), timeout })
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(spawn_failed("output reader exited early".into()))
            }
        }
    }
}

/// `grep`/`find` backed search. Result order is whatever the tools report,
/// which follows directory order on disk and is not stable across machines.
#[derive(Debug, Clone)]
pub struct ProcessSearch<E = ProcessCommandExecutor> {
    executor: E,
}

impl ProcessSearch<ProcessCommandExecutor> {
    pub fn new() -> Self {
        Self { executor: ProcessCommandExecutor }
    }
}

impl Default for ProcessSearch<ProcessCommandExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CommandExecutor> ProcessSearch<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }
}

impl<E: CommandExecutor> TextSearch for ProcessSearch<E> {
    fn files_containing(
        &self,
        root: &Path,
        term: &str,
        extension: &str,
        timeout: Duration,
    ) -> Result<Vec<PathBuf>, SearchError> {
        let args = vec![
            "-r".to_string(),
            "-l".to_string(),
            "-s".to_string(),
            "-F".to_string(),
            format!("--include=*.{extension}"),
            "-e".to_string(),
            term.to_string(),
            "--".to_string(),
            root.to_string_lossy().into_owned(),
        ];
        // grep exits 1 for "no match" and 2 when some files were unreadable;
        // whatever it printed is still usable.
        let result = self.executor.execute("grep", &args, root, timeout)?;
        let matches = non_empty_lines(&result.stdout).map(PathBuf::from).collect();
        Ok(matches)
    }
}

impl<E: CommandExecutor> PathSearch for ProcessSearch<E> {
    fn first_named(
        &self,
        root: &Path,
        file_name: &str,
        timeout: Duration,
    ) -> Result<Option<PathBuf>, SearchError> {
        let args = vec![
            root.to_string_lossy().into_owned(),
            "-name".to_string(),
            file_name.to_string(),
            "-type".to_string(),
            "f".to_string(),
            "-print".to_string(),
            "-quit".to_string(),
        ];
        let result = self.executor.execute("find", &args, root, timeout)?;
        let first = non_empty_lines(&result.stdout).next().map(PathBuf::from);
        Ok(first)
    }
}

fn non_empty_lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().map(str::trim_end).filter(|line| !line.is_empty())
}
