//! Generator invoker
//!
//! Runs one [`AutomationTask`] by spawning the external generator CLI inside
//! an isolated task directory, then harvests whatever files it wrote. The
//! invoker never fails: spawn errors, non-zero exits, timeouts and
//! cancellation are all encoded in the returned [`InvocationResult`].

pub mod batch;
pub mod prompt;

use async_trait::async_trait;
use cloudops_core::domain::artifact::{ArtifactBundle, InvocationResult};
use cloudops_core::domain::task::AutomationTask;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::artifacts::{PROMPT_FILE, read_artifacts};

/// Marker written into each task directory; its mtime ages the directory
pub const CREATED_MARKER: &str = ".created";

/// Arguments appended after the prompt
const TRAILING_ARGS: &[&str] = &["--oneshot", "--mode", "plan", "--output-format", "plain"];

/// Environment that puts the generator in non-interactive, auto-approve mode
const GENERATOR_ENV: &[(&str, &str)] = &[
    ("CI", "true"),
    ("CLINE_AUTO_APPROVE", "true"),
    ("CLINE_NON_INTERACTIVE", "true"),
];

const VALIDATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for output readers to drain once the process is gone
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Executes automation tasks
#[async_trait]
pub trait GeneratorInvoker: Send + Sync {
    /// Runs `task` to completion, timeout or cancellation
    ///
    /// Never returns an error; failures are reported through the result.
    async fn invoke(&self, task: &AutomationTask, cancel: &CancellationToken) -> InvocationResult;
}

/// [`GeneratorInvoker`] backed by an external CLI process
pub struct CliInvoker {
    work_root: PathBuf,
    command: String,
    args: Vec<String>,
    default_timeout: Duration,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl CliInvoker {
    /// Creates an invoker that runs `command` with task directories under `work_root`
    pub fn new(work_root: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            work_root: work_root.into(),
            command: command.into(),
            args: Vec::new(),
            default_timeout: Duration::from_millis(
                cloudops_core::domain::task::DEFAULT_TASK_TIMEOUT_MS,
            ),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Arguments placed before the prompt
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Timeout for tasks that do not carry their own
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Checks that the generator CLI can be executed (`<command> version`)
    pub async fn validate_cli(&self) -> bool {
        let mut cmd = Command::new(&self.command);
        cmd.arg("version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(VALIDATE_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!(command = %self.command, version = %version.trim(), "Generator CLI validated");
                true
            }
            Ok(Ok(output)) => {
                error!(command = %self.command, code = ?output.status.code(), "Generator CLI version check failed");
                false
            }
            Ok(Err(e)) => {
                error!(command = %self.command, "Generator CLI not found or not executable: {}", e);
                false
            }
            Err(_) => {
                error!(command = %self.command, "Generator CLI version check timed out");
                false
            }
        }
    }

    /// Deletes task directories older than `max_age`
    ///
    /// Age is taken from the `.created` marker, or the directory's own mtime
    /// when the marker is missing. Directories of in-flight tasks are never
    /// touched. Returns the number of directories removed.
    pub async fn cleanup(&self, max_age: Duration) -> usize {
        let root = self.work_root.clone();
        let active = lock(&self.in_flight).clone();

        let result =
            tokio::task::spawn_blocking(move || remove_stale_dirs(&root, max_age, &active)).await;

        match result {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Task directory cleanup panicked: {}", e);
                0
            }
        }
    }

    async fn run_process(
        &self,
        task_dir: &Path,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProcessRun {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg(prompt)
            .args(TRAILING_ARGS)
            .envs(GENERATOR_ENV.iter().copied())
            .current_dir(task_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ProcessRun {
                    exit: ProcessExit::SpawnFailed(format!(
                        "failed to spawn {}: {}",
                        self.command, e
                    )),
                    stdout: String::new(),
                    stderr: String::new(),
                };
            }
        };

        let stdout = Arc::new(Mutex::new(String::new()));
        let stderr = Arc::new(Mutex::new(String::new()));
        let stdout_handle = child
            .stdout
            .take()
            .map(|out| tokio::spawn(collect_lines(out, Arc::clone(&stdout))));
        let stderr_handle = child
            .stderr
            .take()
            .map(|err| tokio::spawn(collect_lines(err, Arc::clone(&stderr))));

        let exit = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => ProcessExit::Exited(status.code()),
                Err(e) => ProcessExit::SpawnFailed(format!("failed waiting for {}: {}", self.command, e)),
            },
            _ = tokio::time::sleep(timeout) => ProcessExit::TimedOut(timeout),
            _ = cancel.cancelled() => ProcessExit::Cancelled,
        };

        if matches!(exit, ProcessExit::TimedOut(_) | ProcessExit::Cancelled) {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill generator process: {}", e);
            }
        }

        for handle in [stdout_handle, stderr_handle].into_iter().flatten() {
            if tokio::time::timeout(DRAIN_GRACE, handle).await.is_err() {
                debug!("Generator output still open after exit, keeping what was read");
            }
        }

        ProcessRun {
            exit,
            stdout: lock(&stdout).clone(),
            stderr: lock(&stderr).clone(),
        }
    }
}

#[async_trait]
impl GeneratorInvoker for CliInvoker {
    async fn invoke(&self, task: &AutomationTask, cancel: &CancellationToken) -> InvocationResult {
        let started = Instant::now();
        let dir_name = task.sanitized_id();
        let task_dir = self.work_root.join(&dir_name);
        let _in_flight = InFlight::register(&self.in_flight, dir_name);

        info!(task_id = %task.id, kind = %task.kind, "Executing generator task");

        let prompt = prompt::build_prompt(task);

        if let Err(e) = prepare_task_dir(&task_dir, &prompt).await {
            error!(task_id = %task.id, dir = %task_dir.display(), "Failed to prepare task directory: {}", e);
            return InvocationResult::failed(
                "",
                format!("failed to prepare task directory: {}", e),
                elapsed_ms(started),
            );
        }

        let timeout = task.timeout_or(self.default_timeout);
        let run = self.run_process(&task_dir, &prompt, timeout, cancel).await;

        let harvest_dir = task_dir.clone();
        let artifacts = tokio::task::spawn_blocking(move || read_artifacts(&harvest_dir))
            .await
            .unwrap_or_else(|e| {
                warn!(task_id = %task.id, "Artifact harvest panicked: {}", e);
                None
            });

        let result = settle(run, artifacts, elapsed_ms(started));

        if result.success {
            info!(
                task_id = %task.id,
                duration_ms = result.duration_ms,
                files = result.files().len(),
                partial = result.error.is_some(),
                "Generator task completed"
            );
        } else {
            error!(
                task_id = %task.id,
                duration_ms = result.duration_ms,
                error = result.error.as_deref().unwrap_or_default(),
                "Generator task failed"
            );
        }

        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProcessExit {
    /// Exit code; `None` when the process was killed by a signal
    Exited(Option<i32>),
    TimedOut(Duration),
    Cancelled,
    SpawnFailed(String),
}

#[derive(Debug)]
struct ProcessRun {
    exit: ProcessExit,
    stdout: String,
    stderr: String,
}

impl ProcessRun {
    fn output(&self) -> String {
        if self.stdout.trim().is_empty() {
            self.stderr.clone()
        } else {
            self.stdout.clone()
        }
    }

    fn failure_reason(&self) -> Option<String> {
        let reason = match &self.exit {
            ProcessExit::Exited(Some(0)) => return None,
            ProcessExit::Exited(Some(code)) => format!("generator exited with code {}", code),
            ProcessExit::Exited(None) => "generator terminated by signal".to_string(),
            ProcessExit::TimedOut(after) => format!("generator timed out after {}ms", after.as_millis()),
            ProcessExit::Cancelled => "task cancelled".to_string(),
            ProcessExit::SpawnFailed(e) => e.clone(),
        };

        let tail = stderr_tail(&self.stderr);
        if tail.is_empty() {
            Some(reason)
        } else {
            Some(format!("{} (stderr: {})", reason, tail))
        }
    }
}

/// Maps a finished process and its harvested files to a result
///
/// A clean exit needs at least one file. Timeouts and failed exits still
/// count as success when files were recovered. Cancellation and spawn
/// failures never succeed.
fn settle(run: ProcessRun, artifacts: Option<ArtifactBundle>, duration_ms: u64) -> InvocationResult {
    let output = run.output();
    let artifacts = artifacts.filter(|bundle| !bundle.is_empty());

    match (&run.exit, artifacts) {
        (ProcessExit::Exited(Some(0)), Some(bundle)) => InvocationResult {
            success: true,
            output,
            error: None,
            duration_ms,
            artifacts: Some(bundle),
        },
        (ProcessExit::Exited(Some(0)), None) => InvocationResult::failed(
            output,
            "generator exited successfully but produced no files",
            duration_ms,
        ),
        (ProcessExit::Cancelled | ProcessExit::SpawnFailed(_), _) => InvocationResult::failed(
            output,
            run.failure_reason().unwrap_or_default(),
            duration_ms,
        ),
        (_, Some(bundle)) => {
            let reason = run.failure_reason().unwrap_or_default();
            warn!(files = bundle.len(), "Generator did not finish cleanly but produced files: {}", reason);
            InvocationResult {
                success: true,
                output,
                error: Some(format!("partially completed: {}", reason)),
                duration_ms,
                artifacts: Some(bundle),
            }
        }
        (_, None) => InvocationResult::failed(
            output,
            run.failure_reason().unwrap_or_default(),
            duration_ms,
        ),
    }
}

async fn prepare_task_dir(dir: &Path, prompt: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    let stamp = chrono::Utc::now().to_rfc3339();
    tokio::fs::write(dir.join(CREATED_MARKER), stamp).await?;
    tokio::fs::write(dir.join(PROMPT_FILE), prompt).await?;

    debug!(dir = %dir.display(), "Prepared task directory");
    Ok(())
}

async fn collect_lines<R>(stream: R, sink: Arc<Mutex<String>>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut buf = lock(&sink);
        buf.push_str(&line);
        buf.push('\n');
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join(" | ")
}

fn remove_stale_dirs(root: &Path, max_age: Duration, active: &HashSet<String>) -> usize {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(root = %root.display(), "Nothing to clean up: {}", e);
            return 0;
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if active.contains(&name) {
            continue;
        }

        let created = std::fs::metadata(path.join(CREATED_MARKER))
            .or_else(|_| std::fs::metadata(&path))
            .and_then(|meta| meta.modified());

        let Ok(created) = created else {
            continue;
        };

        let age = now.duration_since(created).unwrap_or_default();
        if age <= max_age {
            continue;
        }

        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                info!(dir = %name, "Cleaned up old task directory");
                removed += 1;
            }
            Err(e) => warn!(dir = %name, "Failed to remove task directory: {}", e),
        }
    }

    removed
}

/// Registration of a task directory as in use, released on drop
struct InFlight {
    set: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl InFlight {
    fn register(set: &Arc<Mutex<HashSet<String>>>, name: String) -> Self {
        lock(set).insert(name.clone());
        Self {
            set: Arc::clone(set),
            name,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.name);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
