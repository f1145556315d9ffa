//! External process execution with cooperative cancellation
//!
//! Fetch and archive steps shell out to external binaries (yt-dlp, tar).
//! The [`ProcessHandle`] trait is the seam between the download manager and
//! those binaries: production code uses [`TokioProcessHandle`], tests plug
//! in a fake that fabricates staged files without spawning anything.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Maximum bytes of stderr kept for the failure log line
const STDERR_TAIL_BYTES: usize = 4096;

/// A fully resolved external command invocation
#[derive(Clone, Debug)]
pub struct CommandPlan {
    /// Absolute path to the binary
    pub program: PathBuf,
    /// Arguments, already in final order
    pub args: Vec<String>,
    /// Working directory the process runs in
    pub working_dir: PathBuf,
}

impl CommandPlan {
    /// Create a plan for the given program and working directory
    pub fn new(program: PathBuf, working_dir: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            working_dir,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Executes external commands on behalf of the download manager
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Run the command to completion, or kill it when `cancel` fires
    ///
    /// Returns [`Error::Canceled`] when the process was killed because of
    /// cancellation, and [`Error::ExternalTool`] on a non-zero exit.
    async fn run(&self, plan: &CommandPlan, cancel: &CancellationToken) -> Result<()>;

    /// Handler name for logging
    fn name(&self) -> &'static str;
}

/// Spawns real child processes via tokio
///
/// stdin and stdout are discarded; stderr is captured so failures can be
/// logged with the tool's own diagnostics. On cancellation the child is
/// killed and reaped before returning.
pub struct TokioProcessHandle;

#[async_trait]
impl ProcessHandle for TokioProcessHandle {
    async fn run(&self, plan: &CommandPlan, cancel: &CancellationToken) -> Result<()> {
        tracing::debug!(
            program = %plan.program.display(),
            args = ?plan.args,
            working_dir = %plan.working_dir.display(),
            "spawning external process"
        );

        let mut child = Command::new(&plan.program)
            .args(&plan.args)
            .current_dir(&plan.working_dir)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::ExternalTool(format!(
                    "failed to execute {}: {}",
                    plan.program.display(),
                    e
                ))
            })?;

        // Drain stderr concurrently so the child never blocks on a full pipe.
        let mut stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(stderr) = stderr_pipe.as_mut() {
                stderr.read_to_end(&mut buf).await.ok();
            }
            buf
        });

        let status = tokio::select! {
            status = child.wait() => status.map_err(Error::Io)?,
            _ = cancel.cancelled() => {
                tracing::debug!(program = %plan.program.display(), "killing process on cancellation");
                child.start_kill().ok();
                // Reap the child so no zombie is left behind.
                child.wait().await.ok();
                stderr_task.abort();
                return Err(Error::Canceled);
            }
        };

        if status.success() {
            return Ok(());
        }

        let stderr = stderr_task.await.unwrap_or_default();
        let tail = stderr_tail(&stderr);
        tracing::warn!(
            program = %plan.program.display(),
            exit = ?status.code(),
            stderr = %tail,
            "external process failed"
        );
        Err(Error::ExternalTool(format!(
            "{} exited with {}",
            tool_label(&plan.program),
            status
                .code()
                .map_or_else(|| "signal".to_string(), |c| format!("status {c}")),
        )))
    }

    fn name(&self) -> &'static str {
        "tokio-process"
    }
}

/// Resolve a tool binary from an explicit path or PATH lookup
///
/// An explicit path always wins. Without one, PATH is searched via `which`
/// when `search_path` is enabled; otherwise resolution fails so the caller
/// can report a configuration problem instead of a confusing spawn error.
pub fn resolve_tool(
    name: &str,
    explicit: Option<&PathBuf>,
    search_path: bool,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.clone());
    }
    if search_path {
        return which::which(name)
            .map_err(|_| Error::NotSupported(format!("{name} not found in PATH")));
    }
    Err(Error::Config {
        message: format!("no path configured for {name} and PATH search is disabled"),
        key: Some("tools.search_path".to_string()),
    })
}

fn tool_label(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
