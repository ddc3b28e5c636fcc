//! depthflow process runner.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::{DepthflowCommand, DEFAULT_PROGRAM};
use crate::error::{RenderError, RenderResult};

/// Lines of stderr kept for the failure message.
const STDERR_TAIL_LINES: usize = 20;

/// How long to wait for stderr to close once the process has exited.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs depthflow commands as child processes.
#[derive(Debug, Clone)]
pub struct DepthflowRunner {
    /// Program name or path
    program: String,
    /// Kill the process after this long
    timeout: Option<Duration>,
}

impl Default for DepthflowRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl DepthflowRunner {
    /// Create a runner for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a command to completion.
    ///
    /// Success means exit status zero. The output file is not checked.
    /// On Unix the renderer gets its own process group, and a timeout kills
    /// the whole group so helper processes it started do not outlive it.
    pub async fn run(&self, cmd: &DepthflowCommand) -> RenderResult<()> {
        let program = check_renderer(&self.program)?;
        let args = cmd.build_args();
        debug!("Running renderer: {}", cmd.display(&self.program));

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "parallax_render::stderr", "{}", line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Vec::from(tail).join("\n")
            })
        });

        let status = self.wait_for_completion(&mut child).await;

        let stderr = match stderr_task {
            Some(task) => drain_stderr(task).await,
            None => None,
        };

        let status = status?;
        if status.success() {
            info!("Renderer finished: {}", cmd.output().display());
            Ok(())
        } else {
            Err(RenderError::tool_failed(&self.program, status.code(), stderr))
        }
    }

    /// Wait for the child, killing it if the timeout elapses.
    async fn wait_for_completion(&self, child: &mut Child) -> RenderResult<ExitStatus> {
        let Some(limit) = self.timeout else {
            return Ok(child.wait().await?);
        };

        match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!("Renderer timed out after {:?}, killing process", limit);
                kill_process_group(child);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill renderer: {}", e);
                }
                Err(RenderError::Timeout(limit))
            }
        }
    }
}

/// Collect the stderr tail, giving up if the pipe stays open.
///
/// A helper process that inherited stderr can hold the pipe open after the
/// renderer itself has exited.
async fn drain_stderr(mut task: JoinHandle<String>) -> Option<String> {
    match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, &mut task).await {
        Ok(joined) => joined.ok().filter(|s| !s.is_empty()),
        Err(_) => {
            warn!("Renderer stderr still open after exit, dropping it");
            task.abort();
            None
        }
    }
}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    // The group id equals the leader's pid because of process_group(0)
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        warn!("Failed to kill renderer process group {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

/// Check that the renderer is available.
pub fn check_renderer(program: &str) -> RenderResult<PathBuf> {
    which::which(program).map_err(|_| RenderError::tool_not_found(program))
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    use parallax_models::{AnimationSettings, DefaultSettings, JobSpec};

    use super::*;

    fn command() -> DepthflowCommand {
        let spec = JobSpec::new(
            "in.jpg",
            DefaultSettings::default(),
            AnimationSettings::default(),
        );
        DepthflowCommand::from_spec(&spec, "out.mp4")
    }

    fn script(dir: &tempfile::TempDir, body: &str) -> String {
        let path = dir.path().join("fake-depthflow");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let runner = DepthflowRunner::new(script(&dir, "exit 0"));
        runner.run(&command()).await.unwrap();
    }

    #[tokio::test]
    async fn test_arguments_reach_the_process() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("args.txt");
        let body = format!("printf '%s\\n' \"$@\" > {}", log.display());
        let runner = DepthflowRunner::new(script(&dir, &body));

        runner.run(&command()).await.unwrap();

        let recorded = std::fs::read_to_string(&log).unwrap();
        let recorded: Vec<&str> = recorded.lines().collect();
        assert_eq!(recorded, command().build_args());
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_status_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let runner = DepthflowRunner::new(script(&dir, "echo 'cannot open image' >&2\nexit 3"));

        let err = runner.run(&command()).await.unwrap_err();
        assert_eq!(err.exit_code(), Some(3));
        assert!(err.to_string().contains("exited with status 3"));
        assert!(err.to_string().contains("cannot open image"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = DepthflowRunner::new("parallax-no-such-renderer");
        let err = runner.run(&command()).await.unwrap_err();
        assert!(matches!(err, RenderError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let runner = DepthflowRunner::new(script(&dir, "exec sleep 5"))
            .with_timeout(Some(Duration::from_millis(200)));

        let err = runner.run(&command()).await.unwrap_err();
        assert!(matches!(err, RenderError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_not_held_up_by_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let runner = DepthflowRunner::new(script(&dir, "sleep 4 &\nexec sleep 30"))
            .with_timeout(Some(Duration::from_millis(200)));

        let started = std::time::Instant::now();
        let err = runner.run(&command()).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, RenderError::Timeout(_)));
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
        assert_eq!(err.to_string(), "Renderer timed out after 200ms");
    }

    #[tokio::test]
    async fn test_exited_renderer_with_lingering_child_returns() {
        let dir = tempfile::tempdir().unwrap();
        let runner = DepthflowRunner::new(script(&dir, "sleep 5 &\nexit 0"));

        let started = std::time::Instant::now();
        runner.run(&command()).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
