use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// A running worker process whose stderr (and optionally stdout) is being
/// forwarded into the log.
#[derive(Debug)]
pub(crate) struct WorkerProcess {
    module: String,
    child: Child,
    forwarders: Vec<JoinHandle<()>>,
    exited: bool,
}

/// Build the shell invocation for a module command. Extra arguments are
/// passed as positional parameters so paths never need quoting.
pub(crate) fn shell_command<S>(command: &str, args: &[S]) -> Command
where
    S: AsRef<OsStr>,
{
    let script = if args.is_empty() {
        command.to_string()
    } else {
        format!("{command} \"$@\"")
    };
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(script)
        .arg("paintdry-module")
        .args(args)
        .kill_on_drop(true);
    cmd
}

impl WorkerProcess {
    /// Spawn `command`. When `forward_stdout` is false the caller is expected
    /// to take stdout itself.
    pub(crate) fn spawn(
        module: &str,
        mut command: Command,
        stdin: Stdio,
        forward_stdout: bool,
    ) -> Result<Self> {
        command
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| {
            PipelineError::Internal(format!("Failed to start worker for module '{module}': {e}"))
        })?;
        info!(module, pid = child.id(), "worker started");

        let mut forwarders = Vec::new();
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(forward_lines(module, "stderr", stderr));
        }
        if forward_stdout && let Some(stdout) = child.stdout.take() {
            forwarders.push(forward_lines(module, "stdout", stdout));
        }

        Ok(Self {
            module: module.to_string(),
            child,
            forwarders,
            exited: false,
        })
    }

    pub(crate) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Non-blocking exit check. Returns true once the process has exited.
    /// The exit status is logged the first time it is observed.
    pub(crate) fn has_exited(&mut self) -> bool {
        if self.exited {
            return true;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                log_exit(&self.module, status);
                self.exited = true;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(module = %self.module, error = %err, "failed to poll worker");
                self.exited = true;
            }
        }
        self.exited
    }

    /// Wait for the process to exit and its log output to be drained. A
    /// non-zero exit is logged, not returned as an error.
    pub(crate) async fn wait(mut self) -> Result<()> {
        let status = self.child.wait().await.map_err(|e| {
            PipelineError::Internal(format!(
                "Failed to wait for worker '{}': {e}",
                self.module
            ))
        })?;
        if !self.exited {
            log_exit(&self.module, status);
        }
        for task in self.forwarders.drain(..) {
            let _ = task.await;
        }
        Ok(())
    }
}

fn log_exit(module: &str, status: ExitStatus) {
    if status.success() {
        debug!(module, "worker exited");
    } else {
        warn!(module, %status, "worker exited with failure; its results are skipped this pass");
    }
}

pub(crate) fn forward_lines<R>(module: &str, stream: &'static str, reader: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let module = module.to_string();
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => info!(module = %module, stream, "{line}"),
                Ok(None) => break,
                Err(err) => {
                    debug!(module = %module, stream, error = %err, "worker output closed");
                    break;
                }
            }
        }
    })
}
