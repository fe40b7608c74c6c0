//! Line-oriented transport: requests are written to the worker's stdin as
//! newline-delimited JSON and responses are read back from stdout, with an
//! empty line closing each request's batch.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use paintdry_model::{ModuleRequest, ModuleResponse};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::WorkerTransport;
use super::process::{WorkerProcess, shell_command};
use crate::error::{PipelineError, Result};

#[derive(Debug)]
pub struct PipeTransport {
    module: String,
    command: String,
    pending: Vec<ModuleRequest>,
    received: Arc<Mutex<Vec<ModuleResponse>>>,
    running: Option<PipeSession>,
}

#[derive(Debug)]
struct PipeSession {
    process: WorkerProcess,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl PipeTransport {
    pub fn new(module: &str, command: &str) -> Self {
        Self {
            module: module.to_string(),
            command: command.to_string(),
            pending: Vec::new(),
            received: Arc::new(Mutex::new(Vec::new())),
            running: None,
        }
    }
}

#[async_trait]
impl WorkerTransport for PipeTransport {
    async fn submit(&mut self, batch: &[ModuleRequest]) -> Result<()> {
        self.pending.extend_from_slice(batch);
        Ok(())
    }

    async fn launch(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let mut lines = Vec::with_capacity(self.pending.len());
        for request in self.pending.drain(..) {
            let mut line = serde_json::to_vec(&request)?;
            line.push(b'\n');
            lines.push(line);
        }

        let command = shell_command::<&str>(&self.command, &[]);
        let mut process =
            WorkerProcess::spawn(&self.module, command, Stdio::piped(), false)?;

        let stdin = process.child_mut().stdin.take().ok_or_else(|| {
            PipelineError::Internal(format!("Worker '{}' has no stdin", self.module))
        })?;
        let stdout = process.child_mut().stdout.take().ok_or_else(|| {
            PipelineError::Internal(format!("Worker '{}' has no stdout", self.module))
        })?;

        let module = self.module.clone();
        let writer = tokio::spawn(async move {
            let mut stdin = stdin;
            for line in lines {
                if let Err(err) = stdin.write_all(&line).await {
                    warn!(module = %module, error = %err, "worker closed stdin early");
                    return;
                }
            }
            // dropping stdin signals end of input
        });

        let module = self.module.clone();
        let received = Arc::clone(&self.received);
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<ModuleResponse>(line) {
                            Ok(response) => received.lock().await.push(response),
                            Err(err) => {
                                warn!(module = %module, error = %err, "malformed response line skipped");
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(module = %module, error = %err, "failed to read worker output");
                        break;
                    }
                }
            }
        });

        self.running = Some(PipeSession {
            process,
            reader,
            writer,
        });
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        let exited = match self.running.as_mut() {
            Some(session) => session.process.has_exited(),
            None => return false,
        };
        // The reader may still hold buffered output; keep the session until
        // `wait` has joined it.
        !exited || self.running.as_ref().is_some_and(|s| !s.reader.is_finished())
    }

    async fn wait(&mut self) -> Result<()> {
        let Some(session) = self.running.take() else {
            return Ok(());
        };
        if let Err(err) = session.writer.await {
            warn!(module = %self.module, error = %err, "request writer task failed");
        }
        session.process.wait().await?;
        if let Err(err) = session.reader.await {
            warn!(module = %self.module, error = %err, "response reader task failed");
        }
        Ok(())
    }

    async fn collect(&mut self) -> Result<Vec<ModuleResponse>> {
        let responses = std::mem::take(&mut *self.received.lock().await);
        if !responses.is_empty() {
            debug!(module = %self.module, responses = responses.len(), "pipe responses collected");
        }
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_through_a_line_worker() {
        // Answers every request line with a confirmed discovery.
        let command = r#"while read -r line; do [ -n "$line" ] && printf '%s\n\n' '{"operation":"discovery","resource":"example.com","module":"dns","source":"config","timestamp":1}'; done"#;
        let mut transport = PipeTransport::new("dns", command);
        transport
            .submit(&[
                ModuleRequest::discovery("example.com", "dns", "config", 1),
                ModuleRequest::observation("example.com", "dns", 1),
            ])
            .await
            .unwrap();

        transport.launch().await.unwrap();
        transport.wait().await.unwrap();

        let responses = transport.collect().await.unwrap();
        assert_eq!(responses.len(), 2);
        assert!(transport.collect().await.unwrap().is_empty());
        assert!(!transport.is_running());
    }
}
