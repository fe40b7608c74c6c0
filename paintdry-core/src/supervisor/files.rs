//! Directory-based transport: request and response files holding JSON
//! arrays, one pair of directories per module.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use paintdry_model::{ModuleRequest, ModuleResponse};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::WorkerTransport;
use super::process::{WorkerProcess, shell_command};
use crate::error::Result;

/// Queue layout for one module under the queue root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDirs {
    pub requests: PathBuf,
    pub responses: PathBuf,
    pub cache: PathBuf,
}

impl QueueDirs {
    pub fn for_module(queue_root: &Path, module: &str) -> Self {
        let base = queue_root.join("modules").join(module);
        Self {
            requests: base.join("requests"),
            responses: base.join("responses"),
            cache: base.join("cache"),
        }
    }

    async fn create(&self) -> Result<()> {
        for dir in [&self.requests, &self.responses, &self.cache] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}

/// Name a request batch by the SHA-256 of its content with timestamps
/// removed, so re-submitting the same work never produces a second file.
pub fn request_file_name(batch: &[ModuleRequest]) -> Result<String> {
    let identities = batch
        .iter()
        .map(ModuleRequest::identity)
        .collect::<serde_json::Result<Vec<_>>>()?;
    let digest = Sha256::digest(serde_json::to_vec(&identities)?);
    Ok(format!("{}.json", hex::encode(digest)))
}

#[derive(Debug)]
pub struct FileQueueTransport {
    module: String,
    command: String,
    dirs: QueueDirs,
    process: Option<WorkerProcess>,
}

impl FileQueueTransport {
    pub async fn new(module: &str, command: &str, queue_root: &Path) -> Result<Self> {
        let dirs = QueueDirs::for_module(queue_root, module);
        dirs.create().await?;
        Ok(Self {
            module: module.to_string(),
            command: command.to_string(),
            dirs,
            process: None,
        })
    }

    pub fn dirs(&self) -> &QueueDirs {
        &self.dirs
    }

    /// Read one response file. Elements that do not decode are skipped; the
    /// file is only set aside when it is not a JSON array at all.
    async fn read_response_file(&self, path: &Path) -> Result<Option<Vec<ModuleResponse>>> {
        let bytes = tokio::fs::read(path).await?;
        let elements = match serde_json::from_slice::<Vec<serde_json::Value>>(&bytes) {
            Ok(elements) => elements,
            Err(err) => {
                let mut rejected = path.as_os_str().to_owned();
                rejected.push(".rejected");
                warn!(
                    module = %self.module,
                    file = %path.display(),
                    error = %err,
                    "malformed response file set aside"
                );
                tokio::fs::rename(path, PathBuf::from(rejected)).await?;
                return Ok(None);
            }
        };

        let total = elements.len();
        let mut responses = Vec::with_capacity(total);
        for element in elements {
            match serde_json::from_value::<ModuleResponse>(element) {
                Ok(response) => responses.push(response),
                Err(err) => {
                    debug!(module = %self.module, file = %path.display(), error = %err, "undecodable response");
                }
            }
        }
        let skipped = total - responses.len();
        if skipped > 0 {
            warn!(
                module = %self.module,
                file = %path.display(),
                skipped,
                kept = responses.len(),
                "skipped malformed responses"
            );
        }

        tokio::fs::remove_file(path).await?;
        Ok(Some(responses))
    }
}

#[async_trait]
impl WorkerTransport for FileQueueTransport {
    async fn submit(&mut self, batch: &[ModuleRequest]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let name = request_file_name(batch)?;
        let path = self.dirs.requests.join(&name);
        if tokio::fs::try_exists(&path).await? {
            debug!(module = %self.module, file = %name, "identical request file already queued");
            return Ok(());
        }

        let tmp = self.dirs.requests.join(format!("{name}.tmp"));
        tokio::fs::write(&tmp, serde_json::to_vec(batch)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(module = %self.module, file = %name, requests = batch.len(), "request file written");
        Ok(())
    }

    async fn launch(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let command = shell_command(
            &self.command,
            &[&self.dirs.requests, &self.dirs.responses, &self.dirs.cache],
        );
        self.process = Some(WorkerProcess::spawn(
            &self.module,
            command,
            Stdio::null(),
            true,
        )?);
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        let exited = match self.process.as_mut() {
            Some(process) => process.has_exited(),
            None => return false,
        };
        if exited {
            self.process = None;
        }
        !exited
    }

    async fn wait(&mut self) -> Result<()> {
        match self.process.take() {
            Some(process) => process.wait().await,
            None => Ok(()),
        }
    }

    async fn collect(&mut self) -> Result<Vec<ModuleResponse>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dirs.responses).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") && entry.file_type().await?.is_file() {
                names.push(name);
            }
        }
        names.sort();

        let mut responses = Vec::new();
        for name in names {
            let path = self.dirs.responses.join(&name);
            if let Some(batch) = self.read_response_file(&path).await? {
                debug!(module = %self.module, file = %name, responses = batch.len(), "response file consumed");
                responses.extend(batch);
            }
        }
        Ok(responses)
    }
}
