//! Process entry points for worker modules.
//!
//! A module binary hands its [`WorkerModule`] to [`run`] together with the
//! parsed [`Invocation`]. The invocation decides the transport:
//!
//! * `example` prints the module's example requests and their responses,
//! * `<input_dir> <output_dir> [cache_dir]` processes request files,
//! * no arguments reads newline-delimited requests from stdin.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use paintdry_model::{ModuleRequest, ModuleResponse};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::{Result, WorkerError};
use crate::module::{WorkerModule, handle_request};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Example,
    Files {
        input_dir: PathBuf,
        output_dir: PathBuf,
        cache_dir: Option<PathBuf>,
    },
    Pipe,
}

impl Invocation {
    /// Parse process arguments, excluding the program name.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        match args.as_slice() {
            [] => Ok(Invocation::Pipe),
            [mode] if mode == "example" => Ok(Invocation::Example),
            [input, output] => Ok(Invocation::Files {
                input_dir: input.into(),
                output_dir: output.into(),
                cache_dir: None,
            }),
            [input, output, cache] => Ok(Invocation::Files {
                input_dir: input.into(),
                output_dir: output.into(),
                cache_dir: Some(cache.into()),
            }),
            _ => Err(WorkerError::Usage),
        }
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        match self {
            Invocation::Files { cache_dir, .. } => cache_dir.as_deref(),
            _ => None,
        }
    }
}

pub async fn run(module: &dyn WorkerModule, invocation: Invocation) -> Result<()> {
    match invocation {
        Invocation::Example => {
            let mut stdout = tokio::io::stdout();
            run_example(module, &mut stdout).await
        }
        Invocation::Files {
            input_dir,
            output_dir,
            cache_dir,
        } => {
            if let Some(cache) = &cache_dir {
                tokio::fs::create_dir_all(cache).await.map_err(|source| {
                    WorkerError::Io {
                        path: cache.clone(),
                        source,
                    }
                })?;
            }
            let handled = handle_files(module, &input_dir, &output_dir).await?;
            info!(module = module.name(), files = handled, "request files processed");
            Ok(())
        }
        Invocation::Pipe => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = tokio::io::stdout();
            handle_pipe(module, stdin, &mut stdout).await
        }
    }
}

pub async fn run_example<W>(module: &dyn WorkerModule, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for request in module.example_requests() {
        let line = serde_json::to_string(&request)?;
        out.write_all(format!("Example request:\n{line}\n\nResponse(s):\n").as_bytes())
            .await?;
        let responses = handle_request(module, &request).await?;
        write_batch(out, &responses).await?;
        out.write_all(b"\n").await?;
    }
    out.flush().await?;
    Ok(())
}

/// Process every `*.json` request file in `input_dir`, writing a response
/// file with the same name to `output_dir` and deleting the request file.
/// Returns how many files were answered.
pub async fn handle_files(
    module: &dyn WorkerModule,
    input_dir: &Path,
    output_dir: &Path,
) -> Result<usize> {
    for dir in [input_dir, output_dir] {
        if !tokio::fs::metadata(dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
        {
            return Err(WorkerError::MissingDirectory {
                path: dir.to_path_buf(),
            });
        }
    }

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(input_dir).await.map_err(|source| {
        WorkerError::Io {
            path: input_dir.to_path_buf(),
            source,
        }
    })?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".json") && entry.file_type().await?.is_file() {
            names.push(name);
        }
    }
    names.sort();

    let mut seen = HashSet::new();
    let mut handled = 0;
    for name in names {
        let input = input_dir.join(&name);
        let contents = tokio::fs::read_to_string(&input)
            .await
            .map_err(|source| WorkerError::Io {
                path: input.clone(),
                source,
            })?;

        if !seen.insert(contents.clone()) {
            debug!(file = %name, "duplicate request file, skipping");
            remove_file(&input).await?;
            continue;
        }

        let requests = match parse_request_file(&contents) {
            Ok(requests) => requests,
            Err(err) => {
                warn!(file = %name, error = %err, "rejecting malformed request file");
                let rejected = input_dir.join(format!("{name}.rejected"));
                tokio::fs::rename(&input, &rejected)
                    .await
                    .map_err(|source| WorkerError::Io {
                        path: input.clone(),
                        source,
                    })?;
                continue;
            }
        };

        let mut responses = Vec::new();
        for request in &requests {
            responses.extend(handle_request(module, request).await?);
        }

        write_atomically(&output_dir.join(&name), &serde_json::to_vec(&responses)?)
            .await?;
        remove_file(&input).await?;
        handled += 1;
    }

    Ok(handled)
}

/// Accepts a single request object or an array of them.
fn parse_request_file(contents: &str) -> Result<Vec<ModuleRequest>> {
    let value: Value = serde_json::from_str(contents)
        .map_err(|err| WorkerError::MalformedRequest(err.to_string()))?;
    let decode = |value: Value| {
        serde_json::from_value::<ModuleRequest>(value)
            .map_err(|err| WorkerError::MalformedRequest(err.to_string()))
    };
    match value {
        Value::Array(items) => items.into_iter().map(decode).collect(),
        object @ Value::Object(_) => Ok(vec![decode(object)?]),
        other => Err(WorkerError::MalformedRequest(format!(
            "expected an object or array, found {other}"
        ))),
    }
}

/// Newline-delimited requests in, newline-delimited responses out. Each
/// request's batch of responses is terminated by an empty line, including
/// requests that could not be decoded, so the reader never stalls.
pub async fn handle_pipe<R, W>(module: &dyn WorkerModule, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut history = HashSet::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !history.insert(line.to_string()) {
            debug!("duplicate request line, skipping");
            continue;
        }

        let responses = match serde_json::from_str::<ModuleRequest>(line) {
            Ok(request) => handle_request(module, &request).await?,
            Err(err) => {
                warn!(error = %err, "malformed request line");
                Vec::new()
            }
        };
        write_batch(out, &responses).await?;
        out.flush().await?;
    }

    Ok(())
}

async fn write_batch<W>(out: &mut W, responses: &[ModuleResponse]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for response in responses {
        let mut line = serde_json::to_vec(response)?;
        line.push(b'\n');
        out.write_all(&line).await?;
    }
    out.write_all(b"\n").await?;
    Ok(())
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|source| WorkerError::Io {
            path: tmp.clone(),
            source,
        })?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| WorkerError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn remove_file(path: &Path) -> Result<()> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|source| WorkerError::Io {
            path: path.to_path_buf(),
            source,
        })
}
