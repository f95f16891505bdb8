//! Out-of-process structural analyzer
//!
//! Each call spawns a fresh analyzer process, writes the source text to its
//! stdin, closes stdin, and collects stdout and stderr concurrently until
//! the process exits. The exit status decides how the output is read:
//!
//! - exit 0: stdout must be a JSON [`StructuralResult`]
//! - anything else: the call fails with the collected stderr
//!
//! No state is shared between calls and nothing is retried here.

use super::{AnalyzerFailure, FailureReason, StructuralAnalyzer, StructuralResult};
use crate::config::AnalyzerConfig;
use crate::source::SourceUnit;
use crate::util::{lossy_text, truncate};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

/// Maximum characters of bad stdout echoed back in a failure
const OUTPUT_PREVIEW_CHARS: usize = 200;

/// Runs an external analyzer, one process per request
#[derive(Debug, Clone)]
pub struct AnalyzerBridge {
    program: String,
    script: Option<PathBuf>,
    timeout: Option<Duration>,
}

/// What a finished process left behind
struct Exited {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl AnalyzerBridge {
    pub fn new(program: impl Into<String>, script: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script,
            timeout: None,
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(config.program.clone(), config.script.clone()).with_timeout(config.timeout())
    }

    /// Kill the analyzer if it runs longer than `timeout`; `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(script) = &self.script {
            command.arg(script);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run(&self, source: &SourceUnit) -> Result<Exited, AnalyzerFailure> {
        debug!(identity = %source.identity, program = %self.program, "spawning analyzer");
        let mut child = self.command().spawn().map_err(|e| {
            AnalyzerFailure::new(
                FailureReason::SpawnError,
                format!("failed to start '{}': {}", self.program, e),
            )
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let input = source.text.as_bytes();

        let exchange = async {
            let feed = async move {
                match stdin {
                    Some(mut pipe) => {
                        pipe.write_all(input).await?;
                        pipe.shutdown().await
                    }
                    None => Ok(()),
                }
            };
            let (fed, stdout, stderr) = tokio::join!(feed, drain(stdout), drain(stderr));
            if let Err(e) = fed {
                // The analyzer may exit before reading all input; its exit
                // status is what counts.
                debug!(error = %e, "analyzer stopped reading stdin early");
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>(Exited {
                status,
                stdout: stdout?,
                stderr: stderr?,
            })
        };

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange).await.ok(),
            None => Some(exchange.await),
        };

        match outcome {
            Some(Ok(exited)) => Ok(exited),
            Some(Err(e)) => Err(stream_failure(e)),
            None => {
                let _ = child.kill().await;
                Err(AnalyzerFailure::new(
                    FailureReason::Timeout,
                    format!(
                        "analyzer did not finish within {}s",
                        self.timeout.map(|t| t.as_secs_f64()).unwrap_or_default()
                    ),
                ))
            }
        }
    }
}

/// The process started but its pipes broke before it could be read to the end
fn stream_failure(err: std::io::Error) -> AnalyzerFailure {
    AnalyzerFailure::new(
        FailureReason::MalformedOutput,
        format!("couldn't collect analyzer output: {}", err),
    )
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

fn interpret(exited: Exited, source: &SourceUnit) -> Result<StructuralResult, AnalyzerFailure> {
    if !exited.status.success() {
        let stderr = lossy_text(&exited.stderr);
        let detail = if stderr.trim().is_empty() {
            format!("analyzer exited with {}", exited.status)
        } else {
            stderr
        };
        return Err(AnalyzerFailure::new(FailureReason::NonZeroExit, detail));
    }

    let mut result: StructuralResult = serde_json::from_slice(&exited.stdout).map_err(|e| {
        AnalyzerFailure::new(
            FailureReason::MalformedOutput,
            format!(
                "{} (output: {})",
                e,
                truncate(&lossy_text(&exited.stdout), OUTPUT_PREVIEW_CHARS)
            ),
        )
    })?;

    result
        .validate()
        .map_err(|e| AnalyzerFailure::new(FailureReason::MalformedOutput, e))?;

    if result.identity.is_empty() {
        result.identity = source.identity.clone();
    }
    Ok(result)
}

#[async_trait]
impl StructuralAnalyzer for AnalyzerBridge {
    async fn analyze(&self, source: &SourceUnit) -> Result<StructuralResult, AnalyzerFailure> {
        let exited = self.run(source).await?;
        debug!(
            identity = %source.identity,
            status = %exited.status,
            stdout_bytes = exited.stdout.len(),
            stderr_bytes = exited.stderr.len(),
            "analyzer exited"
        );
        interpret(exited, source)
    }
}
