//! Executor invocation
//!
//! Each resource operation runs `<executor> <script> <event>` with:
//!
//! - the provider's environment plus the merged `environment` map, `event`
//!   and `TERRAFORM_UNIVERSE_RESOURCETYPE`
//! - stdin: `{"id": ..., "config": ..., "result": ...}`
//! - stdout: a JSON object, or nothing
//!
//! A non-zero exit status is a failure; its stderr becomes the error message.

use std::collections::BTreeMap;
use std::fmt;
use std::process::Stdio;

use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Variable carrying the operation name
pub const ENV_EVENT: &str = "event";

/// Variable carrying the resource type being operated on
pub const ENV_RESOURCE_TYPE: &str = "TERRAFORM_UNIVERSE_RESOURCETYPE";

/// Resource lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Create,
    Read,
    Update,
    Delete,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Create => "create",
            Event::Read => "read",
            Event::Update => "update",
            Event::Delete => "delete",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from running the executor
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to start '{executor}': {source}")]
    Spawn {
        executor: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to '{executor}': {source}")]
    Io {
        executor: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{executor} {script} {event}' exited with {status}: {stderr}")]
    Failed {
        executor: String,
        script: String,
        event: Event,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("failed to encode input for '{executor} {script} {event}': {source}")]
    InvalidInput {
        executor: String,
        script: String,
        event: Event,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{executor} {script} {event}' printed invalid JSON: {source}")]
    InvalidOutput {
        executor: String,
        script: String,
        event: Event,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{executor} {script} {event}' printed {found}, expected a JSON object")]
    NotAnObject {
        executor: String,
        script: String,
        event: Event,
        found: String,
    },
}

/// Document written to the executor's stdin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub id: Option<String>,
    pub config: serde_json::Value,
    pub result: Option<serde_json::Value>,
}

/// One executor run
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub executor: &'a str,
    pub script: &'a str,
    pub event: Event,
    pub resource_type: &'a str,
    pub environment: &'a BTreeMap<String, String>,
    pub payload: Payload,
}

impl Invocation<'_> {
    /// Run the executor and parse its output
    ///
    /// Returns `None` when the executor printed nothing but whitespace.
    pub async fn run(&self) -> Result<Option<serde_json::Value>, ExecutorError> {
        let input =
            serde_json::to_vec(&self.payload).map_err(|source| ExecutorError::InvalidInput {
                executor: self.executor.to_string(),
                script: self.script.to_string(),
                event: self.event,
                source,
            })?;

        log::debug!(
            "Running '{} {} {}' for {}",
            self.executor,
            self.script,
            self.event,
            self.resource_type
        );

        let mut child = Command::new(self.executor)
            .arg(self.script)
            .arg(self.event.as_str())
            .envs(self.environment)
            .env(ENV_EVENT, self.event.as_str())
            .env(ENV_RESOURCE_TYPE, self.resource_type)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                executor: self.executor.to_string(),
                source,
            })?;

        // Feed stdin while stdout and stderr are drained, or an executor that
        // echoes its input fills the pipe and both sides block
        let stdin = child.stdin.take();
        let write_input = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&input).await {
                // The executor may exit without reading its input
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                result => result,
            }
        };

        let (written, output) = tokio::join!(write_input, child.wait_with_output());
        let io_error = |source| ExecutorError::Io {
            executor: self.executor.to_string(),
            source,
        };
        let output = output.map_err(io_error)?;
        written.map_err(io_error)?;

        if !output.status.success() {
            return Err(ExecutorError::Failed {
                executor: self.executor.to_string(),
                script: self.script.to_string(),
                event: self.event,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(None);
        }
        let value: serde_json::Value =
            serde_json::from_str(&stdout).map_err(|source| ExecutorError::InvalidOutput {
                executor: self.executor.to_string(),
                script: self.script.to_string(),
                event: self.event,
                source,
            })?;
        if !value.is_object() {
            return Err(ExecutorError::NotAnObject {
                executor: self.executor.to_string(),
                script: self.script.to_string(),
                event: self.event,
                found: value.to_string(),
            });
        }
        Ok(Some(value))
    }
}
