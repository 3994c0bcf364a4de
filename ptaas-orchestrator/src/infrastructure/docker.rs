//! Container runtime adapter over the docker CLI
//!
//! Tools run inside long-lived containers via `docker exec`. The child is
//! spawned with `kill_on_drop`, so abandoning the future (soft limit, hard
//! limit) terminates the exec session.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::domain::errors::ScanError;
use crate::domain::services::{ContainerRuntime, ExecOutput};

/// Exit codes the shell uses for "cannot execute" and "command not found"
const EXIT_CANNOT_EXECUTE: i32 = 126;
const EXIT_COMMAND_NOT_FOUND: i32 = 127;

pub struct DockerCliRuntime {
    binary: String,
}

impl DockerCliRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    #[instrument(skip(self, command), fields(binary = %self.binary))]
    async fn exec(&self, container: &str, command: &[String]) -> Result<ExecOutput, ScanError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("exec")
            .arg(container)
            .args(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = ?cmd, "Executing in container");

        let output = cmd.output().await.map_err(|e| {
            warn!(error = %e, "Failed to launch container runtime");
            ScanError::unavailable(container, format!("cannot run {}: {}", self.binary, e))
        })?;

        classify_exit(
            container,
            ExecOutput {
                exit_code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            },
        )
    }
}

/// Separate "the container or tool is missing" from "the tool ran and failed".
fn classify_exit(container: &str, output: ExecOutput) -> Result<ExecOutput, ScanError> {
    if output.success() {
        return Ok(output);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let missing_container =
        stderr.contains("No such container") || stderr.contains("is not running");
    let missing_tool = matches!(
        output.exit_code,
        Some(EXIT_CANNOT_EXECUTE) | Some(EXIT_COMMAND_NOT_FOUND)
    );

    if missing_container || missing_tool {
        return Err(ScanError::unavailable(container, stderr.trim()));
    }

    Ok(output)
}
