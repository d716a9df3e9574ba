use crate::driver::ContainerHandle;
use crate::ContainerDriver;
use bollard::exec::{CreateExecOptions, ResizeExecOptions, StartExecResults};
use bollard::Docker;
use futures_util::{Stream, StreamExt};
use sandbox_types::{Result, SandboxError};
use std::pin::Pin;
use tokio::io::AsyncWrite;

/// A live, bidirectional exec stream: bytes written to `input` reach the
/// process's stdin, bytes read from `output` are its stdout/stderr merged.
pub struct ExecIo {
    pub exec_id: String,
    pub input: Pin<Box<dyn AsyncWrite + Send>>,
    pub output: Pin<Box<dyn Stream<Item = std::result::Result<bollard::container::LogOutput, bollard::errors::Error>> + Send>>,
}

impl ContainerDriver {
    /// §4.1 `open_exec`: an interactive shell with a TTY, stdio merged, and
    /// the environment overridden as the spec requires.
    pub async fn open_exec(
        &self,
        handle: &ContainerHandle,
        argv: &[&str],
        cols: u16,
        rows: u16,
    ) -> Result<ExecIo> {
        let env = vec![
            "TERM=xterm-256color".to_string(),
            format!("COLUMNS={cols}"),
            format!("LINES={rows}"),
            "HOME=/home/sandbox".to_string(),
            "SHELL=/bin/bash".to_string(),
            "USER=sandbox".to_string(),
        ];

        let exec = self
            .docker()
            .create_exec(
                &handle.name,
                CreateExecOptions {
                    cmd: Some(argv.iter().map(|s| s.to_string()).collect()),
                    attach_stdin: Some(true),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    tty: Some(true),
                    env: Some(env),
                    working_dir: Some(sandbox_types::WORKSPACE_ROOT.to_string()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| SandboxError::Transport(format!("create_exec: {e}")))?;

        self.docker()
            .resize_exec(
                &exec.id,
                ResizeExecOptions {
                    height: rows,
                    width: cols,
                },
            )
            .await
            .ok();

        let started = self
            .docker()
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| SandboxError::Transport(format!("start_exec: {e}")))?;

        match started {
            StartExecResults::Attached { input, output } => Ok(ExecIo {
                exec_id: exec.id,
                input,
                output,
            }),
            StartExecResults::Detached => Err(SandboxError::Internal(
                "interactive exec started detached".to_string(),
            )),
        }
    }

    /// §4.1 `exec_resize`: out-of-band terminal geometry change.
    pub async fn exec_resize(&self, exec_id: &str, cols: u16, rows: u16) -> Result<()> {
        self.docker()
            .resize_exec(
                exec_id,
                ResizeExecOptions {
                    height: rows,
                    width: cols,
                },
            )
            .await
            .map_err(|e| SandboxError::Transport(format!("resize_exec: {e}")))
    }

    /// §4.1 `exec_oneshot`: run a command to completion and collect its
    /// merged stdout/stderr plus exit code. Used for health probes and the
    /// shell-hook installer.
    pub async fn exec_oneshot(&self, handle: &ContainerHandle, argv: &[&str]) -> Result<(i64, Vec<u8>)> {
        run_oneshot(self.docker(), &handle.name, argv)
            .await
            .map_err(|e| SandboxError::Transport(e.to_string()))
    }
}

/// Free function so the driver's health probe (which only has a container
/// name, not yet a confirmed [`ContainerHandle`]) can reuse the same logic.
pub(crate) async fn run_oneshot(
    docker: &Docker,
    container_name: &str,
    argv: &[&str],
) -> std::result::Result<(i64, Vec<u8>), bollard::errors::Error> {
    let exec = docker
        .create_exec(
            container_name,
            CreateExecOptions {
                cmd: Some(argv.iter().map(|s| s.to_string()).collect()),
                attach_stdout: Some(true),
                attach_stderr: Some(true),
                ..Default::default()
            },
        )
        .await?;

    let started = docker.start_exec(&exec.id, None).await?;
    let mut buf = Vec::new();
    if let StartExecResults::Attached { mut output, .. } = started {
        while let Some(chunk) = output.next().await {
            if let Ok(log) = chunk {
                buf.extend_from_slice(&log.into_bytes());
            }
        }
    }

    let inspect = docker.inspect_exec(&exec.id).await?;
    let code = inspect.exit_code.unwrap_or(-1);
    Ok((code, buf))
}
