// src/utils/streams.rs: child process plumbing

use std::path::Path;
use std::process::Stdio;

use anyhow::{anyhow, Result};
use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use crate::config::defs::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChildStream {
    Stdout,
    Stderr,
}

/// Reads one of a child's output streams to completion, line by line.
///
/// # Arguments
///
/// * `child` - Spawned child with piped stdio.
/// * `which` - Stream to drain.
///
/// # Returns
/// All lines from the chosen stream.
pub async fn read_child_output_to_vec(
    child: &mut Child,
    which: ChildStream,
) -> Result<Vec<String>> {
    let mut lines_out = Vec::new();
    match which {
        ChildStream::Stdout => {
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| anyhow!("Child stdout was not piped"))?;
            let mut stream = LinesStream::new(BufReader::new(stdout).lines());
            while let Some(line) = stream.next().await {
                lines_out.push(line?);
            }
        }
        ChildStream::Stderr => {
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| anyhow!("Child stderr was not piped"))?;
            let mut stream = LinesStream::new(BufReader::new(stderr).lines());
            while let Some(line) = stream.next().await {
                lines_out.push(line?);
            }
        }
    }
    Ok(lines_out)
}

/// Spawns a task that relays a child's stderr to the debug log, tagged with
/// the tool name. Returns the last few lines for error reporting.
pub fn spawn_stderr_logger(child: &mut Child, tool: &str) -> JoinHandle<Vec<String>> {
    let tool = tool.to_string();
    let stderr = child.stderr.take();
    tokio::spawn(async move {
        let mut tail: Vec<String> = Vec::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("[{}] {}", tool, line);
                if tail.len() >= 20 {
                    tail.remove(0);
                }
                tail.push(line);
            }
        }
        tail
    })
}

/// Spawns an external tool with piped stdio.
pub fn spawn_tool(
    tool: &str,
    args: &[String],
    workdir: Option<&Path>,
) -> Result<Child, PipelineError> {
    debug!("Spawning {} {}", tool, args.join(" "));
    let mut cmd = Command::new(tool);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }
    cmd.spawn().map_err(|e| PipelineError::ToolSpawn {
        tool: tool.to_string(),
        error: e.to_string(),
    })
}

/// Runs an external tool to completion, draining both output streams.
/// Stderr goes to the debug log; a nonzero exit status is a ToolExecution
/// error carrying the stderr tail.
///
/// # Arguments
///
/// * `tool` - Executable name.
/// * `args` - Full argument vector.
/// * `workdir` - Optional working directory for the child.
///
/// # Returns
/// The child's stdout lines.
pub async fn run_tool_to_completion(
    tool: &str,
    args: &[String],
    workdir: Option<&Path>,
) -> Result<Vec<String>, PipelineError> {
    let mut child = spawn_tool(tool, args, workdir)?;
    let stderr_task = spawn_stderr_logger(&mut child, tool);

    let stdout_lines = read_child_output_to_vec(&mut child, ChildStream::Stdout)
        .await
        .map_err(|e| PipelineError::ToolExecution {
            tool: tool.to_string(),
            error: e.to_string(),
        })?;

    let status = child.wait().await.map_err(|e| PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: e.to_string(),
    })?;
    let stderr_tail = stderr_task.await.unwrap_or_default();

    if !status.success() {
        return Err(PipelineError::ToolExecution {
            tool: tool.to_string(),
            error: format!(
                "exit status {}: {}",
                status.code().map_or("signal".to_string(), |c| c.to_string()),
                stderr_tail.join(" | ")
            ),
        });
    }
    if !stderr_tail.is_empty() {
        debug!("{} finished ({} stderr lines)", tool, stderr_tail.len());
    }
    Ok(stdout_lines)
}

/// Runs a tool that consumes its input on stdin (sendmail and friends).
pub async fn run_tool_with_input(
    tool: &str,
    args: &[String],
    input: &str,
) -> Result<(), PipelineError> {
    use tokio::io::AsyncWriteExt;

    debug!("Spawning {} {}", tool, args.join(" "));
    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| PipelineError::ToolSpawn {
            tool: tool.to_string(),
            error: e.to_string(),
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .await
            .map_err(|e| PipelineError::IOError(e.to_string()))?;
        // Dropping closes the pipe so the child sees EOF.
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| PipelineError::ToolExecution {
            tool: tool.to_string(),
            error: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(PipelineError::ToolExecution {
            tool: tool.to_string(),
            error: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
