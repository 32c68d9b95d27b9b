// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{trace, warn};

use crate::error::{Result, WgCtlError};

/// Captured result of one subprocess invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
	/// `None` when the process was killed by a signal.
	pub code: Option<i32>,
	pub stdout: String,
	pub stderr: String,
}

impl CommandOutput {
	pub fn success(&self) -> bool {
		self.code == Some(0)
	}
}

/// Trait abstracting subprocess execution for testability.
#[async_trait]
pub trait CommandRunner: Send + Sync {
	/// Run `argv`, optionally feeding `stdin`, and capture its output.
	///
	/// A non-zero exit is not an error at this level.
	async fn run(&self, argv: &[String], stdin: Option<&str>) -> Result<CommandOutput>;

	/// Run `argv` and return its trimmed stdout, failing on a non-zero exit.
	async fn run_checked(&self, argv: &[String], stdin: Option<&str>) -> Result<String> {
		let output = self.run(argv, stdin).await?;
		if output.success() {
			return Ok(output.stdout.trim().to_string());
		}

		Err(WgCtlError::CommandFailed {
			cmd: argv.first().cloned().unwrap_or_default(),
			args: argv.get(1..).unwrap_or(&[]).to_vec(),
			code: output.code,
			stderr: output.stderr.trim().to_string(),
		})
	}
}

/// Runs commands as local subprocesses.
///
/// Permits on the shared gate bound how many subprocesses run at once, and
/// each invocation is killed once `timeout` elapses.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
	exec_prefix: Vec<String>,
	gate: Arc<Semaphore>,
	timeout: Duration,
}

impl ProcessRunner {
	pub fn new(exec_prefix: Vec<String>, max_concurrent: usize, timeout: Duration) -> Self {
		Self {
			exec_prefix,
			gate: Arc::new(Semaphore::new(max_concurrent.max(1))),
			timeout,
		}
	}

	/// A runner sharing this one's gate and timeout but without the prefix,
	/// for commands that must run on the host itself.
	pub fn unprefixed(&self) -> Self {
		Self {
			exec_prefix: Vec::new(),
			gate: Arc::clone(&self.gate),
			timeout: self.timeout,
		}
	}

	pub fn exec_prefix(&self) -> &[String] {
		&self.exec_prefix
	}
}

#[async_trait]
impl CommandRunner for ProcessRunner {
	async fn run(&self, argv: &[String], stdin: Option<&str>) -> Result<CommandOutput> {
		let full: Vec<&str> = self
			.exec_prefix
			.iter()
			.chain(argv)
			.map(String::as_str)
			.collect();
		let (program, args) = full.split_first().ok_or(WgCtlError::EmptyCommand)?;

		let _permit = self
			.gate
			.acquire()
			.await
			.map_err(|_| WgCtlError::Io(std::io::Error::other("command gate closed")))?;

		let mut cmd = Command::new(program);
		cmd.args(args)
			.stdin(if stdin.is_some() {
				Stdio::piped()
			} else {
				Stdio::null()
			})
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		trace!(cmd = %full.join(" "), "running command");

		let mut child = cmd.spawn().map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				warn!(program = %program, "command not found in PATH");
				WgCtlError::NotInstalled(program.to_string())
			} else {
				WgCtlError::Io(e)
			}
		})?;

		if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
			pipe.write_all(input.as_bytes()).await?;
		}

		let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
			Ok(result) => result?,
			Err(_) => {
				warn!(program = %program, timeout_secs = self.timeout.as_secs(), "command timed out");
				return Err(WgCtlError::Timeout {
					cmd: program.to_string(),
					secs: self.timeout.as_secs(),
				});
			}
		};

		Ok(CommandOutput {
			code: output.status.code(),
			stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
			stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
		})
	}
}
