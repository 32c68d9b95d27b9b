// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::{Result, WgCtlError};
use crate::runner::CommandRunner;

/// Issues lifecycle commands to the tunnel daemon.
#[derive(Clone)]
pub struct DaemonControl {
	runner: Arc<dyn CommandRunner>,
	restart_command: Vec<String>,
}

impl DaemonControl {
	pub fn new(runner: Arc<dyn CommandRunner>, restart_command: Vec<String>) -> Self {
		Self {
			runner,
			restart_command,
		}
	}

	pub fn restart_command(&self) -> &[String] {
		&self.restart_command
	}

	/// Run the configured restart command so the daemon rereads its config.
	#[instrument(skip(self), fields(cmd = %self.restart_command.join(" ")))]
	pub async fn restart(&self) -> Result<()> {
		if self.restart_command.is_empty() {
			return Err(WgCtlError::EmptyCommand);
		}
		self.runner.run_checked(&self.restart_command, None).await?;
		info!("daemon restarted");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{failed, ok, ScriptedRunner};

	fn restart_argv() -> Vec<String> {
		vec!["systemctl".into(), "restart".into(), "wg-quick@wg0".into()]
	}

	#[tokio::test]
	async fn restart_runs_configured_command() {
		let runner = Arc::new(ScriptedRunner::new().respond(&["systemctl", "restart"], ok("")));
		let daemon = DaemonControl::new(runner.clone(), restart_argv());

		daemon.restart().await.unwrap();
		assert_eq!(runner.calls()[0].0, restart_argv());
	}

	#[tokio::test]
	async fn restart_failure_is_surfaced() {
		let runner = Arc::new(
			ScriptedRunner::new().respond(&["systemctl"], failed(1, "Unit wg-quick@wg0.service not found.")),
		);
		let daemon = DaemonControl::new(runner, restart_argv());

		assert!(matches!(
			daemon.restart().await,
			Err(WgCtlError::CommandFailed { .. })
		));
	}

	#[tokio::test]
	async fn empty_restart_command_is_rejected() {
		let daemon = DaemonControl::new(Arc::new(ScriptedRunner::new()), Vec::new());
		assert!(matches!(daemon.restart().await, Err(WgCtlError::EmptyCommand)));
	}
}
