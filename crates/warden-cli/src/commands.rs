// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Subcommand;
use console::style;
use serde::Serialize;
use tracing::instrument;
use warden_peers::{OperationOutcome, PeerService};
use warden_stats::SortBy;

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Provision new peers
	Add {
		#[arg(required = true)]
		names: Vec<String>,
	},
	/// Remove peers from the config, ledger and registry
	Remove {
		#[arg(required = true)]
		names: Vec<String>,
	},
	/// Comment peers out of the config
	Suspend {
		#[arg(required = true)]
		names: Vec<String>,
	},
	/// Re-enable suspended peers
	Resume {
		#[arg(required = true)]
		names: Vec<String>,
	},
	/// Flip peers between active and suspended
	Toggle {
		#[arg(required = true)]
		names: Vec<String>,
	},
	/// List peers in the config file
	List,
	/// Refresh and show traffic statistics
	Stats {
		/// allowed-ips or transfer-sent
		#[arg(long)]
		sort: Option<SortBy>,
	},
	/// Firewall rule management
	Rules {
		#[command(subcommand)]
		command: RulesCommand,
	},
	/// Snapshot traffic counters and restart the daemon
	Restart,
	/// Compare the config file with the registry
	Check,
	/// Print a peer's client configuration
	ClientConfig { name: String },
	/// Put back the config as it was before the last change
	RestoreBackup,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
	/// Add traffic-class blocking rules
	Enable,
	/// Restore the baseline rules
	Disable,
	/// Show whether class blocking is active
	Status,
	/// Print every PostUp/PostDown directive
	List,
}

pub struct Output {
	pub json: bool,
	pub restart: bool,
}

impl Output {
	fn print<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> anyhow::Result<()> {
		if self.json {
			println!("{}", serde_json::to_string_pretty(value)?);
		} else {
			human(value);
		}
		Ok(())
	}

	fn print_outcomes(&self, outcomes: &[OperationOutcome]) -> anyhow::Result<()> {
		self.print(&outcomes, |outcomes| {
			for outcome in outcomes.iter() {
				if outcome.success {
					println!("{} {}", style("✓").green().bold(), outcome.description);
				} else {
					println!("{} {}", style("✗").red().bold(), outcome.description);
				}
			}
		})
	}
}

/// Outcomes of a command and whether the daemon needs to reread its config.
#[derive(Default)]
struct Batch {
	outcomes: Vec<OperationOutcome>,
	changed: bool,
}

impl Batch {
	fn record(&mut self, outcome: OperationOutcome, changed: bool) {
		self.changed |= changed && outcome.success;
		self.outcomes.push(outcome);
	}

	async fn finish(mut self, service: &PeerService, out: &Output) -> anyhow::Result<bool> {
		if self.changed && out.restart {
			let outcome =
				OperationOutcome::from_result(service.restart_daemon().await, |_| "daemon restarted".to_string());
			self.outcomes.push(outcome);
		}
		out.print_outcomes(&self.outcomes)?;
		Ok(self.outcomes.iter().all(|o| o.success))
	}
}

/// Run one command. Returns `false` when any part of it failed.
#[instrument(skip(service, out))]
pub async fn run(command: Command, service: &PeerService, out: &Output) -> anyhow::Result<bool> {
	let mut batch = Batch::default();

	match command {
		Command::Add { names } => {
			for name in names {
				let result = service.add_peer(&name).await;
				batch.record(
					OperationOutcome::from_result(result, |peer| {
						format!("peer {} added at {}", peer.name, peer.address)
					}),
					true,
				);
			}
		}
		Command::Remove { names } => {
			for name in names {
				match service.remove_peer(&name).await {
					Ok(report) => {
						let changed = report.config_changed();
						let outcome = if report.is_clean() {
							OperationOutcome::ok(report.to_string())
						} else {
							OperationOutcome::failed(report.to_string())
						};
						batch.changed |= changed;
						batch.outcomes.push(outcome);
					}
					Err(e) => batch.record(OperationOutcome::failed(e.to_string()), false),
				}
			}
		}
		Command::Suspend { names } => {
			for name in names {
				let result = service.suspend_peer(&name).await;
				let changed = matches!(result, Ok(true));
				batch.record(
					OperationOutcome::from_result(result, |changed| {
						if changed {
							format!("peer {name} suspended")
						} else {
							format!("peer {name} was already suspended")
						}
					}),
					changed,
				);
			}
		}
		Command::Resume { names } => {
			for name in names {
				let result = service.resume_peer(&name).await;
				let changed = matches!(result, Ok(true));
				batch.record(
					OperationOutcome::from_result(result, |changed| {
						if changed {
							format!("peer {name} resumed")
						} else {
							format!("peer {name} was already active")
						}
					}),
					changed,
				);
			}
		}
		Command::Toggle { names } => {
			for name in names {
				let result = service.toggle_peer(&name).await;
				batch.record(
					OperationOutcome::from_result(result, |state| {
						format!("peer {name} is now {}", state.as_str())
					}),
					true,
				);
			}
		}
		Command::Rules { command } => return run_rules(command, service, out, batch).await,
		Command::RestoreBackup => {
			let result = service.restore_backup().await;
			batch.record(
				OperationOutcome::from_result(result, |_| "config restored from backup".to_string()),
				true,
			);
		}
		Command::Restart => {
			let result = service.restart_daemon().await;
			batch.record(
				OperationOutcome::from_result(result, |_| "daemon restarted".to_string()),
				false,
			);
		}
		Command::List => {
			let peers = service.list_peers().await?;
			out.print(&peers, |peers| {
				for peer in peers.iter() {
					let state = match peer.state {
						Some("active") => style("active").green(),
						Some(other) => style(other).yellow(),
						None => style("inconsistent").red(),
					};
					let registered = if peer.registered { "" } else { " (unregistered)" };
					println!("{:<20} {:<18} {}{}", peer.name, peer.address, state, registered);
				}
			})?;
			return Ok(true);
		}
		Command::Stats { sort } => {
			let rows = service.stats_view(sort).await?;
			out.print(&rows, |rows| {
				for row in rows.iter() {
					println!("{}", style(&row.name).bold());
					println!("  allowed ips: {}", row.allowed_ips.as_deref().unwrap_or("N/A"));
					println!("  endpoint:    {}", row.endpoint.as_deref().unwrap_or("N/A"));
					println!("  handshake:   {}", row.handshake);
					println!("  transfer:    {} received, {} sent", row.received, row.sent);
					println!(
						"  today:       {} received, {} sent",
						warden_stats::to_human_readable(row.today.received_bytes),
						warden_stats::to_human_readable(row.today.sent_bytes)
					);
					println!(
						"  this month:  {} received, {} sent",
						warden_stats::to_human_readable(row.this_month.received_bytes),
						warden_stats::to_human_readable(row.this_month.sent_bytes)
					);
				}
			})?;
			return Ok(true);
		}
		Command::Check => {
			let findings = service.check_consistency().await?;
			out.print(&findings, |findings| {
				if findings.is_empty() {
					println!("{} config and registry agree", style("✓").green().bold());
				}
				for finding in findings.iter() {
					println!("{} {finding}", style("!").yellow().bold());
				}
			})?;
			return Ok(findings.is_empty());
		}
		Command::ClientConfig { name } => {
			let rendered = service.client_config(&name).await?;
			print!("{rendered}");
			return Ok(true);
		}
	}

	batch.finish(service, out).await
}

async fn run_rules(
	command: RulesCommand,
	service: &PeerService,
	out: &Output,
	mut batch: Batch,
) -> anyhow::Result<bool> {
	match command {
		RulesCommand::Enable => {
			let result = service.enable_class_blocking().await;
			batch.record(
				OperationOutcome::from_result(result, |_| "class blocking enabled".to_string()),
				true,
			);
		}
		RulesCommand::Disable => {
			let result = service.disable_class_blocking().await;
			batch.record(
				OperationOutcome::from_result(result, |_| "class blocking disabled".to_string()),
				true,
			);
		}
		RulesCommand::Status => {
			let state = service.class_blocking_state().await;
			out.print(&state.as_str(), |state| println!("class blocking: {state}"))?;
			return Ok(true);
		}
		RulesCommand::List => {
			let rules: Vec<(String, String)> = service
				.current_rules()
				.await?
				.into_iter()
				.map(|rule| (rule.hook.as_str().to_string(), rule.command))
				.collect();
			out.print(&rules, |rules| {
				for (hook, command) in rules.iter() {
					println!("{hook} = {command}");
				}
			})?;
			return Ok(true);
		}
	}

	batch.finish(service, out).await
}
