// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use warden_config::{NetworkConfig, StatsConfig, WardenConfig};
use warden_db::{DbError, PeerRecord, PeerStore};
use warden_stats::LedgerStore;
use warden_wgconf::{
	ClassBlockingState, ConfigFileEditor, IpAllocator, PeerState, RuleDirective, WgConfError,
};
use warden_wgctl::{CommandRunner, DaemonControl, KeyMaterialGenerator, StatsCollector};

use crate::error::{PeerError, Result};
use crate::name::NameRule;

/// A newly provisioned peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedPeer {
	pub name: String,
	pub address: Ipv4Net,
	pub public_key: String,
}

/// A peer as listed to an operator: the config file view joined with the
/// registry record, when there is one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerListing {
	pub name: String,
	pub address: String,
	/// `None` when the block's marker and name comment disagree.
	pub state: Option<&'static str>,
	pub registered: bool,
	pub created_at: Option<DateTime<Utc>>,
}

/// Result of one removal sub-step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum StepOutcome {
	Removed,
	Absent,
	Failed(String),
}

impl StepOutcome {
	fn from_found<E: fmt::Display>(result: std::result::Result<bool, E>) -> Self {
		match result {
			Ok(true) => StepOutcome::Removed,
			Ok(false) => StepOutcome::Absent,
			Err(e) => StepOutcome::Failed(e.to_string()),
		}
	}

	pub fn is_failed(&self) -> bool {
		matches!(self, StepOutcome::Failed(_))
	}
}

impl fmt::Display for StepOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StepOutcome::Removed => f.write_str("removed"),
			StepOutcome::Absent => f.write_str("absent"),
			StepOutcome::Failed(e) => write!(f, "failed ({e})"),
		}
	}
}

/// Per-store result of [`PeerService::remove_peer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
	pub name: String,
	pub config: StepOutcome,
	pub ledger: StepOutcome,
	pub registry: StepOutcome,
}

impl RemovalReport {
	fn steps(&self) -> [&StepOutcome; 3] {
		[&self.config, &self.ledger, &self.registry]
	}

	/// Every step either removed something or had nothing to remove.
	pub fn is_clean(&self) -> bool {
		self.steps().iter().all(|s| !s.is_failed())
	}

	pub fn config_changed(&self) -> bool {
		self.config == StepOutcome::Removed
	}
}

impl fmt::Display for RemovalReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}: config {}, ledger {}, registry {}",
			self.name, self.config, self.ledger, self.registry
		)
	}
}

/// Orchestrates every peer operation across the config file, the registry,
/// the traffic ledger and the daemon.
#[derive(Clone)]
pub struct PeerService {
	pub(crate) editor: Arc<ConfigFileEditor>,
	pub(crate) registry: Arc<dyn PeerStore>,
	pub(crate) ledger: LedgerStore,
	pub(crate) keys: KeyMaterialGenerator,
	pub(crate) collector: StatsCollector,
	pub(crate) daemon: DaemonControl,
	pub(crate) names: NameRule,
	pub(crate) network: NetworkConfig,
	pub(crate) stats: StatsConfig,
}

impl PeerService {
	/// `runner` executes `wg` (through the configured exec prefix);
	/// `host_runner` executes the restart command on the host.
	pub fn from_config(
		config: &WardenConfig,
		registry: Arc<dyn PeerStore>,
		runner: Arc<dyn CommandRunner>,
		host_runner: Arc<dyn CommandRunner>,
	) -> Result<Self> {
		let allocator = IpAllocator::new(config.network.subnet).map_err(|e| {
			PeerError::Validation(format!("network.subnet: {e}"))
		})?;
		let editor = ConfigFileEditor::new(&config.paths.wg_config, allocator)
			.with_backup_dir(&config.paths.backup_dir);
		let names = NameRule::new(&config.network.name_pattern, &config.network.reserved_names)?;

		Ok(Self {
			editor: Arc::new(editor),
			registry,
			ledger: LedgerStore::new(&config.paths.ledger),
			keys: KeyMaterialGenerator::new(runner.clone(), &config.daemon.wg_binary),
			collector: StatsCollector::new(runner, &config.daemon.wg_binary, &config.daemon.interface),
			daemon: DaemonControl::new(host_runner, config.daemon.restart_command.clone()),
			names,
			network: config.network.clone(),
			stats: config.stats,
		})
	}

	pub fn editor(&self) -> &ConfigFileEditor {
		&self.editor
	}

	/// Create keys, pick an address, write the config block and record the
	/// peer. A registry failure after the block is written leaves the block in
	/// place; [`PeerService::check_consistency`] reports it.
	#[instrument(skip(self))]
	pub async fn add_peer(&self, name: &str) -> Result<ProvisionedPeer> {
		self.names.check(name)?;

		if self.registry.exists(name).await? {
			return Err(PeerError::AlreadyExists(name.to_string()));
		}

		let keys = self.keys.generate().await?;
		let address = self
			.editor
			.provision(name, keys.public_key(), keys.preshared_key())
			.await?;

		let record = PeerRecord {
			name: name.to_string(),
			private_key: keys.private_key().to_string(),
			public_key: keys.public_key().to_string(),
			preshared_key: keys.preshared_key().to_string(),
			created_at: Utc::now(),
			suspended: false,
			stats: None,
		};
		self.registry.insert(&record).await.map_err(|e| match e {
			DbError::Conflict(name) => PeerError::InconsistentState(format!(
				"{name} was written to the config but is already registered"
			)),
			other => PeerError::InconsistentState(format!(
				"{name} was written to the config but not registered: {other}"
			)),
		})?;

		info!(%address, "peer added");
		Ok(ProvisionedPeer {
			name: name.to_string(),
			address,
			public_key: keys.public_key().to_string(),
		})
	}

	/// Returns whether the config file changed.
	#[instrument(skip(self))]
	pub async fn suspend_peer(&self, name: &str) -> Result<bool> {
		self.set_state(name, PeerState::Suspended).await
	}

	/// Returns whether the config file changed.
	#[instrument(skip(self))]
	pub async fn resume_peer(&self, name: &str) -> Result<bool> {
		self.set_state(name, PeerState::Active).await
	}

	/// Flip a peer between active and suspended, returning the new state.
	#[instrument(skip(self))]
	pub async fn toggle_peer(&self, name: &str) -> Result<PeerState> {
		let state = self.editor.toggle_peer(name).await?;
		self.record_state(name, state).await?;
		Ok(state)
	}

	async fn set_state(&self, name: &str, target: PeerState) -> Result<bool> {
		let changed = self.editor.set_peer_state(name, target).await?;
		self.record_state(name, target).await?;
		Ok(changed)
	}

	async fn record_state(&self, name: &str, state: PeerState) -> Result<()> {
		let suspended = state == PeerState::Suspended;
		if let Err(e) = self.registry.set_suspended(name, suspended).await {
			warn!(error = %e, state = state.as_str(), "config updated but registry was not");
			return Err(PeerError::InconsistentState(format!(
				"{name} is {} in the config but the registry update failed: {e}",
				state.as_str()
			)));
		}
		debug!(suspended, "registry flag updated");
		Ok(())
	}

	/// Remove the config block, the ledger entry and the registry record.
	/// Each step runs regardless of the others. Fails with `NotFound` only
	/// when none of the three stores knew the peer.
	#[instrument(skip(self))]
	pub async fn remove_peer(&self, name: &str) -> Result<RemovalReport> {
		let config = match self.editor.remove_peer(name).await {
			Ok(_) => StepOutcome::Removed,
			Err(WgConfError::PeerNotFound(_)) => StepOutcome::Absent,
			Err(e) => StepOutcome::Failed(e.to_string()),
		};
		let ledger = StepOutcome::from_found(self.ledger.remove_entry(name).await);
		let registry =
			StepOutcome::from_found(self.registry.delete(name).await.map(|rows| rows > 0));

		let report = RemovalReport {
			name: name.to_string(),
			config,
			ledger,
			registry,
		};

		if report.steps().iter().all(|s| **s == StepOutcome::Absent) {
			return Err(PeerError::NotFound(format!("peer {name}")));
		}

		if report.is_clean() {
			info!("peer removed");
		} else {
			warn!(report = %report, "peer removal incomplete");
		}
		Ok(report)
	}

	/// Peers in config file order.
	#[instrument(skip(self))]
	pub async fn list_peers(&self) -> Result<Vec<PeerListing>> {
		let summaries = self.editor.peers().await?;
		let records = self.registry.list().await?;

		Ok(summaries
			.into_iter()
			.map(|summary| {
				let record = records.iter().find(|r| r.name == summary.name);
				PeerListing {
					state: summary.state().map(|s| s.as_str()),
					registered: record.is_some(),
					created_at: record.map(|r| r.created_at),
					address: summary.allowed_ips,
					name: summary.name,
				}
			})
			.collect())
	}

	#[instrument(skip(self))]
	pub async fn enable_class_blocking(&self) -> Result<()> {
		self.editor.enable_class_blocking().await?;
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn disable_class_blocking(&self) -> Result<()> {
		self.editor.disable_class_blocking().await?;
		Ok(())
	}

	pub async fn class_blocking_state(&self) -> ClassBlockingState {
		self.editor.class_blocking_state().await
	}

	pub async fn current_rules(&self) -> Result<Vec<RuleDirective>> {
		Ok(self.editor.current_rules().await?)
	}

	/// Capture traffic counters, then restart the daemon. A failed capture
	/// does not block the restart.
	#[instrument(skip(self))]
	pub async fn restart_daemon(&self) -> Result<()> {
		if let Err(e) = self.refresh_stats().await {
			warn!(error = %e, "stats snapshot before restart failed");
		}
		self.daemon.restart().await?;
		Ok(())
	}

	/// Put the scratch backup taken before the last structural change back in
	/// place.
	#[instrument(skip(self))]
	pub async fn restore_backup(&self) -> Result<()> {
		self.editor.restore_backup().await?;
		Ok(())
	}
}
