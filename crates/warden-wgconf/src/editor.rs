// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};

use ipnet::Ipv4Net;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::allocator::IpAllocator;
use crate::document::{ConfigDocument, PeerSummary};
use crate::error::{Result, WgConfError};
use crate::peer_block::{PeerBlock, PeerState};
use crate::rules::{self, ClassBlockingState, RuleDirective};

/// Serialized access to one WireGuard configuration file.
///
/// Readers share the lock; every mutation holds it exclusively from the read
/// of the current text through the write of the new text. Before a write the
/// current file is copied to `<file>.bak`; a failed write puts that copy
/// back. Successful writes are also mirrored into the durable backup
/// directory when one is configured.
#[derive(Debug)]
pub struct ConfigFileEditor {
	path: PathBuf,
	backup_dir: Option<PathBuf>,
	allocator: IpAllocator,
	lock: RwLock<()>,
}

impl ConfigFileEditor {
	pub fn new(path: impl Into<PathBuf>, allocator: IpAllocator) -> Self {
		Self {
			path: path.into(),
			backup_dir: None,
			allocator,
			lock: RwLock::new(()),
		}
	}

	pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.backup_dir = Some(dir.into());
		self
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn subnet(&self) -> Ipv4Net {
		self.allocator.subnet()
	}

	/// `<file>.bak`, next to the file.
	pub fn backup_path(&self) -> PathBuf {
		let mut name: OsString = self.path.as_os_str().to_owned();
		name.push(".bak");
		PathBuf::from(name)
	}

	fn durable_backup_path(&self) -> Option<PathBuf> {
		let dir = self.backup_dir.as_ref()?;
		let file_name = self.path.file_name()?;
		Some(dir.join(file_name))
	}

	async fn read_text(&self) -> Result<String> {
		fs::read_to_string(&self.path)
			.await
			.map_err(|source| WgConfError::Io {
				action: "read",
				path: self.path.clone(),
				source,
			})
	}

	pub async fn read_document(&self) -> Result<ConfigDocument> {
		let _guard = self.lock.read().await;
		Ok(ConfigDocument::parse(&self.read_text().await?))
	}

	pub async fn peers(&self) -> Result<Vec<PeerSummary>> {
		Ok(self.read_document().await?.summaries())
	}

	pub async fn next_available(&self) -> Result<Ipv4Net> {
		let doc = self.read_document().await?;
		self.allocator.next_available(&doc)
	}

	/// `Unknown` when the file cannot be read.
	pub async fn class_blocking_state(&self) -> ClassBlockingState {
		let _guard = self.lock.read().await;
		match self.read_text().await {
			Ok(text) => rules::detect_state(&text),
			Err(e) => {
				warn!(error = %e, "cannot determine class blocking state");
				ClassBlockingState::Unknown
			}
		}
	}

	pub async fn current_rules(&self) -> Result<Vec<RuleDirective>> {
		let _guard = self.lock.read().await;
		Ok(rules::directives(&self.read_text().await?))
	}

	/// Append a peer block with an already chosen address.
	#[instrument(skip(self, public_key, preshared_key), fields(path = %self.path.display()))]
	pub async fn insert_peer(
		&self,
		name: &str,
		public_key: &str,
		preshared_key: &str,
		address: Ipv4Net,
	) -> Result<()> {
		let _guard = self.lock.write().await;
		let mut doc = ConfigDocument::parse(&self.read_text().await?);
		doc.insert_peer(PeerBlock::new(
			name,
			public_key,
			preshared_key,
			&address.to_string(),
		))?;
		self.commit(&doc.render()).await?;
		info!(%address, "peer inserted");
		Ok(())
	}

	/// Pick the next free address and insert the peer under a single write
	/// guard, so two concurrent provisions never receive the same address.
	#[instrument(skip(self, public_key, preshared_key), fields(path = %self.path.display()))]
	pub async fn provision(
		&self,
		name: &str,
		public_key: &str,
		preshared_key: &str,
	) -> Result<Ipv4Net> {
		let _guard = self.lock.write().await;
		let mut doc = ConfigDocument::parse(&self.read_text().await?);
		let address = self.allocator.next_available(&doc)?;
		doc.insert_peer(PeerBlock::new(
			name,
			public_key,
			preshared_key,
			&address.to_string(),
		))?;
		self.commit(&doc.render()).await?;
		info!(%address, "peer provisioned");
		Ok(address)
	}

	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub async fn remove_peer(&self, name: &str) -> Result<PeerBlock> {
		let _guard = self.lock.write().await;
		let mut doc = ConfigDocument::parse(&self.read_text().await?);
		let removed = doc.remove_peer(name)?;
		self.commit(&doc.render()).await?;
		info!("peer removed from config");
		Ok(removed)
	}

	/// Move a peer to `target`. Returns `false` when it was already there,
	/// in which case the file is not touched.
	#[instrument(skip(self), fields(path = %self.path.display(), target = target.as_str()))]
	pub async fn set_peer_state(&self, name: &str, target: PeerState) -> Result<bool> {
		let _guard = self.lock.write().await;
		let mut doc = ConfigDocument::parse(&self.read_text().await?);
		let block = doc
			.peer_mut(name)
			.ok_or_else(|| WgConfError::PeerNotFound(name.to_string()))?;

		if !block.set_state(target)? {
			debug!("peer already in requested state");
			return Ok(false);
		}

		self.commit(&doc.render()).await?;
		info!("peer state changed");
		Ok(true)
	}

	/// Flip a peer's state, returning the new one.
	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub async fn toggle_peer(&self, name: &str) -> Result<PeerState> {
		let _guard = self.lock.write().await;
		let mut doc = ConfigDocument::parse(&self.read_text().await?);
		let block = doc
			.peer_mut(name)
			.ok_or_else(|| WgConfError::PeerNotFound(name.to_string()))?;

		let target = block.state()?.flipped();
		block.set_state(target)?;
		self.commit(&doc.render()).await?;
		info!(state = target.as_str(), "peer toggled");
		Ok(target)
	}

	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub async fn enable_class_blocking(&self) -> Result<()> {
		let _guard = self.lock.write().await;
		let text = self.read_text().await?;
		let updated = rules::enable_class_blocking(&text, self.subnet())?;
		self.commit(&updated).await?;
		info!(subnet = %self.subnet(), "class blocking enabled");
		Ok(())
	}

	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub async fn disable_class_blocking(&self) -> Result<()> {
		let _guard = self.lock.write().await;
		let text = self.read_text().await?;
		let updated = rules::disable_class_blocking(&text, self.subnet())?;
		self.commit(&updated).await?;
		info!("class blocking disabled");
		Ok(())
	}

	/// Put the scratch backup back in place of the file.
	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub async fn restore_backup(&self) -> Result<()> {
		let _guard = self.lock.write().await;
		let backup = self.backup_path();
		if !fs::try_exists(&backup).await.unwrap_or(false) {
			return Err(WgConfError::BackupMissing(backup));
		}

		fs::copy(&backup, &self.path)
			.await
			.map_err(|source| WgConfError::Io {
				action: "restore",
				path: self.path.clone(),
				source,
			})?;
		info!(backup = %backup.display(), "config restored from backup");
		Ok(())
	}

	/// Write `content` over the file. Callers hold the write guard and have
	/// already validated the change, so nothing is backed up for a request
	/// that fails.
	async fn commit(&self, content: &str) -> Result<()> {
		let backup = self.backup_path();
		fs::copy(&self.path, &backup)
			.await
			.map_err(|source| WgConfError::Io {
				action: "back up",
				path: self.path.clone(),
				source,
			})?;

		write_or_restore(&self.path, &backup, content, |path, content| async move {
			fs::write(path, content).await
		})
		.await?;

		if let Some(durable) = self.durable_backup_path() {
			if let Err(e) = mirror(&self.path, &durable).await {
				warn!(error = %e, backup = %durable.display(), "failed to update durable backup");
			}
		}

		debug!(bytes = content.len(), "config written");
		Ok(())
	}
}

/// Write `content` with `write`. On failure copy `backup` over `path` and
/// report the write error, or the restore error if that copy fails too.
async fn write_or_restore<W, Fut>(path: &Path, backup: &Path, content: &str, write: W) -> Result<()>
where
	W: FnOnce(PathBuf, String) -> Fut,
	Fut: Future<Output = std::io::Result<()>>,
{
	let Err(write_err) = write(path.to_path_buf(), content.to_string()).await else {
		return Ok(());
	};

	warn!(error = %write_err, "config write failed, restoring backup");
	match fs::copy(backup, path).await {
		Ok(_) => Err(WgConfError::Io {
			action: "write",
			path: path.to_path_buf(),
			source: write_err,
		}),
		Err(source) => Err(WgConfError::RestoreFailed {
			path: path.to_path_buf(),
			source,
		}),
	}
}

async fn mirror(from: &Path, to: &Path) -> std::io::Result<()> {
	if let Some(parent) = to.parent() {
		fs::create_dir_all(parent).await?;
	}
	fs::copy(from, to).await?;
	Ok(())
}
