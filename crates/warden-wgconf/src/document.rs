// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::{Result, WgConfError};
use crate::peer_block::{split_directive, PeerBlock, PeerState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
	Peer(PeerBlock),
	/// Anything that is not a recognised peer block, kept verbatim.
	Text(String),
}

impl Block {
	fn lines(&self) -> Box<dyn Iterator<Item = &str> + '_> {
		match self {
			Block::Peer(peer) => Box::new(peer.lines()),
			Block::Text(text) => Box::new(text.split_inclusive('\n')),
		}
	}
}

/// A peer as seen in the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSummary {
	pub name: String,
	pub public_key: String,
	pub allowed_ips: String,
	pub marker_commented: bool,
	pub name_commented: bool,
}

impl PeerSummary {
	/// `None` when the marker and name line disagree.
	pub fn state(&self) -> Option<PeerState> {
		match (self.marker_commented, self.name_commented) {
			(false, false) => Some(PeerState::Active),
			(true, true) => Some(PeerState::Suspended),
			_ => None,
		}
	}

	/// The daemon only loads blocks whose section marker is live.
	pub fn is_available(&self) -> bool {
		!self.marker_commented
	}
}

impl From<&PeerBlock> for PeerSummary {
	fn from(block: &PeerBlock) -> Self {
		Self {
			name: block.name().to_string(),
			public_key: block.public_key().to_string(),
			allowed_ips: block.allowed_ips().to_string(),
			marker_commented: block.marker_commented(),
			name_commented: block.name_commented(),
		}
	}
}

/// Ordered view of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
	blocks: Vec<Block>,
}

impl ConfigDocument {
	pub fn parse(text: &str) -> Self {
		let lines: Vec<&str> = text.split_inclusive('\n').collect();
		let mut blocks = Vec::new();
		let mut pending = String::new();
		let mut i = 0;

		while i < lines.len() {
			if let Some((peer, used)) = PeerBlock::parse(&lines[i..]) {
				if !pending.is_empty() {
					blocks.push(Block::Text(std::mem::take(&mut pending)));
				}
				blocks.push(Block::Peer(peer));
				i += used;
			} else {
				pending.push_str(lines[i]);
				i += 1;
			}
		}

		if !pending.is_empty() {
			blocks.push(Block::Text(pending));
		}

		Self { blocks }
	}

	pub fn render(&self) -> String {
		let mut out = String::new();
		for block in &self.blocks {
			match block {
				Block::Peer(peer) => peer.render_into(&mut out),
				Block::Text(text) => out.push_str(text),
			}
		}
		out
	}

	pub fn blocks(&self) -> &[Block] {
		&self.blocks
	}

	pub fn lines(&self) -> impl Iterator<Item = &str> {
		self.blocks.iter().flat_map(Block::lines)
	}

	pub fn peers(&self) -> impl Iterator<Item = &PeerBlock> {
		self.blocks.iter().filter_map(|block| match block {
			Block::Peer(peer) => Some(peer),
			Block::Text(_) => None,
		})
	}

	pub fn peer(&self, name: &str) -> Option<&PeerBlock> {
		self.peers().find(|peer| peer.name() == name)
	}

	pub fn peer_mut(&mut self, name: &str) -> Option<&mut PeerBlock> {
		self.blocks.iter_mut().find_map(|block| match block {
			Block::Peer(peer) if peer.name() == name => Some(peer),
			_ => None,
		})
	}

	pub fn summaries(&self) -> Vec<PeerSummary> {
		self.peers().map(PeerSummary::from).collect()
	}

	/// Append a block at the end of the file.
	///
	/// A final line without a line break gets one first, so the block always
	/// starts on its own line.
	pub fn insert_peer(&mut self, peer: PeerBlock) -> Result<()> {
		if self.peer(peer.name()).is_some() {
			return Err(WgConfError::PeerExists(peer.name().to_string()));
		}

		match self.blocks.last_mut() {
			Some(Block::Text(text)) if !text.ends_with('\n') => text.push('\n'),
			Some(Block::Peer(last)) => last.ensure_trailing_newline(),
			_ => {}
		}

		self.blocks.push(Block::Peer(peer));
		Ok(())
	}

	/// Remove the block named `name`, returning it.
	pub fn remove_peer(&mut self, name: &str) -> Result<PeerBlock> {
		let index = self
			.blocks
			.iter()
			.position(|block| matches!(block, Block::Peer(peer) if peer.name() == name))
			.ok_or_else(|| WgConfError::PeerNotFound(name.to_string()))?;

		match self.blocks.remove(index) {
			Block::Peer(peer) => Ok(peer),
			Block::Text(_) => Err(WgConfError::PeerNotFound(name.to_string())),
		}
	}

	/// `PrivateKey` of the `[Interface]` section, if present and not commented.
	pub fn interface_private_key(&self) -> Option<&str> {
		self.blocks.iter().find_map(|block| match block {
			Block::Text(text) => text
				.split_inclusive('\n')
				.filter(|line| !line.trim_start().starts_with('#'))
				.filter_map(split_directive)
				.find(|(key, _)| *key == "PrivateKey")
				.map(|(_, value)| value),
			Block::Peer(_) => None,
		})
	}
}
