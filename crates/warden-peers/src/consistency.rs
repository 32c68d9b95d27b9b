// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cross-checks between the config file and the registry. Nothing here
//! repairs anything; findings are for an operator to act on.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{info, instrument, warn};
use warden_wgconf::PeerState;

use crate::error::Result;
use crate::service::PeerService;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Finding {
	/// Registered, but no block in the config file.
	RegistryOnly { name: String },
	/// A block in the config file with no registry record.
	FileOnly { name: String },
	SuspendedMismatch {
		name: String,
		registry_suspended: bool,
		file_state: &'static str,
	},
	/// The block's section marker and name line are not commented alike.
	CommentMismatch { name: String },
	KeyMismatch { name: String },
}

impl Finding {
	pub fn name(&self) -> &str {
		match self {
			Finding::RegistryOnly { name }
			| Finding::FileOnly { name }
			| Finding::SuspendedMismatch { name, .. }
			| Finding::CommentMismatch { name }
			| Finding::KeyMismatch { name } => name,
		}
	}
}

impl fmt::Display for Finding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Finding::RegistryOnly { name } => write!(f, "{name}: registered but missing from config"),
			Finding::FileOnly { name } => write!(f, "{name}: in config but not registered"),
			Finding::SuspendedMismatch {
				name,
				registry_suspended,
				file_state,
			} => write!(
				f,
				"{name}: registry says {}, config says {file_state}",
				if *registry_suspended { "suspended" } else { "active" }
			),
			Finding::CommentMismatch { name } => {
				write!(f, "{name}: [Peer] marker and name comment disagree")
			}
			Finding::KeyMismatch { name } => {
				write!(f, "{name}: public key differs between registry and config")
			}
		}
	}
}

impl PeerService {
	#[instrument(skip(self))]
	pub async fn check_consistency(&self) -> Result<Vec<Finding>> {
		let mut file: BTreeMap<String, _> = self
			.editor
			.peers()
			.await?
			.into_iter()
			.map(|peer| (peer.name.clone(), peer))
			.collect();
		let records = self.registry.list().await?;

		let mut findings = Vec::new();
		for record in records {
			let Some(block) = file.remove(&record.name) else {
				findings.push(Finding::RegistryOnly { name: record.name });
				continue;
			};

			if block.public_key != record.public_key {
				findings.push(Finding::KeyMismatch {
					name: record.name.clone(),
				});
			}

			match block.state() {
				None => findings.push(Finding::CommentMismatch { name: record.name }),
				Some(state) if (state == PeerState::Suspended) != record.suspended => {
					findings.push(Finding::SuspendedMismatch {
						name: record.name,
						registry_suspended: record.suspended,
						file_state: state.as_str(),
					})
				}
				Some(_) => {}
			}
		}

		for (name, block) in file {
			if block.state().is_none() {
				findings.push(Finding::CommentMismatch { name: name.clone() });
			}
			findings.push(Finding::FileOnly { name });
		}

		if findings.is_empty() {
			info!("config and registry agree");
		} else {
			warn!(findings = findings.len(), "inconsistencies found");
		}
		Ok(findings)
	}
}
