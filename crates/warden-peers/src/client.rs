// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tracing::instrument;

use crate::error::{PeerError, Result};
use crate::service::PeerService;

impl PeerService {
	/// Render the tunnel configuration a peer's device imports. Contains the
	/// peer's private key.
	#[instrument(skip(self))]
	pub async fn client_config(&self, name: &str) -> Result<String> {
		let endpoint_host = self.network.endpoint_host.as_deref().ok_or_else(|| {
			PeerError::Incomplete("network.endpoint_host is not set".to_string())
		})?;

		let record = self
			.registry
			.get(name)
			.await?
			.ok_or_else(|| PeerError::NotFound(format!("peer {name}")))?;

		let doc = self.editor.read_document().await?;
		let block = doc
			.peer(name)
			.ok_or_else(|| PeerError::InconsistentState(format!("{name} is registered but not in the config")))?;
		let server_private = doc.interface_private_key().ok_or_else(|| {
			PeerError::Incomplete(format!(
				"no interface PrivateKey in {}",
				self.editor.path().display()
			))
		})?;
		let server_public = self.keys.public_key_for(server_private).await?;

		Ok(format!(
			"[Interface]\n\
			 Address = {address}\n\
			 PrivateKey = {private_key}\n\
			 DNS = {dns}\n\
			 \n\
			 [Peer]\n\
			 PublicKey = {server_public}\n\
			 PresharedKey = {preshared_key}\n\
			 Endpoint = {endpoint_host}:{port}\n\
			 AllowedIPs = 0.0.0.0/0\n",
			address = block.allowed_ips(),
			private_key = record.private_key,
			dns = self.network.dns,
			preshared_key = record.preshared_key,
			port = self.network.endpoint_port,
		))
	}
}
