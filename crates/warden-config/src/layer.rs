// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{
	DaemonConfigLayer, LoggingConfigLayer, NetworkConfigLayer, PathsConfigLayer, StatsConfigLayer,
};

/// Partial configuration from one source. Later layers override earlier ones
/// field by field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WardenConfigLayer {
	#[serde(default)]
	pub paths: Option<PathsConfigLayer>,
	#[serde(default)]
	pub network: Option<NetworkConfigLayer>,
	#[serde(default)]
	pub daemon: Option<DaemonConfigLayer>,
	#[serde(default)]
	pub stats: Option<StatsConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

macro_rules! merge_section {
	($self:ident, $other:ident, $field:ident) => {
		if let Some(incoming) = $other.$field {
			match &mut $self.$field {
				Some(current) => current.merge(incoming),
				None => $self.$field = Some(incoming),
			}
		}
	};
}

impl WardenConfigLayer {
	pub fn merge(&mut self, other: WardenConfigLayer) {
		merge_section!(self, other, paths);
		merge_section!(self, other, network);
		merge_section!(self, other, daemon);
		merge_section!(self, other, stats);
		merge_section!(self, other, logging);
	}
}
