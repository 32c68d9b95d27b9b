// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Traffic ledger behaviour.

use serde::Deserialize;
use warden_stats::{MergePolicy, SortBy};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsConfig {
	pub merge_policy: MergePolicy,
	/// Default order for the stats view.
	pub sort: SortBy,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsConfigLayer {
	#[serde(default)]
	pub merge_policy: Option<MergePolicy>,
	#[serde(default)]
	pub sort: Option<SortBy>,
}

impl StatsConfigLayer {
	pub fn merge(&mut self, other: StatsConfigLayer) {
		if other.merge_policy.is_some() {
			self.merge_policy = other.merge_policy;
		}
		if other.sort.is_some() {
			self.sort = other.sort;
		}
	}

	pub fn finalize(self) -> StatsConfig {
		StatsConfig {
			merge_policy: self.merge_policy.unwrap_or_default(),
			sort: self.sort.unwrap_or_default(),
		}
	}
}
