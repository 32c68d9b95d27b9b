// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod daemon;
mod logging;
mod network;
mod paths;
mod stats;

pub use daemon::{DaemonConfig, DaemonConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use network::{NetworkConfig, NetworkConfigLayer};
pub use paths::{PathsConfig, PathsConfigLayer};
pub use stats::{StatsConfig, StatsConfigLayer};
