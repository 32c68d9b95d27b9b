// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for warden.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. Config file (`/etc/warden/warden.toml`, or the path given on the command line)
//! 3. Environment variables (`WARDEN_<SECTION>_<FIELD>`)

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::WardenConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WardenConfig {
	pub paths: PathsConfig,
	pub network: NetworkConfig,
	pub daemon: DaemonConfig,
	pub stats: StatsConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from defaults, the system config file and the
/// environment.
pub fn load_config() -> Result<WardenConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<WardenConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<WardenConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = WardenConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

fn finalize(layer: WardenConfigLayer) -> Result<WardenConfig, ConfigError> {
	let config = WardenConfig {
		paths: layer.paths.unwrap_or_default().finalize(),
		network: layer.network.unwrap_or_default().finalize(),
		daemon: layer.daemon.unwrap_or_default().finalize(),
		stats: layer.stats.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		wg_config = %config.paths.wg_config.display(),
		database = %config.paths.database_url,
		subnet = %config.network.subnet,
		interface = %config.daemon.interface,
		exec_prefix = %config.daemon.exec_prefix.join(" "),
		merge_policy = %config.stats.merge_policy,
		"configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &WardenConfig) -> Result<(), ConfigError> {
	if config.network.subnet.prefix_len() > 24 {
		return Err(ConfigError::Validation(format!(
			"network.subnet {} is too narrow; peer addresses need a /24 or wider",
			config.network.subnet
		)));
	}

	if config.daemon.max_concurrent == 0 {
		return Err(ConfigError::Validation(
			"daemon.max_concurrent must be at least 1".to_string(),
		));
	}

	if config.network.name_pattern.trim().is_empty() {
		return Err(ConfigError::Validation(
			"network.name_pattern must not be empty".to_string(),
		));
	}

	Ok(())
}
