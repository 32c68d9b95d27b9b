// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and the environment.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::WardenConfigLayer;
use crate::sections::{
	DaemonConfigLayer, LoggingConfigLayer, NetworkConfigLayer, PathsConfigLayer, StatsConfigLayer,
};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/warden/warden.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<WardenConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<WardenConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(WardenConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<WardenConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(WardenConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: WardenConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: WARDEN_<SECTION>_<FIELD>. List values are whitespace
/// separated (`WARDEN_DAEMON_EXEC_PREFIX="docker exec wireguard"`), except
/// `WARDEN_NETWORK_RESERVED_NAMES` which is comma separated.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<WardenConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(WardenConfigLayer {
			paths: Some(load_paths_from_env()),
			network: Some(load_network_from_env()?),
			daemon: Some(load_daemon_from_env()?),
			stats: Some(load_stats_from_env()?),
			logging: Some(load_logging_from_env()),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|e| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid value '{v}': {e}"),
		}),
		None => Ok(None),
	}
}

fn env_words(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|v| v.split_whitespace().map(str::to_string).collect())
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|v| {
		v.split(',')
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	})
}

fn load_paths_from_env() -> PathsConfigLayer {
	PathsConfigLayer {
		wg_config: env_var("WARDEN_PATHS_WG_CONFIG").map(PathBuf::from),
		backup_dir: env_var("WARDEN_PATHS_BACKUP_DIR").map(PathBuf::from),
		ledger: env_var("WARDEN_PATHS_LEDGER").map(PathBuf::from),
		database_url: env_var("WARDEN_PATHS_DATABASE_URL"),
	}
}

fn load_network_from_env() -> Result<NetworkConfigLayer, ConfigError> {
	Ok(NetworkConfigLayer {
		subnet: env_parse("WARDEN_NETWORK_SUBNET")?,
		endpoint_host: env_var("WARDEN_NETWORK_ENDPOINT_HOST"),
		endpoint_port: env_parse("WARDEN_NETWORK_ENDPOINT_PORT")?,
		dns: env_parse("WARDEN_NETWORK_DNS")?,
		name_pattern: env_var("WARDEN_NETWORK_NAME_PATTERN"),
		reserved_names: env_list("WARDEN_NETWORK_RESERVED_NAMES"),
	})
}

fn load_daemon_from_env() -> Result<DaemonConfigLayer, ConfigError> {
	Ok(DaemonConfigLayer {
		exec_prefix: env_words("WARDEN_DAEMON_EXEC_PREFIX"),
		wg_binary: env_var("WARDEN_DAEMON_WG_BINARY"),
		interface: env_var("WARDEN_DAEMON_INTERFACE"),
		restart_command: env_words("WARDEN_DAEMON_RESTART_COMMAND"),
		max_concurrent: env_parse("WARDEN_DAEMON_MAX_CONCURRENT")?,
		timeout_secs: env_parse("WARDEN_DAEMON_TIMEOUT_SECS")?,
	})
}

fn load_stats_from_env() -> Result<StatsConfigLayer, ConfigError> {
	Ok(StatsConfigLayer {
		merge_policy: env_parse("WARDEN_STATS_MERGE_POLICY")?,
		sort: env_parse("WARDEN_STATS_SORT")?,
	})
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("WARDEN_LOGGING_LEVEL"),
	}
}
