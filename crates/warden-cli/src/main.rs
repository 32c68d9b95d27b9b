// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_config::WardenConfig;
use warden_db::{create_pool, migrate, PeerRepository};
use warden_peers::PeerService;
use warden_wgctl::ProcessRunner;

use commands::{Command, Output};

/// Warden - WireGuard gateway peer management
#[derive(Parser, Debug)]
#[command(name = "warden", version, about, long_about = None)]
struct Args {
	/// Path to configuration file (default /etc/warden/warden.toml)
	#[arg(short, long, env = "WARDEN_CONFIG")]
	config: Option<PathBuf>,

	/// Log level (overrides config)
	#[arg(short, long)]
	log_level: Option<String>,

	/// Output logs as JSON
	#[arg(long)]
	json_logs: bool,

	/// Print results as JSON
	#[arg(long)]
	json: bool,

	/// Do not restart the daemon after structural changes
	#[arg(long)]
	no_restart: bool,

	#[command(subcommand)]
	command: Command,
}

fn init_tracing(level: &str, json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

	if json {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.init();
	} else {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().compact().with_writer(std::io::stderr))
			.init();
	}
}

async fn build_service(config: &WardenConfig) -> anyhow::Result<PeerService> {
	let pool = create_pool(&config.paths.database_url)
		.await
		.with_context(|| format!("opening registry at {}", config.paths.database_url))?;
	migrate(&pool).await.context("creating registry schema")?;
	let registry = Arc::new(PeerRepository::new(pool));

	let runner = ProcessRunner::new(
		config.daemon.exec_prefix.clone(),
		config.daemon.max_concurrent,
		config.daemon.timeout(),
	);
	let host_runner = runner.unprefixed();
	debug!(exec_prefix = ?runner.exec_prefix(), "command runner ready");

	let service = PeerService::from_config(config, registry, Arc::new(runner), Arc::new(host_runner))?;
	Ok(service)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let config = match &args.config {
		Some(path) => warden_config::load_config_with_file(path),
		None => warden_config::load_config(),
	}
	.context("loading configuration")?;

	init_tracing(
		args.log_level.as_deref().unwrap_or(&config.logging.level),
		args.json_logs,
	);
	info!(wg_config = %config.paths.wg_config.display(), "warden starting");

	let service = build_service(&config).await?;
	let output = Output {
		json: args.json,
		restart: !args.no_restart,
	};

	if !commands::run(args.command, &service, &output).await? {
		std::process::exit(1);
	}
	Ok(())
}
