use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::eyre;
use serde_json::json;

use dun_domain::EngineKind;
use dun_service::ReminderService;
use dun_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = dun_cli::VERSION,
	rename_all = "kebab",
	styles = dun_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Which engine to run once.
	#[arg(long, short = 'e', value_enum, default_value_t = EngineSelection::All)]
	pub engine: EngineSelection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EngineSelection {
	Chase,
	Nudge,
	All,
}
impl EngineSelection {
	pub fn kinds(self) -> &'static [EngineKind] {
		match self {
			Self::Chase => &[EngineKind::Chase],
			Self::Nudge => &[EngineKind::Nudge],
			Self::All => &EngineKind::ALL,
		}
	}
}

/// Runs one batch per selected engine and prints one JSON report per line.
pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = dun_config::load(&args.config)?;

	dun_cli::init_tracing(&config.service.log_level);

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let service = ReminderService::from_config(&config, &db)?;
	let mut failed = Vec::new();

	tracing::info!(selection = ?args.engine, "Running engines once.");

	for &kind in args.engine.kinds() {
		let Some(engine) = service.engine(kind) else {
			println!("{}", json!({ "success": false, "engine": kind, "skipped": "engine_disabled" }));

			continue;
		};

		match engine.run().await {
			Ok(outcome) => println!("{}", outcome.report()?),
			Err(err) => {
				println!("{}", json!({ "success": false, "engine": kind, "error": err.to_string() }));
				failed.push(kind);
			},
		}
	}

	db.pool.close().await;

	if !failed.is_empty() {
		let names: Vec<_> = failed.iter().map(|kind| kind.as_str()).collect();

		return Err(eyre::eyre!("Engine run failed: {}.", names.join(", ")));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn engine_defaults_to_all() {
		let args = Args::try_parse_from(["dun-worker", "-c", "dun.toml"]).expect("parse");

		assert_eq!(args.engine, EngineSelection::All);
		assert_eq!(args.engine.kinds(), &EngineKind::ALL);
	}

	#[test]
	fn engine_can_be_selected() {
		let args = Args::try_parse_from(["dun-worker", "-c", "dun.toml", "--engine", "nudge"])
			.expect("parse");

		assert_eq!(args.engine.kinds(), &[EngineKind::Nudge]);
		assert!(Args::try_parse_from(["dun-worker", "-c", "dun.toml", "--engine", "x"]).is_err());
	}
}
