use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser};

mod config;
mod scenario;

#[derive(Parser, Clone)]
#[command(name = "texlink")]
pub struct Cli {
	/// Load configuration from a TOML file; explicit flags take precedence.
	#[arg(long, env = "TEXLINK_CONFIG")]
	pub config: Option<PathBuf>,

	/// The output configuration.
	#[command(flatten)]
	pub texlink: texlink::Config,

	/// The log configuration.
	#[command(flatten)]
	pub log: texlink::Log,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(clap::Subcommand, Clone)]
pub enum Command {
	Scenario(scenario::Scenario),
	Replay(scenario::Replay),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let matches = Cli::command().get_matches();
	let cli = Cli::from_arg_matches(&matches)?;

	let (config, log) = match &cli.config {
		Some(path) => config::File::load(path)?.merge(&matches, cli.texlink, cli.log),
		None => (cli.texlink, cli.log),
	};
	log.init();

	tracing::debug!(?config, "starting");

	match cli.command {
		Command::Scenario(scenario) => scenario.run(config).await,
		Command::Replay(replay) => replay.run(config).await,
	}
}
