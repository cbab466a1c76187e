use std::path::Path;

use anyhow::Context;
use clap::parser::{ArgMatches, ValueSource};

/// The optional TOML configuration file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct File {
	pub texlink: texlink::Config,
	pub log: texlink::Log,
}

impl File {
	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let contents = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
		toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
	}

	/// Start from the file, then apply any arguments that were explicitly provided.
	pub fn merge(self, matches: &ArgMatches, cli: texlink::Config, log: texlink::Log) -> (texlink::Config, texlink::Log) {
		let mut config = self.texlink;
		if explicit(matches, "revoke-delay") {
			config.revoke_delay = cli.revoke_delay;
		}
		if explicit(matches, "create-policy") {
			config.create_policy = cli.create_policy;
		}
		if explicit(matches, "frame-poll-initial") {
			config.frame_poll.initial = cli.frame_poll.initial;
		}
		if explicit(matches, "frame-poll-max") {
			config.frame_poll.max = cli.frame_poll.max;
		}
		if explicit(matches, "frame-poll-attempts") {
			config.frame_poll.attempts = cli.frame_poll.attempts;
		}

		let log = match explicit(matches, "log-level") {
			true => log,
			false => self.log,
		};

		(config, log)
	}
}

// Defaults never override the file; flags and environment variables do.
fn explicit(matches: &ArgMatches, id: &str) -> bool {
	matches
		.value_source(id)
		.is_some_and(|source| source != ValueSource::DefaultValue)
}
