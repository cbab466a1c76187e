use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging configuration.
///
/// `RUST_LOG` directives take precedence over the level.
#[derive(Clone, Debug, clap::Args, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct Log {
	/// The level filter to use.
	#[serde(with = "level")]
	#[arg(id = "log-level", long = "log-level", default_value = "info", env = "TEXLINK_LOG_LEVEL")]
	pub level: Level,
}

impl Default for Log {
	fn default() -> Self {
		Self { level: Level::INFO }
	}
}

impl Log {
	pub fn new(level: Level) -> Self {
		Self { level }
	}

	/// Install the global subscriber.
	///
	/// Only the first call has any effect; later calls are ignored.
	pub fn init(&self) {
		let filter = EnvFilter::builder()
			.with_default_directive(LevelFilter::from_level(self.level).into())
			.from_env_lossy();

		let fmt = tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.with_filter(filter);

		if tracing_subscriber::registry().with(fmt).try_init().is_err() {
			tracing::debug!("logger already initialized");
		}
	}
}

mod level {
	use std::str::FromStr;

	use serde::{Deserialize, Deserializer, Serializer};
	use tracing::Level;

	pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(level.as_str())
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
		let level = String::deserialize(deserializer)?;
		Level::from_str(&level).map_err(serde::de::Error::custom)
	}
}
