use std::time::Duration;

/// What to do when `Create` is called for a session that already has an output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatePolicy {
	/// Fail with [crate::Error::InvalidState].
	#[default]
	Reject,

	/// Dispose the existing output and create a new one.
	Replace,
}

/// Backoff used while waiting for the host's render loop.
#[derive(Clone, Debug, PartialEq, Eq, clap::Args, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct FramePoll {
	/// The delay before the first retry.
	#[arg(
		id = "frame-poll-initial",
		long = "frame-poll-initial",
		env = "TEXLINK_FRAME_POLL_INITIAL",
		default_value = "5ms",
		value_parser = humantime::parse_duration,
	)]
	#[serde(with = "humantime_serde")]
	pub initial: Duration,

	/// The delay doubles after each attempt, up to this value.
	#[arg(
		id = "frame-poll-max",
		long = "frame-poll-max",
		env = "TEXLINK_FRAME_POLL_MAX",
		default_value = "200ms",
		value_parser = humantime::parse_duration,
	)]
	#[serde(with = "humantime_serde")]
	pub max: Duration,

	/// Give up and report the host as unavailable after this many attempts.
	#[arg(
		id = "frame-poll-attempts",
		long = "frame-poll-attempts",
		env = "TEXLINK_FRAME_POLL_ATTEMPTS",
		default_value = "10"
	)]
	pub attempts: u32,
}

impl Default for FramePoll {
	fn default() -> Self {
		Self {
			initial: Duration::from_millis(5),
			max: Duration::from_millis(200),
			attempts: 10,
		}
	}
}

/// Configuration for the [crate::OutputRegistry].
#[derive(Clone, Debug, PartialEq, Eq, clap::Args, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct Config {
	/// How long to wait before revoking a replaced surface reference.
	///
	/// The renderer may still be drawing into the old surface; there's no handshake, so this bounds the unsafe window.
	#[arg(
		id = "revoke-delay",
		long = "revoke-delay",
		env = "TEXLINK_REVOKE_DELAY",
		default_value = "5s",
		value_parser = humantime::parse_duration,
	)]
	#[serde(with = "humantime_serde")]
	pub revoke_delay: Duration,

	/// What to do when an output already exists for a session.
	#[arg(
		id = "create-policy",
		long = "create-policy",
		env = "TEXLINK_CREATE_POLICY",
		default_value = "reject"
	)]
	pub create_policy: CreatePolicy,

	#[command(flatten)]
	#[serde(default)]
	pub frame_poll: FramePoll,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			revoke_delay: Duration::from_secs(5),
			create_policy: CreatePolicy::default(),
			frame_poll: FramePoll::default(),
		}
	}
}
