/// A list of possible errors that can occur while managing outputs.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
	/// The native reference provider was never registered.
	#[error("native reference provider missing")]
	CollaboratorMissing,

	/// The native reference table is full.
	#[error("native reference table exhausted")]
	ResourceExhausted,

	/// No output exists for the session handle.
	#[error("invalid session handle")]
	InvalidHandle,

	/// The render loop is not attached yet.
	#[error("render loop unavailable")]
	TransientUnavailable,

	/// An output already exists for the session handle.
	#[error("invalid state")]
	InvalidState,

	/// The output was disposed.
	#[error("disposed")]
	Disposed,

	/// The compositor refused to create a surface producer.
	#[error("producer error: {0}")]
	Producer(String),

	#[error("unknown method: {0}")]
	UnknownMethod(String),

	#[error("invalid argument: {0}")]
	InvalidArgument(String),
}

impl Error {
	/// A negative integer code, returned across the C boundary.
	pub fn code(&self) -> i32 {
		-match self {
			Self::CollaboratorMissing => 1,
			Self::ResourceExhausted => 2,
			Self::InvalidHandle => 3,
			Self::TransientUnavailable => 4,
			Self::InvalidState => 5,
			Self::Disposed => 6,
			Self::Producer(_) => 7,
			Self::UnknownMethod(_) => 8,
			Self::InvalidArgument(_) => 9,
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		tracing::debug!(%err, "invalid arguments");
		Error::InvalidArgument(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
