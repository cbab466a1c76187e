/// Errors returned across the C boundary, as negative codes.
#[derive(Debug, thiserror::Error, Clone)]
#[non_exhaustive]
pub enum Error {
	#[error(transparent)]
	Texlink(#[from] texlink::Error),

	#[error("invalid pointer")]
	InvalidPointer,

	#[error("invalid utf-8: {0}")]
	Utf8(#[from] std::str::Utf8Error),

	#[error("panic")]
	Panic,

	/// A return value didn't fit in a code.
	#[error("invalid code")]
	InvalidCode,

	#[error("invalid id")]
	InvalidId,

	#[error("not found")]
	NotFound,

	#[error("invalid log level: {0}")]
	InvalidLevel(String),

	/// The host didn't provide a required function pointer.
	#[error("missing callback: {0}")]
	MissingCallback(&'static str),
}

impl Error {
	pub fn code(&self) -> i32 {
		match self {
			// -1 through -99 are reserved for the core library.
			Self::Texlink(err) => err.code(),
			Self::InvalidPointer => -100,
			Self::Utf8(_) => -101,
			Self::Panic => -102,
			Self::InvalidCode => -103,
			Self::InvalidId => -104,
			Self::NotFound => -105,
			Self::InvalidLevel(_) => -106,
			Self::MissingCallback(_) => -107,
		}
	}
}
