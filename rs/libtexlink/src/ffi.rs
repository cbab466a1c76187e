use std::ffi::{c_char, c_void, CStr};

use crate::Error;

pub fn return_code<C: ReturnCode, F: FnOnce() -> C>(f: F) -> i32 {
	match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
		Ok(ret) => ret.code(),
		Err(_) => Error::Panic.code(),
	}
}

pub trait ReturnCode {
	fn code(&self) -> i32;
}

impl ReturnCode for () {
	fn code(&self) -> i32 {
		0
	}
}

impl ReturnCode for i32 {
	fn code(&self) -> i32 {
		*self
	}
}

impl ReturnCode for Result<i32, Error> {
	fn code(&self) -> i32 {
		match self {
			Ok(code) if *code < 0 => Error::InvalidCode.code(),
			Ok(code) => *code,
			Err(e) => e.code(),
		}
	}
}

impl ReturnCode for Result<usize, Error> {
	fn code(&self) -> i32 {
		match self {
			Ok(code) => i32::try_from(*code).unwrap_or_else(|_| Error::InvalidCode.code()),
			Err(e) => e.code(),
		}
	}
}

impl ReturnCode for Result<(), Error> {
	fn code(&self) -> i32 {
		match self {
			Ok(()) => 0,
			Err(e) => e.code(),
		}
	}
}

/// A C-side pointer handed back to the host's callbacks.
#[derive(Clone, Copy)]
pub struct UserData(pub *mut c_void);

// SAFETY: The pointer is never dereferenced on our side, only passed back to the host.
// The host MUST guarantee the data it points to can be accessed from any thread.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

/// # Safety
///
/// The caller must ensure that cstr is valid for 'a.
pub unsafe fn parse_str<'a>(cstr: *const c_char) -> Result<&'a str, Error> {
	if cstr.is_null() {
		return Ok("");
	}

	let string = unsafe { CStr::from_ptr(cstr) };
	Ok(string.to_str()?)
}

/// Subscription ids are positive, so zero and negative values are never valid.
pub fn parse_id(id: i32) -> Result<usize, Error> {
	match id {
		id if id > 0 => Ok(id as usize - 1),
		_ => Err(Error::InvalidId),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes() {
		assert_eq!(return_code(|| ()), 0);
		assert_eq!(return_code(|| Ok::<i32, Error>(5)), 5);
		assert_eq!(return_code(|| Ok::<i32, Error>(-5)), Error::InvalidCode.code());
		assert_eq!(
			return_code(|| Err::<(), Error>(texlink::Error::InvalidState.into())),
			texlink::Error::InvalidState.code()
		);
	}

	#[test]
	fn panic() {
		assert_eq!(return_code(|| -> i32 { panic!("boom") }), Error::Panic.code());
	}

	#[test]
	fn ids() {
		assert_eq!(parse_id(1).unwrap(), 0);
		assert!(parse_id(0).is_err());
		assert!(parse_id(-3).is_err());
	}
}
