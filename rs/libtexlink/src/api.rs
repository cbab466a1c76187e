use crate::ffi;
use crate::host::{self, HostFns};
use crate::state::*;
use crate::Error;

use std::ffi::c_char;
use std::ffi::c_void;
use std::str::FromStr;

use texlink::{SessionHandle, TextureId};
use tracing::Level;

/// The host's compositor and render loop.
///
/// Producers are identified by their texture id, which must be unique and non-negative.
#[repr(C)]
pub struct TexlinkHost {
	/// Passed back to every function below.
	pub user_data: *mut c_void,

	/// Create a producer and its texture slot, returning the texture id or a negative code.
	pub create_producer: Option<extern "C" fn(user_data: *mut c_void) -> i64>,

	/// Resize the producer's surface. The host may call [texlink_surface_created] before returning.
	pub set_size: Option<extern "C" fn(user_data: *mut c_void, texture_id: i64, width: u32, height: u32)>,

	/// The producer's current surface, or zero if none.
	pub surface: Option<extern "C" fn(user_data: *mut c_void, texture_id: i64) -> usize>,

	/// Release the producer's texture slot and surface.
	pub release: Option<extern "C" fn(user_data: *mut c_void, texture_id: i64)>,

	/// Returns true once the render loop is attached. Optional.
	pub render_loop_ready: Option<extern "C" fn(user_data: *mut c_void) -> bool>,

	/// Tell the render loop the texture has a new frame. Optional.
	pub mark_frame_available: Option<extern "C" fn(user_data: *mut c_void, texture_id: i64)>,
}

/// A snapshot of an output, filled in by [texlink_create].
#[repr(C)]
pub struct TexlinkOutput {
	pub texture_id: i64,
	pub native_ref: i64,
	pub width: u32,
	pub height: u32,
}

/// Initialize logging with a level.
///
/// The log_level is a string: "error", "warn", "info", "debug", "trace"
///
/// Returns a zero on success, or a negative code on failure.
///
/// # Safety
/// - The caller must ensure that level is a valid null-terminated C string, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn texlink_log_level(level: *const c_char) -> i32 {
	ffi::return_code(move || {
		let log = match unsafe { ffi::parse_str(level)? } {
			"" => texlink::Log::default(),
			level => texlink::Log::new(Level::from_str(level).map_err(|err| Error::InvalidLevel(err.to_string()))?),
		};
		log.init();

		Ok(())
	})
}

/// Replace the configuration with a JSON object, ex. `{"revoke_delay": "5s"}`.
///
/// Missing fields use their defaults. Existing outputs are disposed.
///
/// Returns a zero on success, or a negative code on failure.
///
/// # Safety
/// - The caller must ensure that config is a valid null-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn texlink_config(config: *const c_char) -> i32 {
	ffi::return_code(move || {
		let config = unsafe { ffi::parse_str(config)? };
		let config: texlink::Config = serde_json::from_str(config).map_err(texlink::Error::from)?;

		let old = State::lock().configure(config);
		drop(old);

		Ok(())
	})
}

/// Register the native runtime's global reference table.
///
/// `acquire` mints a reference to a surface, returning a positive value, or zero/negative when the table is full.
/// `release` frees a reference minted by `acquire`; it's called exactly once per reference, after a grace delay.
///
/// Without this, [texlink_create] fails. Existing outputs are disposed.
///
/// Returns a zero on success, or a negative code on failure.
///
/// # Safety
/// - The caller must ensure that the functions remain valid until [texlink_shutdown].
/// - The caller must ensure that user_data can be accessed from any thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn texlink_global_refs(
	acquire: Option<extern "C" fn(user_data: *mut c_void, surface: usize) -> i64>,
	release: Option<extern "C" fn(user_data: *mut c_void, native_ref: i64)>,
	user_data: *mut c_void,
) -> i32 {
	ffi::return_code(move || {
		let provider = host::RefProvider::new(user_data, acquire, release)?;
		let old = State::lock().global_refs(provider);
		drop(old);

		Ok(())
	})
}

/// Register the host's compositor and render loop.
///
/// The struct is copied; it doesn't need to outlive this call. Existing outputs are disposed.
///
/// Returns a zero on success, or a negative code on failure.
///
/// # Safety
/// - The caller must ensure that host is a valid pointer.
/// - The caller must ensure that the functions remain valid until [texlink_shutdown].
/// - The caller must ensure that user_data can be accessed from any thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn texlink_host(host: *const TexlinkHost) -> i32 {
	ffi::return_code(move || {
		let host = unsafe { host.as_ref() }.ok_or(Error::InvalidPointer)?;
		let fns = HostFns::new(host)?;

		let old = State::lock().host(fns);
		drop(old);

		Ok(())
	})
}

/// Receive every event as a JSON object, ex. `{"event":"FirstFrameRendered","handle":7}`.
///
/// The string is only valid for the duration of the callback.
/// The callback must not call any texlink function.
///
/// Returns a positive subscription id on success, or a negative code on failure.
///
/// # Safety
/// - The caller must ensure that on_event remains valid until [texlink_unsubscribe].
/// - The caller must ensure that user_data can be accessed from any thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn texlink_subscribe(
	on_event: Option<extern "C" fn(user_data: *mut c_void, json: *const c_char, len: usize)>,
	user_data: *mut c_void,
) -> i32 {
	ffi::return_code(move || {
		let on_event = host::OnEvent::new(user_data, on_event)?;
		State::lock().subscribe(on_event)
	})
}

/// Stop receiving events.
///
/// Returns a zero on success, or a negative code on failure.
#[unsafe(no_mangle)]
pub extern "C" fn texlink_unsubscribe(subscription: i32) -> i32 {
	ffi::return_code(move || {
		let subscription = ffi::parse_id(subscription)?;
		State::lock().unsubscribe(subscription)
	})
}

/// Create an output for a session.
///
/// Returns a zero on success, or a negative code on failure.
///
/// # Safety
/// - The caller must ensure that dst is a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn texlink_create(handle: i64, dst: *mut TexlinkOutput) -> i32 {
	ffi::return_code(move || {
		let dst = unsafe { dst.as_mut() }.ok_or(Error::InvalidPointer)?;

		let dispatcher = State::lock().dispatcher()?;
		let info = dispatcher.create(SessionHandle(handle))?;

		*dst = TexlinkOutput {
			texture_id: info.texture_id.0,
			native_ref: info.native_ref.0,
			width: info.width,
			height: info.height,
		};

		Ok(())
	})
}

/// Resize a session's surface; a no-op for unknown sessions.
///
/// Returns a zero on success, or a negative code on failure.
#[unsafe(no_mangle)]
pub extern "C" fn texlink_set_surface_size(handle: i64, width: u32, height: u32) -> i32 {
	ffi::return_code(move || {
		let dispatcher = State::lock().dispatcher()?;
		dispatcher.set_surface_size(SessionHandle(handle), width, height);
		Ok(())
	})
}

/// Dispose a session's output; a no-op for unknown sessions.
///
/// Returns a zero on success, or a negative code on failure.
#[unsafe(no_mangle)]
pub extern "C" fn texlink_dispose(handle: i64) -> i32 {
	ffi::return_code(move || {
		let dispatcher = State::lock().dispatcher()?;
		dispatcher.dispose(SessionHandle(handle));
		Ok(())
	})
}

/// Dispose every output and forget all registrations, ex. when the host detaches.
///
/// Pending revocations still run after this returns.
///
/// Returns a zero on success, or a negative code on failure.
#[unsafe(no_mangle)]
pub extern "C" fn texlink_shutdown() -> i32 {
	ffi::return_code(move || {
		let old = State::lock().shutdown();
		if let Some(dispatcher) = old {
			dispatcher.registry().dispose_all();
		}
	})
}

/// The producer for the texture allocated a new surface.
///
/// Returns a zero on success, or a negative code if the texture has no output (safe to ignore).
#[unsafe(no_mangle)]
pub extern "C" fn texlink_surface_created(texture_id: i64) -> i32 {
	ffi::return_code(move || {
		let callback = host::callback(TextureId(texture_id)).ok_or(Error::NotFound)?;
		callback.on_surface_created();
		Ok(())
	})
}

/// The producer for the texture tore down its surface.
///
/// Returns a zero on success, or a negative code if the texture has no output (safe to ignore).
#[unsafe(no_mangle)]
pub extern "C" fn texlink_surface_destroyed(texture_id: i64) -> i32 {
	ffi::return_code(move || {
		let callback = host::callback(TextureId(texture_id)).ok_or(Error::NotFound)?;
		callback.on_surface_destroyed();
		Ok(())
	})
}

/// A new frame was written to the texture's surface.
///
/// Returns a zero on success, or a negative code if the texture has no output (safe to ignore).
#[unsafe(no_mangle)]
pub extern "C" fn texlink_frame_available(texture_id: i64) -> i32 {
	ffi::return_code(move || {
		let callback = host::callback(TextureId(texture_id)).ok_or(Error::NotFound)?;
		callback.on_frame_available();
		Ok(())
	})
}
