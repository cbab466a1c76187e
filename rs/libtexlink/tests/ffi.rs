//! Drives the C API the way a host would, with the host side written in Rust.

use std::{
	collections::HashMap,
	ffi::{c_char, c_void, CStr},
	sync::{
		atomic::{AtomicI64, AtomicUsize, Ordering},
		LazyLock, Mutex,
	},
	time::Duration,
};

use texlink_ffi::*;

static NEXT_TEXTURE: AtomicI64 = AtomicI64::new(100);
static NEXT_SURFACE: AtomicUsize = AtomicUsize::new(1);
static NEXT_REF: AtomicI64 = AtomicI64::new(1);
static MARKED: AtomicUsize = AtomicUsize::new(0);
static DOUBLE_RELEASES: AtomicUsize = AtomicUsize::new(0);

static SURFACES: LazyLock<Mutex<HashMap<i64, usize>>> = LazyLock::new(Default::default);
static LIVE: LazyLock<Mutex<HashMap<i64, usize>>> = LazyLock::new(Default::default);
static EVENTS: LazyLock<Mutex<Vec<serde_json::Value>>> = LazyLock::new(Default::default);

extern "C" fn create_producer(_: *mut c_void) -> i64 {
	NEXT_TEXTURE.fetch_add(1, Ordering::Relaxed)
}

// Like most compositors, reallocates and notifies before returning.
extern "C" fn set_size(_: *mut c_void, texture_id: i64, _width: u32, _height: u32) {
	let surface = NEXT_SURFACE.fetch_add(1, Ordering::Relaxed);
	SURFACES.lock().unwrap().insert(texture_id, surface);
	texlink_surface_created(texture_id);
}

extern "C" fn surface(_: *mut c_void, texture_id: i64) -> usize {
	SURFACES.lock().unwrap().get(&texture_id).copied().unwrap_or(0)
}

extern "C" fn release(_: *mut c_void, texture_id: i64) {
	SURFACES.lock().unwrap().remove(&texture_id);
}

extern "C" fn render_loop_ready(_: *mut c_void) -> bool {
	true
}

extern "C" fn mark_frame_available(_: *mut c_void, _texture_id: i64) {
	MARKED.fetch_add(1, Ordering::Relaxed);
}

extern "C" fn acquire_ref(_: *mut c_void, surface: usize) -> i64 {
	let native_ref = NEXT_REF.fetch_add(1, Ordering::Relaxed);
	LIVE.lock().unwrap().insert(native_ref, surface);
	native_ref
}

extern "C" fn release_ref(_: *mut c_void, native_ref: i64) {
	if LIVE.lock().unwrap().remove(&native_ref).is_none() {
		DOUBLE_RELEASES.fetch_add(1, Ordering::Relaxed);
	}
}

extern "C" fn on_event(_: *mut c_void, json: *const c_char, len: usize) {
	let json = unsafe { CStr::from_ptr(json) }.to_str().unwrap();
	assert_eq!(json.len(), len);
	EVENTS.lock().unwrap().push(serde_json::from_str(json).unwrap());
}

fn events() -> Vec<serde_json::Value> {
	EVENTS.lock().unwrap().clone()
}

// Everything shares global state, so it's one test.
#[test]
fn lifecycle() {
	let host = TexlinkHost {
		user_data: std::ptr::null_mut(),
		create_producer: Some(create_producer),
		set_size: Some(set_size),
		surface: Some(surface),
		release: Some(release),
		render_loop_ready: Some(render_loop_ready),
		mark_frame_available: Some(mark_frame_available),
	};

	let mut output = TexlinkOutput {
		texture_id: 0,
		native_ref: 0,
		width: 0,
		height: 0,
	};

	unsafe {
		assert_eq!(texlink_log_level(c"debug".as_ptr()), 0);
		assert!(texlink_log_level(c"loud".as_ptr()) < 0);
		assert_eq!(texlink_config(c"{\"revoke_delay\": \"10ms\"}".as_ptr()), 0);
		assert!(texlink_config(c"{\"bogus\": 1}".as_ptr()) < 0);

		// Nothing registered yet.
		assert_eq!(
			texlink_create(7, &mut output),
			texlink::Error::CollaboratorMissing.code()
		);

		assert_eq!(texlink_host(&host), 0);
		assert_eq!(texlink_host(std::ptr::null()), Error::InvalidPointer.code());

		// Still missing the reference table.
		assert_eq!(
			texlink_create(7, &mut output),
			texlink::Error::CollaboratorMissing.code()
		);

		assert_eq!(texlink_global_refs(Some(acquire_ref), Some(release_ref), std::ptr::null_mut()), 0);

		let subscription = texlink_subscribe(Some(on_event), std::ptr::null_mut());
		assert_eq!(subscription, 1);

		assert_eq!(texlink_create(7, &mut output), 0);
		assert_eq!(
			texlink_create(7, &mut output),
			texlink::Error::InvalidState.code()
		);
		assert_eq!(texlink_create(8, std::ptr::null_mut()), Error::InvalidPointer.code());
	}

	let first = output.native_ref;
	assert!(first > 0);
	assert_eq!((output.width, output.height), (1, 1));
	assert!(events().is_empty());

	assert_eq!(texlink_set_surface_size(7, 640, 480), 0);
	let update = events().last().cloned().unwrap();
	assert_eq!(update["event"], "SurfaceUpdated");
	assert_eq!(update["handle"], 7);
	assert_eq!(update["textureId"], output.texture_id);
	assert_eq!(update["width"], 640);
	let second = update["nativeRef"].as_i64().unwrap();
	assert_ne!(second, first);

	assert_eq!(texlink_frame_available(output.texture_id), 0);
	assert_eq!(texlink_frame_available(output.texture_id), 0);
	assert_eq!(MARKED.load(Ordering::Relaxed), 2);
	assert_eq!(
		events().last().cloned().unwrap(),
		serde_json::json!({ "event": "FirstFrameRendered", "handle": 7 })
	);

	assert_eq!(texlink_dispose(7), 0);
	let teardown = events().last().cloned().unwrap();
	assert_eq!(teardown["nativeRef"], 0);

	// Late notifications for a disposed output are reported, but harmless.
	assert_eq!(texlink_surface_created(output.texture_id), Error::NotFound.code());
	assert_eq!(texlink_dispose(7), 0);

	std::thread::sleep(Duration::from_millis(200));
	assert!(LIVE.lock().unwrap().is_empty(), "leaked references");
	assert_eq!(DOUBLE_RELEASES.load(Ordering::Relaxed), 0);

	assert_eq!(texlink_unsubscribe(1), 0);
	assert_eq!(texlink_unsubscribe(1), Error::NotFound.code());
	assert_eq!(texlink_unsubscribe(0), Error::InvalidId.code());
	assert_eq!(texlink_shutdown(), 0);
}
