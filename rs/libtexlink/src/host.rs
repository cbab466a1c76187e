//! Adapts the host's C function pointers to the texlink collaborator traits.

use std::{
	collections::HashMap,
	ffi::{c_char, c_void, CString},
	sync::{Arc, LazyLock, Mutex, PoisonError, Weak},
};

use texlink::{Event, NativeRef, Surface, SurfaceCallback, TextureId};

use crate::{ffi::UserData, Error, TexlinkHost};

// Producers are identified by texture id; compositor entry points look up the output here.
// Kept apart from the global state, since callbacks may arrive while it's locked.
static CALLBACKS: LazyLock<Mutex<HashMap<TextureId, Weak<dyn SurfaceCallback>>>> = LazyLock::new(Default::default);

/// The output bound to the texture, if it's still alive.
pub fn callback(texture_id: TextureId) -> Option<Arc<dyn SurfaceCallback>> {
	CALLBACKS
		.lock()
		.unwrap_or_else(PoisonError::into_inner)
		.get(&texture_id)?
		.upgrade()
}

fn set_callback(texture_id: TextureId, callback: Option<Weak<dyn SurfaceCallback>>) {
	let mut callbacks = CALLBACKS.lock().unwrap_or_else(PoisonError::into_inner);
	match callback {
		Some(callback) => callbacks.insert(texture_id, callback),
		None => callbacks.remove(&texture_id),
	};
}

/// The validated function table from [TexlinkHost].
pub struct HostFns {
	user_data: UserData,
	create_producer: extern "C" fn(user_data: *mut c_void) -> i64,
	set_size: extern "C" fn(user_data: *mut c_void, texture_id: i64, width: u32, height: u32),
	surface: extern "C" fn(user_data: *mut c_void, texture_id: i64) -> usize,
	release: extern "C" fn(user_data: *mut c_void, texture_id: i64),
	render_loop_ready: Option<extern "C" fn(user_data: *mut c_void) -> bool>,
	mark_frame_available: Option<extern "C" fn(user_data: *mut c_void, texture_id: i64)>,
}

impl HostFns {
	pub fn new(host: &TexlinkHost) -> Result<Self, Error> {
		Ok(Self {
			user_data: UserData(host.user_data),
			create_producer: host.create_producer.ok_or(Error::MissingCallback("create_producer"))?,
			set_size: host.set_size.ok_or(Error::MissingCallback("set_size"))?,
			surface: host.surface.ok_or(Error::MissingCallback("surface"))?,
			release: host.release.ok_or(Error::MissingCallback("release"))?,
			render_loop_ready: host.render_loop_ready,
			mark_frame_available: host.mark_frame_available,
		})
	}
}

pub struct Compositor {
	fns: Arc<HostFns>,
}

impl Compositor {
	pub fn new(fns: Arc<HostFns>) -> Self {
		Self { fns }
	}
}

impl texlink::Compositor for Compositor {
	fn create_producer(&self) -> texlink::Result<Box<dyn texlink::SurfaceProducer>> {
		let texture_id = (self.fns.create_producer)(self.fns.user_data.0);
		if texture_id < 0 {
			return Err(texlink::Error::Producer(format!("host returned {texture_id}")));
		}

		let producer: Box<dyn texlink::SurfaceProducer> = Box::new(Producer {
			texture_id: TextureId(texture_id),
			fns: self.fns.clone(),
		});
		Ok(producer)
	}
}

struct Producer {
	texture_id: TextureId,
	fns: Arc<HostFns>,
}

impl texlink::SurfaceProducer for Producer {
	fn texture_id(&self) -> TextureId {
		self.texture_id
	}

	fn set_size(&self, width: u32, height: u32) {
		(self.fns.set_size)(self.fns.user_data.0, self.texture_id.0, width, height)
	}

	fn surface(&self) -> Option<Surface> {
		match (self.fns.surface)(self.fns.user_data.0, self.texture_id.0) {
			0 => None,
			surface => Some(Surface(surface)),
		}
	}

	fn set_callback(&self, callback: Option<Weak<dyn SurfaceCallback>>) {
		set_callback(self.texture_id, callback)
	}

	fn release(&self) {
		set_callback(self.texture_id, None);
		(self.fns.release)(self.fns.user_data.0, self.texture_id.0)
	}
}

pub struct RenderLoopSource {
	fns: Arc<HostFns>,
}

impl RenderLoopSource {
	pub fn new(fns: Arc<HostFns>) -> Self {
		Self { fns }
	}
}

impl texlink::RenderLoopSource for RenderLoopSource {
	fn acquire(&self) -> texlink::Result<Arc<dyn texlink::RenderLoop>> {
		match (self.fns.render_loop_ready, self.fns.mark_frame_available) {
			(Some(ready), Some(mark)) if ready(self.fns.user_data.0) => {
				let render_loop: Arc<dyn texlink::RenderLoop> = Arc::new(RenderLoop {
					user_data: self.fns.user_data,
					mark,
				});
				Ok(render_loop)
			}
			_ => Err(texlink::Error::TransientUnavailable),
		}
	}
}

struct RenderLoop {
	user_data: UserData,
	mark: extern "C" fn(user_data: *mut c_void, texture_id: i64),
}

impl texlink::RenderLoop for RenderLoop {
	fn mark_frame_available(&self, texture_id: TextureId) {
		(self.mark)(self.user_data.0, texture_id.0)
	}
}

/// The native runtime's reference table.
pub struct RefProvider {
	user_data: UserData,
	acquire: extern "C" fn(user_data: *mut c_void, surface: usize) -> i64,
	release: extern "C" fn(user_data: *mut c_void, native_ref: i64),
}

impl RefProvider {
	pub fn new(
		user_data: *mut c_void,
		acquire: Option<extern "C" fn(user_data: *mut c_void, surface: usize) -> i64>,
		release: Option<extern "C" fn(user_data: *mut c_void, native_ref: i64)>,
	) -> Result<Self, Error> {
		Ok(Self {
			user_data: UserData(user_data),
			acquire: acquire.ok_or(Error::MissingCallback("acquire"))?,
			release: release.ok_or(Error::MissingCallback("release"))?,
		})
	}
}

impl texlink::RefProvider for RefProvider {
	fn acquire(&self, surface: Surface) -> texlink::Result<NativeRef> {
		match (self.acquire)(self.user_data.0, surface.0) {
			native_ref if native_ref < 0 => Err(texlink::Error::ResourceExhausted),
			native_ref => Ok(NativeRef(native_ref)),
		}
	}

	fn release(&self, native_ref: NativeRef) {
		(self.release)(self.user_data.0, native_ref.0)
	}
}

/// Delivers events to C as JSON.
pub struct OnEvent {
	user_data: UserData,
	on_event: extern "C" fn(user_data: *mut c_void, json: *const c_char, len: usize),
}

impl OnEvent {
	pub fn new(
		user_data: *mut c_void,
		on_event: Option<extern "C" fn(user_data: *mut c_void, json: *const c_char, len: usize)>,
	) -> Result<Self, Error> {
		Ok(Self {
			user_data: UserData(user_data),
			on_event: on_event.ok_or(Error::MissingCallback("on_event"))?,
		})
	}
}

impl texlink::EventSink for OnEvent {
	fn send(&self, event: Event) {
		let json = match serde_json::to_string(&event) {
			Ok(json) => json,
			Err(err) => {
				tracing::warn!(%err, "failed to encode event");
				return;
			}
		};

		// JSON escapes control characters, so there's never an interior nul.
		let len = json.len();
		let Ok(json) = CString::new(json) else {
			return;
		};

		(self.on_event)(self.user_data.0, json.as_ptr(), len)
	}
}
