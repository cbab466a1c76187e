//! In-memory collaborators.
//!
//! These stand in for the compositor, the native reference table and the render loop.
//! They behave like the real thing where it matters: producers invoke callbacks synchronously,
//! the reference table has a fixed capacity, and the render loop can attach late.

use std::{
	collections::{BTreeMap, HashMap},
	sync::{
		atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
		Arc, Weak,
	},
};

use parking_lot::Mutex;

use crate::{
	Compositor, Error, Event, EventSink, GlobalRefs, Host, NativeRef, RefProvider, RenderLoop, RenderLoopSource, Result,
	Surface, SurfaceCallback, SurfaceProducer, TextureId,
};

/// The reference table capacity used by [Sim::new].
pub const DEFAULT_CAPACITY: usize = 1024;

/// A full set of simulated collaborators.
pub struct Sim {
	pub compositor: Arc<SimCompositor>,
	pub refs: Arc<SimRefTable>,
	pub render_loop: Arc<SimRenderLoop>,
}

impl Sim {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CAPACITY)
	}

	/// Limit the reference table to `capacity` live references.
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			compositor: Arc::new(SimCompositor::new()),
			refs: Arc::new(SimRefTable::new(capacity)),
			render_loop: Arc::new(SimRenderLoop::ready()),
		}
	}

	pub fn host(&self) -> Host {
		Host {
			compositor: self.compositor.clone(),
			refs: Some(GlobalRefs::new(self.refs.clone())),
			render_loop: self.render_loop.clone(),
		}
	}
}

impl Default for Sim {
	fn default() -> Self {
		Self::new()
	}
}

/// A compositor that hands out [SimProducer]s.
#[derive(Default)]
pub struct SimCompositor {
	next_texture: AtomicI64,
	surfaces: Arc<AtomicUsize>,
	producers: Mutex<Vec<SimProducer>>,
	failing: AtomicBool,
}

impl SimCompositor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every producer created so far, in creation order.
	pub fn producers(&self) -> Vec<SimProducer> {
		self.producers.lock().clone()
	}

	pub fn last(&self) -> Option<SimProducer> {
		self.producers.lock().last().cloned()
	}

	/// Refuse to create producers until cleared.
	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::Relaxed);
	}
}

impl Compositor for SimCompositor {
	fn create_producer(&self) -> Result<Box<dyn SurfaceProducer>> {
		if self.failing.load(Ordering::Relaxed) {
			return Err(Error::Producer("compositor unavailable".into()));
		}

		let texture_id = TextureId(self.next_texture.fetch_add(1, Ordering::Relaxed) + 1);
		let producer = SimProducer::new(texture_id, self.surfaces.clone());
		self.producers.lock().push(producer.clone());

		let producer: Box<dyn SurfaceProducer> = Box::new(producer);
		Ok(producer)
	}
}

#[derive(Default)]
struct ProducerState {
	surface: Option<Surface>,
	callback: Option<Weak<dyn SurfaceCallback>>,
	resizes: usize,
	releases: usize,
	released: bool,
}

struct ProducerShared {
	texture_id: TextureId,
	surfaces: Arc<AtomicUsize>,
	state: Mutex<ProducerState>,
}

/// A producer that allocates a new surface on every resize.
///
/// Callbacks are invoked synchronously on the calling thread, after the producer's own lock is released.
#[derive(Clone)]
pub struct SimProducer {
	shared: Arc<ProducerShared>,
}

impl SimProducer {
	fn new(texture_id: TextureId, surfaces: Arc<AtomicUsize>) -> Self {
		Self {
			shared: Arc::new(ProducerShared {
				texture_id,
				surfaces,
				state: Default::default(),
			}),
		}
	}

	/// The number of [SurfaceProducer::set_size] calls.
	pub fn resizes(&self) -> usize {
		self.shared.state.lock().resizes
	}

	/// The number of [SurfaceProducer::release] calls.
	pub fn releases(&self) -> usize {
		self.shared.state.lock().releases
	}

	/// Deliver a surface-created callback without allocating, like a spurious compositor notification.
	pub fn fire_created(&self) {
		if let Some(callback) = self.callback() {
			callback.on_surface_created();
		}
	}

	/// Allocate a new surface, as the compositor may do at any time.
	pub fn reallocate(&self) {
		{
			let mut state = self.shared.state.lock();
			if state.released {
				return;
			}
			state.surface = Some(self.next_surface());
		}

		self.fire_created();
	}

	/// Tear down the surface without releasing the producer.
	pub fn destroy(&self) {
		self.shared.state.lock().surface = None;

		if let Some(callback) = self.callback() {
			callback.on_surface_destroyed();
		}
	}

	/// A frame was written to the surface.
	pub fn frame(&self) {
		if let Some(callback) = self.callback() {
			callback.on_frame_available();
		}
	}

	fn callback(&self) -> Option<Arc<dyn SurfaceCallback>> {
		self.shared.state.lock().callback.as_ref()?.upgrade()
	}

	fn next_surface(&self) -> Surface {
		Surface(self.shared.surfaces.fetch_add(1, Ordering::Relaxed) + 1)
	}
}

impl SurfaceProducer for SimProducer {
	fn texture_id(&self) -> TextureId {
		self.shared.texture_id
	}

	fn set_size(&self, _width: u32, _height: u32) {
		self.shared.state.lock().resizes += 1;
		self.reallocate();
	}

	fn surface(&self) -> Option<Surface> {
		self.shared.state.lock().surface
	}

	fn set_callback(&self, callback: Option<Weak<dyn SurfaceCallback>>) {
		self.shared.state.lock().callback = callback;
	}

	fn release(&self) {
		let callback = {
			let mut state = self.shared.state.lock();
			state.releases += 1;
			state.released = true;
			state.surface = None;
			state.callback.as_ref().and_then(Weak::upgrade)
		};

		if let Some(callback) = callback {
			callback.on_surface_destroyed();
		}
	}
}

#[derive(Default)]
struct RefTableState {
	next: i64,
	live: BTreeMap<NativeRef, Surface>,
	releases: usize,
	double_releases: usize,
}

/// A fixed-capacity global reference table.
pub struct SimRefTable {
	capacity: usize,
	reuse: bool,
	state: Mutex<RefTableState>,
}

impl SimRefTable {
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			reuse: false,
			state: Default::default(),
		}
	}

	/// Hand out the lowest free value instead of always a new one.
	pub fn reuse_slots(mut self) -> Self {
		self.reuse = true;
		self
	}

	/// The number of references that were minted and not yet released.
	pub fn live(&self) -> usize {
		self.state.lock().live.len()
	}

	pub fn is_live(&self, native_ref: NativeRef) -> bool {
		self.state.lock().live.contains_key(&native_ref)
	}

	/// The surface behind a live reference, as the renderer would see it.
	pub fn resolve(&self, native_ref: NativeRef) -> Option<Surface> {
		self.state.lock().live.get(&native_ref).copied()
	}

	/// The number of release calls, including invalid ones.
	pub fn releases(&self) -> usize {
		self.state.lock().releases
	}

	/// The number of releases for references that weren't live.
	pub fn double_releases(&self) -> usize {
		self.state.lock().double_releases
	}
}

impl RefProvider for SimRefTable {
	fn acquire(&self, surface: Surface) -> Result<NativeRef> {
		let mut state = self.state.lock();
		if state.live.len() >= self.capacity {
			return Err(Error::ResourceExhausted);
		}

		let native_ref = if self.reuse {
			(1..)
				.map(NativeRef)
				.find(|native_ref| !state.live.contains_key(native_ref))
				.ok_or(Error::ResourceExhausted)?
		} else {
			state.next += 1;
			NativeRef(state.next)
		};

		state.live.insert(native_ref, surface);
		Ok(native_ref)
	}

	fn release(&self, native_ref: NativeRef) {
		let mut state = self.state.lock();
		state.releases += 1;

		if state.live.remove(&native_ref).is_none() {
			tracing::error!(%native_ref, "released a reference that isn't live");
			state.double_releases += 1;
		}
	}
}

#[derive(Default)]
struct SimTarget {
	marked: Mutex<HashMap<TextureId, usize>>,
}

impl RenderLoop for SimTarget {
	fn mark_frame_available(&self, texture_id: TextureId) {
		*self.marked.lock().entry(texture_id).or_default() += 1;
	}
}

/// A render loop that may attach late, or never.
pub struct SimRenderLoop {
	// The number of failed acquires before it's ready, or None for never.
	ready_after: Option<usize>,
	acquires: AtomicUsize,
	target: Arc<SimTarget>,
}

impl SimRenderLoop {
	pub fn ready() -> Self {
		Self::ready_after(0)
	}

	/// Fail the first `attempts` acquires.
	pub fn ready_after(attempts: usize) -> Self {
		Self {
			ready_after: Some(attempts),
			acquires: AtomicUsize::new(0),
			target: Default::default(),
		}
	}

	pub fn never() -> Self {
		Self {
			ready_after: None,
			acquires: AtomicUsize::new(0),
			target: Default::default(),
		}
	}

	/// The number of acquire attempts so far.
	pub fn acquires(&self) -> usize {
		self.acquires.load(Ordering::Relaxed)
	}

	/// The number of frames marked available for the texture.
	pub fn marked(&self, texture_id: TextureId) -> usize {
		self.target.marked.lock().get(&texture_id).copied().unwrap_or_default()
	}
}

impl RenderLoopSource for SimRenderLoop {
	fn acquire(&self) -> Result<Arc<dyn RenderLoop>> {
		let failed = self.acquires.fetch_add(1, Ordering::Relaxed);

		match self.ready_after {
			Some(attempts) if failed >= attempts => {
				let render_loop: Arc<dyn RenderLoop> = self.target.clone();
				Ok(render_loop)
			}
			_ => Err(Error::TransientUnavailable),
		}
	}
}

/// Records every event it receives.
#[derive(Clone, Default)]
pub struct EventLog {
	events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
	pub fn new() -> Self {
		Self::default()
	}

	/// A copy of the events received so far.
	pub fn events(&self) -> Vec<Event> {
		self.events.lock().clone()
	}

	pub fn clear(&self) {
		self.events.lock().clear();
	}
}

impl EventSink for EventLog {
	fn send(&self, event: Event) {
		self.events.lock().push(event);
	}
}
