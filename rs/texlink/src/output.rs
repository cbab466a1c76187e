//! A single session's drawing target.
//!
//! A [VideoOutput] owns a [SurfaceProducer] and the [NativeRef] currently handed to the renderer.
//! It moves through these states:
//! - sized: the producer exists with a 1x1 placeholder size.
//! - active: a surface is attached and its reference was minted.
//! - replacing: the producer reallocated its surface; a new reference is minted and the old one revoked later.
//! - disposed: terminal, every later call is a no-op.
//!
//! Resize and dispose (from the UI thread) race with producer callbacks (from the compositor).
//! Everything is serialized on one re-entrant lock per output, because producers are allowed to
//! invoke callbacks synchronously from inside [SurfaceProducer::set_size] and [SurfaceProducer::release].

use std::{cell::RefCell, fmt, str::FromStr, sync::Arc};

use parking_lot::ReentrantMutex;

use crate::{
	Config, Error, Event, EventSink, FrameSignals, GlobalRef, GlobalRefs, Host, NativeRef, Result, Scheduler, Surface,
	SurfaceCallback, SurfaceProducer, TextureId,
};

/// A caller-assigned identifier for a playback session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(pub i64);

impl fmt::Display for SessionHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl FromStr for SessionHandle {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		s.parse().map(Self)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
	pub width: u32,
	pub height: u32,
}

impl Size {
	/// The size used until the host asks for a real one.
	pub const PLACEHOLDER: Self = Self { width: 1, height: 1 };

	pub fn new(width: u32, height: u32) -> Self {
		Self { width, height }
	}
}

/// A snapshot of an output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputInfo {
	pub texture_id: TextureId,
	pub native_ref: NativeRef,
	pub width: u32,
	pub height: u32,
}

struct State {
	surface: Option<Surface>,
	global_ref: GlobalRef,

	// The size of the attached surface, and the size last asked for.
	size: Size,
	requested: Size,

	disposed: bool,
}

struct Inner {
	handle: SessionHandle,
	texture_id: TextureId,
	producer: Box<dyn SurfaceProducer>,
	refs: GlobalRefs,
	scheduler: Scheduler,
	events: Arc<dyn EventSink>,
	frames: FrameSignals,

	// Re-entrant so producer callbacks on the same thread don't deadlock.
	// Never hold the RefCell borrow while calling into a collaborator.
	state: ReentrantMutex<RefCell<State>>,
}

/// The drawing target of a single session.
#[derive(Clone)]
pub struct VideoOutput {
	inner: Arc<Inner>,
}

impl fmt::Debug for VideoOutput {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("VideoOutput")
			.field("handle", &self.inner.handle)
			.field("texture_id", &self.inner.texture_id)
			.finish()
	}
}

impl VideoOutput {
	/// Create a producer, size it to the placeholder and attach the initial surface.
	///
	/// Fails with [Error::CollaboratorMissing] if the host has no reference provider.
	pub fn new(
		handle: SessionHandle,
		host: &Host,
		config: &Config,
		scheduler: &Scheduler,
		events: Arc<dyn EventSink>,
	) -> Result<Self> {
		let refs = host.refs.clone().ok_or(Error::CollaboratorMissing)?;

		let producer = host.compositor.create_producer()?;
		let texture_id = producer.texture_id();
		producer.set_size(Size::PLACEHOLDER.width, Size::PLACEHOLDER.height);

		let frames = FrameSignals::new(
			handle,
			texture_id,
			host.render_loop.clone(),
			events.clone(),
			scheduler.clone(),
			config.frame_poll.clone(),
		);

		let state = State {
			surface: None,
			global_ref: GlobalRef::NONE,
			size: Size::PLACEHOLDER,
			requested: Size::PLACEHOLDER,
			disposed: false,
		};

		let inner = Arc::new(Inner {
			handle,
			texture_id,
			producer,
			refs,
			scheduler: scheduler.clone(),
			events,
			frames,
			state: ReentrantMutex::new(RefCell::new(state)),
		});

		let callback: Arc<dyn SurfaceCallback> = inner.clone();
		inner.producer.set_callback(Some(Arc::downgrade(&callback)));

		if let Err(err) = inner.attach_initial() {
			inner.dispose();
			return Err(err);
		}

		let output = Self { inner };
		if let Ok(info) = output.info() {
			tracing::info!(%handle, texture_id = %info.texture_id, native_ref = %info.native_ref, "created output");
		}

		Ok(output)
	}

	pub fn handle(&self) -> SessionHandle {
		self.inner.handle
	}

	/// Returns [Error::Disposed] once disposed.
	pub fn info(&self) -> Result<OutputInfo> {
		let guard = self.inner.state.lock();
		let state = guard.borrow();
		if state.disposed {
			return Err(Error::Disposed);
		}

		Ok(OutputInfo {
			texture_id: self.inner.texture_id,
			native_ref: state.global_ref.native_ref,
			width: state.size.width,
			height: state.size.height,
		})
	}

	/// Resize the surface; a no-op if the size is unchanged or the output is disposed.
	///
	/// The reported size only changes once a surface of the new size is attached.
	#[tracing::instrument("output", skip_all, fields(handle = %self.inner.handle))]
	pub fn set_surface_size(&self, width: u32, height: u32) {
		self.inner.set_surface_size(Size::new(width, height))
	}

	/// Release everything; a no-op if already disposed.
	#[tracing::instrument("output", skip_all, fields(handle = %self.inner.handle))]
	pub fn dispose(&self) {
		self.inner.dispose()
	}

	pub fn is_disposed(&self) -> bool {
		self.inner.state.lock().borrow().disposed
	}
}

impl Inner {
	fn attach_initial(&self) -> Result<()> {
		let guard = self.state.lock();

		let Some(surface) = self.producer.surface() else {
			tracing::debug!(handle = %self.handle, "no initial surface");
			return Ok(());
		};

		// A callback may have beaten us to it.
		if !guard.borrow().global_ref.is_none() {
			return Ok(());
		}

		let global_ref = self.refs.acquire(surface)?;

		let mut state = guard.borrow_mut();
		state.global_ref = global_ref;
		state.surface = Some(surface);

		Ok(())
	}

	fn set_surface_size(&self, size: Size) {
		if size.width == 0 || size.height == 0 {
			tracing::debug!(?size, "ignoring empty size");
			return;
		}

		let guard = self.state.lock();

		{
			let mut state = guard.borrow_mut();
			if state.disposed {
				tracing::debug!("ignoring resize, disposed");
				return;
			}

			if state.requested == size {
				return;
			}

			state.requested = size;
		}

		tracing::debug!(width = size.width, height = size.height, "resizing");

		// May call on_surface_created on this thread.
		self.producer.set_size(size.width, size.height);
	}

	fn surface_created(&self) -> Result<()> {
		let guard = self.state.lock();
		if guard.borrow().disposed {
			return Ok(());
		}

		let Some(surface) = self.producer.surface() else {
			tracing::debug!(handle = %self.handle, "surface created but none available");
			return Ok(());
		};

		{
			let mut state = guard.borrow_mut();
			if state.surface == Some(surface) {
				tracing::trace!(handle = %self.handle, "duplicate surface created");
				state.size = state.requested;
				return Ok(());
			}
		}

		// Mint first, so a full table leaves the current surface attached.
		let global_ref = match self.refs.acquire(surface) {
			Ok(global_ref) => global_ref,
			Err(err) => {
				// Forget the request so the same size can be retried.
				let mut state = guard.borrow_mut();
				state.requested = state.size;
				return Err(err);
			}
		};

		let (previous, size) = {
			let mut state = guard.borrow_mut();
			if state.disposed {
				drop(state);
				self.refs.revoke(global_ref);
				return Ok(());
			}

			state.surface = Some(surface);
			state.size = state.requested;
			(std::mem::replace(&mut state.global_ref, global_ref), state.size)
		};

		let native_ref = global_ref.native_ref;

		self.frames.reset();
		self.events.send(Event::SurfaceUpdated {
			handle: self.handle,
			texture_id: self.texture_id,
			native_ref,
			width: size.width,
			height: size.height,
		});

		tracing::debug!(handle = %self.handle, %native_ref, previous = %previous.native_ref, "surface replaced");

		// Only after the replacement was announced.
		self.scheduler.revoke_later(&self.refs, previous);

		Ok(())
	}

	// Detach the surface, announcing that no surface is attached.
	fn detach(&self, state: &RefCell<State>) {
		let (previous, size) = {
			let mut state = state.borrow_mut();
			state.surface = None;
			(std::mem::take(&mut state.global_ref), state.size)
		};

		if previous.is_none() {
			return;
		}

		self.events.send(Event::SurfaceUpdated {
			handle: self.handle,
			texture_id: self.texture_id,
			native_ref: NativeRef::NONE,
			width: size.width,
			height: size.height,
		});

		self.scheduler.revoke_later(&self.refs, previous);
	}

	fn dispose(&self) {
		let guard = self.state.lock();

		{
			let mut state = guard.borrow_mut();
			if state.disposed {
				return;
			}

			state.disposed = true;
		}

		// Nothing is relayed after this point.
		self.frames.close();

		self.producer.set_callback(None);
		self.producer.release();

		self.detach(&guard);

		tracing::info!(handle = %self.handle, texture_id = %self.texture_id, "disposed output");
	}
}

impl SurfaceCallback for Inner {
	fn on_surface_created(&self) {
		if let Err(err) = self.surface_created() {
			tracing::warn!(handle = %self.handle, %err, "failed to attach surface");
		}
	}

	fn on_surface_destroyed(&self) {
		let guard = self.state.lock();
		if guard.borrow().disposed {
			return;
		}

		tracing::debug!(handle = %self.handle, "surface destroyed");
		self.detach(&guard);
	}

	fn on_frame_available(&self) {
		self.frames.signal();
	}
}

impl Drop for Inner {
	fn drop(&mut self) {
		if !self.state.get_mut().get_mut().disposed {
			tracing::warn!(handle = %self.handle, "output dropped without dispose");
			self.dispose();
		}
	}
}
