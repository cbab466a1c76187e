//! Relays frame-available signals into the host's render loop.
//!
//! The render loop may not be attached yet when the first frames arrive (ex. the UI is still starting up).
//! In that case we poll for it in the background with exponential backoff, dropping frames meanwhile.
//! If it never shows up, the host is considered unavailable and the first frame is reported anyway.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Event, EventSink, FramePoll, Result, Scheduler, SessionHandle, TextureId};

/// The host's render-scheduling primitive.
pub trait RenderLoop: Send + Sync {
	/// Tell the render loop the texture has a new frame.
	fn mark_frame_available(&self, texture_id: TextureId);
}

/// Provides access to the [RenderLoop].
pub trait RenderLoopSource: Send + Sync {
	/// Returns [crate::Error::TransientUnavailable] until the render loop is attached.
	fn acquire(&self) -> Result<Arc<dyn RenderLoop>>;
}

enum Accessor {
	// Never asked for the render loop.
	Unknown,

	// A background task is polling for the render loop.
	Polling,

	Ready(Arc<dyn RenderLoop>),

	// Polling gave up.
	Unavailable,
}

struct State {
	accessor: Accessor,

	// Reset on every surface replacement.
	first_frame: bool,

	closed: bool,
}

struct Shared {
	handle: SessionHandle,
	texture_id: TextureId,
	source: Arc<dyn RenderLoopSource>,
	events: Arc<dyn EventSink>,
	scheduler: Scheduler,
	poll: FramePoll,
	state: Mutex<State>,
}

/// The frame-signal bridge of a single output.
#[derive(Clone)]
pub struct FrameSignals {
	shared: Arc<Shared>,
}

impl FrameSignals {
	pub fn new(
		handle: SessionHandle,
		texture_id: TextureId,
		source: Arc<dyn RenderLoopSource>,
		events: Arc<dyn EventSink>,
		scheduler: Scheduler,
		poll: FramePoll,
	) -> Self {
		let state = State {
			accessor: Accessor::Unknown,
			first_frame: false,
			closed: false,
		};

		Self {
			shared: Arc::new(Shared {
				handle,
				texture_id,
				source,
				events,
				scheduler,
				poll,
				state: Mutex::new(state),
			}),
		}
	}

	/// A new frame is ready to display.
	pub fn signal(&self) {
		let shared = &self.shared;
		let mut state = shared.state.lock();
		if state.closed {
			return;
		}

		let render_loop = match &state.accessor {
			Accessor::Ready(render_loop) => Some(render_loop.clone()),
			Accessor::Unknown => match shared.source.acquire() {
				Ok(render_loop) => {
					state.accessor = Accessor::Ready(render_loop.clone());
					Some(render_loop)
				}
				Err(err) => {
					tracing::debug!(handle = %shared.handle, %err, "render loop not ready, polling");
					state.accessor = Accessor::Polling;
					self.start_polling();
					return;
				}
			},
			Accessor::Polling => {
				tracing::trace!(handle = %shared.handle, "dropping frame, render loop not ready");
				return;
			}
			Accessor::Unavailable => None,
		};

		if let Some(render_loop) = render_loop {
			render_loop.mark_frame_available(shared.texture_id);
		}

		self.first_frame(&mut state);
	}

	/// Allow another first-frame notification, called when the surface is replaced.
	pub fn reset(&self) {
		self.shared.state.lock().first_frame = false;
	}

	/// Stop relaying; nothing is emitted after this returns.
	pub fn close(&self) {
		self.shared.state.lock().closed = true;
	}

	fn first_frame(&self, state: &mut State) {
		if state.first_frame {
			return;
		}

		state.first_frame = true;

		tracing::debug!(handle = %self.shared.handle, "first frame rendered");
		self.shared.events.send(Event::FirstFrameRendered {
			handle: self.shared.handle,
		});
	}

	fn start_polling(&self) {
		let this = self.clone();
		self.shared.scheduler.spawn(async move { this.run_polling().await });
	}

	async fn run_polling(self) {
		let poll = self.shared.poll.clone();
		let mut delay = poll.initial;

		for attempt in 0..poll.attempts {
			tokio::time::sleep(delay).await;

			if self.poll_once(attempt) {
				return;
			}

			delay = (delay * 2).min(poll.max);
		}

		let mut state = self.shared.state.lock();
		if state.closed {
			return;
		}

		tracing::warn!(handle = %self.shared.handle, attempts = poll.attempts, "render loop unavailable");
		state.accessor = Accessor::Unavailable;
		self.first_frame(&mut state);
	}

	// Returns true when polling should stop.
	fn poll_once(&self, attempt: u32) -> bool {
		let mut state = self.shared.state.lock();
		if state.closed {
			return true;
		}

		match self.shared.source.acquire() {
			Ok(render_loop) => {
				tracing::debug!(handle = %self.shared.handle, attempt, "render loop ready");
				state.accessor = Accessor::Ready(render_loop);
				true
			}
			Err(err) => {
				tracing::trace!(handle = %self.shared.handle, attempt, %err, "render loop still unavailable");
				false
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::sim::{EventLog, SimRenderLoop};

	fn bridge(render_loop: &Arc<SimRenderLoop>, events: &EventLog, poll: FramePoll) -> FrameSignals {
		FrameSignals::new(
			SessionHandle(1),
			TextureId(9),
			render_loop.clone(),
			Arc::new(events.clone()),
			Scheduler::current(Duration::from_secs(5)),
			poll,
		)
	}

	fn first_frames(events: &EventLog) -> usize {
		events
			.events()
			.iter()
			.filter(|event| matches!(event, Event::FirstFrameRendered { .. }))
			.count()
	}

	#[tokio::test(start_paused = true)]
	async fn first_frame_once() {
		let render_loop = Arc::new(SimRenderLoop::ready());
		let events = EventLog::new();
		let frames = bridge(&render_loop, &events, FramePoll::default());

		frames.signal();
		frames.signal();
		frames.signal();

		assert_eq!(render_loop.marked(TextureId(9)), 3);
		assert_eq!(first_frames(&events), 1);

		frames.reset();
		frames.signal();
		assert_eq!(first_frames(&events), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn closed() {
		let render_loop = Arc::new(SimRenderLoop::ready());
		let events = EventLog::new();
		let frames = bridge(&render_loop, &events, FramePoll::default());

		frames.close();
		frames.signal();

		assert_eq!(render_loop.marked(TextureId(9)), 0);
		assert!(events.events().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn polls_until_ready() {
		// Not ready for the first acquire and the first two polls.
		let render_loop = Arc::new(SimRenderLoop::ready_after(3));
		let events = EventLog::new();
		let frames = bridge(&render_loop, &events, FramePoll::default());

		frames.signal();
		assert_eq!(first_frames(&events), 0);

		// Signals are dropped while polling.
		frames.signal();
		assert_eq!(render_loop.marked(TextureId(9)), 0);

		// 5ms + 10ms + 20ms of backoff.
		tokio::time::sleep(Duration::from_millis(40)).await;

		frames.signal();
		assert_eq!(render_loop.marked(TextureId(9)), 1);
		assert_eq!(first_frames(&events), 1);
		assert_eq!(render_loop.acquires(), 4);
	}

	#[tokio::test(start_paused = true)]
	async fn gives_up() {
		let render_loop = Arc::new(SimRenderLoop::never());
		let events = EventLog::new();
		let poll = FramePoll {
			initial: Duration::from_millis(1),
			max: Duration::from_millis(4),
			attempts: 4,
		};
		let frames = bridge(&render_loop, &events, poll);

		frames.signal();
		tokio::time::sleep(Duration::from_millis(100)).await;

		// The fallback emits the first frame by itself.
		assert_eq!(first_frames(&events), 1);
		assert_eq!(render_loop.acquires(), 5);

		// Later signals don't emit it again until the surface is replaced.
		frames.signal();
		assert_eq!(first_frames(&events), 1);

		frames.reset();
		frames.signal();
		assert_eq!(first_frames(&events), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn close_while_polling() {
		let render_loop = Arc::new(SimRenderLoop::never());
		let events = EventLog::new();
		let frames = bridge(&render_loop, &events, FramePoll::default());

		frames.signal();
		frames.close();

		tokio::time::sleep(Duration::from_secs(10)).await;
		assert!(events.events().is_empty());
	}
}
