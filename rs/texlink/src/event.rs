use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;

use crate::{NativeRef, SessionHandle, TextureId};

/// A notification emitted toward the host.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum Event {
	/// The texture's backing surface changed; a zero `native_ref` means no surface.
	SurfaceUpdated {
		handle: SessionHandle,
		texture_id: TextureId,
		native_ref: NativeRef,
		width: u32,
		height: u32,
	},

	/// The first frame since construction or the last surface replacement was rendered.
	FirstFrameRendered { handle: SessionHandle },
}

impl Event {
	pub fn handle(&self) -> SessionHandle {
		match self {
			Self::SurfaceUpdated { handle, .. } => *handle,
			Self::FirstFrameRendered { handle } => *handle,
		}
	}
}

/// Receives events.
///
/// Sinks are invoked on the calling thread while internal locks are held, so they must not block.
/// A sink handling [Event::SurfaceUpdated] may read the output back.
pub trait EventSink: Send + Sync {
	fn send(&self, event: Event);
}

impl<F> EventSink for F
where
	F: Fn(Event) + Send + Sync,
{
	fn send(&self, event: Event) {
		self(event)
	}
}

/// Identifies a subscription in [Subscribers].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

#[derive(Default)]
struct SubscribersState {
	next: u64,
	sinks: BTreeMap<u64, Arc<dyn EventSink>>,
}

/// A publish/subscribe list of [EventSink]s.
///
/// One lock guards the list; [Subscribers::notify] works on a snapshot, so a sink may unsubscribe itself.
#[derive(Clone, Default)]
pub struct Subscribers {
	state: Arc<Mutex<SubscribersState>>,
}

impl Subscribers {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn subscribe(&self, sink: Arc<dyn EventSink>) -> SubscriberId {
		let mut state = self.state.lock();
		state.next += 1;
		let id = state.next;
		state.sinks.insert(id, sink);
		SubscriberId(id)
	}

	/// Returns false if the subscription was unknown.
	pub fn unsubscribe(&self, id: SubscriberId) -> bool {
		self.state.lock().sinks.remove(&id.0).is_some()
	}

	pub fn len(&self) -> usize {
		self.state.lock().sinks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn notify(&self, event: &Event) {
		let sinks: Vec<_> = self.state.lock().sinks.values().cloned().collect();
		for sink in sinks {
			sink.send(event.clone());
		}
	}
}

impl EventSink for Subscribers {
	fn send(&self, event: Event) {
		self.notify(&event)
	}
}
