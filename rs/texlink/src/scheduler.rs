use std::{future::Future, time::Duration};

use tokio::{runtime::Handle, task::JoinHandle};

use crate::{GlobalRef, GlobalRefs};

/// Runs deferred work on a tokio runtime, decoupled from the caller's thread.
///
/// Callers are usually compositor or UI threads that are not inside a runtime,
/// so the handle is captured up front.
#[derive(Clone, Debug)]
pub struct Scheduler {
	runtime: Handle,
	revoke_delay: Duration,
}

impl Scheduler {
	pub fn new(runtime: Handle, revoke_delay: Duration) -> Self {
		Self { runtime, revoke_delay }
	}

	/// Use the runtime of the current context.
	///
	/// Panics if called outside of a tokio runtime.
	pub fn current(revoke_delay: Duration) -> Self {
		Self::new(Handle::current(), revoke_delay)
	}

	pub fn revoke_delay(&self) -> Duration {
		self.revoke_delay
	}

	/// Revoke the reference after the grace delay.
	///
	/// Never blocks; the renderer may still be drawing into the surface until then.
	pub fn revoke_later(&self, refs: &GlobalRefs, global_ref: GlobalRef) {
		if global_ref.is_none() {
			return;
		}

		let refs = refs.clone();
		let delay = self.revoke_delay;

		tracing::debug!(%global_ref, ?delay, "scheduling revoke");

		self.runtime.spawn(async move {
			tokio::time::sleep(delay).await;
			refs.revoke(global_ref);
		});
	}

	pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
	where
		F: Future + Send + 'static,
		F::Output: Send + 'static,
	{
		self.runtime.spawn(future)
	}
}
