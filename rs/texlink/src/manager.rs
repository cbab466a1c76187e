use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::{
	Compositor, Config, CreatePolicy, Error, EventSink, GlobalRefs, OutputInfo, RefProvider, RenderLoopSource, Result,
	Scheduler, SessionHandle, VideoOutput,
};

/// The collaborators provided by the host.
#[derive(Clone)]
pub struct Host {
	pub compositor: Arc<dyn Compositor>,

	/// Optional so a missing native runtime is reported per output, not at startup.
	pub refs: Option<GlobalRefs>,

	pub render_loop: Arc<dyn RenderLoopSource>,
}

impl Host {
	pub fn new(compositor: Arc<dyn Compositor>, render_loop: Arc<dyn RenderLoopSource>) -> Self {
		Self {
			compositor,
			refs: None,
			render_loop,
		}
	}

	pub fn with_refs(mut self, provider: Arc<dyn RefProvider>) -> Self {
		self.refs = Some(GlobalRefs::new(provider));
		self
	}
}

impl fmt::Debug for Host {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Host").field("refs", &self.refs).finish_non_exhaustive()
	}
}

/// Maps session handles to [VideoOutput]s.
pub struct OutputRegistry {
	config: Config,
	host: Host,
	scheduler: Scheduler,
	outputs: Mutex<HashMap<SessionHandle, VideoOutput>>,
}

impl OutputRegistry {
	/// Deferred work is spawned on the given runtime.
	pub fn new(config: Config, host: Host, runtime: Handle) -> Self {
		let scheduler = Scheduler::new(runtime, config.revoke_delay);
		Self {
			config,
			host,
			scheduler,
			outputs: Default::default(),
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Create an output for the session, returning its texture and initial reference.
	///
	/// An existing output is either rejected or replaced, depending on [Config::create_policy].
	pub fn create(&self, handle: SessionHandle, events: Arc<dyn EventSink>) -> Result<OutputInfo> {
		// Held throughout so the check and insert are atomic.
		// The old output is disposed before the new one exists, so its events can't be mistaken for the new one.
		let mut outputs = self.outputs.lock();

		if let Some(existing) = outputs.get(&handle) {
			match self.config.create_policy {
				CreatePolicy::Reject => {
					tracing::warn!(%handle, "output already exists");
					return Err(Error::InvalidState);
				}
				CreatePolicy::Replace => {
					tracing::info!(%handle, "replacing output");
					existing.dispose();
					outputs.remove(&handle);
				}
			}
		}

		let output = VideoOutput::new(handle, &self.host, &self.config, &self.scheduler, events)?;
		let info = output.info()?;
		outputs.insert(handle, output);

		Ok(info)
	}

	/// A no-op if there's no output for the session.
	pub fn set_surface_size(&self, handle: SessionHandle, width: u32, height: u32) {
		match self.get(handle) {
			Some(output) => output.set_surface_size(width, height),
			None => tracing::debug!(%handle, "set size: no output"),
		}
	}

	/// A no-op if there's no output for the session.
	pub fn dispose(&self, handle: SessionHandle) {
		let output = self.outputs.lock().remove(&handle);
		match output {
			Some(output) => output.dispose(),
			None => tracing::debug!(%handle, "dispose: no output"),
		}
	}

	/// Dispose every output, ex. when the host detaches.
	pub fn dispose_all(&self) {
		let outputs: Vec<_> = self.outputs.lock().drain().map(|(_, output)| output).collect();
		for output in outputs {
			output.dispose();
		}
	}

	pub fn info(&self, handle: SessionHandle) -> Result<OutputInfo> {
		self.get(handle).ok_or(Error::InvalidHandle)?.info()
	}

	pub fn len(&self) -> usize {
		self.outputs.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	// Cloned out so the map isn't locked while calling into the output.
	fn get(&self, handle: SessionHandle) -> Option<VideoOutput> {
		self.outputs.lock().get(&handle).cloned()
	}
}

impl Drop for OutputRegistry {
	fn drop(&mut self) {
		self.dispose_all();
	}
}
