use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use slab::Slab;
use texlink::{Config, Dispatcher, GlobalRefs, Host, OutputRegistry, SubscriberId, Subscribers};

use crate::{
	host::{self, HostFns},
	runtime::RUNTIME,
	Error,
};

static STATE: LazyLock<Mutex<State>> = LazyLock::new(Default::default);

/// Everything registered by the host.
///
/// The dispatcher is built lazily from the current registrations and torn down when they change.
/// Callers clone it out and release the lock before using it, since outputs call back into C.
#[derive(Default)]
pub struct State {
	config: Config,
	refs: Option<GlobalRefs>,
	host: Option<Arc<HostFns>>,

	subscribers: Subscribers,

	// Indexed by the id returned to C, minus one.
	subscriptions: Slab<SubscriberId>,

	dispatcher: Option<Arc<Dispatcher>>,
}

impl State {
	pub fn lock() -> MutexGuard<'static, State> {
		STATE.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// The previous dispatcher is returned so it can be dropped without the lock.
	#[must_use]
	pub fn configure(&mut self, config: Config) -> Option<Arc<Dispatcher>> {
		self.config = config;
		self.dispatcher.take()
	}

	#[must_use]
	pub fn global_refs(&mut self, provider: host::RefProvider) -> Option<Arc<Dispatcher>> {
		self.refs = Some(GlobalRefs::new(Arc::new(provider)));
		self.dispatcher.take()
	}

	#[must_use]
	pub fn host(&mut self, fns: HostFns) -> Option<Arc<Dispatcher>> {
		self.host = Some(Arc::new(fns));
		self.dispatcher.take()
	}

	/// Fails with [texlink::Error::CollaboratorMissing] until the host is registered.
	pub fn dispatcher(&mut self) -> Result<Arc<Dispatcher>, Error> {
		if let Some(dispatcher) = &self.dispatcher {
			return Ok(dispatcher.clone());
		}

		let fns = self.host.clone().ok_or(texlink::Error::CollaboratorMissing)?;
		let host = Host {
			compositor: Arc::new(host::Compositor::new(fns.clone())),
			refs: self.refs.clone(),
			render_loop: Arc::new(host::RenderLoopSource::new(fns)),
		};

		let registry = OutputRegistry::new(self.config.clone(), host, RUNTIME.clone());
		let dispatcher = Arc::new(Dispatcher::with_subscribers(registry, self.subscribers.clone()));
		self.dispatcher = Some(dispatcher.clone());

		Ok(dispatcher)
	}

	pub fn subscribe(&mut self, on_event: host::OnEvent) -> Result<i32, Error> {
		let entry = self.subscriptions.vacant_entry();
		let id = i32::try_from(entry.key() + 1).map_err(|_| Error::InvalidId)?;

		entry.insert(self.subscribers.subscribe(Arc::new(on_event)));
		Ok(id)
	}

	pub fn unsubscribe(&mut self, index: usize) -> Result<(), Error> {
		let id = self.subscriptions.try_remove(index).ok_or(Error::NotFound)?;
		self.subscribers.unsubscribe(id);
		Ok(())
	}

	/// Forget every registration and subscription.
	#[must_use]
	pub fn shutdown(&mut self) -> Option<Arc<Dispatcher>> {
		for id in self.subscriptions.drain() {
			self.subscribers.unsubscribe(id);
		}

		self.refs = None;
		self.host = None;
		self.dispatcher.take()
	}
}
