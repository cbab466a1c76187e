//! Global references to native surfaces.
//!
//! The renderer lives in a separate native runtime and can't participate in our ownership.
//! Instead it receives an opaque [NativeRef] minted by the runtime's own [RefProvider],
//! which stays resolvable until we explicitly revoke it.
//!
//! Revocation is idempotent: [GlobalRefs] remembers a bounded set of recently revoked references.
//! Runtimes reuse freed values, so each mint also carries a generation; a stale duplicate revoke
//! never releases a later mint of the same value.

use std::{collections::HashSet, fmt, sync::Arc};

use parking_lot::Mutex;

use crate::{Error, Result, Surface};

/// The maximum number of recently revoked references to remember.
///
/// The set is cleared when full, trading exactness for bounded memory.
pub const REVOKED_CAPACITY: usize = 100;

/// An opaque reference to a native surface, resolvable by the renderer.
///
/// Zero means no surface is attached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NativeRef(pub i64);

impl NativeRef {
	pub const NONE: Self = Self(0);

	pub fn is_none(&self) -> bool {
		self.0 == 0
	}
}

impl fmt::Display for NativeRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// The native runtime's global reference table.
pub trait RefProvider: Send + Sync {
	/// Mint a new reference to the surface, or [Error::ResourceExhausted] if the table is full.
	fn acquire(&self, surface: Surface) -> Result<NativeRef>;

	/// Release a reference minted by [RefProvider::acquire].
	fn release(&self, native_ref: NativeRef);
}

/// A reference minted by [GlobalRefs::acquire].
///
/// The renderer only sees [GlobalRef::native_ref]; the generation tells apart successive mints of a reused value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GlobalRef {
	pub native_ref: NativeRef,
	generation: u64,
}

impl GlobalRef {
	pub const NONE: Self = Self {
		native_ref: NativeRef::NONE,
		generation: 0,
	};

	pub fn is_none(&self) -> bool {
		self.native_ref.is_none()
	}
}

impl fmt::Display for GlobalRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}#{}", self.native_ref, self.generation)
	}
}

#[derive(Default)]
struct Revoked {
	recent: HashSet<GlobalRef>,
	generation: u64,
}

impl Revoked {
	// Returns false if the reference was already revoked.
	fn insert(&mut self, global_ref: GlobalRef) -> bool {
		if self.recent.contains(&global_ref) {
			return false;
		}

		if self.recent.len() >= REVOKED_CAPACITY {
			self.recent.clear();
		}

		self.recent.insert(global_ref)
	}
}

/// Issues and revokes global references, shared by every output.
#[derive(Clone)]
pub struct GlobalRefs {
	provider: Arc<dyn RefProvider>,
	revoked: Arc<Mutex<Revoked>>,
}

impl fmt::Debug for GlobalRefs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GlobalRefs")
			.field("revoked", &self.revoked.lock().recent.len())
			.finish()
	}
}

impl GlobalRefs {
	pub fn new(provider: Arc<dyn RefProvider>) -> Self {
		Self {
			provider,
			revoked: Default::default(),
		}
	}

	/// Mint a reference to the surface.
	pub fn acquire(&self, surface: Surface) -> Result<GlobalRef> {
		let native_ref = self.provider.acquire(surface)?;
		if native_ref.is_none() {
			return Err(Error::ResourceExhausted);
		}

		let mut revoked = self.revoked.lock();
		revoked.generation += 1;

		let global_ref = GlobalRef {
			native_ref,
			generation: revoked.generation,
		};

		tracing::trace!(%global_ref, ?surface, "acquired global ref");
		Ok(global_ref)
	}

	/// Revoke a reference; revoking the same reference twice is a no-op.
	///
	/// Duplicates are only detected among the last [REVOKED_CAPACITY] revokes.
	pub fn revoke(&self, global_ref: GlobalRef) {
		if global_ref.is_none() {
			return;
		}

		if !self.revoked.lock().insert(global_ref) {
			tracing::debug!(%global_ref, "ignoring duplicate revoke");
			return;
		}

		tracing::trace!(%global_ref, "revoked global ref");
		self.provider.release(global_ref.native_ref);
	}
}
