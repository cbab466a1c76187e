//! The compositor side of an output.
//!
//! A [Compositor] hands out one [SurfaceProducer] per output.
//! The producer owns a texture slot and the drawing surface bound to it, and it may reallocate that surface whenever it likes.
//! Every reallocation and teardown is reported through [SurfaceCallback], on an unspecified thread,
//! possibly from inside [SurfaceProducer::set_size] or [SurfaceProducer::release].

use std::{fmt, sync::Weak};

use crate::Result;

/// Identifier of a compositor texture slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TextureId(pub i64);

impl fmt::Display for TextureId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// An opaque handle to a native drawing surface.
///
/// Two handles compare equal only if they refer to the same surface object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Surface(pub usize);

/// Receives surface lifecycle notifications from a [SurfaceProducer].
pub trait SurfaceCallback: Send + Sync {
	/// The producer allocated a new surface; read it with [SurfaceProducer::surface].
	fn on_surface_created(&self);

	/// The producer tore down its surface.
	fn on_surface_destroyed(&self);

	/// A new frame was written to the surface.
	fn on_frame_available(&self);
}

/// A drawing surface bound to a compositor texture slot.
pub trait SurfaceProducer: Send + Sync {
	/// The texture slot, fixed for the lifetime of the producer.
	fn texture_id(&self) -> TextureId;

	/// Request a new surface size.
	///
	/// This usually results in [SurfaceCallback::on_surface_created], either synchronously or later.
	fn set_size(&self, width: u32, height: u32);

	/// The current surface, if any.
	fn surface(&self) -> Option<Surface>;

	/// Register (or clear) the callback target.
	///
	/// The producer only holds a weak reference, so it never keeps its owner alive.
	fn set_callback(&self, callback: Option<Weak<dyn SurfaceCallback>>);

	/// Release the texture slot and surface.
	fn release(&self);
}

/// Creates [SurfaceProducer]s.
pub trait Compositor: Send + Sync {
	fn create_producer(&self) -> Result<Box<dyn SurfaceProducer>>;
}
