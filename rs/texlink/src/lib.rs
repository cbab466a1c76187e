//! # texlink: surface and texture lifecycle bridge
//!
//! `texlink` sits between a native video renderer and a UI compositor.
//! The compositor owns texture slots and the drawing surfaces behind them; the renderer wants an opaque,
//! long-lived reference to a surface so it can draw decoded frames into it from its own threads.
//!
//! ## API
//!
//! The API is built around a few collaborators that the host injects, and the components that glue them together:
//! - [Compositor]: creates a [SurfaceProducer] per output, which reports surface lifecycle via [SurfaceCallback].
//! - [RefProvider]: the native runtime's global reference table, wrapped by [GlobalRefs].
//! - [RenderLoopSource]: access to the host's render loop, used by the [FrameSignals] bridge.
//!
//! And the components:
//! - [VideoOutput]: one session's drawing target, serializing resize, surface replacement and disposal.
//! - [OutputRegistry]: maps session handles to [VideoOutput]s.
//! - [Dispatcher]: the named-method call boundary, fanning out [Event]s through [Subscribers].
//!
//! Global references are never released synchronously when a surface is replaced.
//! The renderer may still be using the old reference, so revocation is deferred by [Config::revoke_delay].
//!
//! The [sim] module contains in-memory collaborators, handy for tests and demos.

mod config;
mod dispatch;
mod error;
mod event;
mod frame;
mod global_ref;
mod log;
mod manager;
mod output;
mod producer;
mod scheduler;

pub mod sim;

pub use config::*;
pub use dispatch::*;
pub use error::*;
pub use event::*;
pub use frame::*;
pub use global_ref::*;
pub use log::*;
pub use manager::*;
pub use output::*;
pub use producer::*;
pub use scheduler::*;
