//! C bindings for texlink.
//!
//! The host registers its collaborators with [texlink_global_refs] and [texlink_host],
//! then drives outputs with [texlink_create], [texlink_set_surface_size] and [texlink_dispose].
//! Compositor notifications are forwarded with [texlink_surface_created] and friends,
//! and events are delivered as JSON to [texlink_subscribe] callbacks.
//!
//! Every function returns zero (or a positive id) on success and a negative code on failure.

mod api;
mod error;
mod ffi;
mod host;
mod runtime;
mod state;

pub use api::*;
pub use error::*;
