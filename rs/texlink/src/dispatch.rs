use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DisplayFromStr, PickFirst};

use crate::{
	Error, EventSink, NativeRef, OutputInfo, OutputRegistry, Result, SessionHandle, SubscriberId, Subscribers, TextureId,
};

/// The channel name hosts historically prefix methods with.
pub const CHANNEL: &str = "VideoOutputManager";

/// A method accepted by [Dispatcher::call].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
	Create,
	SetSurfaceSize,
	Dispose,
}

impl Method {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Create => "Create",
			Self::SetSurfaceSize => "SetSurfaceSize",
			Self::Dispose => "Dispose",
		}
	}
}

impl fmt::Display for Method {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Method {
	type Err = Error;

	/// Accepts both `Create` and `VideoOutputManager.Create`, and `SetSize` for [Method::SetSurfaceSize].
	fn from_str(s: &str) -> Result<Self> {
		let name = s
			.strip_prefix(CHANNEL)
			.and_then(|name| name.strip_prefix('.'))
			.unwrap_or(s);

		match name {
			"Create" => Ok(Self::Create),
			"SetSurfaceSize" | "SetSize" => Ok(Self::SetSurfaceSize),
			"Dispose" => Ok(Self::Dispose),
			_ => Err(Error::UnknownMethod(s.to_string())),
		}
	}
}

// Handles may arrive as numbers or decimal strings.
#[serde_with::serde_as]
#[derive(Deserialize)]
struct HandleArgs {
	#[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
	handle: SessionHandle,
}

// A width or height; hosts send "null" when there is no fixed size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
struct Dimension(Option<u32>);

impl FromStr for Dimension {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"null" => Ok(Self(None)),
			s => s.parse().map(|value| Self(Some(value))),
		}
	}
}

fn size(width: Dimension, height: Dimension) -> Option<(u32, u32)> {
	Some((width.0?, height.0?))
}

#[serde_with::serde_as]
#[derive(Deserialize)]
struct CreateArgs {
	#[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
	handle: SessionHandle,

	#[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
	#[serde(default)]
	width: Dimension,

	#[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
	#[serde(default)]
	height: Dimension,
}

#[serde_with::serde_as]
#[derive(Deserialize)]
struct SizeArgs {
	#[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
	handle: SessionHandle,

	#[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
	width: Dimension,

	#[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
	height: Dimension,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateReply {
	texture_id: TextureId,
	native_ref: NativeRef,
}

/// The named-method call boundary in front of an [OutputRegistry].
///
/// Every output created through the dispatcher reports to the same [Subscribers].
pub struct Dispatcher {
	registry: OutputRegistry,
	subscribers: Subscribers,
}

impl Dispatcher {
	pub fn new(registry: OutputRegistry) -> Self {
		Self::with_subscribers(registry, Subscribers::new())
	}

	/// Report to an existing subscriber list, ex. one populated before the host was registered.
	pub fn with_subscribers(registry: OutputRegistry, subscribers: Subscribers) -> Self {
		Self { registry, subscribers }
	}

	pub fn registry(&self) -> &OutputRegistry {
		&self.registry
	}

	pub fn subscribe(&self, sink: Arc<dyn EventSink>) -> SubscriberId {
		self.subscribers.subscribe(sink)
	}

	pub fn unsubscribe(&self, id: SubscriberId) -> bool {
		self.subscribers.unsubscribe(id)
	}

	pub fn create(&self, handle: SessionHandle) -> Result<OutputInfo> {
		self.registry.create(handle, Arc::new(self.subscribers.clone()))
	}

	/// Create an output and resize it before returning, so the result already reflects the size.
	pub fn create_sized(&self, handle: SessionHandle, width: u32, height: u32) -> Result<OutputInfo> {
		self.create(handle)?;
		self.set_surface_size(handle, width, height);
		self.registry.info(handle)
	}

	pub fn set_surface_size(&self, handle: SessionHandle, width: u32, height: u32) {
		self.registry.set_surface_size(handle, width, height)
	}

	pub fn dispose(&self, handle: SessionHandle) {
		self.registry.dispose(handle)
	}

	/// Invoke a method by name with JSON arguments.
	pub fn call(&self, method: &str, args: Value) -> Result<Value> {
		let method: Method = method.parse()?;
		tracing::trace!(%method, %args, "call");

		match method {
			Method::Create => {
				let args: CreateArgs = serde_json::from_value(args)?;
				let info = match size(args.width, args.height) {
					Some((width, height)) => self.create_sized(args.handle, width, height)?,
					None => self.create(args.handle)?,
				};

				let reply = CreateReply {
					texture_id: info.texture_id,
					native_ref: info.native_ref,
				};
				Ok(serde_json::to_value(reply)?)
			}
			Method::SetSurfaceSize => {
				let args: SizeArgs = serde_json::from_value(args)?;
				match size(args.width, args.height) {
					Some((width, height)) => self.set_surface_size(args.handle, width, height),
					None => tracing::debug!(handle = %args.handle, "ignoring resize without a size"),
				}
				Ok(Value::Null)
			}
			Method::Dispose => {
				let args: HandleArgs = serde_json::from_value(args)?;
				self.dispose(args.handle);
				Ok(Value::Null)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use serde_json::json;
	use tokio::runtime::Handle;

	use super::*;
	use crate::{
		sim::{EventLog, Sim},
		Config, Event,
	};

	fn dispatcher(sim: &Sim) -> (Dispatcher, EventLog) {
		let registry = OutputRegistry::new(Config::default(), sim.host(), Handle::current());
		let dispatcher = Dispatcher::new(registry);

		let events = EventLog::new();
		dispatcher.subscribe(Arc::new(events.clone()));

		(dispatcher, events)
	}

	#[test]
	fn method_names() {
		assert_eq!("Create".parse::<Method>().unwrap(), Method::Create);
		assert_eq!(
			"VideoOutputManager.SetSurfaceSize".parse::<Method>().unwrap(),
			Method::SetSurfaceSize
		);
		assert_eq!(
			"Other.Dispose".parse::<Method>(),
			Err(Error::UnknownMethod("Other.Dispose".into()))
		);
		assert!("VideoOutputManagerCreate".parse::<Method>().is_err());
		assert_eq!(
			"VideoOutputManager.SetSize".parse::<Method>().unwrap(),
			Method::SetSurfaceSize
		);
	}

	#[test]
	fn dimensions() {
		assert_eq!("640".parse::<Dimension>().unwrap(), Dimension(Some(640)));
		assert_eq!("null".parse::<Dimension>().unwrap(), Dimension(None));
		assert!("wide".parse::<Dimension>().is_err());

		let args: CreateArgs = serde_json::from_value(json!({ "handle": "1", "width": "640", "height": 480 })).unwrap();
		assert_eq!(size(args.width, args.height), Some((640, 480)));

		let args: CreateArgs = serde_json::from_value(json!({ "handle": 1, "width": "null", "height": "null" })).unwrap();
		assert_eq!(size(args.width, args.height), None);

		let args: CreateArgs = serde_json::from_value(json!({ "handle": 1, "width": null })).unwrap();
		assert_eq!(size(args.width, args.height), None);
	}

	#[tokio::test(start_paused = true)]
	async fn create_with_size() {
		let sim = Sim::new();
		let (dispatcher, events) = dispatcher(&sim);

		let reply = dispatcher
			.call(
				"VideoOutputManager.Create",
				json!({ "handle": "5", "width": "640", "height": "480", "enableHardwareAcceleration": true }),
			)
			.unwrap();

		let info = dispatcher.registry().info(SessionHandle(5)).unwrap();
		assert_eq!((info.width, info.height), (640, 480));
		assert_eq!(
			reply,
			json!({ "textureId": info.texture_id.0, "nativeRef": info.native_ref.0 })
		);

		// The reply carries the reference announced by the resize.
		assert_eq!(
			events.events(),
			vec![Event::SurfaceUpdated {
				handle: SessionHandle(5),
				texture_id: info.texture_id,
				native_ref: info.native_ref,
				width: 640,
				height: 480,
			}]
		);
	}

	#[tokio::test(start_paused = true)]
	async fn create_without_size() {
		let sim = Sim::new();
		let (dispatcher, events) = dispatcher(&sim);

		dispatcher
			.call("Create", json!({ "handle": "5", "width": "null", "height": "null" }))
			.unwrap();

		let info = dispatcher.registry().info(SessionHandle(5)).unwrap();
		assert_eq!((info.width, info.height), (1, 1));
		assert!(events.events().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn set_size_alias() {
		let sim = Sim::new();
		let (dispatcher, events) = dispatcher(&sim);

		dispatcher.call("Create", json!({ "handle": 2 })).unwrap();

		dispatcher
			.call("VideoOutputManager.SetSize", json!({ "handle": "2", "width": "null", "height": "null" }))
			.unwrap();
		assert!(events.events().is_empty());

		dispatcher
			.call("VideoOutputManager.SetSize", json!({ "handle": "2", "width": "320", "height": "240" }))
			.unwrap();

		let info = dispatcher.registry().info(SessionHandle(2)).unwrap();
		assert_eq!((info.width, info.height), (320, 240));
		assert_eq!(events.events().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn create_reply() {
		let sim = Sim::new();
		let (dispatcher, events) = dispatcher(&sim);

		let reply = dispatcher.call("Create", json!({ "handle": 7 })).unwrap();
		let info = dispatcher.registry().info(SessionHandle(7)).unwrap();

		assert_eq!(
			reply,
			json!({ "textureId": info.texture_id.0, "nativeRef": info.native_ref.0 })
		);
		assert!(events.events().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn string_handle() {
		let sim = Sim::new();
		let (dispatcher, events) = dispatcher(&sim);

		dispatcher
			.call("VideoOutputManager.Create", json!({ "handle": "12" }))
			.unwrap();
		dispatcher
			.call("SetSurfaceSize", json!({ "handle": "12", "width": 320, "height": 240 }))
			.unwrap();

		assert_eq!(events.events().len(), 1);
		assert_eq!(events.events()[0].handle(), SessionHandle(12));
	}

	#[tokio::test(start_paused = true)]
	async fn bad_arguments() {
		let sim = Sim::new();
		let (dispatcher, _events) = dispatcher(&sim);

		let err = dispatcher.call("Create", Value::Null).unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));

		let err = dispatcher.call("Create", json!({ "handle": "seven" })).unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));

		let err = dispatcher.call("SetSurfaceSize", json!({ "handle": 1, "width": -1, "height": 1 })).unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));

		let err = dispatcher.call("Destroy", json!({ "handle": 1 })).unwrap_err();
		assert_eq!(err, Error::UnknownMethod("Destroy".into()));

		assert!(dispatcher.registry().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn unknown_handle() {
		let sim = Sim::new();
		let (dispatcher, events) = dispatcher(&sim);

		assert_eq!(
			dispatcher
				.call("SetSurfaceSize", json!({ "handle": 3, "width": 2, "height": 2 }))
				.unwrap(),
			Value::Null
		);
		assert_eq!(dispatcher.call("Dispose", json!({ "handle": 3 })).unwrap(), Value::Null);
		assert!(events.events().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn unsubscribed_sink_is_quiet() {
		let sim = Sim::new();
		let (dispatcher, events) = dispatcher(&sim);

		let late = EventLog::new();
		let id = dispatcher.subscribe(Arc::new(late.clone()));

		dispatcher.call("Create", json!({ "handle": 1 })).unwrap();
		assert!(dispatcher.unsubscribe(id));
		dispatcher.call("Dispose", json!({ "handle": 1 })).unwrap();

		assert!(late.events().is_empty());
		assert_eq!(events.events().len(), 1);

		tokio::time::sleep(Duration::from_secs(6)).await;
		assert_eq!(sim.refs.live(), 0);
	}
}
