use std::{sync::Arc, time::Duration};

use serde_json::json;
use tokio::runtime::Handle;

use texlink::{
	sim::{EventLog, Sim},
	Config, Dispatcher, Event, NativeRef, OutputRegistry, SessionHandle, TextureId,
};

fn dispatcher(sim: &Sim) -> (Dispatcher, EventLog) {
	let registry = OutputRegistry::new(Config::default(), sim.host(), Handle::current());
	let dispatcher = Dispatcher::new(registry);

	let events = EventLog::new();
	dispatcher.subscribe(Arc::new(events.clone()));

	(dispatcher, events)
}

#[tokio::test(start_paused = true)]
async fn create_resize_dispose() {
	let sim = Sim::new();
	let (dispatcher, events) = dispatcher(&sim);
	let handle = SessionHandle(7);

	let reply = dispatcher.call("Create", json!({ "handle": 7 })).unwrap();
	let texture_id = TextureId(reply["textureId"].as_i64().unwrap());
	let first = NativeRef(reply["nativeRef"].as_i64().unwrap());
	assert!(!first.is_none());

	dispatcher
		.call("SetSurfaceSize", json!({ "handle": 7, "width": 640, "height": 480 }))
		.unwrap();

	let second = dispatcher.registry().info(handle).unwrap().native_ref;
	assert_ne!(second, first);
	assert_eq!(
		events.events(),
		vec![Event::SurfaceUpdated {
			handle,
			texture_id,
			native_ref: second,
			width: 640,
			height: 480,
		}]
	);

	// The renderer may still hold the first reference for a while.
	tokio::time::sleep(Duration::from_secs(4)).await;
	assert!(sim.refs.is_live(first));
	tokio::time::sleep(Duration::from_secs(2)).await;
	assert!(!sim.refs.is_live(first));

	dispatcher.call("Dispose", json!({ "handle": 7 })).unwrap();
	assert_eq!(
		events.events().last(),
		Some(&Event::SurfaceUpdated {
			handle,
			texture_id,
			native_ref: NativeRef::NONE,
			width: 640,
			height: 480,
		})
	);

	// No-ops once disposed.
	dispatcher
		.call("SetSurfaceSize", json!({ "handle": 7, "width": 1280, "height": 720 }))
		.unwrap();
	dispatcher.call("Dispose", json!({ "handle": 7 })).unwrap();
	assert_eq!(events.events().len(), 2);

	tokio::time::sleep(Duration::from_secs(6)).await;
	assert_eq!(sim.refs.live(), 0);
	assert_eq!(sim.refs.double_releases(), 0);
}

#[tokio::test(start_paused = true)]
async fn frames_after_late_render_loop() {
	let sim = Sim {
		render_loop: Arc::new(texlink::sim::SimRenderLoop::ready_after(2)),
		..Sim::new()
	};
	let (dispatcher, events) = dispatcher(&sim);

	dispatcher.call("Create", json!({ "handle": 1 })).unwrap();
	let producer = sim.compositor.last().unwrap();

	// Dropped while we wait for the render loop.
	producer.frame();
	producer.frame();

	tokio::time::sleep(Duration::from_millis(100)).await;

	producer.frame();
	producer.frame();

	let first_frames: Vec<_> = events
		.events()
		.into_iter()
		.filter(|event| matches!(event, Event::FirstFrameRendered { .. }))
		.collect();
	assert_eq!(first_frames, vec![Event::FirstFrameRendered { handle: SessionHandle(1) }]);

	let texture_id = dispatcher.registry().info(SessionHandle(1)).unwrap().texture_id;
	assert_eq!(sim.render_loop.marked(texture_id), 2);
}

#[tokio::test(start_paused = true)]
async fn many_sessions() {
	let sim = Sim::new();
	let (dispatcher, events) = dispatcher(&sim);

	for handle in 0..16 {
		dispatcher.call("Create", json!({ "handle": handle })).unwrap();
		dispatcher
			.call("SetSurfaceSize", json!({ "handle": handle, "width": 100 + handle, "height": 100 }))
			.unwrap();
	}

	assert_eq!(dispatcher.registry().len(), 16);
	assert_eq!(events.events().len(), 16);

	// Each event belongs to the session that was resized.
	for event in events.events() {
		let Event::SurfaceUpdated { handle, width, .. } = event else {
			panic!("unexpected event: {event:?}");
		};
		assert_eq!(width as i64, 100 + handle.0);
	}

	dispatcher.registry().dispose_all();

	tokio::time::sleep(Duration::from_secs(6)).await;
	assert_eq!(sim.refs.live(), 0);
	assert_eq!(sim.refs.double_releases(), 0);
}
