use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use texlink::{
	sim::{Sim, SimRenderLoop},
	Dispatcher, Event, OutputRegistry, SessionHandle,
};

/// Create an output, resize it, deliver frames and dispose it.
#[derive(clap::Args, Clone, Debug)]
pub struct Scenario {
	/// The session handle to use.
	#[arg(long, default_value_t = 7)]
	pub handle: i64,

	#[arg(long, default_value_t = 640)]
	pub width: u32,

	#[arg(long, default_value_t = 480)]
	pub height: u32,

	/// The number of frames to deliver after the resize.
	#[arg(long, default_value_t = 3)]
	pub frames: usize,

	/// Fail this many render loop lookups before it attaches.
	#[arg(long, default_value_t = 0)]
	pub late_render_loop: usize,
}

/// The outcome of a run, printed last.
#[derive(serde::Serialize)]
struct Summary {
	live_refs: usize,
	double_releases: usize,
}

fn sim(late_render_loop: usize) -> Sim {
	Sim {
		render_loop: Arc::new(SimRenderLoop::ready_after(late_render_loop)),
		..Sim::new()
	}
}

fn dispatcher(config: &texlink::Config, sim: &Sim) -> Dispatcher {
	let registry = OutputRegistry::new(config.clone(), sim.host(), tokio::runtime::Handle::current());
	let dispatcher = Dispatcher::new(registry);

	dispatcher.subscribe(Arc::new(|event: Event| print_json(&event)));
	dispatcher
}

fn print_json<T: serde::Serialize>(value: &T) {
	match serde_json::to_string(value) {
		Ok(json) => println!("{json}"),
		Err(err) => tracing::warn!(%err, "failed to encode"),
	}
}

// Wait out the grace delay so every revocation has run.
async fn finish(config: &texlink::Config, sim: &Sim) {
	tokio::time::sleep(config.revoke_delay + Duration::from_millis(100)).await;

	print_json(&Summary {
		live_refs: sim.refs.live(),
		double_releases: sim.refs.double_releases(),
	});
}

impl Scenario {
	pub async fn run(self, config: texlink::Config) -> anyhow::Result<()> {
		let sim = sim(self.late_render_loop);
		let dispatcher = dispatcher(&config, &sim);
		let handle = SessionHandle(self.handle);

		let info = dispatcher.create(handle).context("failed to create output")?;
		tracing::info!(%handle, texture_id = %info.texture_id, native_ref = %info.native_ref, "created");
		print_json(&info);

		dispatcher.set_surface_size(handle, self.width, self.height);

		let producer = sim.compositor.last().context("no producer")?;
		for _ in 0..self.frames {
			producer.frame();

			// Gives a late render loop a chance to attach.
			tokio::time::sleep(Duration::from_millis(50)).await;
		}

		dispatcher.dispose(handle);

		finish(&config, &sim).await;
		Ok(())
	}
}

/// Read calls from stdin as JSON lines, ex. `{"method": "Create", "args": {"handle": 7}}`.
#[derive(clap::Args, Clone, Debug)]
pub struct Replay {
	/// Fail this many render loop lookups before it attaches.
	#[arg(long, default_value_t = 0)]
	pub late_render_loop: usize,
}

#[derive(serde::Deserialize)]
struct Call {
	method: String,

	#[serde(default)]
	args: serde_json::Value,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
enum Reply {
	Ok(serde_json::Value),
	Error { code: i32, message: String },
}

impl Replay {
	pub async fn run(self, config: texlink::Config) -> anyhow::Result<()> {
		let sim = sim(self.late_render_loop);
		let dispatcher = dispatcher(&config, &sim);

		let mut lines = BufReader::new(tokio::io::stdin()).lines();
		while let Some(line) = lines.next_line().await? {
			if line.trim().is_empty() {
				continue;
			}

			let call: Call = serde_json::from_str(&line).with_context(|| format!("invalid call: {line}"))?;

			let reply = match dispatcher.call(&call.method, call.args) {
				Ok(value) => Reply::Ok(value),
				Err(err) => Reply::Error {
					code: err.code(),
					message: err.to_string(),
				},
			};
			print_json(&reply);
		}

		dispatcher.registry().dispose_all();

		finish(&config, &sim).await;
		Ok(())
	}
}
