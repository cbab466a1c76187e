use std::sync::LazyLock;

/// Global tokio runtime handle.
///
/// Runs in a dedicated background thread, driving deferred revocations and render loop polling.
pub static RUNTIME: LazyLock<tokio::runtime::Handle> = LazyLock::new(|| {
	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.expect("failed to build runtime");
	let handle = runtime.handle().clone();

	std::thread::Builder::new()
		.name("texlink".into())
		.spawn(move || {
			runtime.block_on(std::future::pending::<()>());
		})
		.expect("failed to spawn runtime thread");

	handle
});
