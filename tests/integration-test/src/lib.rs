//! End-to-end tests of the frame pipeline against the in-memory mock platform.

pub mod frame_ring;
pub mod pacer;
pub mod resource_table;
pub mod staged_upload;
pub mod swapchain_resize;

/// Routes `log` output of the pipeline into the test harness. Every test may call it, only the first call installs
/// the logger.
pub fn init_logger() {
	let _ = env_logger::builder()
		.is_test(true)
		.filter_level(log::LevelFilter::Debug)
		.try_init();
}
