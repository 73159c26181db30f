use crate::backing::table::SlotAllocationError;
use crate::config::ConfigError;
use crate::descriptor::DrawParamsError;
use crate::platform::FramePlatform;
use crate::upload::UploadError;
use std::fmt::{Debug, Formatter};
use thiserror::Error;

/// Fatal errors ending the frame loop. Stale swapchains are recovered from internally and never reported.
#[derive(Error)]
pub enum FrameError<P: FramePlatform> {
	/// The platform failed, like a lost device or running out of device memory.
	#[error("Platform error: {0}")]
	Platform(#[source] P::Error),
	#[error("Resource exhaustion: {0}")]
	Exhausted(#[from] SlotAllocationError),
	#[error("Upload error: {0}")]
	Upload(#[from] UploadError),
	#[error("Draw params error: {0}")]
	DrawParams(#[from] DrawParamsError),
	#[error("Invalid config: {0}")]
	Config(#[from] ConfigError),
	#[error("Surface does not report any supported formats")]
	NoSurfaceFormat,
	#[error("Frame hook failed: {0:#}")]
	Hook(anyhow::Error),
}

impl<P: FramePlatform> Debug for FrameError<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		std::fmt::Display::fmt(self, f)
	}
}
