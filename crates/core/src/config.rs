use crate::descriptor::DEFAULT_DESCRIPTOR_CAPACITY;
use crate::frame_in_flight::FRAMES_LIMIT;
use crate::swapchain::SwapchainPreferences;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_FRAMES_IN_FLIGHT: u32 = 2;

/// Everything the frame pipeline is configured with, passed once at construction.
#[derive(Clone, Debug)]
pub struct FramePipelineConfig {
	/// Amount of frames whose GPU work may be outstanding at once, between 1 and [`FRAMES_LIMIT`].
	pub frames_in_flight: u32,
	/// Slots per binding of the bindless descriptor set.
	pub descriptor_capacity: u32,
	pub swapchain: SwapchainPreferences,
	pub assets: AssetPaths,
}

impl Default for FramePipelineConfig {
	fn default() -> Self {
		Self {
			frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
			descriptor_capacity: DEFAULT_DESCRIPTOR_CAPACITY,
			swapchain: SwapchainPreferences::default(),
			assets: AssetPaths::default(),
		}
	}
}

impl FramePipelineConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.frames_in_flight == 0 || self.frames_in_flight > FRAMES_LIMIT {
			return Err(ConfigError::FramesInFlight {
				got: self.frames_in_flight,
				limit: FRAMES_LIMIT,
			});
		}
		if self.descriptor_capacity == 0 {
			return Err(ConfigError::ZeroDescriptorCapacity);
		}
		// u32::MAX is the INVALID handle and never a slot
		self.check_descriptor_capacity(u32::MAX - 1)
	}

	/// Checks the descriptor capacity against the most slots the device allows per binding.
	pub fn check_descriptor_capacity(&self, limit: u32) -> Result<(), ConfigError> {
		if self.descriptor_capacity > limit {
			return Err(ConfigError::DescriptorCapacity {
				got: self.descriptor_capacity,
				limit,
			});
		}
		Ok(())
	}
}

/// Where collaborators load their assets from.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AssetPaths {
	pub root: PathBuf,
}

impl AssetPaths {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// `relative` joined onto the asset root. Absolute paths are returned unchanged.
	pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
		self.root.join(relative)
	}
}

#[derive(Error)]
pub enum ConfigError {
	#[error("frames_in_flight must be within 1..={limit}, got {got}")]
	FramesInFlight { got: u32, limit: u32 },
	#[error("descriptor_capacity must not be 0")]
	ZeroDescriptorCapacity,
	#[error("descriptor_capacity must be at most {limit}, got {got}")]
	DescriptorCapacity { got: u32, limit: u32 },
}

impl core::fmt::Debug for ConfigError {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		core::fmt::Display::fmt(self, f)
	}
}
