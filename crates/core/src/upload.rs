//! Two phase CPU to GPU transfers. Every uploader, no matter if it uploads geometry, per-light data or textures,
//! follows the same protocol:
//!
//! 1. [`StagedUpload::create`] allocates persistently mapped staging memory and the device-local destination.
//! 2. [`StagedUpload::stage`] writes into the staging memory, without any GPU side effect.
//! 3. [`StagedUpload::copy_staging_to_gpu`] records the copy into a recording target that is about to be submitted.
//! 4. [`StagedUpload::release_staging_buffer`] detaches the staging buffer, which must be handed to
//!    [`FrameContext::destroy_after_submit`] since the copy has likely not executed yet.
//!
//! [`StagedUpload::finish`] performs steps 3 and 4 in one go.

use crate::descriptor::{BufferCreateInfo, BufferUsage, Extent, Format, ImageCreateInfo, ImageUsage, SamplerCreateInfo};
use crate::frame::{FrameContext, FrameError, Retired};
use crate::platform::FramePlatform;
use thiserror::Error;

/// Where the staged bytes are copied to.
pub trait UploadDestination<P: FramePlatform>: Sized {
	/// # Safety
	/// `target` must be recording and `staging` must hold at least `size` bytes.
	unsafe fn record_copy(&self, platform: &P, target: &mut P::RecordingTarget, staging: &P::Buffer, size: u64);

	/// Releases the destination's resources immediately.
	///
	/// # Safety
	/// No pending execution may access the destination.
	unsafe fn destroy(self, platform: &P);
}

/// A device-local buffer.
pub struct DeviceBuffer<P: FramePlatform> {
	pub buffer: P::Buffer,
	pub usage: BufferUsage,
	pub size: u64,
}

impl<P: FramePlatform> UploadDestination<P> for DeviceBuffer<P> {
	unsafe fn record_copy(&self, platform: &P, target: &mut P::RecordingTarget, staging: &P::Buffer, size: u64) {
		unsafe { platform.cmd_copy_buffer(target, staging, &self.buffer, size) }
	}

	unsafe fn destroy(self, platform: &P) {
		unsafe { platform.destroy_buffer(self.buffer) }
	}
}

/// A device-local 2D texture with a single mip level.
pub struct DeviceTexture<P: FramePlatform> {
	pub image: P::Image,
	pub format: Format,
	pub extent: Extent,
}

impl<P: FramePlatform> UploadDestination<P> for DeviceTexture<P> {
	unsafe fn record_copy(&self, platform: &P, target: &mut P::RecordingTarget, staging: &P::Buffer, _size: u64) {
		unsafe { platform.cmd_copy_buffer_to_image(target, staging, &self.image, self.extent) }
	}

	unsafe fn destroy(self, platform: &P) {
		unsafe { platform.destroy_image(self.image) }
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UploadState {
	/// Staging memory may be written.
	Staging,
	/// The copy has been recorded, staging memory must not change until the submission completed.
	CopyRecorded,
	/// The staging buffer has been handed off.
	Released,
}

#[derive(Error)]
pub enum UploadError {
	#[error("Upload of 0 bytes")]
	ZeroSize,
	#[error("Staging {len} bytes at offset {offset} overflows the staging buffer of {size} bytes")]
	Overflow { offset: u64, len: u64, size: u64 },
	#[error("Staging buffer is not host mapped")]
	NotMapped,
	#[error("Copy to GPU was already recorded, staging memory is read-only until the submission completed")]
	CopyAlreadyRecorded,
	#[error("Staging buffer was already released")]
	StagingReleased,
	#[error("Format {0:?} is not supported for texture uploads")]
	UnsupportedFormat(Format),
}

impl core::fmt::Debug for UploadError {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		core::fmt::Display::fmt(self, f)
	}
}

/// Size of a texel of the formats supported for texture uploads.
pub fn texel_size(format: Format) -> Option<u64> {
	match format {
		Format::R8_UNORM => Some(1),
		Format::R8G8_UNORM => Some(2),
		Format::R8G8B8A8_UNORM | Format::R8G8B8A8_SRGB | Format::B8G8R8A8_UNORM | Format::B8G8R8A8_SRGB => Some(4),
		Format::R16G16B16A16_SFLOAT => Some(8),
		Format::R32G32B32A32_SFLOAT => Some(16),
		_ => None,
	}
}

/// A staging buffer paired with its device-local destination. See [mod](self) for the protocol.
pub struct StagedUpload<P: FramePlatform, D: UploadDestination<P>> {
	staging: Option<P::Buffer>,
	destination: D,
	size: u64,
	state: UploadState,
}

impl<P: FramePlatform> StagedUpload<P, DeviceBuffer<P>> {
	/// Allocates `size` bytes of staging memory and a device-local buffer with `usage`.
	pub fn create(platform: &P, size: u64, usage: BufferUsage, name: &str) -> Result<Self, FrameError<P>> {
		if size == 0 {
			return Err(UploadError::ZeroSize.into());
		}
		let usage = usage | BufferUsage::TRANSFER_DST;
		unsafe {
			let buffer = platform
				.alloc_buffer(&BufferCreateInfo {
					size,
					usage,
					name,
					..BufferCreateInfo::default()
				})
				.map_err(FrameError::Platform)?;
			let destination = DeviceBuffer { buffer, usage, size };
			Self::with_destination(platform, destination, size, name)
		}
	}
}

impl<P: FramePlatform> StagedUpload<P, DeviceTexture<P>> {
	/// Allocates staging memory for tightly packed texels and a sampled device-local image.
	pub fn create_texture(platform: &P, extent: Extent, format: Format, name: &str) -> Result<Self, FrameError<P>> {
		let texel = texel_size(format).ok_or(UploadError::UnsupportedFormat(format))?;
		let size = extent.width as u64 * extent.height as u64 * texel;
		if size == 0 {
			return Err(UploadError::ZeroSize.into());
		}
		unsafe {
			let image = platform
				.alloc_image(&ImageCreateInfo {
					format,
					extent,
					usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
					name,
					..ImageCreateInfo::default()
				})
				.map_err(FrameError::Platform)?;
			let destination = DeviceTexture { image, format, extent };
			Self::with_destination(platform, destination, size, name)
		}
	}

	/// Completes the upload like [`Self::finish`] and registers the texture with a sampler in the bindless table.
	pub fn finish_texture(
		self,
		ctx: &mut FrameContext<'_, P>,
		sampler: &SamplerCreateInfo,
	) -> Result<crate::handle::TextureHandle, FrameError<P>> {
		let texture = self.finish(ctx)?;
		let sampler = match unsafe { ctx.platform().create_sampler(sampler) } {
			Ok(sampler) => sampler,
			Err(e) => {
				ctx.destroy_after_submit(Retired::Image(texture.image));
				return Err(FrameError::Platform(e));
			}
		};
		Ok(ctx.resources().store_texture(texture.image, sampler)?)
	}
}

impl<P: FramePlatform, D: UploadDestination<P>> StagedUpload<P, D> {
	/// # Safety
	/// On failure `destination` is destroyed immediately, so it must not be in use.
	unsafe fn with_destination(platform: &P, destination: D, size: u64, name: &str) -> Result<Self, FrameError<P>> {
		let staging = unsafe {
			platform.alloc_buffer(&BufferCreateInfo {
				size,
				usage: BufferUsage::TRANSFER_SRC | BufferUsage::MAP_WRITE,
				name: &format!("{name} staging"),
				..BufferCreateInfo::default()
			})
		};
		match staging {
			Ok(staging) => Ok(Self {
				staging: Some(staging),
				destination,
				size,
				state: UploadState::Staging,
			}),
			Err(e) => {
				unsafe { destination.destroy(platform) };
				Err(FrameError::Platform(e))
			}
		}
	}

	#[inline]
	pub fn size(&self) -> u64 {
		self.size
	}

	#[inline]
	pub fn state(&self) -> UploadState {
		self.state
	}

	#[inline]
	pub fn destination(&self) -> &D {
		&self.destination
	}

	/// Copies `bytes` to the start of the staging memory.
	pub fn stage(&mut self, bytes: &[u8]) -> Result<(), UploadError> {
		self.stage_at(0, bytes)
	}

	pub fn stage_pod<T: bytemuck::Pod>(&mut self, data: &[T]) -> Result<(), UploadError> {
		self.stage(bytemuck::cast_slice(data))
	}

	pub fn stage_at(&mut self, offset: u64, bytes: &[u8]) -> Result<(), UploadError> {
		match self.state {
			UploadState::Staging => (),
			UploadState::CopyRecorded => return Err(UploadError::CopyAlreadyRecorded),
			UploadState::Released => return Err(UploadError::StagingReleased),
		}
		let len = bytes.len() as u64;
		match offset.checked_add(len) {
			Some(end) if end <= self.size => (),
			_ => {
				return Err(UploadError::Overflow {
					offset,
					len,
					size: self.size,
				})
			}
		}
		let staging = self.staging.as_mut().ok_or(UploadError::StagingReleased)?;
		let slab = unsafe { P::mapped_buffer_to_slab(staging) }.ok_or(UploadError::NotMapped)?;
		presser::copy_from_slice_to_offset(bytes, slab, offset as usize).map_err(|_| UploadError::Overflow {
			offset,
			len,
			size: self.size,
		})?;
		Ok(())
	}

	/// Records the copy from staging to device-local memory. `target` must be recording and be submitted afterward.
	pub fn copy_staging_to_gpu(&mut self, platform: &P, target: &mut P::RecordingTarget) -> Result<(), UploadError> {
		match self.state {
			UploadState::Staging => (),
			UploadState::CopyRecorded => return Err(UploadError::CopyAlreadyRecorded),
			UploadState::Released => return Err(UploadError::StagingReleased),
		}
		let staging = self.staging.as_ref().ok_or(UploadError::StagingReleased)?;
		unsafe { self.destination.record_copy(platform, target, staging, self.size) };
		self.state = UploadState::CopyRecorded;
		Ok(())
	}

	/// Detaches the staging buffer without destroying it. The recorded copy may still read from it, so it must be
	/// handed to [`FrameContext::destroy_after_submit`].
	pub fn release_staging_buffer(&mut self) -> Result<P::Buffer, UploadError> {
		let staging = self.staging.take().ok_or(UploadError::StagingReleased)?;
		self.state = UploadState::Released;
		Ok(staging)
	}

	/// Records the copy into the context's recording target if that did not happen yet, retires the staging buffer
	/// after this frame's submission and returns the destination.
	pub fn finish(mut self, ctx: &mut FrameContext<'_, P>) -> Result<D, FrameError<P>> {
		if self.state == UploadState::Staging {
			let platform = ctx.platform();
			self.copy_staging_to_gpu(platform, ctx.recording_target())?;
		}
		let staging = self.release_staging_buffer()?;
		ctx.destroy_after_submit(Retired::Buffer(staging));
		Ok(self.destination)
	}

	/// The destination, once the staging buffer has been released.
	///
	/// # Panics
	/// If the staging buffer was not released, as it would leak.
	pub fn into_destination(self) -> D {
		assert!(
			self.staging.is_none(),
			"staging buffer must be released before taking the destination"
		);
		self.destination
	}
}

impl<P: FramePlatform> StagedUpload<P, DeviceBuffer<P>> {
	/// Completes the upload like [`Self::finish`] and registers the buffer in the bindless table.
	pub fn finish_buffer(self, ctx: &mut FrameContext<'_, P>) -> Result<crate::handle::BufferHandle, FrameError<P>> {
		let buffer = self.finish(ctx)?;
		Ok(ctx.resources().store_buffer(buffer.buffer, buffer.usage)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::mock::MockPlatform;

	#[test]
	fn stage_writes_mapped_memory() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let mut upload = StagedUpload::create(&platform, 8, BufferUsage::VERTEX_BUFFER, "vertices")?;
		upload.stage(&[1, 2, 3, 4])?;
		upload.stage_at(4, &[5, 6, 7, 8])?;
		let staging = upload.release_staging_buffer()?;
		assert_eq!(platform.buffer_contents(&staging), vec![1, 2, 3, 4, 5, 6, 7, 8]);
		assert!(upload
			.destination()
			.usage
			.contains(BufferUsage::VERTEX_BUFFER | BufferUsage::TRANSFER_DST));
		unsafe {
			platform.destroy_buffer(staging);
			upload.into_destination().destroy(&platform);
		}
		assert_eq!(platform.alive_objects(), 0);
		Ok(())
	}

	#[test]
	fn stage_rejects_overflow() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let mut upload = StagedUpload::create(&platform, 4, BufferUsage::UNIFORM_BUFFER, "small")?;
		assert!(matches!(
			upload.stage(&[0; 5]),
			Err(UploadError::Overflow { len: 5, size: 4, .. })
		));
		assert!(matches!(upload.stage_at(u64::MAX, &[0]), Err(UploadError::Overflow { .. })));
		unsafe {
			platform.destroy_buffer(upload.release_staging_buffer()?);
			upload.into_destination().destroy(&platform);
		}
		Ok(())
	}

	#[test]
	fn zero_size_rejected() {
		let platform = MockPlatform::new();
		let result = StagedUpload::create(&platform, 0, BufferUsage::VERTEX_BUFFER, "empty");
		assert!(matches!(result, Err(FrameError::Upload(UploadError::ZeroSize))));
		assert_eq!(platform.alive_objects(), 0);
	}

	#[test]
	fn staging_is_read_only_after_copy() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let mut target = unsafe { platform.create_recording_target()? };
		unsafe { platform.begin_recording(&mut target)? };

		let mut upload = StagedUpload::create(&platform, 4, BufferUsage::VERTEX_BUFFER, "vertices")?;
		upload.stage(&[9; 4])?;
		upload.copy_staging_to_gpu(&platform, &mut target)?;
		assert_eq!(upload.state(), UploadState::CopyRecorded);
		assert!(matches!(upload.stage(&[1]), Err(UploadError::CopyAlreadyRecorded)));
		assert!(matches!(
			upload.copy_staging_to_gpu(&platform, &mut target),
			Err(UploadError::CopyAlreadyRecorded)
		));

		let staging = upload.release_staging_buffer()?;
		assert!(matches!(upload.release_staging_buffer(), Err(UploadError::StagingReleased)));
		assert!(matches!(upload.stage(&[1]), Err(UploadError::StagingReleased)));
		unsafe {
			platform.destroy_buffer(staging);
			upload.into_destination().destroy(&platform);
			platform.destroy_recording_target(target);
		}
		Ok(())
	}

	#[test]
	fn texture_size_from_format() -> anyhow::Result<()> {
		let platform = MockPlatform::new();
		let extent = Extent { width: 4, height: 2 };
		let upload = StagedUpload::create_texture(&platform, extent, Format::R8G8B8A8_SRGB, "albedo")?;
		assert_eq!(upload.size(), 32);
		let mut upload = upload;
		unsafe {
			platform.destroy_buffer(upload.release_staging_buffer()?);
			upload.into_destination().destroy(&platform);
		}

		let result = StagedUpload::create_texture(&platform, extent, Format::D32_SFLOAT, "depth");
		assert!(matches!(
			result,
			Err(FrameError::Upload(UploadError::UnsupportedFormat(Format::D32_SFLOAT)))
		));
		Ok(())
	}

	#[test]
	#[should_panic(expected = "staging buffer must be released")]
	fn destination_requires_release() {
		let platform = MockPlatform::new();
		let upload = StagedUpload::create(&platform, 4, BufferUsage::VERTEX_BUFFER, "leak").unwrap();
		let _ = upload.into_destination();
	}
}
