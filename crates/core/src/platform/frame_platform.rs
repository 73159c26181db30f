use crate::descriptor::{
	BufferCreateInfo, ColorSpace, DescriptorWrite, Extent, Format, ImageCreateInfo, SampleCount, SamplerCreateInfo,
};
use ash::vk::{PresentModeKHR, SurfaceCapabilitiesKHR, SurfaceFormatKHR, SurfaceTransformFlagsKHR};
use std::error::Error;
use std::fmt::Debug;

/// Internal interface of everything the frame pipeline needs from a graphics API, may change at any time!
///
/// All functions are unsafe as the frame pipeline is responsible for upholding the API's synchronization rules: a
/// resource must not be destroyed or reset while any submitted work may still access it.
pub unsafe trait FramePlatform: Sized + Send + Sync + 'static {
	/// Any error is fatal, like running out of memory or losing the device. Stale swapchains are reported through
	/// [`AcquireOutcome`] and [`PresentOutcome`] instead.
	type Error: 'static + Error + Send + Sync;
	type Buffer: 'static + Send + Sync;
	type Image: 'static + Send + Sync;
	type ImageView: 'static + Copy + Debug + Eq + Send + Sync;
	type Sampler: 'static + Copy + Send + Sync;
	type Fence: 'static + Send + Sync;
	type Semaphore: 'static + Send + Sync;
	type RecordingTarget: 'static + Send;
	type Surface: 'static + Copy + Send + Sync;
	type Swapchain: 'static + Send + Sync;
	type DescriptorSet: 'static + Send + Sync;

	// sync
	unsafe fn create_fence(&self, signaled: bool) -> Result<Self::Fence, Self::Error>;

	/// Blocks until the fence is signaled.
	unsafe fn wait_for_fence(&self, fence: &Self::Fence) -> Result<(), Self::Error>;

	unsafe fn reset_fence(&self, fence: &Self::Fence) -> Result<(), Self::Error>;

	unsafe fn destroy_fence(&self, fence: Self::Fence);

	unsafe fn create_semaphore(&self) -> Result<Self::Semaphore, Self::Error>;

	unsafe fn destroy_semaphore(&self, semaphore: Self::Semaphore);

	/// Blocks until all work on the device and presentation engine has completed.
	unsafe fn wait_idle(&self) -> Result<(), Self::Error>;

	// recording
	unsafe fn create_recording_target(&self) -> Result<Self::RecordingTarget, Self::Error>;

	/// Resets all previously recorded commands and starts recording anew.
	unsafe fn begin_recording(&self, target: &mut Self::RecordingTarget) -> Result<(), Self::Error>;

	unsafe fn end_recording(&self, target: &mut Self::RecordingTarget) -> Result<(), Self::Error>;

	/// Submits the recorded commands. Execution waits for `wait` at the color attachment output stage, `signal` and
	/// `fence` are signaled once execution completes.
	unsafe fn submit(
		&self,
		target: &Self::RecordingTarget,
		wait: Option<&Self::Semaphore>,
		signal: Option<&Self::Semaphore>,
		fence: &Self::Fence,
	) -> Result<(), Self::Error>;

	unsafe fn destroy_recording_target(&self, target: Self::RecordingTarget);

	// buffers
	unsafe fn alloc_buffer(&self, create_info: &BufferCreateInfo) -> Result<Self::Buffer, Self::Error>;

	/// The persistently mapped memory of a buffer with [`MAP_WRITE`] or [`MAP_READ`] usage, `None` otherwise.
	///
	/// [`MAP_WRITE`]: crate::descriptor::BufferUsage::MAP_WRITE
	/// [`MAP_READ`]: crate::descriptor::BufferUsage::MAP_READ
	unsafe fn mapped_buffer_to_slab(buffer: &mut Self::Buffer) -> Option<&mut (impl presser::Slab + '_)>;

	unsafe fn cmd_copy_buffer(
		&self,
		target: &mut Self::RecordingTarget,
		src: &Self::Buffer,
		dst: &Self::Buffer,
		size: u64,
	);

	/// Copies tightly packed texels into mip 0 of `dst`, transitioning it to be sampled by shaders afterward.
	unsafe fn cmd_copy_buffer_to_image(
		&self,
		target: &mut Self::RecordingTarget,
		src: &Self::Buffer,
		dst: &Self::Image,
		extent: Extent,
	);

	unsafe fn destroy_buffer(&self, buffer: Self::Buffer);

	// images
	/// Allocates the image and a default view covering all its mips.
	unsafe fn alloc_image(&self, create_info: &ImageCreateInfo) -> Result<Self::Image, Self::Error>;

	fn image_view(image: &Self::Image) -> Self::ImageView;

	unsafe fn destroy_image(&self, image: Self::Image);

	unsafe fn create_sampler(&self, create_info: &SamplerCreateInfo) -> Result<Self::Sampler, Self::Error>;

	unsafe fn destroy_sampler(&self, sampler: Self::Sampler);

	// bindless
	/// Creates the bindless descriptor set with `capacity` slots for each of the uniform buffer, storage buffer and
	/// sampled texture bindings.
	unsafe fn create_descriptor_set(&self, capacity: u32) -> Result<Self::DescriptorSet, Self::Error>;

	/// Writes descriptors of slots that have been stored. Slots in use by any pending execution are never written.
	unsafe fn write_descriptors(&self, set: &Self::DescriptorSet, writes: &[DescriptorWrite<'_, Self>]);

	unsafe fn destroy_descriptor_set(&self, set: Self::DescriptorSet);

	// device limits
	unsafe fn min_uniform_buffer_offset_alignment(&self) -> u64;

	unsafe fn max_sample_count(&self) -> SampleCount;

	/// Most slots a single binding of the bindless descriptor set may hold.
	unsafe fn max_descriptor_capacity(&self) -> u32;

	unsafe fn max_uniform_buffer_range(&self) -> u64;

	unsafe fn depth_format(&self) -> Result<Format, Self::Error>;

	// swapchain
	unsafe fn surface_support(&self, surface: Self::Surface) -> Result<SurfaceSupport, Self::Error>;

	unsafe fn create_swapchain(
		&self,
		surface: Self::Surface,
		create_info: &SwapchainCreateInfo,
		old_swapchain: Option<&Self::Swapchain>,
	) -> Result<Self::Swapchain, Self::Error>;

	fn swapchain_image_views(swapchain: &Self::Swapchain) -> &[Self::ImageView];

	/// Acquires the next image, `signal` is signaled once the presentation engine releases it.
	unsafe fn acquire_next_image(
		&self,
		swapchain: &Self::Swapchain,
		signal: &Self::Semaphore,
	) -> Result<AcquireOutcome, Self::Error>;

	/// Presents the image once `wait` is signaled.
	unsafe fn present(
		&self,
		swapchain: &Self::Swapchain,
		image_index: u32,
		wait: &Self::Semaphore,
	) -> Result<PresentOutcome, Self::Error>;

	unsafe fn destroy_swapchain(&self, swapchain: Self::Swapchain);
}

/// What the surface reports to be capable of.
#[derive(Clone, Debug, Default)]
pub struct SurfaceSupport {
	pub capabilities: SurfaceCapabilitiesKHR,
	pub formats: Vec<SurfaceFormatKHR>,
	pub present_modes: Vec<PresentModeKHR>,
}

#[derive(Copy, Clone, Debug)]
pub struct SwapchainCreateInfo {
	pub min_image_count: u32,
	pub format: Format,
	pub color_space: ColorSpace,
	pub present_mode: PresentModeKHR,
	pub extent: Extent,
	pub pre_transform: SurfaceTransformFlagsKHR,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AcquireOutcome {
	/// An image was acquired. A suboptimal image may still be rendered to and presented, but the swapchain should be
	/// recreated afterward.
	Acquired { image_index: u32, suboptimal: bool },
	/// The swapchain no longer matches the surface and must be recreated. No semaphore was signaled.
	OutOfDate,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PresentOutcome {
	Optimal,
	Suboptimal,
	OutOfDate,
}

impl PresentOutcome {
	#[inline]
	pub fn should_recreate(&self) -> bool {
		!matches!(self, PresentOutcome::Optimal)
	}
}
