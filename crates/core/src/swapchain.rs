use crate::descriptor::{ColorSpace, Extent, Format, ImageCreateInfo, ImageUsage, SampleCount};
use crate::frame::FrameError;
use crate::platform::{AcquireOutcome, FramePlatform, PresentOutcome, SwapchainCreateInfo};
use ash::vk::{PresentModeKHR, SurfaceCapabilitiesKHR, SurfaceFormatKHR};

/// How the swapchain should be set up, if the surface supports it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SwapchainPreferences {
	pub format: Format,
	pub color_space: ColorSpace,
	/// Prefer [`PresentModeKHR::MAILBOX`] over [`PresentModeKHR::FIFO`].
	pub prefer_low_latency: bool,
	/// MSAA samples of the color and depth targets, limited by what the device supports.
	pub samples: SampleCount,
}

impl Default for SwapchainPreferences {
	fn default() -> Self {
		Self {
			format: Format::B8G8R8A8_UNORM,
			color_space: ColorSpace::SRGB_NONLINEAR,
			prefer_low_latency: true,
			samples: SampleCount::Sample4,
		}
	}
}

/// Changes on every recreate. Framebuffers and pipelines built for an older generation are stale, using them is a
/// contract violation that is not detected.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SwapchainGeneration(pub u64);

/// The preferred format if the surface supports it, else the first supported one.
pub fn choose_surface_format(
	formats: &[SurfaceFormatKHR],
	preferences: &SwapchainPreferences,
) -> Option<SurfaceFormatKHR> {
	formats
		.iter()
		.find(|f| f.format == preferences.format && f.color_space == preferences.color_space)
		.or_else(|| formats.first())
		.copied()
}

pub fn choose_present_mode(present_modes: &[PresentModeKHR], prefer_low_latency: bool) -> PresentModeKHR {
	if prefer_low_latency && present_modes.contains(&PresentModeKHR::MAILBOX) {
		PresentModeKHR::MAILBOX
	} else {
		// FIFO is always available
		PresentModeKHR::FIFO
	}
}

/// The surface's current extent, unless the surface lets the swapchain decide by reporting `u32::MAX`.
pub fn choose_extent(capabilities: &SurfaceCapabilitiesKHR, desired: Extent) -> Extent {
	if capabilities.current_extent.width != u32::MAX {
		capabilities.current_extent
	} else {
		let min = capabilities.min_image_extent;
		let max = capabilities.max_image_extent;
		Extent {
			width: desired.width.clamp(min.width, max.width),
			height: desired.height.clamp(min.height, max.height),
		}
	}
}

/// One more than the minimum, so the application never waits on the driver to release an image.
pub fn choose_image_count(capabilities: &SurfaceCapabilitiesKHR) -> u32 {
	let count = capabilities.min_image_count + 1;
	if capabilities.max_image_count != 0 {
		count.min(capabilities.max_image_count)
	} else {
		count
	}
}

/// Owns the swapchain, its image views and the multisampled color and depth targets sized to its extent.
pub struct SwapchainManager<P: FramePlatform> {
	surface: P::Surface,
	preferences: SwapchainPreferences,
	swapchain: P::Swapchain,
	surface_format: SurfaceFormatKHR,
	present_mode: PresentModeKHR,
	extent: Extent,
	samples: SampleCount,
	depth_format: Format,
	color_target: P::Image,
	depth_target: P::Image,
	generation: SwapchainGeneration,
}

struct SwapchainParts<P: FramePlatform> {
	swapchain: P::Swapchain,
	surface_format: SurfaceFormatKHR,
	present_mode: PresentModeKHR,
	extent: Extent,
	color_target: P::Image,
	depth_target: P::Image,
}

impl<P: FramePlatform> SwapchainManager<P> {
	/// Creates the swapchain for `surface`. A surface with zero area, like a minimized window, gets a 1x1 swapchain
	/// that is meant to be recreated once the window is restored.
	pub fn new(
		platform: &P,
		surface: P::Surface,
		desired_extent: Extent,
		preferences: SwapchainPreferences,
	) -> Result<Self, FrameError<P>> {
		profiling::function_scope!();
		unsafe {
			let samples = preferences.samples.min(platform.max_sample_count());
			let depth_format = platform.depth_format().map_err(FrameError::Platform)?;
			let parts = Self::create_parts(
				platform,
				surface,
				&preferences,
				desired_extent,
				samples,
				depth_format,
				None,
				true,
			)?
			.ok_or(FrameError::NoSurfaceFormat)?;
			Ok(Self {
				surface,
				preferences,
				swapchain: parts.swapchain,
				surface_format: parts.surface_format,
				present_mode: parts.present_mode,
				extent: parts.extent,
				samples,
				depth_format,
				color_target: parts.color_target,
				depth_target: parts.depth_target,
				generation: SwapchainGeneration::default(),
			})
		}
	}

	/// Returns `Ok(None)` if the surface has zero area, unless `force_nonzero` is set.
	#[allow(clippy::too_many_arguments)]
	unsafe fn create_parts(
		platform: &P,
		surface: P::Surface,
		preferences: &SwapchainPreferences,
		desired_extent: Extent,
		samples: SampleCount,
		depth_format: Format,
		old_swapchain: Option<&P::Swapchain>,
		force_nonzero: bool,
	) -> Result<Option<SwapchainParts<P>>, FrameError<P>> {
		unsafe {
			let support = platform.surface_support(surface).map_err(FrameError::Platform)?;
			let surface_format =
				choose_surface_format(&support.formats, preferences).ok_or(FrameError::NoSurfaceFormat)?;
			let present_mode = choose_present_mode(&support.present_modes, preferences.prefer_low_latency);
			let mut extent = choose_extent(&support.capabilities, desired_extent);
			if extent.width == 0 || extent.height == 0 {
				if !force_nonzero {
					return Ok(None);
				}
				extent = Extent {
					width: extent.width.max(1),
					height: extent.height.max(1),
				};
			}

			let swapchain = platform
				.create_swapchain(
					surface,
					&SwapchainCreateInfo {
						min_image_count: choose_image_count(&support.capabilities),
						format: surface_format.format,
						color_space: surface_format.color_space,
						present_mode,
						extent,
						pre_transform: support.capabilities.current_transform,
					},
					old_swapchain,
				)
				.map_err(FrameError::Platform)?;
			let color_target = match platform.alloc_image(&ImageCreateInfo {
				format: surface_format.format,
				extent,
				samples,
				usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSIENT_ATTACHMENT,
				name: "swapchain color target",
				..ImageCreateInfo::default()
			}) {
				Ok(image) => image,
				Err(e) => {
					platform.destroy_swapchain(swapchain);
					return Err(FrameError::Platform(e));
				}
			};
			let depth_target = match platform.alloc_image(&ImageCreateInfo {
				format: depth_format,
				extent,
				samples,
				usage: ImageUsage::DEPTH_STENCIL_ATTACHMENT,
				name: "swapchain depth target",
				..ImageCreateInfo::default()
			}) {
				Ok(image) => image,
				Err(e) => {
					platform.destroy_image(color_target);
					platform.destroy_swapchain(swapchain);
					return Err(FrameError::Platform(e));
				}
			};

			log::info!(
				"Created swapchain {}x{} with {} images, {:?} {:?}, {:?}, {}x MSAA",
				extent.width,
				extent.height,
				P::swapchain_image_views(&swapchain).len(),
				surface_format.format,
				surface_format.color_space,
				present_mode,
				samples.samples(),
			);
			Ok(Some(SwapchainParts {
				swapchain,
				surface_format,
				present_mode,
				extent,
				color_target,
				depth_target,
			}))
		}
	}

	/// Rebuilds the swapchain and its targets for the surface's new extent and bumps the generation. Returns `false`
	/// without touching anything if the surface has zero area.
	///
	/// # Safety
	/// No pending execution may reference the current swapchain images or targets.
	pub unsafe fn recreate(&mut self, platform: &P, desired_extent: Extent) -> Result<bool, FrameError<P>> {
		profiling::function_scope!();
		unsafe {
			let parts = Self::create_parts(
				platform,
				self.surface,
				&self.preferences,
				desired_extent,
				self.samples,
				self.depth_format,
				Some(&self.swapchain),
				false,
			)?;
			let Some(parts) = parts else {
				log::debug!("Surface has zero area, postponing swapchain recreation");
				return Ok(false);
			};
			platform.destroy_image(std::mem::replace(&mut self.color_target, parts.color_target));
			platform.destroy_image(std::mem::replace(&mut self.depth_target, parts.depth_target));
			platform.destroy_swapchain(std::mem::replace(&mut self.swapchain, parts.swapchain));
			self.surface_format = parts.surface_format;
			self.present_mode = parts.present_mode;
			self.extent = parts.extent;
			self.generation.0 += 1;
			Ok(true)
		}
	}

	/// Acquires the next image, `signal` is signaled once it may be rendered to.
	pub fn acquire(&self, platform: &P, signal: &P::Semaphore) -> Result<AcquireOutcome, P::Error> {
		profiling::function_scope!();
		unsafe { platform.acquire_next_image(&self.swapchain, signal) }
	}

	/// Presents `image_index` once `wait` is signaled.
	pub fn present(&self, platform: &P, image_index: u32, wait: &P::Semaphore) -> Result<PresentOutcome, P::Error> {
		profiling::function_scope!();
		unsafe { platform.present(&self.swapchain, image_index, wait) }
	}

	#[inline]
	pub fn image_count(&self) -> u32 {
		self.image_views().len() as u32
	}

	#[inline]
	pub fn image_views(&self) -> &[P::ImageView] {
		P::swapchain_image_views(&self.swapchain)
	}

	#[inline]
	pub fn image_view(&self, image_index: u32) -> P::ImageView {
		self.image_views()[image_index as usize]
	}

	/// The multisampled color target, to be resolved into the swapchain image.
	#[inline]
	pub fn color_view(&self) -> P::ImageView {
		P::image_view(&self.color_target)
	}

	#[inline]
	pub fn depth_view(&self) -> P::ImageView {
		P::image_view(&self.depth_target)
	}

	#[inline]
	pub fn surface_format(&self) -> SurfaceFormatKHR {
		self.surface_format
	}

	#[inline]
	pub fn format(&self) -> Format {
		self.surface_format.format
	}

	#[inline]
	pub fn depth_format(&self) -> Format {
		self.depth_format
	}

	#[inline]
	pub fn present_mode(&self) -> PresentModeKHR {
		self.present_mode
	}

	#[inline]
	pub fn extent(&self) -> Extent {
		self.extent
	}

	#[inline]
	pub fn samples(&self) -> SampleCount {
		self.samples
	}

	#[inline]
	pub fn generation(&self) -> SwapchainGeneration {
		self.generation
	}

	#[inline]
	pub fn surface(&self) -> P::Surface {
		self.surface
	}

	#[inline]
	pub fn swapchain(&self) -> &P::Swapchain {
		&self.swapchain
	}

	/// # Safety
	/// The device must be idle. The surface is not destroyed, it is owned by the caller.
	pub unsafe fn destroy(self, platform: &P) {
		unsafe {
			platform.destroy_image(self.color_target);
			platform.destroy_image(self.depth_target);
			platform.destroy_swapchain(self.swapchain);
		}
	}
}
