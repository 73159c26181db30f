use crate::config::FramePipelineConfig;
use crate::descriptor::{BindlessResourceTable, Extent};
use crate::frame::{CommandRing, FrameContext, FrameError};
use crate::frame_in_flight::SeedInFlight;
use crate::platform::{AcquireOutcome, FramePlatform};
use crate::swapchain::SwapchainManager;
use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The application side of the frame loop. All hooks run on the thread driving [`FramePacer`].
pub trait FrameHooks<P: FramePlatform> {
	/// Records one-time setup work such as initial uploads, submitted before the first frame.
	fn on_init(&mut self, ctx: &mut FrameContext<'_, P>, swapchain: &SwapchainManager<P>) -> anyhow::Result<()> {
		let _ = (ctx, swapchain);
		Ok(())
	}

	/// Called after the swapchain was rebuilt, with the device idle. Anything sized or formatted after the swapchain
	/// must be rebuilt here.
	fn on_swapchain_recreated(&mut self, platform: &P, swapchain: &SwapchainManager<P>) -> anyhow::Result<()> {
		let _ = (platform, swapchain);
		Ok(())
	}

	/// Advances application state by the wall time since the last update.
	fn update(&mut self, delta: Duration) -> anyhow::Result<()>;

	/// Records this frame's rendering into swapchain image `image_index`.
	fn render(
		&mut self,
		ctx: &mut FrameContext<'_, P>,
		swapchain: &SwapchainManager<P>,
		image_index: u32,
	) -> anyhow::Result<()>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameOutcome {
	Presented { image_index: u32 },
	/// The swapchain was out of date on acquire and got recreated, nothing was rendered.
	SkippedOutOfDate,
	/// The window has zero area, nothing was waited on or rendered.
	Minimized,
}

/// Drives the frame loop: waits for a free frame slot, acquires an image, lets the [`FrameHooks`] record into it,
/// submits, presents and recreates the swapchain whenever it stops matching the window.
///
/// The only blocking point of a regular frame is the fence wait of the slot about to be reused, so at most
/// `frames_in_flight` submissions are ever pending.
pub struct FramePacer<P: FramePlatform, H: FrameHooks<P>> {
	platform: Arc<P>,
	hooks: H,
	config: FramePipelineConfig,
	ring: ManuallyDrop<CommandRing<P>>,
	resources: ManuallyDrop<BindlessResourceTable<P>>,
	swapchain: ManuallyDrop<SwapchainManager<P>>,
	window_extent: Extent,
	recreate_requested: bool,
	last_update: Instant,
}

impl<P: FramePlatform, H: FrameHooks<P>> FramePacer<P, H> {
	/// Creates all frame slots, the bindless table and the swapchain for `surface`, then runs
	/// [`FrameHooks::on_init`]. The surface must outlive the pacer.
	pub fn new(
		platform: Arc<P>,
		surface: P::Surface,
		window_extent: Extent,
		config: FramePipelineConfig,
		hooks: H,
	) -> Result<Self, FrameError<P>> {
		profiling::function_scope!();
		config.validate()?;
		config.check_descriptor_capacity(unsafe { platform.max_descriptor_capacity() })?;
		let seed = SeedInFlight::new(config.frames_in_flight);
		let ring = CommandRing::new(&*platform, seed).map_err(FrameError::Platform)?;
		let resources = match BindlessResourceTable::new(&*platform, config.descriptor_capacity) {
			Ok(resources) => resources,
			Err(e) => {
				unsafe { ring.destroy(&*platform) };
				return Err(FrameError::Platform(e));
			}
		};
		let swapchain = match SwapchainManager::new(&*platform, surface, window_extent, config.swapchain.clone()) {
			Ok(swapchain) => swapchain,
			Err(e) => {
				unsafe {
					ring.destroy(&*platform);
					resources.destroy(&*platform);
				}
				return Err(e);
			}
		};
		log::info!(
			"Frame pacer running {} frames in flight on a {:?} swapchain",
			config.frames_in_flight,
			swapchain.extent()
		);

		let mut pacer = Self {
			platform,
			hooks,
			config,
			ring: ManuallyDrop::new(ring),
			resources: ManuallyDrop::new(resources),
			swapchain: ManuallyDrop::new(swapchain),
			window_extent,
			recreate_requested: false,
			last_update: Instant::now(),
		};
		pacer.init()?;
		Ok(pacer)
	}

	/// Records [`FrameHooks::on_init`] into the first slot and submits it without any swapchain sync. The first frame
	/// reuses that slot and thus waits for it.
	fn init(&mut self) -> Result<(), FrameError<P>> {
		profiling::function_scope!();
		let platform = &*self.platform;
		self.ring.wait_for_current(platform).map_err(FrameError::Platform)?;
		unsafe { self.ring.begin(platform).map_err(FrameError::Platform)? };
		{
			let mut ctx = self.ring.frame_context(platform, &mut self.resources);
			self.hooks
				.on_init(&mut ctx, &self.swapchain)
				.map_err(FrameError::Hook)?;
		}
		self.resources.resolve_descriptor_table(platform);
		unsafe { self.ring.submit(platform, false).map_err(FrameError::Platform)? };
		self.last_update = Instant::now();
		Ok(())
	}

	/// Runs one iteration of the frame loop. Errors are fatal, the pacer should only be dropped afterward.
	pub fn run_frame(&mut self) -> Result<FrameOutcome, FrameError<P>> {
		profiling::function_scope!();
		let result = self.run_frame_inner();
		if let Err(e) = &result {
			log::error!("Frame {} failed: {}", self.ring.cycle(), e);
		}
		result
	}

	fn run_frame_inner(&mut self) -> Result<FrameOutcome, FrameError<P>> {
		if is_zero_area(self.window_extent) {
			return Ok(FrameOutcome::Minimized);
		}

		self.ring.wait_for_current(&self.platform).map_err(FrameError::Platform)?;

		let slot = self.ring.current();
		let image_index = match self
			.swapchain
			.acquire(&self.platform, slot.image_available())
			.map_err(FrameError::Platform)?
		{
			AcquireOutcome::Acquired { image_index, suboptimal } => {
				if suboptimal {
					self.recreate_requested = true;
				}
				image_index
			}
			AcquireOutcome::OutOfDate => {
				log::debug!("Swapchain out of date on acquire");
				self.recreate_swapchain()?;
				return Ok(FrameOutcome::SkippedOutOfDate);
			}
		};

		let platform = &*self.platform;
		unsafe { self.ring.begin(platform).map_err(FrameError::Platform)? };

		let now = Instant::now();
		let delta = now.duration_since(self.last_update);
		self.last_update = now;
		{
			profiling::scope!("update");
			self.hooks.update(delta).map_err(FrameError::Hook)?;
		}
		{
			profiling::scope!("render");
			let mut ctx = self.ring.frame_context(platform, &mut self.resources);
			self.hooks
				.render(&mut ctx, &self.swapchain, image_index)
				.map_err(FrameError::Hook)?;
		}
		self.resources.resolve_descriptor_table(platform);
		unsafe { self.ring.submit(platform, true).map_err(FrameError::Platform)? };

		let presented = self
			.swapchain
			.present(platform, image_index, self.ring.current().render_finished())
			.map_err(FrameError::Platform)?;
		self.ring.move_to_next();
		if presented.should_recreate() || self.recreate_requested {
			self.recreate_swapchain()?;
		}
		Ok(FrameOutcome::Presented { image_index })
	}

	/// Remembers the window's new size, the swapchain is rebuilt after the next present.
	pub fn notify_resize(&mut self, width: u32, height: u32) {
		let extent = Extent { width, height };
		if extent != self.window_extent {
			log::debug!("Window resized to {}x{}", width, height);
		}
		self.window_extent = extent;
		self.recreate_requested = true;
	}

	/// Waits for the device to go idle, then rebuilds the swapchain and restarts the ring at its first slot. Returns
	/// `false` if the window has zero area, in which case the recreation stays requested.
	pub fn recreate_swapchain(&mut self) -> Result<bool, FrameError<P>> {
		profiling::function_scope!();
		if is_zero_area(self.window_extent) {
			self.recreate_requested = true;
			return Ok(false);
		}
		self.wait_idle()?;
		let platform = &*self.platform;
		if !unsafe { self.swapchain.recreate(platform, self.window_extent)? } {
			self.recreate_requested = true;
			return Ok(false);
		}
		self.recreate_requested = false;
		self.ring.reset_frame_index();
		self.hooks
			.on_swapchain_recreated(platform, &self.swapchain)
			.map_err(FrameError::Hook)?;
		Ok(true)
	}

	/// Blocks until all submitted work has completed.
	pub fn wait_idle(&self) -> Result<(), FrameError<P>> {
		self.ring.wait_all_idle(&self.platform).map_err(FrameError::Platform)?;
		unsafe { self.platform.wait_idle() }.map_err(FrameError::Platform)
	}

	#[inline]
	pub fn platform(&self) -> &Arc<P> {
		&self.platform
	}

	#[inline]
	pub fn hooks(&self) -> &H {
		&self.hooks
	}

	#[inline]
	pub fn hooks_mut(&mut self) -> &mut H {
		&mut self.hooks
	}

	#[inline]
	pub fn config(&self) -> &FramePipelineConfig {
		&self.config
	}

	#[inline]
	pub fn swapchain(&self) -> &SwapchainManager<P> {
		&self.swapchain
	}

	#[inline]
	pub fn resources(&self) -> &BindlessResourceTable<P> {
		&self.resources
	}

	#[inline]
	pub fn ring(&self) -> &CommandRing<P> {
		&self.ring
	}

	#[inline]
	pub fn window_extent(&self) -> Extent {
		self.window_extent
	}

	#[inline]
	pub fn is_recreate_requested(&self) -> bool {
		self.recreate_requested
	}

	/// Waits for the device and destroys everything the pacer owns. Dropping does the same but can only log a failed
	/// wait.
	pub fn destroy(self) -> Result<(), FrameError<P>> {
		let result = self.wait_idle();
		drop(self);
		result
	}
}

impl<P: FramePlatform, H: FrameHooks<P>> Drop for FramePacer<P, H> {
	fn drop(&mut self) {
		profiling::function_scope!();
		if let Err(e) = self.wait_idle() {
			log::error!("Failed to wait for idle before destroying the frame pacer: {}", e);
		}
		let platform = &*self.platform;
		unsafe {
			ManuallyDrop::take(&mut self.ring).destroy(platform);
			ManuallyDrop::take(&mut self.swapchain).destroy(platform);
			ManuallyDrop::take(&mut self.resources).destroy(platform);
		}
	}
}

#[inline]
fn is_zero_area(extent: Extent) -> bool {
	extent.width == 0 || extent.height == 0
}
