//! Clears the window to a slowly cycling color, the smallest app exercising the whole frame loop.

use ash::vk::{
	AccessFlags2, AttachmentLoadOp, AttachmentStoreOp, ClearColorValue, ClearValue, DependencyInfo, ImageAspectFlags,
	ImageLayout, ImageMemoryBarrier2, ImageSubresourceRange, PipelineStageFlags2, Rect2D, RenderingAttachmentInfo,
	RenderingInfo,
};
use frame_pipeline_core::frame::{FrameContext, FrameHooks};
use frame_pipeline_core::platform::ash::{AppConfig, Ash, Debuggers};
use frame_pipeline_core::swapchain::SwapchainManager;
use frame_pipeline_winit::ash::{AshAppConfig, run_ash_app};
use std::time::Duration;
use winit::window::WindowAttributes;

#[derive(Default)]
struct ClearScreen {
	elapsed: Duration,
}

impl ClearScreen {
	fn color(&self) -> [f32; 4] {
		let t = self.elapsed.as_secs_f32();
		[(t.sin() + 1.) / 2., ((t * 0.7).sin() + 1.) / 2., ((t * 0.3).cos() + 1.) / 2., 1.]
	}
}

impl FrameHooks<Ash> for ClearScreen {
	fn on_swapchain_recreated(&mut self, _platform: &Ash, swapchain: &SwapchainManager<Ash>) -> anyhow::Result<()> {
		log::info!(
			"Swapchain {:?} is now {}x{}",
			swapchain.generation(),
			swapchain.extent().width,
			swapchain.extent().height
		);
		Ok(())
	}

	fn update(&mut self, delta: Duration) -> anyhow::Result<()> {
		self.elapsed += delta;
		Ok(())
	}

	fn render(
		&mut self,
		ctx: &mut FrameContext<'_, Ash>,
		swapchain: &SwapchainManager<Ash>,
		image_index: u32,
	) -> anyhow::Result<()> {
		profiling::function_scope!();
		let (ash, target, _) = ctx.split();
		let image = swapchain.swapchain().images[image_index as usize];
		let range = ImageSubresourceRange {
			aspect_mask: ImageAspectFlags::COLOR,
			base_mip_level: 0,
			level_count: 1,
			base_array_layer: 0,
			layer_count: 1,
		};
		unsafe {
			ash.device.cmd_pipeline_barrier2(
				target.cmd,
				&DependencyInfo::default().image_memory_barriers(&[ImageMemoryBarrier2::default()
					.image(image)
					.subresource_range(range)
					.old_layout(ImageLayout::UNDEFINED)
					.new_layout(ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
					// chains with the acquire semaphore wait
					.src_stage_mask(PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
					.src_access_mask(AccessFlags2::NONE)
					.dst_stage_mask(PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
					.dst_access_mask(AccessFlags2::COLOR_ATTACHMENT_WRITE)]),
			);
			ash.device.cmd_begin_rendering(
				target.cmd,
				&RenderingInfo::default()
					.render_area(Rect2D {
						offset: Default::default(),
						extent: swapchain.extent(),
					})
					.layer_count(1)
					.color_attachments(&[RenderingAttachmentInfo::default()
						.image_view(swapchain.image_view(image_index))
						.image_layout(ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
						.load_op(AttachmentLoadOp::CLEAR)
						.store_op(AttachmentStoreOp::STORE)
						.clear_value(ClearValue {
							color: ClearColorValue { float32: self.color() },
						})]),
			);
			ash.device.cmd_end_rendering(target.cmd);
			ash.device.cmd_pipeline_barrier2(
				target.cmd,
				&DependencyInfo::default().image_memory_barriers(&[ImageMemoryBarrier2::default()
					.image(image)
					.subresource_range(range)
					.old_layout(ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
					.new_layout(ImageLayout::PRESENT_SRC_KHR)
					.src_stage_mask(PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
					.src_access_mask(AccessFlags2::COLOR_ATTACHMENT_WRITE)
					.dst_stage_mask(PipelineStageFlags2::NONE)
					.dst_access_mask(AccessFlags2::NONE)]),
			);
		}
		Ok(())
	}
}

fn main() -> anyhow::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	run_ash_app(
		AshAppConfig {
			app: AppConfig {
				name: c"clear_screen",
				version: 1,
			},
			debug: Debuggers::Validation,
			window: WindowAttributes::default().with_title("clear screen"),
			..AshAppConfig::default()
		},
		|_| Ok(ClearScreen::default()),
	)
}
