#![cfg(test)]

use crate::init_logger;
use frame_pipeline_core::config::FramePipelineConfig;
use frame_pipeline_core::descriptor::{BindlessBinding, BindlessDrawParams, Extent, Format, SamplerCreateInfo};
use frame_pipeline_core::frame::{FrameContext, FrameError, FrameHooks, FrameOutcome, FramePacer};
use frame_pipeline_core::handle::{DrawParamsHandle, TextureHandle};
use frame_pipeline_core::platform::mock::{MockError, MockEvent, MockPlatform};
use frame_pipeline_core::swapchain::{SwapchainGeneration, SwapchainManager};
use frame_pipeline_core::upload::StagedUpload;
use std::sync::Arc;
use std::time::Duration;

type Tint = [f32; 4];

const TEXELS: [[u8; 4]; 4] = [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255], [255, 255, 255, 255]];

/// Uploads a texture and per-frame draw params on init, then checks every frame that both are bound.
#[derive(Default)]
struct Scene {
	texture: Option<TextureHandle>,
	params: Option<BindlessDrawParams<MockPlatform>>,
	tint: Option<DrawParamsHandle>,
	elapsed: Duration,
	presented: Vec<u32>,
	recreated: Vec<(SwapchainGeneration, Extent)>,
}

impl FrameHooks<MockPlatform> for Scene {
	fn on_init(
		&mut self,
		ctx: &mut FrameContext<'_, MockPlatform>,
		_swapchain: &SwapchainManager<MockPlatform>,
	) -> anyhow::Result<()> {
		let extent = Extent { width: 2, height: 2 };
		let mut upload = StagedUpload::create_texture(ctx.platform(), extent, Format::R8G8B8A8_UNORM, "checker")?;
		upload.stage_pod(&TEXELS)?;
		self.texture = Some(upload.finish_texture(ctx, &SamplerCreateInfo::default())?);

		let mut params = BindlessDrawParams::new(ctx.platform(), ctx.frame_in_flight().seed());
		let tint = params.declare_params::<Tint>()?;
		params.define_params::<Tint>(tint, &[1., 0.5, 0.25, 1.], None)?;
		params.build(ctx)?;
		self.params = Some(params);
		self.tint = Some(tint);
		Ok(())
	}

	fn on_swapchain_recreated(
		&mut self,
		_platform: &MockPlatform,
		swapchain: &SwapchainManager<MockPlatform>,
	) -> anyhow::Result<()> {
		self.recreated.push((swapchain.generation(), swapchain.extent()));
		Ok(())
	}

	fn update(&mut self, delta: Duration) -> anyhow::Result<()> {
		self.elapsed += delta;
		Ok(())
	}

	fn render(
		&mut self,
		ctx: &mut FrameContext<'_, MockPlatform>,
		_swapchain: &SwapchainManager<MockPlatform>,
		image_index: u32,
	) -> anyhow::Result<()> {
		let texture = self.texture.ok_or_else(|| anyhow::anyhow!("rendered before init"))?;
		let params = self
			.params
			.as_ref()
			.and_then(|params| params.buffer(ctx.frame_in_flight()))
			.ok_or_else(|| anyhow::anyhow!("draw params missing"))?;
		anyhow::ensure!(ctx.resources().texture(texture).is_some());
		anyhow::ensure!(ctx.resources().buffer(params).is_some());
		self.presented.push(image_index);
		Ok(())
	}
}

fn window() -> Extent {
	Extent {
		width: 800,
		height: 600,
	}
}

fn scene(platform: &Arc<MockPlatform>) -> anyhow::Result<FramePacer<MockPlatform, Scene>> {
	let surface = platform.create_surface();
	Ok(FramePacer::new(
		platform.clone(),
		surface,
		window(),
		FramePipelineConfig::default(),
		Scene::default(),
	)?)
}

#[test]
fn scene_is_uploaded_before_the_first_frame() -> anyhow::Result<()> {
	init_logger();
	let platform = Arc::new(MockPlatform::new());
	let mut pacer = scene(&platform)?;

	let mut writes = platform
		.take_descriptor_writes()
		.into_iter()
		.map(|w| (w.binding, w.index))
		.collect::<Vec<_>>();
	writes.sort_by_key(|(binding, index)| (binding.binding(), *index));
	assert_eq!(
		writes,
		[
			(BindlessBinding::UniformBuffer, 0),
			(BindlessBinding::UniformBuffer, 1),
			(BindlessBinding::Texture, 0),
		]
	);

	for image_index in 0..3 {
		assert_eq!(pacer.run_frame()?, FrameOutcome::Presented { image_index });
	}
	let texture = pacer.hooks().texture.expect("initialized");
	let stored = pacer.resources().texture(texture).expect("stored");
	assert_eq!(platform.image_contents(&stored.image), bytemuck::cast_slice::<_, u8>(&TEXELS));
	assert_eq!(pacer.hooks().presented, [0, 1, 2]);
	assert!(platform.pending_submissions() <= 2);

	pacer.destroy()?;
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}

#[test]
fn resize_round_trip() -> anyhow::Result<()> {
	init_logger();
	let platform = Arc::new(MockPlatform::new());
	let mut pacer = scene(&platform)?;
	pacer.run_frame()?;

	// minimized: nothing is waited on or submitted
	pacer.notify_resize(0, 0);
	platform.take_events();
	assert_eq!(pacer.run_frame()?, FrameOutcome::Minimized);
	assert_eq!(pacer.run_frame()?, FrameOutcome::Minimized);
	assert!(platform.take_events().is_empty());
	assert!(pacer.is_recreate_requested());

	// restored at a new size
	let restored = Extent {
		width: 1280,
		height: 720,
	};
	platform.set_surface_extent(restored);
	pacer.notify_resize(restored.width, restored.height);
	assert!(matches!(pacer.run_frame()?, FrameOutcome::Presented { .. }));
	assert!(!pacer.is_recreate_requested());
	assert_eq!(pacer.swapchain().extent(), restored);
	assert_eq!(pacer.hooks().recreated, [(SwapchainGeneration(1), restored)]);
	assert!(platform.events().contains(&MockEvent::WaitIdle));

	// the ring restarts at its first slot after recreation
	assert_eq!(pacer.ring().frame_index(), 0);
	assert!(matches!(pacer.run_frame()?, FrameOutcome::Presented { .. }));
	assert_eq!(pacer.ring().frame_index(), 1);

	pacer.destroy()?;
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}

#[test]
fn device_lost_ends_the_loop() -> anyhow::Result<()> {
	init_logger();
	let platform = Arc::new(MockPlatform::new());
	let mut pacer = scene(&platform)?;
	pacer.run_frame()?;
	pacer.run_frame()?;

	platform.set_device_lost();
	let result = pacer.run_frame();
	assert!(
		matches!(result, Err(FrameError::Platform(MockError::DeviceLost))),
		"{result:?}"
	);
	assert!(pacer.destroy().is_err());
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}
