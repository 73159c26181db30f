use anyhow::Context;
use ash::ext::metal_surface;
use ash::khr::{android_surface, surface, wayland_surface, win32_surface, xcb_surface, xlib_surface};
use ash::prelude::VkResult;
use ash::vk::SurfaceKHR;
use frame_pipeline_core::config::FramePipelineConfig;
use frame_pipeline_core::descriptor::Extent;
use frame_pipeline_core::frame::{FrameHooks, FramePacer};
use frame_pipeline_core::platform::ash::{
	AppConfig, Ash, AshSingleGraphicsQueueCreateInfo, Debuggers, ash_init_single_graphics_queue,
};
use std::ffi::CStr;
use std::sync::Arc;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use winit::window::{Window, WindowAttributes, WindowId};

pub fn ash_enumerate_required_extensions(display_handle: RawDisplayHandle) -> VkResult<&'static [&'static CStr]> {
	Ok(match display_handle {
		RawDisplayHandle::Windows(_) => &[surface::NAME, win32_surface::NAME],
		RawDisplayHandle::Wayland(_) => &[surface::NAME, wayland_surface::NAME],
		RawDisplayHandle::Xlib(_) => &[surface::NAME, xlib_surface::NAME],
		RawDisplayHandle::Xcb(_) => &[surface::NAME, xcb_surface::NAME],
		RawDisplayHandle::Android(_) => &[surface::NAME, android_surface::NAME],
		RawDisplayHandle::AppKit(_) | RawDisplayHandle::UiKit(_) => &[surface::NAME, metal_surface::NAME],
		_ => return Err(ash::vk::Result::ERROR_EXTENSION_NOT_PRESENT),
	})
}

/// # Safety
/// The surface must be destroyed with [`ash_destroy_surface`] before the window.
pub unsafe fn ash_create_surface(ash: &Ash, window: &Window) -> anyhow::Result<SurfaceKHR> {
	unsafe {
		Ok(ash_window::create_surface(
			&ash.entry,
			&ash.instance,
			window.display_handle()?.as_raw(),
			window.window_handle()?.as_raw(),
			None,
		)?)
	}
}

/// # Safety
/// No swapchain of this surface may be alive anymore.
pub unsafe fn ash_destroy_surface(ash: &Ash, surface: SurfaceKHR) {
	unsafe {
		match ash.extensions.surface() {
			Ok(ext) => ext.destroy_surface(surface, None),
			Err(e) => log::error!("Leaking surface: {}", e),
		}
	}
}

fn window_extent(window: &Window) -> Extent {
	let size = window.inner_size();
	Extent {
		width: size.width,
		height: size.height,
	}
}

pub struct AshAppConfig<'a> {
	pub app: AppConfig<'a>,
	pub debug: Debuggers,
	pub window: WindowAttributes,
	pub pipeline: FramePipelineConfig,
}

impl Default for AshAppConfig<'_> {
	fn default() -> Self {
		Self {
			app: AppConfig::default(),
			debug: Debuggers::default(),
			window: WindowAttributes::default(),
			pipeline: FramePipelineConfig::default(),
		}
	}
}

/// Opens a window and drives a [`FramePacer`] with the hooks returned by `create_hooks` until the window is closed or
/// a frame fails.
pub fn run_ash_app<H, F>(config: AshAppConfig, create_hooks: F) -> anyhow::Result<()>
where
	H: FrameHooks<Ash>,
	F: FnMut(&Arc<Ash>) -> anyhow::Result<H>,
{
	let event_loop = EventLoop::new()?;
	let instance_extensions = ash_enumerate_required_extensions(event_loop.display_handle()?.as_raw())?;
	let ash = Arc::new(Ash::new(ash_init_single_graphics_queue(
		AshSingleGraphicsQueueCreateInfo {
			app: config.app,
			instance_extensions,
			debug: config.debug,
			..AshSingleGraphicsQueueCreateInfo::default()
		},
	)?));

	let mut app = AshFrameApp {
		ash,
		window_attributes: config.window,
		pipeline: config.pipeline,
		create_hooks,
		running: None,
		error: None,
	};
	event_loop.run_app(&mut app)?;
	app.shutdown();
	match app.error.take() {
		Some(e) => Err(e),
		None => Ok(()),
	}
}

struct Running<H: FrameHooks<Ash>> {
	pacer: FramePacer<Ash, H>,
	surface: SurfaceKHR,
	window: Window,
}

struct AshFrameApp<H: FrameHooks<Ash>, F> {
	ash: Arc<Ash>,
	window_attributes: WindowAttributes,
	pipeline: FramePipelineConfig,
	create_hooks: F,
	running: Option<Running<H>>,
	error: Option<anyhow::Error>,
}

impl<H, F> AshFrameApp<H, F>
where
	H: FrameHooks<Ash>,
	F: FnMut(&Arc<Ash>) -> anyhow::Result<H>,
{
	fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<Running<H>> {
		let window = event_loop.create_window(self.window_attributes.clone())?;
		let surface = unsafe { ash_create_surface(&self.ash, &window)? };
		let pacer = (self.create_hooks)(&self.ash).and_then(|hooks| {
			FramePacer::new(
				self.ash.clone(),
				surface,
				window_extent(&window),
				self.pipeline.clone(),
				hooks,
			)
			.context("creating the frame pacer")
		});
		match pacer {
			Ok(pacer) => Ok(Running {
				pacer,
				surface,
				window,
			}),
			Err(e) => {
				unsafe { ash_destroy_surface(&self.ash, surface) };
				Err(e)
			}
		}
	}

	fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
		self.error.get_or_insert(error);
		event_loop.exit();
	}

	/// The pacer must be gone before its surface, the surface before its window.
	fn shutdown(&mut self) {
		if let Some(running) = self.running.take() {
			if let Err(e) = running.pacer.destroy() {
				log::error!("Failed to shut down the frame pacer: {}", e);
			}
			unsafe { ash_destroy_surface(&self.ash, running.surface) };
			drop(running.window);
		}
	}
}

impl<H, F> ApplicationHandler for AshFrameApp<H, F>
where
	H: FrameHooks<Ash>,
	F: FnMut(&Arc<Ash>) -> anyhow::Result<H>,
{
	fn resumed(&mut self, event_loop: &ActiveEventLoop) {
		if self.running.is_some() {
			return;
		}
		log::info!("winit event: resumed");
		match self.start(event_loop) {
			Ok(running) => self.running = Some(running),
			Err(e) => self.fail(event_loop, e),
		}
	}

	fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
		let Some(running) = self.running.as_mut() else {
			return;
		};
		match event {
			WindowEvent::CloseRequested => event_loop.exit(),
			WindowEvent::Resized(size) => running.pacer.notify_resize(size.width, size.height),
			WindowEvent::RedrawRequested => {
				if let Err(e) = running.pacer.run_frame() {
					self.fail(event_loop, e.into());
				}
			}
			_ => {}
		}
	}

	fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
		if let Some(running) = self.running.as_ref() {
			running.window.request_redraw();
		}
	}

	fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
		log::info!("winit event: exiting");
		self.shutdown();
	}
}
