#![cfg(test)]

use crate::init_logger;
use ash::vk::{PresentModeKHR, SurfaceCapabilitiesKHR};
use frame_pipeline_core::descriptor::{Extent, Format, SampleCount};
use frame_pipeline_core::platform::mock::{MockConfig, MockEvent, MockPlatform};
use frame_pipeline_core::platform::SurfaceSupport;
use frame_pipeline_core::swapchain::{SwapchainGeneration, SwapchainManager, SwapchainPreferences};

fn support(capabilities: SurfaceCapabilitiesKHR, present_modes: Vec<PresentModeKHR>) -> SurfaceSupport {
	SurfaceSupport {
		capabilities,
		present_modes,
		..MockConfig::default().surface_support
	}
}

#[test]
fn recreate_follows_the_surface() -> anyhow::Result<()> {
	init_logger();
	let platform = MockPlatform::new();
	let surface = platform.create_surface();
	let mut swapchain = SwapchainManager::new(
		&platform,
		surface,
		Extent {
			width: 800,
			height: 600,
		},
		SwapchainPreferences::default(),
	)?;
	assert_eq!(swapchain.image_count(), 3);
	assert_eq!(swapchain.present_mode(), PresentModeKHR::MAILBOX);
	assert_eq!(swapchain.format(), Format::B8G8R8A8_UNORM);
	assert_eq!(swapchain.samples(), SampleCount::Sample4);
	assert_eq!(swapchain.generation(), SwapchainGeneration(0));
	let old = swapchain.swapchain().id();

	let capabilities = SurfaceCapabilitiesKHR {
		min_image_count: 3,
		max_image_count: 4,
		current_extent: Extent {
			width: 1280,
			height: 720,
		},
		..MockConfig::default().surface_support.capabilities
	};
	platform.set_surface_support(support(capabilities, vec![PresentModeKHR::FIFO]));
	platform.take_events();
	let desired = Extent {
		width: 1280,
		height: 720,
	};
	assert!(unsafe { swapchain.recreate(&platform, desired)? });

	assert_eq!(swapchain.image_count(), 4);
	assert_eq!(swapchain.image_views().len(), 4);
	assert_eq!(swapchain.extent(), desired);
	assert_eq!(swapchain.present_mode(), PresentModeKHR::FIFO);
	assert_eq!(swapchain.generation(), SwapchainGeneration(1));

	let events = platform.take_events();
	let created = events
		.iter()
		.position(|e| matches!(e, MockEvent::SwapchainCreated { old: Some(id), image_count: 4, .. } if *id == old))
		.expect("new swapchain replaces the old one");
	let destroyed = events
		.iter()
		.position(|e| *e == MockEvent::SwapchainDestroyed { swapchain: old })
		.expect("old swapchain destroyed");
	assert!(created < destroyed);

	unsafe { swapchain.destroy(&platform) };
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}

#[test]
fn zero_area_surface_postpones_recreate() -> anyhow::Result<()> {
	init_logger();
	let platform = MockPlatform::new();
	let surface = platform.create_surface();
	let window = Extent {
		width: 800,
		height: 600,
	};
	let mut swapchain = SwapchainManager::new(&platform, surface, window, SwapchainPreferences::default())?;

	platform.set_surface_extent(Extent { width: 0, height: 0 });
	platform.take_events();
	assert!(!unsafe { swapchain.recreate(&platform, window)? });
	assert_eq!(swapchain.generation(), SwapchainGeneration(0));
	assert_eq!(swapchain.extent(), window);
	assert!(platform.take_events().is_empty());

	platform.set_surface_extent(window);
	assert!(unsafe { swapchain.recreate(&platform, window)? });
	assert_eq!(swapchain.generation(), SwapchainGeneration(1));

	unsafe { swapchain.destroy(&platform) };
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}

#[test]
fn undefined_surface_extent_clamps_the_window() -> anyhow::Result<()> {
	init_logger();
	let platform = MockPlatform::new();
	let capabilities = SurfaceCapabilitiesKHR {
		current_extent: Extent {
			width: u32::MAX,
			height: u32::MAX,
		},
		..MockConfig::default().surface_support.capabilities
	};
	platform.set_surface_support(support(capabilities, vec![PresentModeKHR::FIFO]));
	let surface = platform.create_surface();
	let swapchain = SwapchainManager::new(
		&platform,
		surface,
		Extent {
			width: 5000,
			height: 300,
		},
		SwapchainPreferences {
			prefer_low_latency: false,
			..SwapchainPreferences::default()
		},
	)?;
	assert_eq!(
		swapchain.extent(),
		Extent {
			width: 4096,
			height: 300
		}
	);
	assert_eq!(swapchain.present_mode(), PresentModeKHR::FIFO);

	unsafe { swapchain.destroy(&platform) };
	assert_eq!(platform.alive_objects(), 0);
	Ok(())
}
