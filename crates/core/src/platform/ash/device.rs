use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::vk::{
	DebugUtilsObjectNameInfoEXT, Handle, PhysicalDeviceProperties, PhysicalDeviceProperties2,
	PhysicalDeviceVulkan12Properties, ShaderStageFlags,
};
use gpu_allocator::vulkan::Allocator;
use parking_lot::lock_api::MutexGuard;
use parking_lot::{Mutex, RawMutex};
use static_assertions::assert_impl_all;
use std::ffi::CString;
use std::ops::Deref;

/// The ash [`FramePlatform`](crate::platform::FramePlatform): a single graphics queue that also presents.
pub struct Ash {
	pub create_info: AshCreateInfo,
	pub properties: PhysicalDeviceProperties,
	/// Smallest update-after-bind limit across the bindless bindings.
	pub max_descriptor_capacity: u32,
}
assert_impl_all!(Ash: Send, Sync);

impl Ash {
	pub fn new(create_info: AshCreateInfo) -> Self {
		let mut vulkan12 = PhysicalDeviceVulkan12Properties::default();
		let properties = unsafe {
			let mut properties2 = PhysicalDeviceProperties2::default().push_next(&mut vulkan12);
			create_info
				.instance
				.get_physical_device_properties2(create_info.physical_device, &mut properties2);
			properties2.properties
		};
		let max_descriptor_capacity = vulkan12
			.max_descriptor_set_update_after_bind_uniform_buffers
			.min(vulkan12.max_descriptor_set_update_after_bind_storage_buffers)
			.min(vulkan12.max_descriptor_set_update_after_bind_sampled_images)
			.min(vulkan12.max_descriptor_set_update_after_bind_samplers);
		log::info!(
			"Using device {:?}",
			properties.device_name_as_c_str().unwrap_or(c"<unknown>")
		);
		Self {
			create_info,
			properties,
			max_descriptor_capacity,
		}
	}

	pub unsafe fn set_debug_object_name(&self, handle: impl Handle, name: &str) -> VkResult<()> {
		unsafe {
			if let Some(debug_marker) = self.extensions.debug_utils.as_ref() {
				// names with interior nul bytes are just not attached
				if let Ok(name) = CString::new(name) {
					debug_marker.set_debug_utils_object_name(
						&DebugUtilsObjectNameInfoEXT::default()
							.object_handle(handle)
							.object_name(&name),
					)?;
				}
			}
			Ok(())
		}
	}
}

impl Deref for Ash {
	type Target = AshCreateInfo;

	fn deref(&self) -> &Self::Target {
		&self.create_info
	}
}

impl Drop for Ash {
	fn drop(&mut self) {
		unsafe {
			if let Err(e) = self.device.device_wait_idle() {
				log::error!("device_wait_idle failed during shutdown: {}", e);
			}
		}
	}
}

pub struct AshCreateInfo {
	pub entry: ash::Entry,
	pub instance: ash::Instance,
	pub physical_device: ash::vk::PhysicalDevice,
	pub device: ash::Device,
	pub memory_allocator: Option<Mutex<Allocator>>,
	/// Stages the bindless descriptor set and push constants are visible to.
	pub shader_stages: ShaderStageFlags,
	pub queue_family_index: u32,
	pub queue: Mutex<ash::vk::Queue>,
	pub extensions: AshExtensions,
	pub destroy: Option<AshDestroyFn>,
}

pub type AshDestroyFn = Box<dyn FnOnce(&mut AshCreateInfo) + Send + Sync>;

#[derive(Default)]
#[non_exhaustive]
pub struct AshExtensions {
	pub debug_utils: Option<debug_utils::Device>,
	pub surface: Option<surface::Instance>,
	pub swapchain: Option<swapchain::Device>,
}

impl AshExtensions {
	pub fn surface(&self) -> Result<&surface::Instance, AshError> {
		self.surface.as_ref().ok_or(AshError::MissingExtension("VK_KHR_surface"))
	}

	pub fn swapchain(&self) -> Result<&swapchain::Device, AshError> {
		self.swapchain
			.as_ref()
			.ok_or(AshError::MissingExtension("VK_KHR_swapchain"))
	}
}

impl AshCreateInfo {
	pub fn memory_allocator(&self) -> Result<MutexGuard<'_, RawMutex, Allocator>, AshError> {
		self.memory_allocator
			.as_ref()
			.map(Mutex::lock)
			.ok_or(AshError::AllocatorDestroyed)
	}
}

impl Drop for AshCreateInfo {
	fn drop(&mut self) {
		if let Some(destroy) = self.destroy.take() {
			destroy(self);
		}
	}
}

#[derive(thiserror::Error)]
pub enum AshError {
	#[error("VkResult: {0}")]
	Vk(#[from] ash::vk::Result),
	#[error("gpu-allocator Error: {0}")]
	Allocation(#[from] gpu_allocator::AllocationError),
	#[error("Extension {0} was not enabled")]
	MissingExtension(&'static str),
	#[error("The memory allocator was already destroyed")]
	AllocatorDestroyed,
	#[error("The queue family can't present to this surface")]
	PresentUnsupported,
	#[error("No depth attachment format is supported")]
	NoDepthFormat,
}

impl core::fmt::Debug for AshError {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		core::fmt::Display::fmt(self, f)
	}
}
