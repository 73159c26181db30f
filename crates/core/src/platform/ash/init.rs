use crate::platform::ash::{AshCreateInfo, AshExtensions};
use anyhow::anyhow;
use ash::Entry;
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::vk::{
	ApplicationInfo, Bool32, DebugUtilsMessageSeverityFlagsEXT, DebugUtilsMessageTypeFlagsEXT,
	DebugUtilsMessengerCallbackDataEXT, DebugUtilsMessengerCreateInfoEXT, DeviceCreateInfo, DeviceQueueCreateInfo,
	InstanceCreateInfo, PhysicalDeviceFeatures, PhysicalDeviceType, PhysicalDeviceVulkan12Features,
	PhysicalDeviceVulkan13Features, QueueFlags, ShaderStageFlags,
};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use gpu_allocator::{AllocationSizes, AllocatorDebugSettings};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::ffi::{CStr, c_void};

pub fn required_features() -> PhysicalDeviceFeatures {
	PhysicalDeviceFeatures::default()
		.shader_storage_buffer_array_dynamic_indexing(true)
		.shader_uniform_buffer_array_dynamic_indexing(true)
		.shader_sampled_image_array_dynamic_indexing(true)
		.sample_rate_shading(true)
}

pub fn required_features_vk12() -> PhysicalDeviceVulkan12Features<'static> {
	PhysicalDeviceVulkan12Features::default()
		.runtime_descriptor_array(true)
		.descriptor_binding_update_unused_while_pending(true)
		.descriptor_binding_partially_bound(true)
		.descriptor_indexing(true)
		.descriptor_binding_storage_buffer_update_after_bind(true)
		.descriptor_binding_uniform_buffer_update_after_bind(true)
		.descriptor_binding_sampled_image_update_after_bind(true)
		.shader_storage_buffer_array_non_uniform_indexing(true)
		.shader_uniform_buffer_array_non_uniform_indexing(true)
		.shader_sampled_image_array_non_uniform_indexing(true)
}

pub fn required_features_vk13() -> PhysicalDeviceVulkan13Features<'static> {
	PhysicalDeviceVulkan13Features::default()
		.synchronization2(true)
		.dynamic_rendering(true)
}

pub const LAYER_VALIDATION: &CStr = c"VK_LAYER_KHRONOS_validation";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Debuggers {
	#[default]
	None,
	Validation,
}

pub struct AppConfig<'a> {
	pub name: &'a CStr,
	pub version: u32,
}

impl Default for AppConfig<'_> {
	fn default() -> Self {
		Self {
			name: c"Unknown App",
			version: 0,
		}
	}
}

pub struct AshSingleGraphicsQueueCreateInfo<'a> {
	pub app: AppConfig<'a>,
	pub shader_stages: ShaderStageFlags,
	/// Usually the extensions the windowing system needs for creating surfaces.
	pub instance_extensions: &'a [&'a CStr],
	pub extensions: &'a [&'a CStr],
	pub debug: Debuggers,
}

impl Default for AshSingleGraphicsQueueCreateInfo<'_> {
	fn default() -> Self {
		Self {
			app: Default::default(),
			shader_stages: ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
			instance_extensions: &[],
			extensions: &[swapchain::NAME],
			debug: Debuggers::default(),
		}
	}
}

/// Creates an [`AshCreateInfo`] with any GPU (preferring dedicated) and its single graphics queue, which is also used
/// for presenting.
///
/// If any of the steps were to fail during initialization, this method currently does not clean up after itself
/// correctly. It will only destroy itself correctly if the entire initialization succeeds.
pub fn ash_init_single_graphics_queue(create_info: AshSingleGraphicsQueueCreateInfo) -> anyhow::Result<AshCreateInfo> {
	unsafe {
		let entry = Entry::load()?;

		let instance = {
			let mut layers = SmallVec::<[_; 1]>::new();
			if matches!(create_info.debug, Debuggers::Validation) {
				layers.push(LAYER_VALIDATION.as_ptr());
			}

			let extensions = create_info
				.instance_extensions
				.iter()
				.copied()
				.chain([debug_utils::NAME])
				.map(|c| c.as_ptr())
				.collect::<SmallVec<[_; 4]>>();

			entry.create_instance(
				&InstanceCreateInfo::default()
					.application_info(
						&ApplicationInfo::default()
							.application_name(create_info.app.name)
							.application_version(create_info.app.version)
							.engine_name(c"frame-pipeline")
							.engine_version(1)
							.api_version(ash::vk::make_api_version(0, 1, 3, 0)),
					)
					.enabled_extension_names(&extensions)
					.enabled_layer_names(&layers),
				None,
			)?
		};

		let debug_instance = debug_utils::Instance::new(&entry, &instance);
		let debug_messenger = debug_instance.create_debug_utils_messenger(
			&DebugUtilsMessengerCreateInfoEXT::default()
				.message_severity(
					DebugUtilsMessageSeverityFlagsEXT::ERROR
						| DebugUtilsMessageSeverityFlagsEXT::WARNING
						| DebugUtilsMessageSeverityFlagsEXT::INFO,
				)
				.message_type(
					DebugUtilsMessageTypeFlagsEXT::GENERAL
						| DebugUtilsMessageTypeFlagsEXT::VALIDATION
						| DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
				)
				.pfn_user_callback(Some(log_debug_callback)),
			None,
		)?;

		let physical_device = instance
			.enumerate_physical_devices()?
			.into_iter()
			.min_by_key(|phy| match instance.get_physical_device_properties(*phy).device_type {
				PhysicalDeviceType::DISCRETE_GPU => 1,
				PhysicalDeviceType::VIRTUAL_GPU => 2,
				PhysicalDeviceType::INTEGRATED_GPU => 3,
				PhysicalDeviceType::CPU => 4,
				_ => 5,
			})
			.ok_or(anyhow!("No physical devices available"))?;

		let queue_family_index = instance
			.get_physical_device_queue_family_properties(physical_device)
			.into_iter()
			.enumerate()
			.find(|(_, prop)| prop.queue_flags.contains(QueueFlags::GRAPHICS))
			.ok_or(anyhow!("No graphics queue on physical device available"))?
			.0 as u32;

		let device = {
			let extensions = create_info.extensions.iter().map(|x| x.as_ptr()).collect::<Vec<_>>();
			instance.create_device(
				physical_device,
				&DeviceCreateInfo::default()
					.enabled_features(&required_features())
					.enabled_extension_names(&extensions)
					.push_next(&mut required_features_vk12())
					.push_next(&mut required_features_vk13())
					.queue_create_infos(&[DeviceQueueCreateInfo::default()
						.queue_family_index(queue_family_index)
						.queue_priorities(&[1.])]),
				None,
			)?
		};

		let queue = device.get_device_queue(queue_family_index, 0);
		let memory_allocator = Allocator::new(&AllocatorCreateDesc {
			instance: instance.clone(),
			device: device.clone(),
			physical_device,
			debug_settings: AllocatorDebugSettings::default(),
			buffer_device_address: false,
			allocation_sizes: AllocationSizes::default(),
		})?;

		let debug_utils = Some(debug_utils::Device::new(&instance, &device));

		let surface = create_info
			.instance_extensions
			.contains(&surface::NAME)
			.then(|| surface::Instance::new(&entry, &instance));

		let swapchain = create_info
			.extensions
			.contains(&swapchain::NAME)
			.then(|| swapchain::Device::new(&instance, &device));

		Ok(AshCreateInfo {
			entry,
			instance,
			physical_device,
			device,
			queue_family_index,
			queue: Mutex::new(queue),
			memory_allocator: Some(Mutex::new(memory_allocator)),
			shader_stages: create_info.shader_stages,
			extensions: AshExtensions {
				debug_utils,
				surface,
				swapchain,
			},
			destroy: Some(Box::new(move |create_info| {
				let instance = &create_info.instance;
				let device = &create_info.device;

				create_info.extensions = AshExtensions::default();
				drop(create_info.memory_allocator.take());
				device.destroy_device(None);
				debug_instance.destroy_debug_utils_messenger(debug_messenger, None);
				instance.destroy_instance(None);
			})),
		})
	}
}

/// All child objects created on device must have been destroyed prior to destroying device
/// https://vulkan.lunarg.com/doc/view/1.3.296.0/linux/1.3-extensions/vkspec.html#VUID-vkDestroyDevice-device-05137
const VUID_VK_DESTROY_DEVICE_DEVICE_05137: i32 = 0x4872eaa0;

const IGNORED_MSG_IDS: &[i32] = &[VUID_VK_DESTROY_DEVICE_DEVICE_05137];

/// Routes validation messages into `log`, at the level matching their severity.
unsafe extern "system" fn log_debug_callback(
	message_severity: DebugUtilsMessageSeverityFlagsEXT,
	message_type: DebugUtilsMessageTypeFlagsEXT,
	callback_data: *const DebugUtilsMessengerCallbackDataEXT<'_>,
	_p_user_data: *mut c_void,
) -> Bool32 {
	unsafe {
		let callback_data = *callback_data;
		let message_id_number = callback_data.message_id_number;
		if IGNORED_MSG_IDS.contains(&message_id_number) {
			return false.into();
		}
		let message_id_name = callback_data
			.message_id_name_as_c_str()
			.map_or(Cow::Borrowed(""), CStr::to_string_lossy);
		let message = callback_data
			.message_as_c_str()
			.map_or(Cow::Borrowed("No message"), CStr::to_string_lossy);

		let level = if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::ERROR) {
			log::Level::Error
		} else if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::WARNING) {
			log::Level::Warn
		} else {
			log::Level::Debug
		};
		log::log!(
			target: "vulkan",
			level,
			"{message_type:?} [{message_id_name} ({message_id_number:#x})]: {message}"
		);

		false.into()
	}
}
