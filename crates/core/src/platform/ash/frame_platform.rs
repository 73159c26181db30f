use crate::descriptor::{
	BufferCreateInfo, DescriptorWrite, Extent, Format, ImageCreateInfo, SampleCount, SamplerCreateInfo,
};
use crate::platform::ash::{Ash, AshError, format_aspect};
use crate::platform::{AcquireOutcome, FramePlatform, PresentOutcome, SurfaceSupport, SwapchainCreateInfo};
use ash::vk::{
	AccessFlags2, BufferCopy, BufferImageCopy, CommandBuffer, CommandBufferAllocateInfo, CommandBufferBeginInfo,
	CommandBufferLevel, CommandBufferUsageFlags, CommandPool, CommandPoolCreateFlags, CommandPoolCreateInfo,
	CommandPoolResetFlags, ComponentMapping, CompositeAlphaFlagsKHR, DependencyInfo, DescriptorBindingFlags,
	DescriptorBufferInfo, DescriptorImageInfo, DescriptorPool, DescriptorPoolCreateFlags, DescriptorPoolCreateInfo,
	DescriptorPoolSize, DescriptorSet, DescriptorSetAllocateInfo, DescriptorSetLayout,
	DescriptorSetLayoutBindingFlagsCreateInfo, DescriptorSetLayoutCreateFlags, DescriptorSetLayoutCreateInfo,
	DescriptorType, Extent3D, Fence, FenceCreateFlags, FenceCreateInfo, FormatFeatureFlags, ImageAspectFlags,
	ImageLayout, ImageMemoryBarrier2, ImageSubresourceLayers, ImageSubresourceRange, ImageTiling, ImageType,
	ImageUsageFlags, ImageView, ImageViewCreateInfo, ImageViewType, MemoryBarrier2, PipelineLayout,
	PipelineLayoutCreateInfo, PipelineStageFlags, PipelineStageFlags2, PresentInfoKHR, PushConstantRange,
	Semaphore, SemaphoreCreateInfo, SharingMode, SubmitInfo, SurfaceKHR, SwapchainKHR, WHOLE_SIZE,
	WriteDescriptorSet,
};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc};
use gpu_allocator::MemoryLocation;

/// Size of the push constant block every pipeline using the bindless set receives: the draw params offset and a
/// user defined `u32`.
pub const PUSH_CONSTANT_SIZE: u32 = 8;

pub struct AshBuffer {
	pub buffer: ash::vk::Buffer,
	pub size: u64,
	/// `None` only during destruction.
	pub allocation: Option<Allocation>,
}

pub struct AshImage {
	pub image: ash::vk::Image,
	pub image_view: ImageView,
	pub format: Format,
	pub mip_levels: u32,
	pub allocation: Option<Allocation>,
}

/// Every recording target owns its own pool, so resetting it never affects another frame.
pub struct AshRecordingTarget {
	pub pool: CommandPool,
	pub cmd: CommandBuffer,
}

pub struct AshSwapchain {
	pub swapchain: SwapchainKHR,
	pub images: Vec<ash::vk::Image>,
	pub image_views: Vec<ImageView>,
}

#[derive(Copy, Clone, Debug)]
pub struct AshDescriptorSet {
	pub pipeline_layout: PipelineLayout,
	pub set_layout: DescriptorSetLayout,
	pub pool: DescriptorPool,
	pub set: DescriptorSet,
}

impl Ash {
	unsafe fn free_allocation(&self, allocation: Option<Allocation>) {
		let Some(allocation) = allocation else { return };
		let result = self
			.memory_allocator()
			.and_then(|mut allocator| Ok(allocator.free(allocation)?));
		if let Err(e) = result {
			log::error!("Failed to free allocation: {}", e);
		}
	}

	unsafe fn create_view(
		&self,
		image: ash::vk::Image,
		format: Format,
		mip_levels: u32,
		name: &str,
	) -> Result<ImageView, AshError> {
		unsafe {
			let view = self.device.create_image_view(
				&ImageViewCreateInfo::default()
					.image(image)
					.view_type(ImageViewType::TYPE_2D)
					.format(format)
					.components(ComponentMapping::default()) // identity
					.subresource_range(ImageSubresourceRange {
						aspect_mask: format_aspect(format),
						base_mip_level: 0,
						level_count: mip_levels,
						base_array_layer: 0,
						layer_count: 1,
					}),
				None,
			)?;
			self.set_debug_object_name(view, name)?;
			Ok(view)
		}
	}
}

unsafe impl FramePlatform for Ash {
	type Error = AshError;
	type Buffer = AshBuffer;
	type Image = AshImage;
	type ImageView = ImageView;
	type Sampler = ash::vk::Sampler;
	type Fence = Fence;
	type Semaphore = Semaphore;
	type RecordingTarget = AshRecordingTarget;
	type Surface = SurfaceKHR;
	type Swapchain = AshSwapchain;
	type DescriptorSet = AshDescriptorSet;

	unsafe fn create_fence(&self, signaled: bool) -> Result<Self::Fence, Self::Error> {
		unsafe {
			let flags = if signaled {
				FenceCreateFlags::SIGNALED
			} else {
				FenceCreateFlags::empty()
			};
			Ok(self
				.device
				.create_fence(&FenceCreateInfo::default().flags(flags), None)?)
		}
	}

	unsafe fn wait_for_fence(&self, fence: &Self::Fence) -> Result<(), Self::Error> {
		unsafe { Ok(self.device.wait_for_fences(&[*fence], true, u64::MAX)?) }
	}

	unsafe fn reset_fence(&self, fence: &Self::Fence) -> Result<(), Self::Error> {
		unsafe { Ok(self.device.reset_fences(&[*fence])?) }
	}

	unsafe fn destroy_fence(&self, fence: Self::Fence) {
		unsafe { self.device.destroy_fence(fence, None) }
	}

	unsafe fn create_semaphore(&self) -> Result<Self::Semaphore, Self::Error> {
		unsafe { Ok(self.device.create_semaphore(&SemaphoreCreateInfo::default(), None)?) }
	}

	unsafe fn destroy_semaphore(&self, semaphore: Self::Semaphore) {
		unsafe { self.device.destroy_semaphore(semaphore, None) }
	}

	unsafe fn wait_idle(&self) -> Result<(), Self::Error> {
		unsafe { Ok(self.device.device_wait_idle()?) }
	}

	unsafe fn create_recording_target(&self) -> Result<Self::RecordingTarget, Self::Error> {
		unsafe {
			let pool = self.device.create_command_pool(
				&CommandPoolCreateInfo::default()
					.flags(CommandPoolCreateFlags::TRANSIENT)
					.queue_family_index(self.queue_family_index),
				None,
			)?;
			let cmd = self.device.allocate_command_buffers(
				&CommandBufferAllocateInfo::default()
					.command_pool(pool)
					.level(CommandBufferLevel::PRIMARY)
					.command_buffer_count(1),
			);
			match cmd.map(|cmds| cmds.first().copied()) {
				Ok(Some(cmd)) => Ok(AshRecordingTarget { pool, cmd }),
				Ok(None) => {
					self.device.destroy_command_pool(pool, None);
					Err(ash::vk::Result::ERROR_UNKNOWN.into())
				}
				Err(e) => {
					self.device.destroy_command_pool(pool, None);
					Err(e.into())
				}
			}
		}
	}

	unsafe fn begin_recording(&self, target: &mut Self::RecordingTarget) -> Result<(), Self::Error> {
		unsafe {
			self.device
				.reset_command_pool(target.pool, CommandPoolResetFlags::empty())?;
			self.device.begin_command_buffer(
				target.cmd,
				&CommandBufferBeginInfo::default().flags(CommandBufferUsageFlags::ONE_TIME_SUBMIT),
			)?;
			Ok(())
		}
	}

	unsafe fn end_recording(&self, target: &mut Self::RecordingTarget) -> Result<(), Self::Error> {
		unsafe { Ok(self.device.end_command_buffer(target.cmd)?) }
	}

	unsafe fn submit(
		&self,
		target: &Self::RecordingTarget,
		wait: Option<&Self::Semaphore>,
		signal: Option<&Self::Semaphore>,
		fence: &Self::Fence,
	) -> Result<(), Self::Error> {
		unsafe {
			let wait = wait.map(|s| [*s]);
			let signal = signal.map(|s| [*s]);
			let wait_stages = [PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
			let cmds = [target.cmd];
			let mut submit = SubmitInfo::default().command_buffers(&cmds);
			if let Some(wait) = wait.as_ref() {
				submit = submit.wait_semaphores(wait).wait_dst_stage_mask(&wait_stages);
			}
			if let Some(signal) = signal.as_ref() {
				submit = submit.signal_semaphores(signal);
			}
			let queue = self.queue.lock();
			Ok(self.device.queue_submit(*queue, &[submit], *fence)?)
		}
	}

	unsafe fn destroy_recording_target(&self, target: Self::RecordingTarget) {
		// command buffers are freed with their pool
		unsafe { self.device.destroy_command_pool(target.pool, None) }
	}

	unsafe fn alloc_buffer(&self, create_info: &BufferCreateInfo) -> Result<Self::Buffer, Self::Error> {
		unsafe {
			let buffer = self.device.create_buffer(
				&ash::vk::BufferCreateInfo::default()
					.usage(create_info.usage.to_ash_buffer_usage_flags())
					.size(create_info.size)
					.sharing_mode(SharingMode::EXCLUSIVE),
				None,
			)?;
			let allocation = (|| {
				self.set_debug_object_name(buffer, create_info.name)?;
				let requirements = self.device.get_buffer_memory_requirements(buffer);
				Ok::<_, AshError>(self.memory_allocator()?.allocate(&AllocationCreateDesc {
					requirements,
					name: create_info.name,
					location: create_info.usage.to_gpu_allocator_memory_location(),
					allocation_scheme: create_info.allocation_scheme.to_gpu_allocator_buffer(buffer),
					linear: true,
				})?)
			})();
			let allocation = match allocation {
				Ok(allocation) => allocation,
				Err(e) => {
					self.device.destroy_buffer(buffer, None);
					return Err(e);
				}
			};
			if let Err(e) = self
				.device
				.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
			{
				self.free_allocation(Some(allocation));
				self.device.destroy_buffer(buffer, None);
				return Err(e.into());
			}
			Ok(AshBuffer {
				buffer,
				size: create_info.size,
				allocation: Some(allocation),
			})
		}
	}

	unsafe fn mapped_buffer_to_slab(buffer: &mut Self::Buffer) -> Option<&mut (impl presser::Slab + '_)> {
		buffer
			.allocation
			.as_mut()
			.filter(|allocation| allocation.mapped_ptr().is_some())
	}

	unsafe fn cmd_copy_buffer(
		&self,
		target: &mut Self::RecordingTarget,
		src: &Self::Buffer,
		dst: &Self::Buffer,
		size: u64,
	) {
		unsafe {
			self.device.cmd_copy_buffer(
				target.cmd,
				src.buffer,
				dst.buffer,
				&[BufferCopy {
					src_offset: 0,
					dst_offset: 0,
					size,
				}],
			);
			// make the copy visible to every later read of this submission
			self.device.cmd_pipeline_barrier2(
				target.cmd,
				&DependencyInfo::default().memory_barriers(&[MemoryBarrier2::default()
					.src_stage_mask(PipelineStageFlags2::COPY)
					.src_access_mask(AccessFlags2::TRANSFER_WRITE)
					.dst_stage_mask(PipelineStageFlags2::ALL_COMMANDS)
					.dst_access_mask(AccessFlags2::MEMORY_READ)]),
			);
		}
	}

	unsafe fn cmd_copy_buffer_to_image(
		&self,
		target: &mut Self::RecordingTarget,
		src: &Self::Buffer,
		dst: &Self::Image,
		extent: Extent,
	) {
		unsafe {
			let range = ImageSubresourceRange {
				aspect_mask: ImageAspectFlags::COLOR,
				base_mip_level: 0,
				level_count: dst.mip_levels,
				base_array_layer: 0,
				layer_count: 1,
			};
			self.device.cmd_pipeline_barrier2(
				target.cmd,
				&DependencyInfo::default().image_memory_barriers(&[ImageMemoryBarrier2::default()
					.image(dst.image)
					.subresource_range(range)
					.old_layout(ImageLayout::UNDEFINED)
					.new_layout(ImageLayout::TRANSFER_DST_OPTIMAL)
					.src_stage_mask(PipelineStageFlags2::NONE)
					.src_access_mask(AccessFlags2::NONE)
					.dst_stage_mask(PipelineStageFlags2::COPY)
					.dst_access_mask(AccessFlags2::TRANSFER_WRITE)]),
			);
			self.device.cmd_copy_buffer_to_image(
				target.cmd,
				src.buffer,
				dst.image,
				ImageLayout::TRANSFER_DST_OPTIMAL,
				&[BufferImageCopy {
					buffer_offset: 0,
					buffer_row_length: 0,
					buffer_image_height: 0,
					image_subresource: ImageSubresourceLayers {
						aspect_mask: ImageAspectFlags::COLOR,
						mip_level: 0,
						base_array_layer: 0,
						layer_count: 1,
					},
					image_offset: Default::default(),
					image_extent: Extent3D {
						width: extent.width,
						height: extent.height,
						depth: 1,
					},
				}],
			);
			self.device.cmd_pipeline_barrier2(
				target.cmd,
				&DependencyInfo::default().image_memory_barriers(&[ImageMemoryBarrier2::default()
					.image(dst.image)
					.subresource_range(range)
					.old_layout(ImageLayout::TRANSFER_DST_OPTIMAL)
					.new_layout(ImageLayout::SHADER_READ_ONLY_OPTIMAL)
					.src_stage_mask(PipelineStageFlags2::COPY)
					.src_access_mask(AccessFlags2::TRANSFER_WRITE)
					.dst_stage_mask(PipelineStageFlags2::ALL_COMMANDS)
					.dst_access_mask(AccessFlags2::SHADER_SAMPLED_READ)]),
			);
		}
	}

	unsafe fn destroy_buffer(&self, mut buffer: Self::Buffer) {
		unsafe {
			self.free_allocation(buffer.allocation.take());
			self.device.destroy_buffer(buffer.buffer, None);
		}
	}

	unsafe fn alloc_image(&self, create_info: &ImageCreateInfo) -> Result<Self::Image, Self::Error> {
		unsafe {
			let image = self.device.create_image(
				&ash::vk::ImageCreateInfo::default()
					.image_type(ImageType::TYPE_2D)
					.format(create_info.format)
					.extent(Extent3D {
						width: create_info.extent.width,
						height: create_info.extent.height,
						depth: 1,
					})
					.mip_levels(create_info.mip_levels)
					.array_layers(1)
					.samples(create_info.samples.to_ash_sample_count_flags())
					.tiling(ImageTiling::OPTIMAL)
					.usage(create_info.usage.to_ash_image_usage_flags())
					.sharing_mode(SharingMode::EXCLUSIVE)
					.initial_layout(ImageLayout::UNDEFINED),
				None,
			)?;
			let allocation = (|| {
				self.set_debug_object_name(image, create_info.name)?;
				let requirements = self.device.get_image_memory_requirements(image);
				Ok::<_, AshError>(self.memory_allocator()?.allocate(&AllocationCreateDesc {
					requirements,
					name: create_info.name,
					location: MemoryLocation::GpuOnly,
					allocation_scheme: create_info.allocation_scheme.to_gpu_allocator_image(image),
					linear: false,
				})?)
			})();
			let allocation = match allocation {
				Ok(allocation) => allocation,
				Err(e) => {
					self.device.destroy_image(image, None);
					return Err(e);
				}
			};
			// the view needs bound memory, both fail the same way
			let image_view = self
				.device
				.bind_image_memory(image, allocation.memory(), allocation.offset())
				.map_err(AshError::from)
				.and_then(|()| self.create_view(image, create_info.format, create_info.mip_levels, create_info.name));
			let image_view = match image_view {
				Ok(image_view) => image_view,
				Err(e) => {
					self.free_allocation(Some(allocation));
					self.device.destroy_image(image, None);
					return Err(e);
				}
			};
			Ok(AshImage {
				image,
				image_view,
				format: create_info.format,
				mip_levels: create_info.mip_levels,
				allocation: Some(allocation),
			})
		}
	}

	fn image_view(image: &Self::Image) -> Self::ImageView {
		image.image_view
	}

	unsafe fn destroy_image(&self, mut image: Self::Image) {
		unsafe {
			self.device.destroy_image_view(image.image_view, None);
			self.free_allocation(image.allocation.take());
			self.device.destroy_image(image.image, None);
		}
	}

	unsafe fn create_sampler(&self, create_info: &SamplerCreateInfo) -> Result<Self::Sampler, Self::Error> {
		unsafe {
			let address_mode = create_info.address_mode.to_ash_address_mode();
			Ok(self.device.create_sampler(
				&ash::vk::SamplerCreateInfo::default()
					.mag_filter(create_info.mag_filter.to_ash_filter())
					.min_filter(create_info.min_filter.to_ash_filter())
					.mipmap_mode(create_info.mipmap_mode.to_ash_mipmap_mode())
					.address_mode_u(address_mode)
					.address_mode_v(address_mode)
					.address_mode_w(address_mode)
					.min_lod(0.)
					.max_lod(create_info.max_lod),
				None,
			)?)
		}
	}

	unsafe fn destroy_sampler(&self, sampler: Self::Sampler) {
		unsafe { self.device.destroy_sampler(sampler, None) }
	}

	unsafe fn create_descriptor_set(&self, capacity: u32) -> Result<Self::DescriptorSet, Self::Error> {
		unsafe {
			let bindings = [
				(0, DescriptorType::UNIFORM_BUFFER),
				(1, DescriptorType::STORAGE_BUFFER),
				(2, DescriptorType::COMBINED_IMAGE_SAMPLER),
			]
			.map(|(binding, ty)| {
				ash::vk::DescriptorSetLayoutBinding::default()
					.binding(binding)
					.descriptor_type(ty)
					.descriptor_count(capacity)
					.stage_flags(self.shader_stages)
			});
			let binding_flags = [DescriptorBindingFlags::UPDATE_AFTER_BIND
				| DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING
				| DescriptorBindingFlags::PARTIALLY_BOUND; 3];

			let set_layout = self.device.create_descriptor_set_layout(
				&DescriptorSetLayoutCreateInfo::default()
					.flags(DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
					.bindings(&bindings)
					.push_next(&mut DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags)),
				None,
			)?;

			let pipeline_layout = self.device.create_pipeline_layout(
				&PipelineLayoutCreateInfo::default()
					.set_layouts(&[set_layout])
					.push_constant_ranges(&[PushConstantRange {
						offset: 0,
						size: PUSH_CONSTANT_SIZE,
						stage_flags: self.shader_stages,
					}]),
				None,
			)?;

			let pool = self.device.create_descriptor_pool(
				&DescriptorPoolCreateInfo::default()
					.flags(DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
					.pool_sizes(&bindings.map(|b| {
						DescriptorPoolSize::default()
							.ty(b.descriptor_type)
							.descriptor_count(b.descriptor_count)
					}))
					.max_sets(1),
				None,
			)?;

			let set = self.device.allocate_descriptor_sets(
				&DescriptorSetAllocateInfo::default()
					.descriptor_pool(pool)
					.set_layouts(&[set_layout]),
			)?;
			let set = set.first().copied().ok_or(ash::vk::Result::ERROR_OUT_OF_POOL_MEMORY)?;
			log::debug!("Created bindless descriptor set with {} slots per binding", capacity);

			Ok(AshDescriptorSet {
				pipeline_layout,
				set_layout,
				pool,
				set,
			})
		}
	}

	unsafe fn write_descriptors(&self, set: &Self::DescriptorSet, writes: &[DescriptorWrite<'_, Self>]) {
		unsafe {
			let buffer_infos = writes
				.iter()
				.filter_map(|write| match write {
					DescriptorWrite::UniformBuffer { buffer, .. } => Some(
						DescriptorBufferInfo::default()
							.buffer(buffer.buffer)
							.offset(0)
							.range(buffer.size.min(self.max_uniform_buffer_range())),
					),
					DescriptorWrite::StorageBuffer { buffer, .. } => Some(
						DescriptorBufferInfo::default()
							.buffer(buffer.buffer)
							.offset(0)
							.range(WHOLE_SIZE),
					),
					DescriptorWrite::Texture { .. } => None,
				})
				.collect::<Vec<_>>();
			let image_infos = writes
				.iter()
				.filter_map(|write| match write {
					DescriptorWrite::Texture { view, sampler, .. } => Some(
						DescriptorImageInfo::default()
							.image_view(*view)
							.sampler(*sampler)
							.image_layout(ImageLayout::SHADER_READ_ONLY_OPTIMAL),
					),
					_ => None,
				})
				.collect::<Vec<_>>();

			let mut buffer_info_index = 0;
			let mut image_info_index = 0;
			let vk_writes = writes
				.iter()
				.map(|write| {
					let out = WriteDescriptorSet::default()
						.dst_set(set.set)
						.dst_binding(write.binding().binding())
						.dst_array_element(write.index());
					match write {
						DescriptorWrite::UniformBuffer { .. } | DescriptorWrite::StorageBuffer { .. } => {
							let ty = if matches!(write, DescriptorWrite::UniformBuffer { .. }) {
								DescriptorType::UNIFORM_BUFFER
							} else {
								DescriptorType::STORAGE_BUFFER
							};
							buffer_info_index += 1;
							out.descriptor_type(ty)
								.buffer_info(&buffer_infos[buffer_info_index - 1..buffer_info_index])
						}
						DescriptorWrite::Texture { .. } => {
							image_info_index += 1;
							out.descriptor_type(DescriptorType::COMBINED_IMAGE_SAMPLER)
								.image_info(&image_infos[image_info_index - 1..image_info_index])
						}
					}
				})
				.collect::<Vec<_>>();
			self.device.update_descriptor_sets(&vk_writes, &[]);
		}
	}

	unsafe fn destroy_descriptor_set(&self, set: Self::DescriptorSet) {
		unsafe {
			// descriptor sets allocated from pool are freed implicitly
			self.device.destroy_descriptor_pool(set.pool, None);
			self.device.destroy_pipeline_layout(set.pipeline_layout, None);
			self.device.destroy_descriptor_set_layout(set.set_layout, None);
		}
	}

	unsafe fn min_uniform_buffer_offset_alignment(&self) -> u64 {
		self.properties.limits.min_uniform_buffer_offset_alignment
	}

	unsafe fn max_sample_count(&self) -> SampleCount {
		let limits = &self.properties.limits;
		SampleCount::highest_in(limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts)
	}

	unsafe fn max_descriptor_capacity(&self) -> u32 {
		self.max_descriptor_capacity
	}

	unsafe fn max_uniform_buffer_range(&self) -> u64 {
		u64::from(self.properties.limits.max_uniform_buffer_range)
	}

	unsafe fn depth_format(&self) -> Result<Format, Self::Error> {
		unsafe {
			[Format::D32_SFLOAT, Format::D32_SFLOAT_S8_UINT, Format::D24_UNORM_S8_UINT]
				.into_iter()
				.find(|format| {
					self.instance
						.get_physical_device_format_properties(self.physical_device, *format)
						.optimal_tiling_features
						.contains(FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
				})
				.ok_or(AshError::NoDepthFormat)
		}
	}

	unsafe fn surface_support(&self, surface: Self::Surface) -> Result<SurfaceSupport, Self::Error> {
		unsafe {
			let ext = self.extensions.surface()?;
			if !ext.get_physical_device_surface_support(self.physical_device, self.queue_family_index, surface)? {
				return Err(AshError::PresentUnsupported);
			}
			Ok(SurfaceSupport {
				capabilities: ext.get_physical_device_surface_capabilities(self.physical_device, surface)?,
				formats: ext.get_physical_device_surface_formats(self.physical_device, surface)?,
				present_modes: ext.get_physical_device_surface_present_modes(self.physical_device, surface)?,
			})
		}
	}

	unsafe fn create_swapchain(
		&self,
		surface: Self::Surface,
		create_info: &SwapchainCreateInfo,
		old_swapchain: Option<&Self::Swapchain>,
	) -> Result<Self::Swapchain, Self::Error> {
		unsafe {
			let ext = self.extensions.swapchain()?;
			let swapchain = ext.create_swapchain(
				&ash::vk::SwapchainCreateInfoKHR::default()
					.surface(surface)
					.min_image_count(create_info.min_image_count)
					.image_format(create_info.format)
					.image_color_space(create_info.color_space)
					.image_extent(create_info.extent)
					.image_array_layers(1)
					.image_usage(ImageUsageFlags::COLOR_ATTACHMENT)
					.image_sharing_mode(SharingMode::EXCLUSIVE)
					.pre_transform(create_info.pre_transform)
					.composite_alpha(CompositeAlphaFlagsKHR::OPAQUE)
					.present_mode(create_info.present_mode)
					.clipped(true)
					.old_swapchain(old_swapchain.map_or(SwapchainKHR::null(), |old| old.swapchain)),
				None,
			)?;
			let images = match ext.get_swapchain_images(swapchain) {
				Ok(images) => images,
				Err(e) => {
					ext.destroy_swapchain(swapchain, None);
					return Err(e.into());
				}
			};
			let mut image_views = Vec::with_capacity(images.len());
			for (i, image) in images.iter().enumerate() {
				match self.create_view(*image, create_info.format, 1, &format!("swapchain image {i}")) {
					Ok(view) => image_views.push(view),
					Err(e) => {
						for view in image_views {
							self.device.destroy_image_view(view, None);
						}
						ext.destroy_swapchain(swapchain, None);
						return Err(e);
					}
				}
			}
			Ok(AshSwapchain {
				swapchain,
				images,
				image_views,
			})
		}
	}

	fn swapchain_image_views(swapchain: &Self::Swapchain) -> &[Self::ImageView] {
		&swapchain.image_views
	}

	unsafe fn acquire_next_image(
		&self,
		swapchain: &Self::Swapchain,
		signal: &Self::Semaphore,
	) -> Result<AcquireOutcome, Self::Error> {
		unsafe {
			match self
				.extensions
				.swapchain()?
				.acquire_next_image(swapchain.swapchain, u64::MAX, *signal, Fence::null())
			{
				Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
				Err(ash::vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
				Err(e) => Err(e.into()),
			}
		}
	}

	unsafe fn present(
		&self,
		swapchain: &Self::Swapchain,
		image_index: u32,
		wait: &Self::Semaphore,
	) -> Result<PresentOutcome, Self::Error> {
		unsafe {
			let queue = self.queue.lock();
			match self.extensions.swapchain()?.queue_present(
				*queue,
				&PresentInfoKHR::default()
					.wait_semaphores(&[*wait])
					.swapchains(&[swapchain.swapchain])
					.image_indices(&[image_index]),
			) {
				Ok(false) => Ok(PresentOutcome::Optimal),
				Ok(true) => Ok(PresentOutcome::Suboptimal),
				Err(ash::vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
				Err(e) => Err(e.into()),
			}
		}
	}

	unsafe fn destroy_swapchain(&self, swapchain: Self::Swapchain) {
		unsafe {
			for view in swapchain.image_views {
				self.device.destroy_image_view(view, None);
			}
			// swapchain images are owned by the swapchain
			if let Ok(ext) = self.extensions.swapchain() {
				ext.destroy_swapchain(swapchain.swapchain, None);
			}
		}
	}
}
