use crate::descriptor::{AddressMode, AllocationScheme, BufferUsage, Filter, ImageUsage, SampleCount, is_depth_format};
use ash::vk::{
	BufferUsageFlags, Format, ImageAspectFlags, ImageUsageFlags, SampleCountFlags, SamplerAddressMode,
	SamplerMipmapMode,
};
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::AllocationScheme as GpuAllocationScheme;

impl AllocationScheme {
	pub fn to_gpu_allocator_buffer(&self, buffer: ash::vk::Buffer) -> GpuAllocationScheme {
		match self {
			AllocationScheme::Dedicated => GpuAllocationScheme::DedicatedBuffer(buffer),
			AllocationScheme::AllocatorManaged => GpuAllocationScheme::GpuAllocatorManaged,
		}
	}

	pub fn to_gpu_allocator_image(&self, image: ash::vk::Image) -> GpuAllocationScheme {
		match self {
			AllocationScheme::Dedicated => GpuAllocationScheme::DedicatedImage(image),
			AllocationScheme::AllocatorManaged => GpuAllocationScheme::GpuAllocatorManaged,
		}
	}
}

impl BufferUsage {
	pub fn to_ash_buffer_usage_flags(&self) -> BufferUsageFlags {
		let mut out = BufferUsageFlags::empty();
		for (usage, flag) in [
			(BufferUsage::TRANSFER_SRC, BufferUsageFlags::TRANSFER_SRC),
			(BufferUsage::TRANSFER_DST, BufferUsageFlags::TRANSFER_DST),
			(BufferUsage::UNIFORM_BUFFER, BufferUsageFlags::UNIFORM_BUFFER),
			(BufferUsage::STORAGE_BUFFER, BufferUsageFlags::STORAGE_BUFFER),
			(BufferUsage::INDEX_BUFFER, BufferUsageFlags::INDEX_BUFFER),
			(BufferUsage::VERTEX_BUFFER, BufferUsageFlags::VERTEX_BUFFER),
			(BufferUsage::INDIRECT_BUFFER, BufferUsageFlags::INDIRECT_BUFFER),
		] {
			if self.contains(usage) {
				out |= flag;
			}
		}
		// empty flags are invalid in vulkan, this is reachable via a buffer that is only host mappable
		if out.is_empty() {
			BufferUsageFlags::TRANSFER_SRC
		} else {
			out
		}
	}

	/// prioritizes MAP_WRITE over MAP_READ
	pub fn to_gpu_allocator_memory_location(&self) -> MemoryLocation {
		if self.contains(BufferUsage::MAP_WRITE) {
			MemoryLocation::CpuToGpu
		} else if self.contains(BufferUsage::MAP_READ) {
			MemoryLocation::GpuToCpu
		} else {
			MemoryLocation::GpuOnly
		}
	}
}

impl ImageUsage {
	pub fn to_ash_image_usage_flags(&self) -> ImageUsageFlags {
		let mut out = ImageUsageFlags::empty();
		for (usage, flag) in [
			(ImageUsage::TRANSFER_SRC, ImageUsageFlags::TRANSFER_SRC),
			(ImageUsage::TRANSFER_DST, ImageUsageFlags::TRANSFER_DST),
			(ImageUsage::SAMPLED, ImageUsageFlags::SAMPLED),
			(ImageUsage::STORAGE, ImageUsageFlags::STORAGE),
			(ImageUsage::COLOR_ATTACHMENT, ImageUsageFlags::COLOR_ATTACHMENT),
			(ImageUsage::DEPTH_STENCIL_ATTACHMENT, ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
			(ImageUsage::TRANSIENT_ATTACHMENT, ImageUsageFlags::TRANSIENT_ATTACHMENT),
		] {
			if self.contains(usage) {
				out |= flag;
			}
		}
		out
	}
}

impl SampleCount {
	pub fn to_ash_sample_count_flags(&self) -> SampleCountFlags {
		match self {
			SampleCount::Sample1 => SampleCountFlags::TYPE_1,
			SampleCount::Sample2 => SampleCountFlags::TYPE_2,
			SampleCount::Sample4 => SampleCountFlags::TYPE_4,
			SampleCount::Sample8 => SampleCountFlags::TYPE_8,
			SampleCount::Sample16 => SampleCountFlags::TYPE_16,
			SampleCount::Sample32 => SampleCountFlags::TYPE_32,
			SampleCount::Sample64 => SampleCountFlags::TYPE_64,
		}
	}

	/// The highest sample count contained in `flags`.
	pub fn highest_in(flags: SampleCountFlags) -> SampleCount {
		[
			(SampleCountFlags::TYPE_64, SampleCount::Sample64),
			(SampleCountFlags::TYPE_32, SampleCount::Sample32),
			(SampleCountFlags::TYPE_16, SampleCount::Sample16),
			(SampleCountFlags::TYPE_8, SampleCount::Sample8),
			(SampleCountFlags::TYPE_4, SampleCount::Sample4),
			(SampleCountFlags::TYPE_2, SampleCount::Sample2),
		]
		.into_iter()
		.find(|(flag, _)| flags.contains(*flag))
		.map_or(SampleCount::Sample1, |(_, samples)| samples)
	}
}

impl Filter {
	pub fn to_ash_filter(&self) -> ash::vk::Filter {
		match self {
			Filter::Nearest => ash::vk::Filter::NEAREST,
			Filter::Linear => ash::vk::Filter::LINEAR,
		}
	}

	pub fn to_ash_mipmap_mode(&self) -> SamplerMipmapMode {
		match self {
			Filter::Nearest => SamplerMipmapMode::NEAREST,
			Filter::Linear => SamplerMipmapMode::LINEAR,
		}
	}
}

impl AddressMode {
	pub fn to_ash_address_mode(&self) -> SamplerAddressMode {
		match self {
			AddressMode::Repeat => SamplerAddressMode::REPEAT,
			AddressMode::MirroredRepeat => SamplerAddressMode::MIRRORED_REPEAT,
			AddressMode::ClampToEdge => SamplerAddressMode::CLAMP_TO_EDGE,
		}
	}
}

pub fn format_aspect(format: Format) -> ImageAspectFlags {
	if is_depth_format(format) {
		ImageAspectFlags::DEPTH
	} else {
		ImageAspectFlags::COLOR
	}
}
