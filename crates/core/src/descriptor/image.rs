use crate::descriptor::AllocationScheme;

pub type Format = ash::vk::Format;
pub type ColorSpace = ash::vk::ColorSpaceKHR;
pub type Extent = ash::vk::Extent2D;

bitflags::bitflags! {
	/// Image usage specify how you may use the image.
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
	pub struct ImageUsage: u64 {
		/// Can be used as a source of transfer operations
		const TRANSFER_SRC = 0b1;
		/// Can be used as a destination of transfer operations
		const TRANSFER_DST = 0b10;
		/// Can be sampled from with a sampler
		const SAMPLED = 0b100;
		/// Can be used as storage image
		const STORAGE = 0b1000;
		/// Can be used as framebuffer color attachment
		const COLOR_ATTACHMENT = 0b1_0000;
		/// Can be used as framebuffer depth/stencil attachment
		const DEPTH_STENCIL_ATTACHMENT = 0b10_0000;
		/// Contents never leave tile memory, like a multisampled target that is resolved at the end of the pass
		const TRANSIENT_ATTACHMENT = 0b100_0000;
	}
}

/// The amount of samples of the Image. Must be [`SampleCount::Sample1`] if the image is not multisampled.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SampleCount {
	#[default]
	Sample1,
	Sample2,
	Sample4,
	Sample8,
	Sample16,
	Sample32,
	Sample64,
}

impl SampleCount {
	pub fn samples(&self) -> u32 {
		1 << (*self as u32)
	}
}

/// Whether a format carries depth, used to pick the view aspect.
pub fn is_depth_format(format: Format) -> bool {
	matches!(
		format,
		Format::D16_UNORM
			| Format::X8_D24_UNORM_PACK32
			| Format::D32_SFLOAT
			| Format::D16_UNORM_S8_UINT
			| Format::D24_UNORM_S8_UINT
			| Format::D32_SFLOAT_S8_UINT
	)
}

/// 2D images only, with a single array layer.
#[derive(Copy, Clone, Debug)]
pub struct ImageCreateInfo<'a> {
	pub format: Format,
	pub extent: Extent,
	pub mip_levels: u32,
	pub samples: SampleCount,
	pub usage: ImageUsage,
	/// Determines how this allocation should be managed.
	pub allocation_scheme: AllocationScheme,
	/// Name of the image, for tracking and debugging purposes
	pub name: &'a str,
}

impl Default for ImageCreateInfo<'_> {
	fn default() -> Self {
		Self {
			format: Format::UNDEFINED,
			extent: Extent::default(),
			mip_levels: 1,
			samples: SampleCount::default(),
			usage: ImageUsage::empty(),
			allocation_scheme: AllocationScheme::default(),
			name: "",
		}
	}
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Filter {
	Nearest,
	#[default]
	Linear,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum AddressMode {
	#[default]
	Repeat,
	MirroredRepeat,
	ClampToEdge,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SamplerCreateInfo {
	pub mag_filter: Filter,
	pub min_filter: Filter,
	pub mipmap_mode: Filter,
	pub address_mode: AddressMode,
	pub max_lod: f32,
}

impl Default for SamplerCreateInfo {
	fn default() -> Self {
		Self {
			mag_filter: Filter::Linear,
			min_filter: Filter::Linear,
			mipmap_mode: Filter::Linear,
			address_mode: AddressMode::Repeat,
			max_lod: 0.,
		}
	}
}

impl SamplerCreateInfo {
	/// Trilinear sampler covering all mip levels of an image with `mip_levels`.
	pub fn for_mip_levels(mip_levels: u32) -> Self {
		Self {
			max_lod: mip_levels.saturating_sub(1) as f32,
			..Self::default()
		}
	}
}

/// A sampled texture registered in the [`BindlessResourceTable`](crate::descriptor::BindlessResourceTable).
pub struct StoredTexture<I, S> {
	pub image: I,
	pub sampler: S,
}
