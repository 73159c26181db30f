mod bindless;
mod buffer;
mod draw_params;
mod image;

pub use bindless::*;
pub use buffer::*;
pub use draw_params::*;
pub use image::*;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum AllocationScheme {
	/// Perform a dedicated, driver-managed allocation for the given buffer or image, allowing it to perform
	/// optimizations on this type of allocation.
	Dedicated,
	/// The memory for this resource will be allocated and managed by gpu-allocator.
	#[default]
	AllocatorManaged,
}
